//! XML text -> raw ODX document tree.

use thiserror::Error;

use crate::raw::OdxDocument;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("XML deserialization failed: {0}")]
    Xml(#[from] quick_xml::DeError),
    #[error("document is neither a DIAG-LAYER-CONTAINER nor a COMPARAM-SUBSET")]
    EmptyDocument,
}

/// Parse one ODX document (the text of a single `.odx` file).
///
/// The result is the raw attributed tree; reference resolution and typing
/// happen in `odx-db`.
pub fn parse_document(xml: &str) -> Result<OdxDocument, ParseError> {
    let doc: OdxDocument = quick_xml::de::from_str(xml)?;

    if doc.diag_layer_container.is_none() && doc.comparam_subset.is_none() {
        return Err(ParseError::EmptyDocument);
    }

    Ok(doc)
}
