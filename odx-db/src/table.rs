//! Lookup tables: a key value decoded earlier selects which structure
//! governs the rest of the message.

use crate::dop::Dop;
use crate::error::CodecError;
use crate::handles::{Handle, Link};
use crate::value::OdxValue;

#[derive(Debug, Clone)]
pub struct TableRow {
    pub id: String,
    pub short_name: String,
    pub long_name: Option<String>,
    /// KEY, parsed with the data type of the table's key DOP.
    pub key: OdxValue,
    /// Structure (or plain DOP) governing the row's payload, if any.
    pub structure: Option<Link<Dop>>,
}

#[derive(Debug, Clone)]
pub struct Table {
    pub id: String,
    pub short_name: String,
    pub long_name: Option<String>,
    pub semantic: Option<String>,
    /// DOP used to code the key value itself.
    pub key_dop: Link<Dop>,
    pub rows: Vec<Handle<TableRow>>,
}

impl Table {
    /// Row whose key equals `key`.
    pub fn row_by_key<'a>(
        &self,
        rows: &'a [TableRow],
        key: &OdxValue,
    ) -> Result<&'a TableRow, CodecError> {
        self.rows
            .iter()
            .map(|h| &rows[h.index()])
            .find(|row| row.key == *key)
            .ok_or_else(|| CodecError::InvalidTableKey {
                table: self.short_name.clone(),
                key: key.to_string(),
            })
    }

    /// Row selected by its short name (the encode-side key form).
    pub fn row_by_name<'a>(
        &self,
        rows: &'a [TableRow],
        name: &str,
    ) -> Result<&'a TableRow, CodecError> {
        self.rows
            .iter()
            .map(|h| &rows[h.index()])
            .find(|row| row.short_name == name)
            .ok_or_else(|| CodecError::InvalidTableKey {
                table: self.short_name.clone(),
                key: name.to_string(),
            })
    }
}
