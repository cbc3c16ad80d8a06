//! Diagnostic services and message dispatch.

use crate::database::CodecScope;
use crate::dop::Structure;
use crate::error::{CodecError, DispatchError};
use crate::handles::{Handle, Link};
use crate::param::{self, ParamValue};
use crate::state::{DecodeState, EncodeState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    Request,
    PosResponse,
    NegResponse,
    GlobalNegResponse,
}

/// A request or response definition: a named top-level parameter list.
#[derive(Debug, Clone)]
pub struct MessageDef {
    pub id: String,
    pub short_name: String,
    pub role: MessageRole,
    pub structure: Structure,
}

impl MessageDef {
    /// Encode a structure value into message bytes.
    ///
    /// `triggering_request` supplies the bytes MATCHING-REQUEST-PARAM
    /// parameters copy from; only responses need it.
    pub fn encode(
        &self,
        scope: &CodecScope<'_>,
        values: &ParamValue,
        triggering_request: Option<&[u8]>,
    ) -> Result<Vec<u8>, CodecError> {
        let mut state = EncodeState::new();
        state.triggering_request = triggering_request.map(<[u8]>::to_vec);
        self.structure.encode(values, scope, &mut state)?;
        param::patch_length_keys(&mut state)?;
        Ok(state.coded)
    }

    /// Decode message bytes into a structure value. Every byte must be
    /// accounted for; trailing bytes are a [`CodecError::BufferOverrun`].
    ///
    /// `triggering_request` supplies the bytes MATCHING-REQUEST-PARAM
    /// parameters copy from; decoding a definition that contains one
    /// without it fails with [`CodecError::MissingMatchingRequest`].
    pub fn decode(
        &self,
        scope: &CodecScope<'_>,
        data: &[u8],
        triggering_request: Option<&[u8]>,
    ) -> Result<ParamValue, CodecError> {
        let mut state = DecodeState::new(data);
        state.triggering_request = triggering_request;
        let values = self.structure.decode(scope, &mut state)?;
        if state.cursor_byte < data.len() {
            return Err(CodecError::BufferOverrun {
                unused: data.len() - state.cursor_byte,
            });
        }
        Ok(values)
    }
}

#[derive(Debug, Clone)]
pub struct DiagService {
    pub id: String,
    pub short_name: String,
    pub long_name: Option<String>,
    pub semantic: Option<String>,
    pub addressing: Option<String>,
    pub request: Option<Link<MessageDef>>,
    pub pos_responses: Vec<Link<MessageDef>>,
    pub neg_responses: Vec<Link<MessageDef>>,
}

impl DiagService {
    /// All message definitions of this service, requests first.
    pub fn message_links(&self) -> impl Iterator<Item = &Link<MessageDef>> {
        self.request
            .iter()
            .chain(&self.pos_responses)
            .chain(&self.neg_responses)
    }
}

/// One successful interpretation of a coded message.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    pub service: Handle<DiagService>,
    pub service_name: String,
    pub message: Handle<MessageDef>,
    pub message_name: String,
    pub role: MessageRole,
    pub values: ParamValue,
}

/// `Ok(None)` means the definition does not apply to these bytes. A
/// missing triggering request is not a mismatch; it is surfaced so the
/// caller can decide whether request bytes were required.
fn try_decode(
    scope: &CodecScope<'_>,
    service: Handle<DiagService>,
    message: Handle<MessageDef>,
    data: &[u8],
    triggering_request: Option<&[u8]>,
) -> Result<Option<DecodedMessage>, CodecError> {
    let service_def = &scope.db.services[service.index()];
    let message_def = &scope.db.messages[message.index()];
    match message_def.decode(scope, data, triggering_request) {
        Ok(values) => Ok(Some(DecodedMessage {
            service,
            service_name: service_def.short_name.clone(),
            message,
            message_name: message_def.short_name.clone(),
            role: message_def.role,
            values,
        })),
        Err(CodecError::PatternMismatch { .. }) => Ok(None),
        Err(CodecError::MissingMatchingRequest) => Err(CodecError::MissingMatchingRequest),
        Err(err) => {
            log::debug!(
                "Message definition '{}' does not apply: {err}",
                message_def.short_name
            );
            Ok(None)
        }
    }
}

/// Services of the layer whose request or response pattern matches the
/// coded message. Several matches are expected; ODX does not guarantee
/// pattern uniqueness.
pub fn identify(
    scope: &CodecScope<'_>,
    data: &[u8],
) -> Result<Vec<Handle<DiagService>>, DispatchError> {
    let mut candidates = Vec::new();
    for &(_, service) in &scope.layer.services {
        let service_def = &scope.db.services[service.index()];
        let mut matches = false;
        for link in service_def.message_links() {
            let Ok(m) = link.get() else { continue };
            match try_decode(scope, service, m, data, None) {
                Ok(Some(_)) => {
                    matches = true;
                    break;
                }
                // Identification has no request at hand; a response
                // definition whose constants all matched up to its
                // request copy still identifies the service.
                Err(CodecError::MissingMatchingRequest) => {
                    matches = true;
                    break;
                }
                _ => {}
            }
        }
        if matches {
            candidates.push(service);
        }
    }
    if candidates.is_empty() {
        return Err(DispatchError::NoMatchingService);
    }
    Ok(candidates)
}

/// Decode a coded message against every applicable definition of the
/// layer, one result per match, in service declaration order.
///
/// With `expected_request` set, only responses of services whose request
/// definition matches those bytes are considered, and the bytes feed any
/// MATCHING-REQUEST-PARAM parameters of those responses.
pub fn decode_message(
    scope: &CodecScope<'_>,
    data: &[u8],
    expected_request: Option<&[u8]>,
) -> Result<Vec<DecodedMessage>, DispatchError> {
    let mut results = Vec::new();
    for &(_, service) in &scope.layer.services {
        let service_def = &scope.db.services[service.index()];

        if let Some(request_bytes) = expected_request {
            let request_matches = match service_def.request.as_ref().map(Link::get) {
                Some(Ok(m)) => try_decode(scope, service, m, request_bytes, None)?.is_some(),
                _ => false,
            };
            if !request_matches {
                continue;
            }
            for link in service_def.pos_responses.iter().chain(&service_def.neg_responses) {
                if let Ok(m) = link.get()
                    && let Some(decoded) =
                        try_decode(scope, service, m, data, Some(request_bytes))?
                {
                    results.push(decoded);
                }
            }
        } else {
            for link in service_def.message_links() {
                if let Ok(m) = link.get()
                    && let Some(decoded) = try_decode(scope, service, m, data, None)?
                {
                    results.push(decoded);
                }
            }
        }
    }
    if results.is_empty() {
        return Err(DispatchError::NoMatchingService);
    }
    Ok(results)
}
