//! Mercury request/reply codec.
//!
//! A Mercury request travels as the `sp/hm_b64` command with args
//! `[method_code, base64(header), base64(payload)?]`.  The reply's `result`
//! is `[base64(header), base64(body)]`; the header's `status_code` decides
//! whether the body is decoded with the schema chosen by the caller.

use base64::prelude::*;
use prost::Message;
use serde_json::{json, Value};

use sw_domain::{Error, Result};

use crate::envelope::Command;
use crate::schema;

/// Command name shared by all Mercury traffic.
pub const COMMAND: &str = "sp/hm_b64";

pub const DEFAULT_METHOD: &str = "GET";

/// Content type announcing a multi-get payload.
pub const MULTI_GET_CONTENT_TYPE: &str = "vnd.spotify/mercury-mget-request";

/// A Mercury request before it is encoded into an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub uri: String,
    pub method: String,
    pub content_type: String,
    pub source: String,
    /// Already-encoded request body.
    pub payload: Option<Vec<u8>>,
}

impl Request {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            method: DEFAULT_METHOD.into(),
            content_type: String::new(),
            source: String::new(),
            payload: None,
        }
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Encode `message` and attach it as the request body.
    pub fn payload_message<M: Message>(self, message: &M) -> Self {
        self.payload(message.encode_to_vec())
    }

    /// Numeric method code placed in `args[0]`.
    pub fn method_code(&self) -> u8 {
        match self.method.as_str() {
            "SUB" => 1,
            "UNSUB" => 2,
            _ => 0,
        }
    }

    /// Protocol-buffer header describing this request.
    pub fn header(&self) -> schema::MercuryRequest {
        schema::MercuryRequest {
            uri: self.uri.clone(),
            content_type: self.content_type.clone(),
            method: self.method.as_bytes().to_vec(),
            source: self.source.clone(),
            ..Default::default()
        }
    }
}

/// Build a request for `uri`, defaulting the method to `GET`.
pub fn build_request(uri: impl Into<String>, method: Option<&str>, payload: Option<Vec<u8>>) -> Request {
    let mut request = Request::new(uri);
    if let Some(method) = method {
        request = request.method(method);
    }
    request.payload = payload;
    request
}

/// Wrap `request` into the command handed to the transport.
pub fn encode_envelope(request: &Request) -> Command {
    let mut args = vec![
        json!(request.method_code()),
        Value::String(BASE64_STANDARD.encode(request.header().encode_to_vec())),
    ];
    if let Some(payload) = &request.payload {
        args.push(Value::String(BASE64_STANDARD.encode(payload)));
    }
    Command::new(COMMAND, args)
}

/// Status codes the service uses to signal an application-level failure.
pub fn is_failure(status: i32) -> bool {
    (400..=599).contains(&status)
}

/// Decode a reply `result` for `request` with the schema `M`.
pub fn decode_reply<M: Message + Default>(request: &Request, result: Option<&Value>) -> Result<M> {
    let body = reply_body(request, result)?;
    M::decode(body.as_slice()).map_err(|e| decode_error(&request.uri, e))
}

/// Check the reply header and return the raw body bytes.
pub fn reply_body(request: &Request, result: Option<&Value>) -> Result<Vec<u8>> {
    let parts = result
        .and_then(Value::as_array)
        .ok_or_else(|| malformed(&request.uri, "reply result is not an array"))?;

    let header_b64 = parts
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(&request.uri, "reply header missing"))?;
    let header = schema::MercuryRequest::decode(decode_base64(&request.uri, header_b64)?.as_slice())
        .map_err(|e| decode_error(&request.uri, e))?;

    if is_failure(header.status_code) {
        tracing::debug!(uri = %request.uri, status = header.status_code, "mercury request failed");
        return Err(Error::Protocol {
            command: COMMAND.into(),
            uri: Some(request.uri.clone()),
            status: Some(header.status_code),
            message: format!("Failed response: {}", header.status_code),
        });
    }

    match parts.get(1).and_then(Value::as_str) {
        Some(body) => decode_base64(&request.uri, body),
        None => Ok(Vec::new()),
    }
}

fn decode_base64(uri: &str, encoded: &str) -> Result<Vec<u8>> {
    // Tolerate line-wrapped base64.
    let compact: String = encoded.split_ascii_whitespace().collect();
    BASE64_STANDARD
        .decode(compact)
        .map_err(|e| {
            tracing::warn!(uri = %uri, error = %e, "invalid base64 in mercury reply");
            Error::Decode(format!("{uri}: invalid base64: {e}"))
        })
}

pub(crate) fn decode_error(uri: &str, err: prost::DecodeError) -> Error {
    tracing::warn!(uri = %uri, error = %err, "failed to decode mercury message");
    Error::Decode(format!("{uri}: {err}"))
}

fn malformed(uri: &str, message: &str) -> Error {
    tracing::warn!(uri = %uri, reason = message, "malformed mercury reply");
    Error::Protocol {
        command: COMMAND.into(),
        uri: Some(uri.to_string()),
        status: None,
        message: message.to_string(),
    }
}

/// Decode the args of an `sp/hm_b64` command back into a request.  Used by
/// tests and local fakes of the access point.
pub fn decode_request(args: &[Value]) -> Result<Request> {
    let header_b64 = args
        .get(1)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Decode("request header missing".into()))?;
    let header = schema::MercuryRequest::decode(decode_base64("request", header_b64)?.as_slice())
        .map_err(|e| decode_error("request", e))?;
    let payload = match args.get(2).and_then(Value::as_str) {
        Some(body) => Some(decode_base64(&header.uri, body)?),
        None => None,
    };
    Ok(Request {
        method: String::from_utf8_lossy(&header.method).into_owned(),
        uri: header.uri,
        content_type: header.content_type,
        source: header.source,
        payload,
    })
}

/// Encode a reply `result` the way the service does.  Used by tests and
/// local fakes of the access point.
pub fn encode_reply(status_code: i32, body: &[u8]) -> Value {
    let header = schema::MercuryRequest {
        status_code,
        ..Default::default()
    };
    json!([
        BASE64_STANDARD.encode(header.encode_to_vec()),
        BASE64_STANDARD.encode(body),
    ])
}
