//! Multi-get batching: N Mercury requests travel as one request whose body
//! is a `MercuryMultiGetRequest`, and come back as one
//! `MercuryMultiGetReply` whose entries line up with the requests.

use prost::Message;

use sw_domain::{Error, Result};

use crate::mercury::{self, Request, COMMAND, MULTI_GET_CONTENT_TYPE};
use crate::schema::{MercuryMultiGetReply, MercuryMultiGetRequest};

/// Wrap `requests` into a single multi-get request addressed to `uri`.
pub fn encode_batch(uri: impl Into<String>, requests: &[Request]) -> Request {
    let body = MercuryMultiGetRequest {
        request: requests.iter().map(Request::header).collect(),
    };
    Request::new(uri)
        .content_type(MULTI_GET_CONTENT_TYPE)
        .payload(body.encode_to_vec())
}

/// Demultiplex a multi-get reply into one decoded `M` per request.
///
/// Fails on the first entry with a failure status, naming that entry's URI.
pub fn decode_batch<M: Message + Default>(
    requests: &[Request],
    reply: MercuryMultiGetReply,
) -> Result<Vec<M>> {
    if reply.reply.len() != requests.len() {
        tracing::warn!(
            replies = reply.reply.len(),
            requests = requests.len(),
            "multi-get reply length mismatch"
        );
        return Err(Error::protocol(
            COMMAND,
            format!(
                "multi-get returned {} replies for {} requests",
                reply.reply.len(),
                requests.len()
            ),
        ));
    }

    requests
        .iter()
        .zip(reply.reply)
        .map(|(request, entry)| {
            if mercury::is_failure(entry.status_code) {
                tracing::debug!(uri = %request.uri, status = entry.status_code, "multi-get entry failed");
                return Err(Error::Protocol {
                    command: COMMAND.into(),
                    uri: Some(request.uri.clone()),
                    status: Some(entry.status_code),
                    message: entry.status_code.to_string(),
                });
            }
            M::decode(entry.body.as_slice()).map_err(|e| mercury::decode_error(&request.uri, e))
        })
        .collect()
}
