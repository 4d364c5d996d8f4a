//! JSON envelopes exchanged over the socket.
//!
//! Outbound frames are always `{"id", "name", "args"}`.  Inbound frames come
//! in two shapes: replies carrying the `id` of the request they answer, and
//! pushes carrying a `message` array whose head is the command name.  Both
//! are normalised into [`Envelope`] before they reach the dispatcher.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use sw_domain::error::TIMED_OUT;

/// Correlation key assigned by the transport.  Never zero.
pub type MessageId = u64;

/// Raw command names used on the wire and for synthetic envelopes.
pub mod commands {
    pub const SESSION_STARTED: &str = "session_started";
    pub const SESSION_ENDED: &str = "session_ended";
    pub const LOGIN_COMPLETE: &str = "login_complete";
    pub const RECONNECTED: &str = "reconnected";
    pub const RESPONSE_RECEIVED: &str = "response_received";
    pub const DO_WORK: &str = "do_work";

    pub const CONNECT: &str = "connect";
    pub const ECHO: &str = "sp/echo";
    pub const WORK_DONE: &str = "sp/work_done";
}

/// A command ready to be handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub args: Vec<Value>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Client → server frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub id: MessageId,
    pub name: String,
    pub args: Vec<Value>,
}

impl OutboundFrame {
    pub fn new(id: MessageId, command: Command) -> Self {
        Self {
            id,
            name: command.name,
            args: command.args,
        }
    }
}

/// Server → client frame as it appears on the wire.
#[derive(Debug, Deserialize)]
struct InboundFrame {
    #[serde(default)]
    id: Option<MessageId>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    message: Option<Vec<Value>>,
}

/// Normalised inbound unit handed to the dispatcher.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    pub id: Option<MessageId>,
    pub command: String,
    pub args: Vec<Value>,
    pub result: Option<Value>,
    pub error: Option<Value>,
}

impl Envelope {
    /// An envelope produced locally rather than read from the socket.
    pub fn synthetic(command: &str) -> Self {
        Self {
            command: command.to_string(),
            ..Default::default()
        }
    }

    /// Lifecycle notice (`session_started` / `session_ended`) tagged with
    /// the connection it belongs to.
    pub fn lifecycle(command: &str, connection: u64) -> Self {
        Self {
            command: command.to_string(),
            args: vec![Value::from(connection)],
            ..Default::default()
        }
    }

    /// Connection a lifecycle notice belongs to, if tagged.
    pub fn connection(&self) -> Option<u64> {
        self.args.first().and_then(Value::as_u64)
    }

    /// Locally produced error reply for message `id`.
    pub fn error_reply(id: MessageId, message: &str) -> Self {
        Self {
            id: Some(id),
            command: commands::RESPONSE_RECEIVED.to_string(),
            error: Some(Value::String(message.to_string())),
            ..Default::default()
        }
    }

    /// Error reply standing in for an answer that never arrived.
    pub fn timed_out(id: MessageId) -> Self {
        Self::error_reply(id, TIMED_OUT)
    }

    /// Parse one text frame.  Returns `Ok(None)` for well-formed JSON that is
    /// neither a reply nor a push.
    pub fn from_wire(text: &str) -> Result<Option<Self>, serde_json::Error> {
        let frame: InboundFrame = serde_json::from_str(text)?;

        if let Some(id) = frame.id {
            return Ok(Some(Self {
                id: Some(id),
                command: commands::RESPONSE_RECEIVED.to_string(),
                args: Vec::new(),
                result: frame.result,
                error: frame.error,
            }));
        }

        let mut message = match frame.message {
            Some(m) if !m.is_empty() => m,
            _ => return Ok(None),
        };
        let command = match message.remove(0) {
            Value::String(s) => s,
            _ => return Ok(None),
        };

        Ok(Some(Self {
            id: None,
            command,
            args: message,
            result: None,
            error: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outbound_frame_uses_name_field() {
        let frame = OutboundFrame::new(3, Command::new("sp/echo", vec![json!("h")]));
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json, json!({"id": 3, "name": "sp/echo", "args": ["h"]}));
    }

    #[test]
    fn reply_becomes_response_received() {
        let env = Envelope::from_wire(r#"{"id":7,"result":["aGVhZGVy","Ym9keQ=="]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(env.id, Some(7));
        assert_eq!(env.command, commands::RESPONSE_RECEIVED);
        assert_eq!(env.result, Some(json!(["aGVhZGVy", "Ym9keQ=="])));
        assert!(env.error.is_none());
    }

    #[test]
    fn reply_with_null_error_has_no_error() {
        let env = Envelope::from_wire(r#"{"id":2,"result":true,"error":null}"#)
            .unwrap()
            .unwrap();
        assert!(env.error.is_none());
    }

    #[test]
    fn push_splits_command_and_args() {
        let env = Envelope::from_wire(r#"{"message":["do_work","return 1;"]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(env.id, None);
        assert_eq!(env.command, "do_work");
        assert_eq!(env.args, vec![json!("return 1;")]);
    }

    #[test]
    fn unrecognised_shape_is_skipped() {
        assert!(Envelope::from_wire(r#"{"hello":"world"}"#).unwrap().is_none());
        assert!(Envelope::from_wire(r#"{"message":[]}"#).unwrap().is_none());
        assert!(Envelope::from_wire(r#"{"message":[42]}"#).unwrap().is_none());
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(Envelope::from_wire("not json").is_err());
    }

    #[test]
    fn timed_out_envelope_carries_error() {
        let env = Envelope::timed_out(9);
        assert_eq!(env.id, Some(9));
        assert_eq!(env.command, commands::RESPONSE_RECEIVED);
        assert_eq!(env.error, Some(json!("timed out")));
    }

    #[test]
    fn lifecycle_notice_carries_connection() {
        let env = Envelope::lifecycle(commands::SESSION_ENDED, 4);
        assert_eq!(env.command, "session_ended");
        assert_eq!(env.connection(), Some(4));
        assert_eq!(Envelope::synthetic(commands::RECONNECTED).connection(), None);
    }
}
