//! Wire protocol: JSON envelopes carried over the socket and the Mercury
//! sub-protocol that ships protocol-buffer requests inside them.
//!
//! ```text
//! {"id": 12, "name": "sp/hm_b64", "args": [0, "<b64 header>", "<b64 body>"]}
//!                     │                        └─ schema::MercuryRequest
//!                     └─ mercury::COMMAND
//!
//! {"id": 12, "result": ["<b64 header>", "<b64 body>"]}   reply
//! {"message": ["login_complete"]}                        push
//! ```

pub mod batch;
pub mod envelope;
pub mod id;
pub mod mercury;
pub mod schema;

pub use envelope::{commands, Command, Envelope, MessageId, OutboundFrame};
pub use id::ResourceId;
pub use mercury::Request as MercuryRequest;
