//! `sw-client` — session engine for the web player's socket protocol.
//!
//! A [`Session`] resolves an access point, opens a WebSocket, authenticates
//! and then multiplexes correlated calls and server pushes over that one
//! socket.  Mercury requests and multi-get batches ride on top of it, and
//! the [`metadata`] module uses them to load catalogue resources lazily.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Session::builder()                                          │
//! │      .credentials(Credentials::new("user:token:extra"))      │
//! │      .reconnect(ReconnectPolicy::every(5s))                  │
//! │      .build()?                                               │
//! │                                                              │
//! │  session.connect().await?                                    │
//! │  let track: Track = session.request(req).await?              │
//! │  group.load(&session).await?         // one multi-get        │
//! └──────────────────────────────────────────────────────────────┘
//!          │ call/request                  ▲ resume
//!          ▼                               │
//!     Transport ──► socket ──► reader ──► inbound queue ──► event loop ──► Dispatcher
//! ```
//!
//! # Connection flow
//!
//! 1. Get credentials, resolve the access point unless one is given
//! 2. Open the socket; wait for `session_started`
//! 3. Send `connect [user, token, rest]`; wait for its reply
//! 4. Wait for `login_complete`; the session is ready
//! 5. While ready: `sp/echo` keepalives, `do_work` answered with `sp/work_done`
//! 6. On an unexpected drop: reconnect after the configured wait, forever

pub mod access_point;
pub mod builder;
pub mod correlation;
pub mod events;
pub mod metadata;
pub mod reconnect;
pub mod session;
pub mod transport;
pub mod work;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use access_point::{AccessPointResolver, Credentials, CredentialsProvider, HttpResolver, StaticAccessPoint};
pub use builder::SessionBuilder;
pub use events::{Dispatcher, Event, EventKind, Matcher, Response, SubscribeOptions, SubscriptionId, WorkRequest};
pub use metadata::{LoadGroup, LoadState, Loadable, MetadataSource, Resource};
pub use reconnect::ReconnectPolicy;
pub use session::{Session, SessionState};
pub use work::WorkHandler;

pub use sw_domain::{Error, Result};
pub use sw_protocol::{MercuryRequest, ResourceId};
