//! Typed events and the dispatcher that fans them out to subscribers.
//!
//! Every inbound envelope, whether read from the socket or produced
//! locally, is turned into an [`Event`] and handed to matching
//! subscriptions in registration order.  Handlers run synchronously on the
//! session's event loop and must not block.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use sw_protocol::{commands, Envelope, MessageId};

/// Names of the events a subscriber can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SessionStarted,
    SessionEnded,
    SessionAuthenticated,
    Reconnected,
    ResponseReceived,
    WorkRequested,
}

impl EventKind {
    /// Map a raw command name to its event.  Unknown names yield `None`.
    pub fn from_command(command: &str) -> Option<Self> {
        Some(match command {
            commands::SESSION_STARTED => Self::SessionStarted,
            commands::SESSION_ENDED => Self::SessionEnded,
            commands::LOGIN_COMPLETE => Self::SessionAuthenticated,
            commands::RECONNECTED => Self::Reconnected,
            commands::RESPONSE_RECEIVED => Self::ResponseReceived,
            commands::DO_WORK => Self::WorkRequested,
            _ => return None,
        })
    }
}

/// Reply to a message previously sent by this client.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub id: MessageId,
    pub result: Option<Value>,
    pub error: Option<Value>,
}

impl Response {
    /// Text of the `error` field, if the reply carries one.
    pub fn error_message(&self) -> Option<String> {
        match &self.error {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

/// Work pushed by the service; answered with `sp/work_done`.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkRequest {
    pub args: Vec<Value>,
}

impl WorkRequest {
    /// The payload to evaluate, when the first argument is a string.
    pub fn script(&self) -> Option<&str> {
        self.args.first().and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    SessionStarted { connection: Option<u64> },
    SessionEnded { connection: Option<u64> },
    SessionAuthenticated,
    Reconnected,
    ResponseReceived(Response),
    WorkRequested(WorkRequest),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::SessionStarted { .. } => EventKind::SessionStarted,
            Event::SessionEnded { .. } => EventKind::SessionEnded,
            Event::SessionAuthenticated => EventKind::SessionAuthenticated,
            Event::Reconnected => EventKind::Reconnected,
            Event::ResponseReceived(_) => EventKind::ResponseReceived,
            Event::WorkRequested(_) => EventKind::WorkRequested,
        }
    }

    /// Typecast an envelope into its event.  Envelopes with an unknown
    /// command, or replies without an id, yield `None`.
    pub fn from_envelope(envelope: Envelope) -> Option<Self> {
        let connection = envelope.connection();
        Some(match EventKind::from_command(&envelope.command)? {
            EventKind::SessionStarted => Event::SessionStarted { connection },
            EventKind::SessionEnded => Event::SessionEnded { connection },
            EventKind::SessionAuthenticated => Event::SessionAuthenticated,
            EventKind::Reconnected => Event::Reconnected,
            EventKind::ResponseReceived => Event::ResponseReceived(Response {
                id: envelope.id?,
                result: envelope.result,
                error: envelope.error,
            }),
            EventKind::WorkRequested => Event::WorkRequested(WorkRequest {
                args: envelope.args,
            }),
        })
    }
}

/// Restricts a subscription to a subset of the events of its kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Matcher {
    #[default]
    Any,
    /// Only the reply to this message.
    MessageId(MessageId),
    /// Only lifecycle notices of this connection.
    Connection(u64),
}

impl Matcher {
    pub fn matches(&self, event: &Event) -> bool {
        match (self, event) {
            (Matcher::Any, _) => true,
            (Matcher::MessageId(id), Event::ResponseReceived(r)) => r.id == *id,
            (
                Matcher::Connection(id),
                Event::SessionStarted { connection } | Event::SessionEnded { connection },
            ) => *connection == Some(*id),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    pub matcher: Matcher,
    /// Remove the subscription after its first invocation.
    pub once: bool,
}

impl SubscribeOptions {
    pub fn once() -> Self {
        Self {
            matcher: Matcher::Any,
            once: true,
        }
    }

    pub fn matching(mut self, matcher: Matcher) -> Self {
        self.matcher = matcher;
        self
    }
}

pub type Handler = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by [`Dispatcher::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    kind: EventKind,
    options: SubscribeOptions,
    handler: Handler,
}

#[derive(Default)]
struct Table {
    last_id: u64,
    subscriptions: Vec<Subscription>,
}

/// Ordered subscription table.  Cloning shares the table.
#[derive(Clone, Default)]
pub struct Dispatcher {
    table: Arc<Mutex<Table>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: EventKind, options: SubscribeOptions, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut table = self.table.lock();
        table.last_id += 1;
        let id = SubscriptionId(table.last_id);
        table.subscriptions.push(Subscription {
            id,
            kind,
            options,
            handler: Arc::new(handler),
        });
        id
    }

    /// Returns `false` when the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut table = self.table.lock();
        let before = table.subscriptions.len();
        table.subscriptions.retain(|s| s.id != id);
        table.subscriptions.len() != before
    }

    pub fn len(&self) -> usize {
        self.table.lock().subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.table.lock().subscriptions.clear();
    }

    /// Typecast `envelope` and dispatch it.  Returns the number of handlers
    /// invoked; unknown commands are dropped.
    pub fn dispatch(&self, envelope: Envelope) -> usize {
        let command = envelope.command.clone();
        match Event::from_envelope(envelope) {
            Some(event) => self.dispatch_event(&event),
            None => {
                tracing::debug!(command = %command, "no event for command");
                0
            }
        }
    }

    /// Invoke every subscription matching `event`, in registration order.
    ///
    /// One-shot subscriptions are removed before any handler runs, so a
    /// handler that re-enters the dispatcher never sees them again.  A
    /// failing or panicking handler is logged and does not stop the others.
    pub fn dispatch_event(&self, event: &Event) -> usize {
        let kind = event.kind();
        let handlers: Vec<Handler> = {
            let mut table = self.table.lock();
            let matched: Vec<(SubscriptionId, bool, Handler)> = table
                .subscriptions
                .iter()
                .filter(|s| s.kind == kind && s.options.matcher.matches(event))
                .map(|s| (s.id, s.options.once, s.handler.clone()))
                .collect();
            table
                .subscriptions
                .retain(|s| !matched.iter().any(|(id, once, _)| *once && *id == s.id));
            matched.into_iter().map(|(_, _, h)| h).collect()
        };

        for handler in &handlers {
            match std::panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(event = ?kind, error = %e, "event handler failed");
                }
                Err(_) => {
                    tracing::error!(event = ?kind, "event handler panicked");
                }
            }
        }
        handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reply(id: MessageId) -> Envelope {
        Envelope {
            id: Some(id),
            command: commands::RESPONSE_RECEIVED.into(),
            result: Some(json!(id)),
            ..Default::default()
        }
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &str) -> impl Fn(&Event) -> anyhow::Result<()> {
        let log = log.clone();
        let tag = tag.to_string();
        move |_| {
            log.lock().push(tag.clone());
            Ok(())
        }
    }

    #[test]
    fn known_commands_map_to_events() {
        assert_eq!(EventKind::from_command("login_complete"), Some(EventKind::SessionAuthenticated));
        assert_eq!(EventKind::from_command("do_work"), Some(EventKind::WorkRequested));
        assert_eq!(EventKind::from_command("session_ended"), Some(EventKind::SessionEnded));
        assert_eq!(EventKind::from_command("mystery"), None);
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let d = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        d.subscribe(EventKind::Reconnected, SubscribeOptions::default(), recorder(&log, "a"));
        d.subscribe(EventKind::Reconnected, SubscribeOptions::default(), recorder(&log, "b"));
        d.subscribe(EventKind::Reconnected, SubscribeOptions::default(), recorder(&log, "c"));

        assert_eq!(d.dispatch(Envelope::synthetic(commands::RECONNECTED)), 3);
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn once_subscription_fires_a_single_time() {
        let d = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        d.subscribe(EventKind::SessionAuthenticated, SubscribeOptions::once(), recorder(&log, "once"));

        d.dispatch(Envelope::synthetic(commands::LOGIN_COMPLETE));
        d.dispatch(Envelope::synthetic(commands::LOGIN_COMPLETE));
        assert_eq!(log.lock().len(), 1);
        assert!(d.is_empty());
    }

    #[test]
    fn message_id_matcher_filters_replies() {
        let d = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        d.subscribe(
            EventKind::ResponseReceived,
            SubscribeOptions::once().matching(Matcher::MessageId(2)),
            recorder(&log, "two"),
        );

        assert_eq!(d.dispatch(reply(1)), 0);
        assert_eq!(d.dispatch(reply(3)), 0);
        assert_eq!(d.dispatch(reply(2)), 1);
        assert_eq!(*log.lock(), vec!["two"]);
    }

    #[test]
    fn connection_matcher_ignores_other_connections() {
        let d = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        d.subscribe(
            EventKind::SessionEnded,
            SubscribeOptions::once().matching(Matcher::Connection(2)),
            recorder(&log, "ended"),
        );

        d.dispatch(Envelope::lifecycle(commands::SESSION_ENDED, 1));
        assert!(log.lock().is_empty());
        d.dispatch(Envelope::lifecycle(commands::SESSION_ENDED, 2));
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn unknown_command_is_a_no_op() {
        let d = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        d.subscribe(EventKind::WorkRequested, SubscribeOptions::default(), recorder(&log, "w"));
        assert_eq!(d.dispatch(Envelope::synthetic("playlist_changed")), 0);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn reply_without_id_is_dropped() {
        let d = Dispatcher::new();
        d.subscribe(EventKind::ResponseReceived, SubscribeOptions::default(), |_| Ok(()));
        assert_eq!(d.dispatch(Envelope::synthetic(commands::RESPONSE_RECEIVED)), 0);
    }

    #[test]
    fn failing_and_panicking_handlers_do_not_stop_others() {
        let d = Dispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        d.subscribe(EventKind::Reconnected, SubscribeOptions::default(), |_| {
            anyhow::bail!("nope")
        });
        d.subscribe(EventKind::Reconnected, SubscribeOptions::default(), |_| panic!("boom"));
        d.subscribe(EventKind::Reconnected, SubscribeOptions::default(), recorder(&log, "last"));

        assert_eq!(d.dispatch(Envelope::synthetic(commands::RECONNECTED)), 3);
        assert_eq!(*log.lock(), vec!["last"]);
    }

    #[test]
    fn once_handlers_are_removed_even_when_they_fail() {
        let d = Dispatcher::new();
        let calls = Arc::new(Mutex::new(0));
        let failing = calls.clone();
        d.subscribe(EventKind::Reconnected, SubscribeOptions::once(), move |_| {
            *failing.lock() += 1;
            anyhow::bail!("nope")
        });
        let panicking = calls.clone();
        d.subscribe(EventKind::Reconnected, SubscribeOptions::once(), move |_| {
            *panicking.lock() += 1;
            panic!("boom")
        });

        assert_eq!(d.dispatch(Envelope::synthetic(commands::RECONNECTED)), 2);
        assert!(d.is_empty());
        assert_eq!(d.dispatch(Envelope::synthetic(commands::RECONNECTED)), 0);
        assert_eq!(*calls.lock(), 2);
    }

    #[test]
    fn handler_may_subscribe_while_dispatching() {
        let d = Dispatcher::new();
        let inner = d.clone();
        d.subscribe(EventKind::SessionStarted, SubscribeOptions::once(), move |_| {
            inner.subscribe(EventKind::SessionStarted, SubscribeOptions::default(), |_| Ok(()));
            Ok(())
        });

        assert_eq!(d.dispatch(Envelope::lifecycle(commands::SESSION_STARTED, 1)), 1);
        assert_eq!(d.len(), 1);
        assert_eq!(d.dispatch(Envelope::lifecycle(commands::SESSION_STARTED, 1)), 1);
    }

    #[test]
    fn unsubscribe_and_clear() {
        let d = Dispatcher::new();
        let a = d.subscribe(EventKind::Reconnected, SubscribeOptions::default(), |_| Ok(()));
        d.subscribe(EventKind::Reconnected, SubscribeOptions::default(), |_| Ok(()));
        assert!(d.unsubscribe(a));
        assert!(!d.unsubscribe(a));
        assert_eq!(d.len(), 1);
        d.clear();
        assert!(d.is_empty());
    }

    #[test]
    fn response_error_message() {
        let r = Response { id: 1, result: None, error: Some(json!("timed out")) };
        assert_eq!(r.error_message().as_deref(), Some("timed out"));
        let r = Response { id: 1, result: None, error: Some(json!({"code": 4})) };
        assert_eq!(r.error_message().as_deref(), Some(r#"{"code":4}"#));
        let r = Response { id: 1, result: Some(json!(1)), error: Some(Value::Null) };
        assert!(r.error_message().is_none());
    }
}
