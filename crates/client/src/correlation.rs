//! Suspension points: continuations resumed from the event loop, the table
//! of calls still waiting for their reply, and one-shot event waiters.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use sw_domain::{Error, Result};
use sw_protocol::MessageId;

use crate::events::{Dispatcher, Event, EventKind, Matcher, Response, SubscribeOptions, SubscriptionId};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Continuation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Resume side of a suspended caller.  Can be resumed at most once.
pub struct Continuation<T> {
    slot: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> Continuation<T> {
    pub fn new() -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                slot: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// Hand `value` to the suspended caller.
    ///
    /// Fails with [`Error::Usage`] when already resumed, or when the caller
    /// stopped waiting.
    pub fn resume(&self, value: T) -> Result<()> {
        let tx = self
            .slot
            .lock()
            .take()
            .ok_or_else(|| Error::Usage("continuation already resumed".into()))?;
        tx.send(value)
            .map_err(|_| Error::Usage("continuation was abandoned by its caller".into()))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pending calls
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A sent message still waiting for its reply.
pub struct PendingCall {
    pub message_id: MessageId,
    pub command: String,
    pub issued_at: Instant,
    /// `None` when calls never time out.
    pub deadline: Option<Instant>,
    continuation: Continuation<Response>,
}

/// Outstanding calls keyed by message id.  An entry leaves the table on its
/// first reply, which is either the real answer or a synthesized timeout.
#[derive(Default)]
pub struct PendingCalls {
    calls: Mutex<HashMap<MessageId, PendingCall>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        message_id: MessageId,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<oneshot::Receiver<Response>> {
        let mut calls = self.calls.lock();
        if calls.contains_key(&message_id) {
            return Err(Error::Usage(format!("message {message_id} is already pending")));
        }
        let issued_at = Instant::now();
        let (continuation, rx) = Continuation::new();
        calls.insert(
            message_id,
            PendingCall {
                message_id,
                command: command.to_string(),
                issued_at,
                deadline: timeout.map(|t| issued_at + t),
                continuation,
            },
        );
        Ok(rx)
    }

    /// Resolve the call `response` answers.
    pub fn complete(&self, response: Response) -> Result<()> {
        let call = self
            .calls
            .lock()
            .remove(&response.id)
            .ok_or_else(|| Error::Usage(format!("no pending call for message {}", response.id)))?;
        tracing::trace!(
            message_id = call.message_id,
            command = %call.command,
            elapsed_ms = call.issued_at.elapsed().as_millis() as u64,
            "reply correlated"
        );
        call.continuation.resume(response)
    }

    /// Drop the entry for a caller that stopped waiting.  Returns whether
    /// one was still pending.
    pub fn abandon(&self, message_id: MessageId) -> bool {
        self.calls.lock().remove(&message_id).is_some()
    }

    pub fn contains(&self, message_id: MessageId) -> bool {
        self.calls.lock().contains_key(&message_id)
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event waiter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One-shot subscription awaited from async code.  Dropping the waiter
/// removes the subscription if it has not fired yet.
pub struct EventWaiter {
    dispatcher: Dispatcher,
    subscription: SubscriptionId,
    rx: oneshot::Receiver<Event>,
}

impl EventWaiter {
    pub fn new(dispatcher: &Dispatcher, kind: EventKind, matcher: Matcher) -> Self {
        let (continuation, rx) = Continuation::new();
        let subscription = dispatcher.subscribe(kind, SubscribeOptions::once().matching(matcher), move |event| {
            continuation.resume(event.clone())?;
            Ok(())
        });
        Self {
            dispatcher: dispatcher.clone(),
            subscription,
            rx,
        }
    }

    pub async fn wait(&mut self) -> Result<Event> {
        (&mut self.rx)
            .await
            .map_err(|_| Error::Usage("event subscription was removed before it fired".into()))
    }
}

impl Drop for EventWaiter {
    fn drop(&mut self) {
        self.dispatcher.unsubscribe(self.subscription);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sw_protocol::{commands, Envelope};

    fn response(id: MessageId) -> Response {
        Response {
            id,
            result: Some(json!("ok")),
            error: None,
        }
    }

    #[test]
    fn continuation_resumes_once() {
        let (c, mut rx) = Continuation::new();
        c.resume(1).unwrap();
        assert_eq!(rx.try_recv().unwrap(), 1);
        assert!(matches!(c.resume(2), Err(Error::Usage(_))));
    }

    #[test]
    fn abandoned_continuation_is_rejected() {
        let (c, rx) = Continuation::<u8>::new();
        drop(rx);
        assert!(matches!(c.resume(1), Err(Error::Usage(_))));
    }

    #[test]
    fn pending_call_resolves_and_leaves_table() {
        let pending = PendingCalls::new();
        let mut rx = pending.register(5, "sp/echo", Some(Duration::from_secs(1))).unwrap();
        assert!(pending.contains(5));

        pending.complete(response(5)).unwrap();
        assert!(pending.is_empty());
        assert_eq!(rx.try_recv().unwrap().id, 5);
    }

    #[test]
    fn duplicate_and_unknown_ids_are_usage_errors() {
        let pending = PendingCalls::new();
        let _rx = pending.register(1, "a", None).unwrap();
        assert!(matches!(pending.register(1, "b", None), Err(Error::Usage(_))));
        assert!(matches!(pending.complete(response(2)), Err(Error::Usage(_))));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn abandoned_call_frees_its_id() {
        let pending = PendingCalls::new();
        let _rx = pending.register(4, "connect", None).unwrap();
        assert!(pending.abandon(4));
        assert!(!pending.abandon(4));
        assert!(matches!(pending.complete(response(4)), Err(Error::Usage(_))));
        assert!(pending.register(4, "connect", None).is_ok());
    }

    #[test]
    fn deadline_follows_timeout() {
        let pending = PendingCalls::new();
        let _a = pending.register(1, "a", None).unwrap();
        let _b = pending.register(2, "b", Some(Duration::from_secs(3))).unwrap();
        let calls = pending.calls.lock();
        assert!(calls[&1].deadline.is_none());
        let b = &calls[&2];
        assert_eq!(b.deadline, Some(b.issued_at + Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn waiter_receives_matching_event() {
        let d = Dispatcher::new();
        let mut waiter = EventWaiter::new(&d, EventKind::SessionStarted, Matcher::Connection(3));
        d.dispatch(Envelope::lifecycle(commands::SESSION_STARTED, 2));
        d.dispatch(Envelope::lifecycle(commands::SESSION_STARTED, 3));
        let event = waiter.wait().await.unwrap();
        assert_eq!(event, Event::SessionStarted { connection: Some(3) });
    }

    #[test]
    fn dropped_waiter_unsubscribes() {
        let d = Dispatcher::new();
        let waiter = EventWaiter::new(&d, EventKind::Reconnected, Matcher::Any);
        assert_eq!(d.len(), 1);
        drop(waiter);
        assert!(d.is_empty());
    }
}
