//! Session lifecycle: connect → authenticate → ready, correlated calls,
//! keepalive and automatic reconnect.
//!
//! All inbound traffic from every transport the session ever opens lands on
//! a single queue drained by one event-loop task, which hands each envelope
//! to the [`Dispatcher`].  Callers suspend on continuations that the loop
//! resumes; nothing else touches the socket.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use prost::Message;
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use sw_domain::error::TIMED_OUT;
use sw_domain::trace::TraceEvent;
use sw_domain::{Error, Result};
use sw_protocol::schema::MercuryMultiGetReply;
use sw_protocol::{batch, commands, mercury, Command, Envelope, MercuryRequest, MessageId};

use crate::access_point::{AccessPointResolver, CredentialsProvider};
use crate::builder::SessionBuilder;
use crate::correlation::{EventWaiter, PendingCalls};
use crate::events::{
    Dispatcher, Event, EventKind, Matcher, Response, SubscribeOptions, SubscriptionId, WorkRequest,
};
use crate::metadata::MetadataSource;
use crate::reconnect::ReconnectPolicy;
use crate::transport::{access_point_url, MessageIds, Transport};
use crate::work::WorkHandler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    /// Socket open, waiting for `session_started`.
    AwaitingStart,
    /// Credentials being sent.
    Authenticating,
    /// Credentials accepted, waiting for `login_complete`.
    AwaitingAuth,
    Ready,
    Closing,
}

pub(crate) struct SessionOptions {
    pub request_timeout: Option<Duration>,
    pub keepalive_interval: Duration,
    pub reconnect: ReconnectPolicy,
}

/// Fails with [`Error::Usage`] outside a Tokio runtime.
pub(crate) fn ensure_runtime() -> Result<()> {
    tokio::runtime::Handle::try_current()
        .map(|_| ())
        .map_err(|_| Error::Usage("sessions must be driven from inside a Tokio runtime".into()))
}

/// Cheaply cloneable handle to one logical session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

struct Inner {
    options: SessionOptions,
    credentials: Arc<dyn CredentialsProvider>,
    resolver: Arc<dyn AccessPointResolver>,
    work_handler: Option<Arc<dyn WorkHandler>>,

    dispatcher: Dispatcher,
    pending: Arc<PendingCalls>,
    message_ids: MessageIds,
    state: watch::Sender<SessionState>,
    transport: Mutex<Option<Arc<Transport>>>,

    inbound_tx: mpsc::UnboundedSender<Envelope>,
    inbound_rx: Mutex<Option<mpsc::UnboundedReceiver<Envelope>>>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
    keepalive: Mutex<Option<JoinHandle<()>>>,

    /// Serialises connection attempts.
    connect_lock: tokio::sync::Mutex<()>,
    last_connection: AtomicU64,
    /// Set while a local close is in progress; suppresses reconnect.
    closing: AtomicBool,
    reconnect_enabled: AtomicBool,
    reconnecting: AtomicBool,
    reconnect_attempts: AtomicU64,
    reconnect_cancel: Mutex<CancellationToken>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(h) = self.keepalive.get_mut().take() {
            h.abort();
        }
        if let Some(h) = self.event_loop.get_mut().take() {
            h.abort();
        }
        if let Some(t) = self.transport.get_mut().take() {
            t.close();
        }
        self.reconnect_cancel.get_mut().cancel();
    }
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub(crate) fn new(
        options: SessionOptions,
        credentials: Arc<dyn CredentialsProvider>,
        resolver: Arc<dyn AccessPointResolver>,
        work_handler: Option<Arc<dyn WorkHandler>>,
    ) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(SessionState::Disconnected);
        let reconnect_enabled = AtomicBool::new(options.reconnect.enabled);

        let session = Self {
            inner: Arc::new(Inner {
                options,
                credentials,
                resolver,
                work_handler,
                dispatcher: Dispatcher::new(),
                pending: Arc::new(PendingCalls::new()),
                message_ids: MessageIds::new(),
                state,
                transport: Mutex::new(None),
                inbound_tx,
                inbound_rx: Mutex::new(Some(inbound_rx)),
                event_loop: Mutex::new(None),
                keepalive: Mutex::new(None),
                connect_lock: tokio::sync::Mutex::new(()),
                last_connection: AtomicU64::new(0),
                closing: AtomicBool::new(false),
                reconnect_enabled,
                reconnecting: AtomicBool::new(false),
                reconnect_attempts: AtomicU64::new(0),
                reconnect_cancel: Mutex::new(CancellationToken::new()),
            }),
        };
        session.install_handlers();
        session
    }

    fn install_handlers(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner
            .dispatcher
            .subscribe(EventKind::SessionEnded, SubscribeOptions::default(), move |event| {
                if let (Some(inner), Event::SessionEnded { connection }) = (weak.upgrade(), event) {
                    Session { inner }.on_session_ended(*connection);
                }
                Ok(())
            });

        let weak = Arc::downgrade(&self.inner);
        self.inner
            .dispatcher
            .subscribe(EventKind::WorkRequested, SubscribeOptions::default(), move |event| {
                if let (Some(inner), Event::WorkRequested(work)) = (weak.upgrade(), event) {
                    Session { inner }.on_work_requested(work.clone());
                }
                Ok(())
            });
    }

    // ── Observers ────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        self.ready_transport().is_ok()
    }

    /// Whether the underlying socket is open, whatever the handshake stage.
    pub fn connected(&self) -> bool {
        self.inner
            .transport
            .lock()
            .as_ref()
            .map(|t| t.connected())
            .unwrap_or(false)
    }

    /// Number of reconnect attempts made over the session's lifetime.
    pub fn reconnect_attempts(&self) -> u64 {
        self.inner.reconnect_attempts.load(Ordering::SeqCst)
    }

    pub fn reconnect_enabled(&self) -> bool {
        self.inner.reconnect_enabled.load(Ordering::SeqCst)
    }

    /// Turn automatic reconnect on or off.  Turning it off stops a
    /// reconnect loop that is already running.
    pub fn set_reconnect(&self, enabled: bool) {
        self.inner.reconnect_enabled.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.cancel_reconnect();
        }
    }

    /// Whether the keepalive timer is running.
    pub fn keepalive_active(&self) -> bool {
        self.inner
            .keepalive
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Calls still waiting for a reply.
    pub fn pending_calls(&self) -> usize {
        self.inner.pending.len()
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Subscribe to session events.  Handlers run on the event loop and
    /// must not block.
    pub fn on<F>(&self, kind: EventKind, options: SubscribeOptions, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.dispatcher.subscribe(kind, options, handler)
    }

    pub fn off(&self, id: SubscriptionId) -> bool {
        self.inner.dispatcher.unsubscribe(id)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Connect and authenticate.  Returns once the session is ready.
    ///
    /// With reconnect enabled, failed attempts are retried until one
    /// succeeds or the session is closed.  Neither the start notice nor the
    /// login confirmation has its own timeout.
    pub async fn connect(&self) -> Result<()> {
        ensure_runtime()?;
        let cancel = self.inner.reconnect_cancel.lock().clone();
        loop {
            match self.establish(false).await {
                Ok(()) => return Ok(()),
                Err(e) if !matches!(e, Error::Usage(_)) && self.reconnect_enabled() => {
                    tracing::warn!(error = %e, "connect failed");
                    if !self.wait_before_retry(&cancel).await {
                        return Err(e);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Close the connection and wait until `session_ended` has been
    /// observed.  Idempotent; a closed session does not reconnect.
    pub async fn close(&self) -> Result<()> {
        ensure_runtime()?;
        self.cancel_reconnect();
        self.shutdown_transport().await;
        Ok(())
    }

    async fn establish(&self, reconnecting: bool) -> Result<()> {
        let _guard = self.inner.connect_lock.lock().await;
        if self.is_ready() {
            return Ok(());
        }
        self.shutdown_transport().await;
        self.ensure_event_loop();
        self.set_state(SessionState::Connecting);

        let (access_point, transport) = match self.open_and_authenticate().await {
            Ok(opened) => opened,
            Err(e) => {
                self.teardown();
                return Err(e);
            }
        };

        {
            let slot = self.inner.transport.lock();
            let current = slot.as_ref().map(|t| t.connection());
            if current != Some(transport.connection()) || !transport.connected() {
                drop(slot);
                self.teardown();
                return Err(ended_during_handshake());
            }
            self.set_state(SessionState::Ready);
        }
        self.start_keepalive();

        tracing::info!(access_point = %access_point, reconnecting, "session ready");
        TraceEvent::SessionConnected {
            access_point,
            reconnect: reconnecting,
        }
        .emit();
        if reconnecting {
            let _ = self.inner.inbound_tx.send(Envelope::synthetic(commands::RECONNECTED));
        }
        Ok(())
    }

    async fn open_and_authenticate(&self) -> Result<(String, Arc<Transport>)> {
        let inner = &self.inner;

        let credentials = inner.credentials.credentials().await?;
        let access_point = match &credentials.access_point {
            Some(ap) => ap.clone(),
            None => inner.resolver.resolve(&credentials).await?,
        };

        // ── Open the socket ──────────────────────────────────────────
        let connection = inner.last_connection.fetch_add(1, Ordering::SeqCst) + 1;
        let mut started = EventWaiter::new(
            &inner.dispatcher,
            EventKind::SessionStarted,
            Matcher::Connection(connection),
        );
        let mut ended = EventWaiter::new(
            &inner.dispatcher,
            EventKind::SessionEnded,
            Matcher::Connection(connection),
        );

        let url = access_point_url(&access_point);
        let transport = Arc::new(
            Transport::open(
                connection,
                &url,
                inner.options.request_timeout,
                inner.message_ids.clone(),
                inner.inbound_tx.clone(),
            )
            .await?,
        );
        *inner.transport.lock() = Some(transport.clone());
        self.set_state(SessionState::AwaitingStart);
        until_ended(&mut started, &mut ended).await?;

        // ── Authenticate ─────────────────────────────────────────────
        self.set_state(SessionState::Authenticating);
        let mut authenticated =
            EventWaiter::new(&inner.dispatcher, EventKind::SessionAuthenticated, Matcher::Any);
        let login = Command::new(commands::CONNECT, credentials.connect_args());
        tokio::select! {
            sent = self.send_and_wait(&transport, login) => {
                sent.map_err(|e| Error::Connection(format!("credentials rejected: {e}")))?;
            }
            _ = ended.wait() => return Err(ended_during_handshake()),
        }
        self.set_state(SessionState::AwaitingAuth);
        until_ended(&mut authenticated, &mut ended).await?;

        Ok((access_point, transport))
    }

    /// Drop the current transport without waiting for it to finish.
    fn teardown(&self) {
        let transport = self.inner.transport.lock().take();
        if let Some(transport) = transport {
            transport.close();
        }
        self.stop_keepalive();
        self.set_state(SessionState::Disconnected);
    }

    /// Close the current transport, if any, and wait until its end has
    /// been processed.
    async fn shutdown_transport(&self) {
        let mut state = self.inner.state.subscribe();
        let transport = {
            let slot = self.inner.transport.lock();
            let Some(transport) = slot.as_ref() else {
                return;
            };
            self.inner.closing.store(true, Ordering::SeqCst);
            self.set_state(SessionState::Closing);
            transport.clone()
        };
        self.stop_keepalive();
        transport.close();
        let _ = state.wait_for(|s| *s == SessionState::Disconnected).await;
        self.inner.closing.store(false, Ordering::SeqCst);
    }

    fn on_session_ended(&self, connection: Option<u64>) {
        let deliberate = self.inner.closing.load(Ordering::SeqCst);
        let was_ready = {
            let mut slot = self.inner.transport.lock();
            let current = slot.as_ref().map(|t| t.connection());
            if current.is_none() || (connection.is_some() && connection != current) {
                tracing::debug!(connection = ?connection, "ignoring end of a retired connection");
                return;
            }
            slot.take();
            let was_ready = self.state() == SessionState::Ready;
            self.set_state(SessionState::Disconnected);
            was_ready
        };
        self.stop_keepalive();

        tracing::info!(connection = ?connection, deliberate, "session ended");
        TraceEvent::SessionEnded { deliberate }.emit();

        // A drop during the handshake is reported to whoever is connecting.
        if was_ready && !deliberate && self.reconnect_enabled() {
            self.spawn_reconnect();
        }
    }

    fn on_work_requested(&self, work: WorkRequest) {
        let Some(handler) = self.inner.work_handler.clone() else {
            tracing::debug!("no work handler installed; ignoring do_work");
            return;
        };
        let session = self.clone();
        tokio::spawn(async move {
            match handler.perform(work).await {
                Ok(result) => {
                    if let Err(e) = session.call(commands::WORK_DONE, result).await {
                        tracing::warn!(error = %e, "failed to report finished work");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "work handler failed"),
            }
        });
    }

    // ── Reconnect ────────────────────────────────────────────────────

    fn spawn_reconnect(&self) {
        if self.inner.reconnecting.swap(true, Ordering::SeqCst) {
            return;
        }
        let cancel = self.inner.reconnect_cancel.lock().clone();
        let session = self.clone();
        tokio::spawn(async move {
            session.reconnect_loop(&cancel).await;
            session.inner.reconnecting.store(false, Ordering::SeqCst);
        });
    }

    async fn reconnect_loop(&self, cancel: &CancellationToken) {
        while self.wait_before_retry(cancel).await {
            match self.establish(true).await {
                Ok(()) => return,
                Err(e @ Error::Usage(_)) => {
                    tracing::error!(error = %e, "reconnect abandoned");
                    return;
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt = self.reconnect_attempts(), "reconnect failed");
                }
            }
        }
    }

    /// Count an attempt and sleep before it.  Returns `false` when
    /// reconnecting was cancelled or disabled meanwhile.
    async fn wait_before_retry(&self, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() || !self.reconnect_enabled() {
            return false;
        }
        let attempt = self.inner.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = self.inner.options.reconnect.delay_for_attempt(attempt);
        TraceEvent::ReconnectScheduled {
            attempt,
            delay_ms: delay.as_millis() as u64,
        }
        .emit();

        tokio::select! {
            _ = tokio::time::sleep(delay) => !cancel.is_cancelled() && self.reconnect_enabled(),
            _ = cancel.cancelled() => false,
        }
    }

    fn cancel_reconnect(&self) {
        let mut token = self.inner.reconnect_cancel.lock();
        token.cancel();
        *token = CancellationToken::new();
    }

    // ── Calls ────────────────────────────────────────────────────────

    /// Send a raw command and wait for its reply's `result`.
    pub async fn call(&self, command: &str, args: Vec<Value>) -> Result<Value> {
        ensure_runtime()?;
        let transport = self.ready_transport()?;
        let response = self.send_and_wait(&transport, Command::new(command, args)).await?;
        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Issue a Mercury request and decode the reply body as `M`.
    pub async fn request<M: Message + Default>(&self, request: MercuryRequest) -> Result<M> {
        ensure_runtime()?;
        let transport = self.ready_transport()?;
        let started = Instant::now();

        let outcome = match self.send_and_wait(&transport, mercury::encode_envelope(&request)).await {
            Ok(response) => mercury::decode_reply::<M>(&request, response.result.as_ref()),
            Err(Error::Protocol {
                command,
                uri: None,
                status,
                message,
            }) => Err(Error::Protocol {
                command,
                uri: Some(request.uri.clone()),
                status,
                message,
            }),
            Err(e) => Err(e),
        };

        TraceEvent::MercuryRequest {
            uri: request.uri.clone(),
            method: request.method.clone(),
            status: outcome.as_ref().err().and_then(Error::status),
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();
        outcome
    }

    /// Issue `requests` as one multi-get addressed to `uri`.  Results line
    /// up with `requests`.  An empty batch sends nothing.
    pub async fn request_batch<M: Message + Default>(
        &self,
        uri: impl Into<String>,
        requests: Vec<MercuryRequest>,
    ) -> Result<Vec<M>> {
        ensure_runtime()?;
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let outer = batch::encode_batch(uri, &requests);
        TraceEvent::BatchIssued {
            uri: outer.uri.clone(),
            size: requests.len(),
        }
        .emit();

        let reply: MercuryMultiGetReply = self.request(outer).await?;
        batch::decode_batch(&requests, reply)
    }

    fn ready_transport(&self) -> Result<Arc<Transport>> {
        let ready = self.state() == SessionState::Ready;
        match self.inner.transport.lock().clone() {
            Some(t) if ready && t.connected() => Ok(t),
            _ => Err(Error::Connection("connection is not open".into())),
        }
    }

    /// Send `command` on `transport` and suspend until its reply.  A reply
    /// carrying `error` becomes [`Error::Protocol`].
    async fn send_and_wait(&self, transport: &Transport, command: Command) -> Result<Response> {
        let name = command.name.clone();
        let pending = &self.inner.pending;
        let dispatcher = &self.inner.dispatcher;
        let timeout = self.inner.options.request_timeout;

        let (message_id, (reply, subscription)) = transport.send(command, |id| {
            let reply = pending.register(id, &name, timeout)?;
            let pending = pending.clone();
            let subscription = dispatcher.subscribe(
                EventKind::ResponseReceived,
                SubscribeOptions::once().matching(Matcher::MessageId(id)),
                move |event| {
                    if let Event::ResponseReceived(response) = event {
                        pending.complete(response.clone())?;
                    }
                    Ok(())
                },
            );
            Ok((reply, subscription))
        })?;
        let _abandon = AbandonOnDrop {
            pending: pending.as_ref(),
            dispatcher,
            message_id,
            subscription,
        };

        let response = reply
            .await
            .map_err(|_| Error::Usage(format!("reply slot for message {message_id} was dropped")))?;

        if let Some(message) = response.error_message() {
            if message == TIMED_OUT {
                TraceEvent::CallTimedOut {
                    message_id,
                    command: name.clone(),
                }
                .emit();
            }
            return Err(Error::protocol(name, message));
        }
        Ok(response)
    }

    // ── Background tasks ─────────────────────────────────────────────

    fn ensure_event_loop(&self) {
        let mut slot = self.inner.event_loop.lock();
        if slot.is_some() {
            return;
        }
        let Some(mut inbound) = self.inner.inbound_rx.lock().take() else {
            return;
        };
        let dispatcher = self.inner.dispatcher.clone();
        *slot = Some(tokio::spawn(async move {
            while let Some(envelope) = inbound.recv().await {
                dispatcher.dispatch(envelope);
            }
        }));
    }

    fn start_keepalive(&self) {
        let interval = self.inner.options.keepalive_interval;
        if interval.is_zero() {
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                let session = Session { inner };
                if let Err(e) = session.call(commands::ECHO, vec![json!("h")]).await {
                    tracing::debug!(error = %e, "keepalive failed");
                }
            }
        });
        if let Some(old) = self.inner.keepalive.lock().replace(handle) {
            old.abort();
        }
    }

    fn stop_keepalive(&self) {
        if let Some(handle) = self.inner.keepalive.lock().take() {
            handle.abort();
        }
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.inner.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = ?previous, to = ?state, "session state");
        }
    }
}

/// Clears a call's table entry and reply subscription if its caller stops
/// waiting before the reply arrives.  A no-op once the reply was delivered.
struct AbandonOnDrop<'a> {
    pending: &'a PendingCalls,
    dispatcher: &'a Dispatcher,
    message_id: MessageId,
    subscription: SubscriptionId,
}

impl Drop for AbandonOnDrop<'_> {
    fn drop(&mut self) {
        if self.pending.abandon(self.message_id) {
            tracing::debug!(message_id = self.message_id, "call abandoned before its reply");
        }
        self.dispatcher.unsubscribe(self.subscription);
    }
}

async fn until_ended(waiter: &mut EventWaiter, ended: &mut EventWaiter) -> Result<Event> {
    tokio::select! {
        event = waiter.wait() => event,
        _ = ended.wait() => Err(ended_during_handshake()),
    }
}

fn ended_during_handshake() -> Error {
    Error::Connection("session ended during handshake".into())
}

#[async_trait]
impl MetadataSource for Session {
    async fn fetch<M: Message + Default + 'static>(&self, request: MercuryRequest) -> Result<M> {
        self.request(request).await
    }

    async fn fetch_batch<M: Message + Default + 'static>(
        &self,
        uri: String,
        requests: Vec<MercuryRequest>,
    ) -> Result<Vec<M>> {
        self.request_batch(uri, requests).await
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::pin;
    use std::task::{Context, Poll};

    use super::*;
    use crate::access_point::{Credentials, StaticAccessPoint};

    fn session() -> Session {
        Session::builder()
            .credentials(Credentials::new("u:t:x"))
            .resolver(StaticAccessPoint("127.0.0.1:1".into()))
            .build()
            .unwrap()
    }

    /// Poll once without a runtime.
    fn poll_once<F: Future>(fut: F) -> Poll<F::Output> {
        let waker = futures_util::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        pin!(fut).poll(&mut cx)
    }

    #[test]
    fn calls_outside_runtime_are_usage_errors() {
        let s = session();
        assert!(matches!(poll_once(s.call("sp/echo", vec![])), Poll::Ready(Err(Error::Usage(_)))));
        assert!(matches!(poll_once(s.connect()), Poll::Ready(Err(Error::Usage(_)))));
        assert!(matches!(poll_once(s.close()), Poll::Ready(Err(Error::Usage(_)))));
    }

    #[tokio::test]
    async fn call_before_connect_is_connection_error() {
        let s = session();
        assert_eq!(s.state(), SessionState::Disconnected);
        let err = s.call("sp/echo", vec![json!("h")]).await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
        assert_eq!(s.pending_calls(), 0);
    }

    #[tokio::test]
    async fn close_without_connection_is_a_no_op() {
        let s = session();
        s.close().await.unwrap();
        s.close().await.unwrap();
        assert_eq!(s.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn unreachable_access_point_fails_without_reconnect() {
        let s = session();
        let err = s.connect().await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
        assert_eq!(s.state(), SessionState::Disconnected);
        assert_eq!(s.reconnect_attempts(), 0);
    }

    #[tokio::test]
    async fn empty_batch_sends_nothing() {
        let s = session();
        let out: Vec<MercuryMultiGetReply> = s.request_batch("hm://metadata/tracks", vec![]).await.unwrap();
        assert!(out.is_empty());
    }
}
