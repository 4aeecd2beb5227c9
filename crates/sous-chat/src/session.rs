//! Session controller: runs one exchange at a time and publishes the
//! conversation as it changes.
//!
//! Each accepted submission spawns an exchange task that owns the transport
//! stream and the display scheduler for its answer. All mutations of the
//! conversation go through one lock, and every mutation checks the
//! exchange's cancellation token under that lock, so a cancelled exchange
//! can never publish again.

use futures::StreamExt;
use parking_lot::Mutex;
use sous_ai::{EventStream, ProtocolEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::conversation::{Conversation, Message, MessageId};
use crate::error::{Error, Result};
use crate::events::ChatEvent;
use crate::handle::SessionHandle;
use crate::reducer::reduce;
use crate::scheduler::{DisplayScheduler, RevealConfig, Tick};
use crate::transport::Transport;

/// Shown when the exchange could not be opened
pub const CONNECT_FAILED: &str = "Sorry, I encountered an error connecting to the server.";
/// Shown when the stream broke after it was opened
pub const CONNECTION_INTERRUPTED: &str = "The connection to the server was interrupted.";
/// Shown when the backend rejected the credential
pub const UNAUTHORIZED: &str = "Your login has expired. Please log in again.";
/// Shown when no data arrived within the read timeout
pub const SERVER_TIMEOUT: &str = "The server stopped responding.";

/// Session controller configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Reveal cadence of streamed answers
    pub reveal: RevealConfig,
    /// Longest wait for the next event before the exchange fails.
    /// `None` waits forever.
    pub read_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reveal: RevealConfig::default(),
            read_timeout: Some(Duration::from_secs(60)),
        }
    }
}

struct Inner {
    conversation: Conversation,
    /// Token of the latest exchange
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    closed: bool,
}

struct Shared {
    state: Mutex<Inner>,
    snapshot_tx: watch::Sender<Conversation>,
    event_tx: broadcast::Sender<ChatEvent>,
    handle: SessionHandle,
}

impl Shared {
    fn publish(&self, conversation: &Conversation) {
        self.snapshot_tx.send_replace(conversation.clone());
    }

    /// Fold one event into the answer. Returns whether the answer is still
    /// open for more events.
    fn apply(&self, cancel: &CancellationToken, id: MessageId, event: &ProtocolEvent) -> bool {
        let mut inner = self.state.lock();
        if cancel.is_cancelled() {
            return false;
        }
        if !inner.conversation.get(id).is_some_and(|m| !m.is_terminal()) {
            tracing::debug!(%id, "Dropping event for finished exchange");
            return false;
        }

        let conversation = std::mem::take(&mut inner.conversation);
        inner.conversation = reduce(conversation, id, event);
        self.publish(&inner.conversation);

        let status = inner.conversation.get(id).map(Message::status);
        match status {
            Some(status) if status.is_terminal() => {
                tracing::debug!(%id, ?status, "Exchange finished");
                self.handle.set_idle();
                let _ = self.event_tx.send(ChatEvent::ExchangeEnd {
                    message: id,
                    status,
                });
                false
            }
            _ => true,
        }
    }

    /// Advance the reveal by one tick, or `None` once cancelled
    fn tick(&self, cancel: &CancellationToken, scheduler: &mut DisplayScheduler) -> Option<Tick> {
        let mut inner = self.state.lock();
        if cancel.is_cancelled() {
            return None;
        }
        let tick = scheduler.tick(&mut inner.conversation);
        if let Tick::Revealed(_) = tick {
            self.publish(&inner.conversation);
        }
        Some(tick)
    }

    /// Map a transport failure to the error shown in the answer
    fn failure(&self, cancel: &CancellationToken, err: &sous_ai::Error, message: &str) -> ProtocolEvent {
        if err.is_unauthorized() {
            tracing::warn!("Chat request was rejected as unauthorized");
            if !cancel.is_cancelled() {
                let _ = self.event_tx.send(ChatEvent::Unauthorized);
            }
            return ProtocolEvent::Error(UNAUTHORIZED.to_string());
        }
        tracing::warn!(error = %err, "Chat exchange failed");
        ProtocolEvent::Error(message.to_string())
    }
}

/// Orchestrates exchanges against a [`Transport`].
///
/// Requires a tokio runtime: [`SessionController::submit`] spawns the
/// exchange task.
pub struct SessionController {
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    config: SessionConfig,
}

impl SessionController {
    pub fn new(transport: Arc<dyn Transport>, config: SessionConfig) -> Self {
        let (snapshot_tx, _) = watch::channel(Conversation::new());
        let (event_tx, _) = broadcast::channel(256);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(Inner {
                    conversation: Conversation::new(),
                    cancel: CancellationToken::new(),
                    task: None,
                    closed: false,
                }),
                snapshot_tx,
                event_tx,
                handle: SessionHandle::new(),
            }),
            transport,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Watch published conversation snapshots
    pub fn subscribe(&self) -> watch::Receiver<Conversation> {
        self.shared.snapshot_tx.subscribe()
    }

    /// Subscribe to exchange lifecycle events
    pub fn events(&self) -> broadcast::Receiver<ChatEvent> {
        self.shared.event_tx.subscribe()
    }

    /// Copy of the current conversation
    pub fn snapshot(&self) -> Conversation {
        self.shared.state.lock().conversation.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.shared.handle.is_busy()
    }

    /// Get a cloneable handle for awaiting idle from other tasks
    pub fn handle(&self) -> SessionHandle {
        self.shared.handle.clone()
    }

    /// Send `query` as a new exchange.
    ///
    /// Rejected with [`Error::Busy`] while an answer is still streaming.
    /// Transport failures never surface here; they end the answer as a
    /// failed message instead. Returns the id of the assistant message.
    pub fn submit(&self, query: &str) -> Result<MessageId> {
        if query.trim().is_empty() {
            return Err(Error::EmptyQuery);
        }

        let mut inner = self.shared.state.lock();
        if inner.closed {
            return Err(Error::Closed);
        }
        if self.shared.handle.is_busy() {
            tracing::debug!("Rejecting submission while an exchange is in flight");
            return Err(Error::Busy);
        }

        // Stop revealing the previous answer; it is shown in full below
        inner.cancel.cancel();
        let cancel = CancellationToken::new();
        inner.cancel = cancel.clone();

        let (user, assistant) = inner.conversation.begin_exchange(query);

        self.shared.handle.set_busy();
        self.shared.publish(&inner.conversation);
        let _ = self.shared.event_tx.send(ChatEvent::ExchangeStart {
            user_message: user,
            assistant_message: assistant,
        });
        tracing::debug!(%assistant, "Exchange started");

        let exchange = Exchange {
            shared: self.shared.clone(),
            transport: self.transport.clone(),
            config: self.config,
            id: assistant,
            cancel,
        };
        inner.task = Some(tokio::spawn(exchange.run(query.to_string())));

        Ok(assistant)
    }

    /// Clear the conversation, dropping any exchange in flight
    pub fn reset(&self) {
        let mut inner = self.shared.state.lock();
        Self::stop(&mut inner);
        inner.conversation = Conversation::new();
        self.shared.handle.set_idle();
        self.shared.publish(&inner.conversation);
    }

    /// Replace the conversation with earlier messages, shown in full
    pub fn restore(&self, messages: impl IntoIterator<Item = Message>) -> Result<()> {
        let mut inner = self.shared.state.lock();
        if inner.closed {
            return Err(Error::Closed);
        }
        if self.shared.handle.is_busy() {
            return Err(Error::Busy);
        }
        Self::stop(&mut inner);
        inner.conversation = Conversation::restore(messages);
        self.shared.publish(&inner.conversation);
        Ok(())
    }

    /// Stop any exchange and reject further submissions
    pub fn shutdown(&self) {
        let mut inner = self.shared.state.lock();
        if inner.closed {
            return;
        }
        inner.closed = true;
        Self::stop(&mut inner);
        self.shared.handle.set_idle();
        tracing::debug!("Session shut down");
    }

    fn stop(inner: &mut Inner) {
        inner.cancel.cancel();
        if let Some(task) = inner.task.take() {
            task.abort();
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// What the next read from the answer stream produced
enum StreamItem {
    Event(ProtocolEvent),
    Failed(sous_ai::Error),
    Closed,
    TimedOut,
}

async fn next_item(stream: &mut Option<EventStream>, deadline: Option<Instant>) -> StreamItem {
    let Some(events) = stream.as_mut() else {
        return std::future::pending().await;
    };
    let item = match deadline {
        Some(deadline) => match tokio::time::timeout_at(deadline, events.next()).await {
            Ok(item) => item,
            Err(_) => return StreamItem::TimedOut,
        },
        None => events.next().await,
    };
    match item {
        Some(Ok(event)) => StreamItem::Event(event),
        Some(Err(err)) => StreamItem::Failed(err),
        None => StreamItem::Closed,
    }
}

/// One exchange: its stream, its reveal, and its cancellation token
struct Exchange {
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    config: SessionConfig,
    id: MessageId,
    cancel: CancellationToken,
}

impl Exchange {
    fn deadline(&self) -> Option<Instant> {
        self.config.read_timeout.map(|timeout| Instant::now() + timeout)
    }

    async fn open(&self, query: &str) -> Option<EventStream> {
        let opening = self.transport.open(query);
        let opened = match self.config.read_timeout {
            Some(timeout) => tokio::time::timeout(timeout, opening).await,
            None => Ok(opening.await),
        };
        let event = match opened {
            Ok(Ok(stream)) => return Some(stream),
            Ok(Err(err)) => self.shared.failure(&self.cancel, &err, CONNECT_FAILED),
            Err(_) => {
                tracing::warn!("Timed out opening chat stream");
                ProtocolEvent::Error(SERVER_TIMEOUT.to_string())
            }
        };
        self.shared.apply(&self.cancel, self.id, &event);
        None
    }

    async fn run(self, query: String) {
        let cancel = self.cancel.clone();

        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            stream = self.open(&query) => stream,
        };

        let mut scheduler = DisplayScheduler::new(self.config.reveal);
        scheduler.track(self.id);
        let mut ticker = tokio::time::interval(scheduler.config().interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut deadline = self.deadline();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(id = %self.id, "Exchange cancelled");
                    return;
                }
                _ = ticker.tick() => match self.shared.tick(&cancel, &mut scheduler) {
                    Some(Tick::Finished) => {
                        let _ = self.shared.event_tx.send(ChatEvent::RevealFinished { message: self.id });
                        return;
                    }
                    None | Some(Tick::Idle) => return,
                    Some(Tick::Revealed(_) | Tick::Waiting) => {}
                },
                item = next_item(&mut stream, deadline) => {
                    let event = match item {
                        StreamItem::Event(event) => event,
                        StreamItem::Failed(err) => {
                            self.shared.failure(&cancel, &err, CONNECTION_INTERRUPTED)
                        }
                        StreamItem::Closed => ProtocolEvent::Done,
                        StreamItem::TimedOut => {
                            tracing::warn!(id = %self.id, "No data from server within read timeout");
                            ProtocolEvent::Error(SERVER_TIMEOUT.to_string())
                        }
                    };
                    deadline = self.deadline();
                    if !self.shared.apply(&cancel, self.id, &event) {
                        // Dropping the stream closes the connection
                        stream = None;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{MessageStatus, Role};
    use crate::reducer::ERROR_MARKER;
    use async_trait::async_trait;
    use sous_ai::AnalysisPayload;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    enum Step {
        Event(ProtocolEvent),
        Fail(sous_ai::Error),
        Delay(Duration),
        Stall,
    }

    type Script = std::result::Result<Vec<Step>, sous_ai::Error>;

    /// Plays one scripted answer per `open` call
    struct ScriptedTransport {
        scripts: Mutex<VecDeque<Script>>,
        opened: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts.into()),
                opened: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn open(&self, _query: &str) -> sous_ai::Result<EventStream> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            let steps = self.scripts.lock().pop_front().unwrap_or_else(|| Ok(vec![]))?;
            Ok(Box::pin(async_stream::stream! {
                for step in steps {
                    match step {
                        Step::Event(event) => yield Ok(event),
                        Step::Fail(err) => yield Err(err),
                        Step::Delay(delay) => tokio::time::sleep(delay).await,
                        Step::Stall => std::future::pending::<()>().await,
                    }
                }
            }))
        }
    }

    /// Transport that decodes raw bytes, as the HTTP transport does
    struct RawTransport(Vec<&'static str>);

    #[async_trait]
    impl Transport for RawTransport {
        async fn open(&self, _query: &str) -> sous_ai::Result<EventStream> {
            let chunks: Vec<sous_ai::Result<&'static [u8]>> =
                self.0.iter().copied().map(|c| Ok(c.as_bytes())).collect();
            Ok(sous_ai::decode_stream(futures::stream::iter(chunks)))
        }
    }

    /// Sets its flag when dropped
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    /// Streams one token, then holds the connection open until the stream
    /// is dropped
    struct HeldTransport {
        closed: Arc<AtomicBool>,
    }

    impl HeldTransport {
        fn new() -> (Arc<Self>, Arc<AtomicBool>) {
            let closed = Arc::new(AtomicBool::new(false));
            let transport = Arc::new(Self {
                closed: closed.clone(),
            });
            (transport, closed)
        }
    }

    #[async_trait]
    impl Transport for HeldTransport {
        async fn open(&self, _query: &str) -> sous_ai::Result<EventStream> {
            let guard = DropFlag(self.closed.clone());
            Ok(Box::pin(async_stream::stream! {
                let _guard = guard;
                yield Ok(ProtocolEvent::Token("held".to_string()));
                std::future::pending::<()>().await;
            }))
        }
    }

    fn token(text: &str) -> Step {
        Step::Event(ProtocolEvent::Token(text.to_string()))
    }

    fn session(transport: Arc<dyn Transport>) -> SessionController {
        SessionController::new(transport, SessionConfig::default())
    }

    async fn reveal_finished(events: &mut broadcast::Receiver<ChatEvent>, id: MessageId) {
        loop {
            match events.recv().await.unwrap() {
                ChatEvent::RevealFinished { message } if message == id => return,
                _ => {}
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_is_revealed_stepwise() {
        let transport = ScriptedTransport::new(vec![Ok(vec![
            token("红"),
            token("烧肉"),
            Step::Event(ProtocolEvent::Analysis(AnalysisPayload {
                strategy: "graph".into(),
                complexity: 0.4,
                relationship_intensity: None,
                reasoning: None,
                relevant_documents: vec![],
            })),
        ])]);
        let session = session(transport);
        let mut snapshots = session.subscribe();
        let mut events = session.events();

        let started = Instant::now();
        let id = session.submit("红烧肉怎么做?").unwrap();

        let mut seen = vec![String::new()];
        loop {
            snapshots.changed().await.unwrap();
            let conv = snapshots.borrow_and_update().clone();
            let msg = conv.get(id).unwrap();
            assert!(msg.text().starts_with(msg.visible_text()));
            if seen.last().map(String::as_str) != Some(msg.visible_text()) {
                seen.push(msg.visible_text().to_string());
            }
            if msg.is_terminal() && msg.is_fully_visible() {
                break;
            }
        }
        assert_eq!(seen, vec!["", "红", "红烧", "红烧肉"]);
        assert!(started.elapsed() >= Duration::from_millis(30));

        reveal_finished(&mut events, id).await;
        let conv = session.snapshot();
        let msg = conv.get(id).unwrap();
        assert_eq!(msg.text(), "红烧肉");
        assert_eq!(msg.status(), MessageStatus::Complete);
        assert_eq!(msg.analysis().unwrap().strategy, "graph");
        assert_eq!(conv.messages()[0].role(), Role::User);
        assert_eq!(conv.messages()[0].status(), MessageStatus::Complete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_connection_fails_with_marker() {
        let transport = ScriptedTransport::new(vec![Ok(vec![
            token("你好"),
            Step::Delay(Duration::from_millis(5)),
            Step::Fail(sous_ai::Error::Aborted),
        ])]);
        let session = session(transport);
        let mut events = session.events();
        let id = session.submit("hi").unwrap();

        session.handle().wait_for_idle().await;
        let conv = session.snapshot();
        let msg = conv.get(id).unwrap();
        assert_eq!(msg.status(), MessageStatus::Failed);
        assert!(msg.text().starts_with("你好"));
        assert!(msg.text().contains(ERROR_MARKER));
        assert!(msg.text().ends_with(CONNECTION_INTERRUPTED));

        reveal_finished(&mut events, id).await;
        assert!(session.snapshot().get(id).unwrap().is_fully_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_frame_does_not_abort_stream() {
        let transport = Arc::new(RawTransport(vec![
            "data: {\"type\": \"token\", \"data\": \"红烧\"}\n\n",
            "data: {not-json}\n\n",
            "data: {\"type\": \"token\", \"data\": \"肉\"}\n\ndata: [DONE]\n\n",
        ]));
        let session = session(transport);
        let mut events = session.events();
        let id = session.submit("q").unwrap();

        reveal_finished(&mut events, id).await;
        let conv = session.snapshot();
        let msg = conv.get(id).unwrap();
        assert_eq!(msg.text(), "红烧肉");
        assert_eq!(msg.status(), MessageStatus::Complete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_while_streaming_is_rejected() {
        let transport = ScriptedTransport::new(vec![Ok(vec![token("partial"), Step::Stall])]);
        let session = session(transport.clone());
        session.submit("first").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(session.is_busy());
        assert!(session.submit("second").unwrap_err().is_busy());
        assert_eq!(session.snapshot().len(), 2);
        assert_eq!(transport.opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let session = session(ScriptedTransport::new(vec![]));
        assert!(matches!(session.submit("  \n"), Err(Error::EmptyQuery)));
        assert!(session.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_submission_after_terminal_state() {
        let transport = ScriptedTransport::new(vec![
            Ok(vec![token("abcdefghij")]),
            Ok(vec![token("second")]),
        ]);
        let session = session(transport);
        let mut events = session.events();
        let first = session.submit("one").unwrap();

        // Busy ends when the answer ends, before the reveal catches up
        session.handle().wait_for_idle().await;
        assert!(!session.snapshot().get(first).unwrap().is_fully_visible());

        let second = session.submit("two").unwrap();
        assert_eq!(
            session.snapshot().get(first).unwrap().visible_text(),
            "abcdefghij"
        );

        reveal_finished(&mut events, second).await;
        let conv = session.snapshot();
        assert_eq!(conv.len(), 4);
        assert_eq!(conv.get(second).unwrap().text(), "second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_stops_publication() {
        let transport = ScriptedTransport::new(vec![Ok(vec![
            token("一二三四五六七八九十"),
            Step::Delay(Duration::from_millis(100)),
            token("more"),
            Step::Stall,
        ])]);
        let session = session(transport);
        let mut snapshots = session.subscribe();
        session.submit("q").unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        session.reset();
        assert!(!session.is_busy());
        assert!(session.snapshot().is_empty());
        snapshots.borrow_and_update();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!snapshots.has_changed().unwrap());
        assert!(session.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_failure_uses_stable_message() {
        let transport = ScriptedTransport::new(vec![Err(sous_ai::Error::Status {
            status: 503,
            body: "down".into(),
        })]);
        let session = session(transport);
        let id = session.submit("q").unwrap();
        session.handle().wait_for_idle().await;

        let conv = session.snapshot();
        let msg = conv.get(id).unwrap();
        assert_eq!(msg.status(), MessageStatus::Failed);
        assert_eq!(msg.text(), format!("{} {}", ERROR_MARKER, CONNECT_FAILED));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthorized_is_broadcast() {
        let transport = ScriptedTransport::new(vec![Err(sous_ai::Error::Unauthorized)]);
        let session = session(transport);
        let mut events = session.events();
        let id = session.submit("q").unwrap();

        assert!(matches!(events.recv().await.unwrap(), ChatEvent::ExchangeStart { .. }));
        assert_eq!(events.recv().await.unwrap(), ChatEvent::Unauthorized);
        assert_eq!(
            events.recv().await.unwrap(),
            ChatEvent::ExchangeEnd {
                message: id,
                status: MessageStatus::Failed
            }
        );
        assert!(session.snapshot().get(id).unwrap().text().ends_with(UNAUTHORIZED));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout_fails_exchange() {
        let transport = ScriptedTransport::new(vec![Ok(vec![token("慢"), Step::Stall])]);
        let config = SessionConfig {
            read_timeout: Some(Duration::from_secs(1)),
            ..Default::default()
        };
        let session = SessionController::new(transport, config);
        let started = Instant::now();
        let id = session.submit("q").unwrap();

        session.handle().wait_for_idle().await;
        assert!(started.elapsed() >= Duration::from_secs(1));
        let conv = session.snapshot();
        let msg = conv.get(id).unwrap();
        assert_eq!(msg.status(), MessageStatus::Failed);
        assert!(msg.text().starts_with("慢"));
        assert!(msg.text().ends_with(SERVER_TIMEOUT));
    }

    #[tokio::test]
    async fn test_restore_shows_history_in_full() {
        let session = session(ScriptedTransport::new(vec![]));
        let mut snapshots = session.subscribe();
        session
            .restore(vec![Message::assistant("你好！我是你的AI烹饪助手")])
            .unwrap();

        assert!(snapshots.has_changed().unwrap());
        let conv = snapshots.borrow_and_update().clone();
        assert_eq!(conv.len(), 1);
        assert!(conv.messages()[0].is_fully_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_while_streaming_is_rejected() {
        let transport = ScriptedTransport::new(vec![Ok(vec![Step::Stall])]);
        let session = session(transport);
        session.submit("q").unwrap();
        assert!(session.restore(vec![]).unwrap_err().is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_rejects_submissions() {
        let transport = ScriptedTransport::new(vec![Ok(vec![token("x"), Step::Stall])]);
        let session = session(transport);
        session.submit("q").unwrap();
        session.shutdown();

        assert!(!session.is_busy());
        assert!(matches!(session.submit("again"), Err(Error::Closed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_reveal_interval_still_finishes() {
        let transport = ScriptedTransport::new(vec![Ok(vec![token("好")])]);
        let config = SessionConfig {
            reveal: RevealConfig {
                interval: Duration::ZERO,
                chars_per_tick: 1,
            },
            ..Default::default()
        };
        let session = SessionController::new(transport, config);
        let mut events = session.events();
        let id = session.submit("q").unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            session.handle().wait_for_idle().await;
            reveal_finished(&mut events, id).await;
        })
        .await
        .expect("exchange never finished");

        assert!(!session.is_busy());
        let conv = session.snapshot();
        let msg = conv.get(id).unwrap();
        assert_eq!(msg.status(), MessageStatus::Complete);
        assert_eq!(msg.text(), "好");
        assert!(msg.is_fully_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_closes_the_connection() {
        let (transport, closed) = HeldTransport::new();
        let session = session(transport);
        session.submit("q").unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!closed.load(Ordering::SeqCst));

        session.reset();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_the_connection() {
        let (transport, closed) = HeldTransport::new();
        let session = session(transport);
        session.submit("q").unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!closed.load(Ordering::SeqCst));

        session.shutdown();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_the_session_closes_the_connection() {
        let (transport, closed) = HeldTransport::new();
        let session = session(transport);
        session.submit("q").unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!closed.load(Ordering::SeqCst));

        drop(session);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exchange_start_reports_the_user_message() {
        let transport = ScriptedTransport::new(vec![Ok(vec![token("ok")])]);
        let session = session(transport);
        let mut events = session.events();
        let id = session.submit("红烧肉怎么做?").unwrap();

        let ChatEvent::ExchangeStart {
            user_message,
            assistant_message,
        } = events.recv().await.unwrap()
        else {
            panic!("expected the exchange to start first");
        };
        assert_eq!(assistant_message, id);
        let conv = session.snapshot();
        let user = conv.get(user_message).unwrap();
        assert_eq!(user.role(), Role::User);
        assert_eq!(user.text(), "红烧肉怎么做?");
    }
}
