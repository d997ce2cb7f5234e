//! Tokio driver for the feed client.
//!
//! DESIGN
//! ======
//! `FeedService::spawn` moves a `FeedClient` into one task that owns it for
//! its whole life. The task `select!`s over two channels:
//! - commands from any number of `FeedHandle` clones
//! - events from transport tasks and reconnect timers
//!
//! so client handlers never run concurrently. After every step the task
//! publishes the drained `FeedUpdate`s on a broadcast channel and the full
//! `FeedView` on a watch channel.
//!
//! TRANSPORT TASKS
//! ===============
//! Each `WsConnector::open` spawns a task that performs the tokio-tungstenite
//! handshake and then relays frames both ways, tagging every event with the
//! transport's generation. Dropping the outbound sender (`Transport::close`)
//! makes the task send a close frame and exit without reporting further
//! events. A failed handshake or read reports `Error` then `Close`. On
//! shutdown the service waits briefly for the latest transport task to exit
//! so queued frames reach the socket.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::{COOKIE, SEC_WEBSOCKET_PROTOCOL};
use tracing::{debug, warn};

use crate::client::{ConnectionState, FeedClient, FeedOptions, FeedUpdate, FeedView};
use crate::error::FeedError;
use crate::transport::{ConnectRequest, Connector, Generation, Scheduler, TimerId, Transport, TransportEvent};

/// Cookie the server reads the login session from.
pub const SESSION_COOKIE: &str = "session";

const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// How long shutdown waits for the live transport to write its close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// The feed client as driven by this module.
pub type LiveFeedClient = FeedClient<WsConnector, TokioScheduler>;

#[derive(Debug)]
enum LoopEvent {
    Transport { generation: Generation, event: TransportEvent },
    Timer(TimerId),
}

// =============================================================================
// CONNECTOR
// =============================================================================

pub struct WsConnector {
    events: mpsc::UnboundedSender<LoopEvent>,
    session_token: Option<String>,
    /// Task of the most recently opened transport.
    current: Option<JoinHandle<()>>,
}

impl WsConnector {
    /// Wait for the latest transport task to flush queued frames and exit.
    /// Call after closing its transport.
    async fn flush(&mut self, grace: Duration) {
        if let Some(task) = self.current.take() {
            if tokio::time::timeout(grace, task).await.is_err() {
                let grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX);
                warn!(grace_ms, "ws: transport still open after grace");
            }
        }
    }
}

pub struct WsTransport {
    outbound: Option<mpsc::UnboundedSender<String>>,
}

impl Transport for WsTransport {
    fn send(&mut self, text: String) -> bool {
        self.outbound.as_ref().is_some_and(|tx| tx.send(text).is_ok())
    }

    fn close(&mut self) {
        self.outbound = None;
    }
}

impl Connector for WsConnector {
    type Transport = WsTransport;

    fn open(&mut self, request: ConnectRequest) -> WsTransport {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_transport(request, self.session_token.clone(), rx, self.events.clone()));
        self.current = Some(task);
        WsTransport { outbound: Some(tx) }
    }
}

fn build_handshake(request: &ConnectRequest, session_token: Option<&str>) -> Result<Request, String> {
    let mut handshake = request.url.as_str().into_client_request().map_err(|e| e.to_string())?;
    let headers = handshake.headers_mut();
    if !request.protocols.is_empty() {
        let protocols = HeaderValue::from_str(&request.protocols.join(", ")).map_err(|e| e.to_string())?;
        headers.insert(SEC_WEBSOCKET_PROTOCOL, protocols);
    }
    if let Some(token) = session_token {
        let cookie = HeaderValue::from_str(&format!("{SESSION_COOKIE}={token}")).map_err(|e| e.to_string())?;
        headers.insert(COOKIE, cookie);
    }
    Ok(handshake)
}

fn emit(events: &mpsc::UnboundedSender<LoopEvent>, generation: Generation, event: TransportEvent) {
    let _ = events.send(LoopEvent::Transport { generation, event });
}

fn fail(events: &mpsc::UnboundedSender<LoopEvent>, generation: Generation, error: String) {
    emit(events, generation, TransportEvent::Error(error));
    emit(events, generation, TransportEvent::Close);
}

async fn run_transport(
    request: ConnectRequest,
    session_token: Option<String>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<LoopEvent>,
) {
    let generation = request.generation;

    let handshake = match build_handshake(&request, session_token.as_deref()) {
        Ok(handshake) => handshake,
        Err(e) => return fail(&events, generation, e),
    };

    // Connecting. A dropped outbound sender means the client gave up on us.
    let connecting = connect_async(handshake);
    tokio::pin!(connecting);
    let stream = loop {
        tokio::select! {
            result = &mut connecting => match result {
                Ok((stream, _)) => break stream,
                Err(e) => return fail(&events, generation, e.to_string()),
            },
            frame = outbound.recv() => {
                if frame.is_none() {
                    debug!(generation, "ws: closed while connecting");
                    return;
                }
            }
        }
    };

    emit(&events, generation, TransportEvent::Open);
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(text) = frame else {
                    let _ = write.send(WsMessage::Close(None)).await;
                    debug!(generation, "ws: closed by client");
                    return;
                };
                if let Err(e) = write.send(WsMessage::Text(text.into())).await {
                    return fail(&events, generation, e.to_string());
                }
            }
            msg = read.next() => match msg {
                Some(Ok(WsMessage::Text(text))) => {
                    emit(&events, generation, TransportEvent::Text(text.as_str().to_owned()));
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    emit(&events, generation, TransportEvent::Close);
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return fail(&events, generation, e.to_string()),
            }
        }
    }
}

// =============================================================================
// SCHEDULER
// =============================================================================

/// One-shot timers backed by `tokio::time::sleep`. At most one is armed.
pub struct TokioScheduler {
    events: mpsc::UnboundedSender<LoopEvent>,
    armed: Option<(TimerId, JoinHandle<()>)>,
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, timer: TimerId, delay: Duration) {
        if let Some((_, previous)) = self.armed.take() {
            previous.abort();
        }
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(LoopEvent::Timer(timer));
        });
        self.armed = Some((timer, handle));
    }

    fn cancel(&mut self, timer: TimerId) {
        if self.armed.as_ref().is_some_and(|(armed, _)| *armed == timer) {
            if let Some((_, handle)) = self.armed.take() {
                handle.abort();
            }
        }
    }
}

// =============================================================================
// SERVICE
// =============================================================================

enum Command {
    SetEnabled(bool),
    SetRoom(String),
    SetMessageLimit(usize),
    Reconnect,
    Send { content: String, image_urls: Vec<String>, reply: oneshot::Sender<bool> },
    Shutdown,
}

pub struct FeedService;

impl FeedService {
    /// Spawn the service task. The client starts disabled; call
    /// [`FeedHandle::set_enabled`] to connect.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn spawn(options: FeedOptions, session_token: Option<String>) -> FeedHandle {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(FeedView::default());
        let (updates_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);

        let connector = WsConnector { events: events_tx.clone(), session_token, current: None };
        let scheduler = TokioScheduler { events: events_tx, armed: None };
        let client = FeedClient::new(options, connector, scheduler);

        let task = tokio::spawn(run_service(client, commands_rx, events_rx, view_tx, updates_tx.clone()));

        FeedHandle { commands: commands_tx, view: view_rx, updates: updates_tx, task: Arc::new(task) }
    }
}

async fn run_service(
    mut client: LiveFeedClient,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut events: mpsc::UnboundedReceiver<LoopEvent>,
    view: watch::Sender<FeedView>,
    updates: broadcast::Sender<FeedUpdate>,
) {
    loop {
        let mut stop = false;
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::SetEnabled(enabled)) => client.set_enabled(enabled),
                Some(Command::SetRoom(room)) => client.set_room(&room),
                Some(Command::SetMessageLimit(limit)) => client.set_message_limit(limit),
                Some(Command::Reconnect) => client.reconnect(),
                Some(Command::Send { content, image_urls, reply }) => {
                    let _ = reply.send(client.send_message(&content, image_urls));
                }
                Some(Command::Shutdown) | None => {
                    client.teardown();
                    stop = true;
                }
            },
            Some(event) = events.recv() => match event {
                LoopEvent::Transport { generation, event } => client.handle_transport(generation, event),
                LoopEvent::Timer(timer) => client.handle_timer(timer),
            },
        }

        publish(&mut client, &view, &updates);
        if stop {
            client.connector_mut().flush(CLOSE_GRACE).await;
            debug!("feed: service stopped");
            return;
        }
    }
}

fn publish(client: &mut LiveFeedClient, view: &watch::Sender<FeedView>, updates: &broadcast::Sender<FeedUpdate>) {
    let drained = client.take_updates();
    if drained.is_empty() {
        return;
    }
    view.send_replace(client.view());
    for update in drained {
        // No subscribers is fine.
        let _ = updates.send(update);
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// Cheap, cloneable control surface for a running [`FeedService`].
#[derive(Clone)]
pub struct FeedHandle {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<FeedView>,
    updates: broadcast::Sender<FeedUpdate>,
    task: Arc<JoinHandle<()>>,
}

impl FeedHandle {
    pub fn set_enabled(&self, enabled: bool) {
        self.command(Command::SetEnabled(enabled));
    }

    pub fn set_room(&self, room: impl Into<String>) {
        self.command(Command::SetRoom(room.into()));
    }

    /// Zero means unbounded.
    pub fn set_message_limit(&self, limit: usize) {
        self.command(Command::SetMessageLimit(limit));
    }

    pub fn reconnect(&self) {
        self.command(Command::Reconnect);
    }

    /// Queue a message on the open connection. Resolves to `false` when there
    /// is no open connection or the service has stopped. Does not wait for
    /// the server to acknowledge.
    pub async fn send_message(&self, content: impl Into<String>, image_urls: Vec<String>) -> bool {
        let (reply, rx) = oneshot::channel();
        let command = Command::Send { content: content.into(), image_urls, reply };
        if self.commands.send(command).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Snapshot of the current view.
    #[must_use]
    pub fn current(&self) -> FeedView {
        self.view.borrow().clone()
    }

    /// Incremental updates from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<FeedUpdate> {
        self.updates.subscribe()
    }

    /// Wait until `predicate` holds for the view.
    ///
    /// # Errors
    ///
    /// [`FeedError::Timeout`] after `deadline`, [`FeedError::ServiceStopped`]
    /// if the service exits first.
    pub async fn wait_until(
        &self,
        deadline: Duration,
        predicate: impl FnMut(&FeedView) -> bool,
    ) -> Result<FeedView, FeedError> {
        let mut rx = self.view.clone();
        match tokio::time::timeout(deadline, rx.wait_for(predicate)).await {
            Err(_) => Err(FeedError::Timeout),
            Ok(Err(_)) => Err(FeedError::ServiceStopped),
            Ok(Ok(view)) => Ok(view.clone()),
        }
    }

    /// Wait for a specific connection state.
    ///
    /// # Errors
    ///
    /// See [`FeedHandle::wait_until`].
    pub async fn wait_for_state(&self, state: ConnectionState, deadline: Duration) -> Result<FeedView, FeedError> {
        self.wait_until(deadline, |view| view.state == state).await
    }

    /// Tear down the connection and stop the service task. Frames queued by
    /// an earlier `send_message` are written before this returns, unless the
    /// socket stays blocked past a short grace period.
    pub async fn shutdown(self) {
        self.command(Command::Shutdown);
        let mut view = self.view.clone();
        // The watch sender drops when the task returns.
        while view.changed().await.is_ok() {}
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    fn command(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("feed: command dropped, service stopped");
        }
    }
}

#[cfg(test)]
#[path = "runtime_test.rs"]
mod tests;
