//! Persistent WebSocket connection to the notes server.

use std::sync::{Arc, Mutex, PoisonError};

use futures::{SinkExt, StreamExt, stream::BoxStream};
use notes_core::{
    ClientConfig, ClientMessage, Envelope, Handshake, ReconnectPolicy, ServerMessage,
};
use tokio::{
    net::TcpStream,
    sync::{Notify, broadcast, mpsc, watch},
    task::{AbortHandle, JoinHandle},
};
use tokio_stream::wrappers::BroadcastStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use crate::{Correlator, TransportError};

/// Broadcast buffer per subscriber.
const EVENT_CAPACITY: usize = 1024;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection lifecycle as seen by the rest of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// One persistent connection shared by requests and server pushes.
///
/// The socket itself lives inside the task started by [`connect`](Self::connect);
/// callers only see this API.
pub struct Transport {
    url: String,
    reconnect: ReconnectPolicy,
    handshake: Arc<dyn Handshake>,
    correlator: Correlator,
    /// Writer queue of the live link; `None` while closed.
    link: Mutex<Option<mpsc::UnboundedSender<String>>>,
    events: broadcast::Sender<ServerMessage>,
    state: watch::Sender<ConnectionState>,
    retry: Notify,
    task: Mutex<Option<AbortHandle>>,
}

impl Transport {
    /// Create a transport. Nothing happens until [`connect`](Self::connect).
    #[must_use]
    pub fn new(config: &ClientConfig, handshake: Arc<dyn Handshake>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (state, _) = watch::channel(ConnectionState::Closed);
        Arc::new(Self {
            url: config.url.clone(),
            reconnect: config.reconnect,
            handshake,
            correlator: Correlator::new(config.correlation),
            link: Mutex::new(None),
            events,
            state,
            retry: Notify::new(),
            task: Mutex::new(None),
        })
    }

    /// Start the connection loop.
    ///
    /// The loop reconnects forever, waiting `reconnect.delay(attempt)` between
    /// attempts, and sends the handshake first on every new connection.
    pub fn connect(self: &Arc<Self>) -> JoinHandle<()> {
        let transport = Arc::clone(self);
        let handle = tokio::spawn(async move { transport.run().await });
        let previous = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle.abort_handle());
        if let Some(previous) = previous {
            previous.abort();
        }
        handle
    }

    /// Stop the connection loop and close the link.
    pub fn shutdown(&self) {
        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            task.abort();
        }
        self.close_link();
    }

    /// Skip the remaining reconnect delay, if the loop is waiting.
    pub fn reconnect_now(&self) {
        self.retry.notify_waiters();
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.state.borrow() == ConnectionState::Open
    }

    /// Watch connection state changes.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Subscribe to every inbound message, replies included.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.events.subscribe()
    }

    /// Stream form of [`subscribe`](Self::subscribe). Lagged messages are skipped.
    #[must_use]
    pub fn incoming(&self) -> BoxStream<'static, ServerMessage> {
        BroadcastStream::new(self.events.subscribe())
            .filter_map(|res| async move { res.ok() })
            .boxed()
    }

    #[must_use]
    pub const fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    /// Send a message that expects no direct reply.
    ///
    /// # Errors
    /// Returns `NotConnected` if the connection is not open.
    pub fn send(&self, message: ClientMessage) -> Result<(), TransportError> {
        self.send_envelope(&Envelope::unsolicited(message))
    }

    fn send_envelope(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let json = envelope.to_json()?;
        let link = self.link.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = link.as_ref().ok_or(TransportError::NotConnected)?;
        tx.send(json).map_err(|_| TransportError::NotConnected)
    }

    /// Send a request and wait for its reply.
    ///
    /// # Errors
    /// Returns `NotConnected` immediately if the connection is not open, or
    /// `ConnectionLost` if it closes before the reply arrives.
    pub async fn try_request(&self, message: ClientMessage) -> Result<ServerMessage, TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotConnected);
        }

        let action = message.action();
        let (request_id, rx) = self.correlator.register(action);
        if let Err(e) = self.send_envelope(&Envelope::request(request_id.clone(), message)) {
            self.correlator.cancel(&request_id);
            return Err(e);
        }
        tracing::debug!(%request_id, %action, "request sent");

        rx.await.unwrap_or(Err(TransportError::ConnectionLost))
    }

    /// Send a request; transport failures come back as an error-status reply.
    pub async fn request(&self, message: ClientMessage) -> ServerMessage {
        self.try_request(message)
            .await
            .unwrap_or_else(|e| ServerMessage::error(e.to_string()))
    }

    async fn run(self: Arc<Self>) {
        let mut attempt: u32 = 0;
        loop {
            self.state.send_replace(ConnectionState::Connecting);
            tracing::info!(url = %self.url, attempt, "connecting");

            match connect_async(self.url.as_str()).await {
                Ok((socket, _)) => {
                    attempt = 0;
                    self.serve(socket).await;
                    tracing::info!(url = %self.url, "disconnected");
                }
                Err(e) => tracing::warn!(url = %self.url, "connect failed: {e}"),
            }

            self.close_link();

            attempt = attempt.saturating_add(1);
            let delay = self.reconnect.delay(attempt);
            tracing::debug!(?delay, attempt, "waiting to reconnect");
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.retry.notified() => tracing::debug!("reconnect requested"),
            }
        }
    }

    async fn serve(&self, socket: Socket) {
        let (mut sink, mut source) = socket.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        // Queued before the link is published, so it is always the first frame.
        match Envelope::unsolicited(self.handshake.handshake()).to_json() {
            Ok(json) => {
                let _ = tx.send(json);
            }
            Err(e) => tracing::error!("Failed to serialize handshake: {e}"),
        }
        *self.link.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        self.state.send_replace(ConnectionState::Open);
        tracing::info!(url = %self.url, "connected");

        let writer = tokio::spawn(async move {
            while let Some(json) = rx.recv().await {
                if let Err(e) = sink.send(Message::text(json)).await {
                    tracing::warn!("WebSocket send failed: {e}");
                    break;
                }
            }
        });

        while let Some(frame) = source.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text.as_str().to_owned(),
                Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                    Ok(s) => s,
                    Err(_) => {
                        tracing::warn!("dropping non-UTF-8 binary frame");
                        continue;
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    tracing::error!("WebSocket error: {e}");
                    break;
                }
            };
            self.deliver(&text);
        }

        writer.abort();
    }

    fn deliver(&self, text: &str) {
        let mut msg = match ServerMessage::from_json(text) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!("unparseable frame: {e}");
                if let Some(reply) = self.correlator.reject_unparseable(text) {
                    let _ = self.events.send(reply);
                }
                return;
            }
        };
        tracing::debug!(status = ?msg.status, action = ?msg.action, "received frame");

        self.correlator.resolve(&mut msg);
        // Err only means nobody is subscribed.
        let _ = self.events.send(msg);
    }

    fn close_link(&self) {
        // Link first: requests registered after this point fail to send.
        self.link.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.state.send_replace(ConnectionState::Closed);
        self.correlator.fail_all();
    }
}
