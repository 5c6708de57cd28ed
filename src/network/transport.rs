//! Realtime transport: one duplex link per active conversation scope.
//!
//! The adapter owns every [`ConnectionHandle`]. Inbound frames from all links
//! are funnelled into a single queue tagged with `(conversation, generation)`
//! so the worker can select on one stream and drop frames from links that
//! were already replaced.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use crate::common::{ChatMessage, ConnectionState, Conversation, NetworkEvent, Scope, UserId};
use crate::config::RetryConfig;
use crate::error::{ClientError, ErrorKind, Result};

const RECENT_SENT_LIMIT: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Closed,
    Error(String),
}

/// Both directions of an established connection.
pub struct Link {
    pub outbound: mpsc::Sender<OutboundFrame>,
    pub inbound: mpsc::Receiver<InboundFrame>,
}

/// Establishes links. Production uses websockets; tests plug in channels.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str, token: Option<&str>) -> Result<Link>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedFrame {
    pub conversation: Conversation,
    pub generation: u64,
    pub frame: InboundFrame,
}

/// What the worker should do with a tagged frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Message(ChatMessage),
    StateChanged(ConnectionState),
    Malformed(ClientError),
    /// Our own message reflected back by the server.
    Echo,
    /// Frame from a handle that was already released or replaced.
    Stale,
}

/// A send that did not go out. The composed content is handed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFailure {
    pub content: String,
    pub error: ClientError,
}

pub struct ConnectionHandle {
    conversation: Conversation,
    generation: u64,
    state: ConnectionState,
    outbound: Option<mpsc::Sender<OutboundFrame>>,
    forwarder: Option<JoinHandle<()>>,
    recent_sent: VecDeque<ChatMessage>,
    released: bool,
}

impl ConnectionHandle {
    fn connecting(conversation: Conversation, generation: u64) -> Self {
        Self {
            conversation,
            generation,
            state: ConnectionState::Connecting,
            outbound: None,
            forwarder: None,
            recent_sent: VecDeque::new(),
            released: false,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Release the underlying link. Only the first call has an effect.
    fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;

        if let Some(outbound) = self.outbound.take() {
            if let Err(err) = outbound.try_send(OutboundFrame::Close) {
                log::debug!("Close frame for {} not queued: {err}", self.conversation);
            }
        }
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        if self.state != ConnectionState::Errored {
            self.state = ConnectionState::Closed;
        }
        log::info!(
            "Released connection {} (generation {})",
            self.conversation,
            self.generation
        );
        true
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.release();
    }
}

pub struct Transport<C: Connector> {
    connector: C,
    ws_base_url: String,
    retry: RetryConfig,
    slots: HashMap<Scope, ConnectionHandle>,
    next_generation: u64,
    frames_tx: mpsc::UnboundedSender<TaggedFrame>,
    frames_rx: mpsc::UnboundedReceiver<TaggedFrame>,
    events: mpsc::Sender<NetworkEvent>,
}

impl<C: Connector> Transport<C> {
    pub fn new(
        connector: C,
        ws_base_url: &str,
        retry: RetryConfig,
        events: mpsc::Sender<NetworkEvent>,
    ) -> Self {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        Self {
            connector,
            ws_base_url: ws_base_url.trim_end_matches('/').to_string(),
            retry,
            slots: HashMap::new(),
            next_generation: 1,
            frames_tx,
            frames_rx,
            events,
        }
    }

    pub fn handle(&self, conversation: &Conversation) -> Option<&ConnectionHandle> {
        self.slots
            .get(&conversation.scope)
            .filter(|handle| &handle.conversation == conversation)
    }

    pub fn open_count(&self) -> usize {
        self.slots
            .values()
            .filter(|handle| handle.state == ConnectionState::Open)
            .count()
    }

    /// Open `conversation`, releasing whatever held its scope first.
    ///
    /// Retries with exponential backoff up to `retry.max_attempts`; returns
    /// the generation of the new handle.
    pub async fn open(&mut self, conversation: &Conversation, token: Option<&str>) -> Result<u64> {
        if let Some(existing) = self.handle(conversation) {
            if matches!(
                existing.state,
                ConnectionState::Open | ConnectionState::Connecting
            ) {
                return Ok(existing.generation);
            }
        }

        if let Some(mut previous) = self.slots.remove(&conversation.scope) {
            previous.release();
            emit_state(
                &self.events,
                &previous.conversation,
                previous.generation,
                previous.state,
                0,
            )
            .await;
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        self.slots.insert(
            conversation.scope,
            ConnectionHandle::connecting(conversation.clone(), generation),
        );

        let url = match self.socket_url(conversation) {
            Ok(url) => url,
            Err(err) => {
                log::warn!("Cannot build socket URL for {conversation}: {err}");
                if let Some(handle) = self.slots.get_mut(&conversation.scope) {
                    handle.state = ConnectionState::Errored;
                }
                emit_state(&self.events, conversation, generation, ConnectionState::Errored, 0)
                    .await;
                return Err(err);
            }
        };
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = ClientError::Network("no connection attempt made".to_string());

        for attempt in 1..=max_attempts {
            emit_state(
                &self.events,
                conversation,
                generation,
                ConnectionState::Connecting,
                attempt,
            )
            .await;
            log::info!("Connecting {conversation} to {url} (attempt {attempt}/{max_attempts})");

            match self.connector.connect(&url, token).await {
                Ok(link) => {
                    self.attach(conversation, generation, link);
                    emit_state(
                        &self.events,
                        conversation,
                        generation,
                        ConnectionState::Open,
                        attempt,
                    )
                    .await;
                    return Ok(generation);
                }
                Err(err) => {
                    log::warn!("Connection attempt {attempt} for {conversation} failed: {err}");
                    // Only transient faults are worth another attempt.
                    let give_up = err.kind() != ErrorKind::Network;
                    last_error = err;
                    if give_up {
                        break;
                    }
                    if attempt < max_attempts {
                        let wait = self.retry.backoff_ms(attempt);
                        tokio::time::sleep(Duration::from_millis(wait)).await;
                    }
                }
            }
        }

        if let Some(handle) = self.slots.get_mut(&conversation.scope) {
            handle.state = ConnectionState::Errored;
        }
        emit_state(
            &self.events,
            conversation,
            generation,
            ConnectionState::Errored,
            max_attempts,
        )
        .await;
        Err(last_error)
    }

    /// Realtime endpoint of `conversation` with every segment percent-encoded.
    fn socket_url(&self, conversation: &Conversation) -> Result<String> {
        let mut url = Url::parse(&self.ws_base_url).map_err(|err| {
            ClientError::Config(format!(
                "invalid websocket base URL {}: {err}",
                self.ws_base_url
            ))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                ClientError::Config(format!(
                    "websocket base URL {} cannot carry a path",
                    self.ws_base_url
                ))
            })?
            .pop_if_empty()
            .extend(conversation.socket_segments());
        Ok(url.to_string())
    }

    fn attach(&mut self, conversation: &Conversation, generation: u64, link: Link) {
        let Link { outbound, mut inbound } = link;
        let frames = self.frames_tx.clone();
        let tag = conversation.clone();

        let forwarder = tokio::spawn(async move {
            let mut terminated = false;
            while let Some(frame) = inbound.recv().await {
                terminated = !matches!(frame, InboundFrame::Text(_));
                let tagged = TaggedFrame {
                    conversation: tag.clone(),
                    generation,
                    frame,
                };
                if frames.send(tagged).is_err() || terminated {
                    return;
                }
            }
            if !terminated {
                let _ = frames.send(TaggedFrame {
                    conversation: tag,
                    generation,
                    frame: InboundFrame::Closed,
                });
            }
        });

        if let Some(handle) = self.slots.get_mut(&conversation.scope) {
            handle.outbound = Some(outbound);
            handle.forwarder = Some(forwarder);
            handle.state = ConnectionState::Open;
        }
    }

    /// Send a message on the open handle of `conversation`.
    ///
    /// Fails without touching anything when the handle is missing or not open.
    pub async fn send(
        &mut self,
        conversation: &Conversation,
        sender: &UserId,
        content: String,
    ) -> std::result::Result<ChatMessage, SendFailure> {
        let Some(handle) = self
            .slots
            .get_mut(&conversation.scope)
            .filter(|handle| &handle.conversation == conversation)
        else {
            return Err(SendFailure {
                content,
                error: ClientError::NotOpen {
                    conversation: conversation.to_string(),
                    state: "no connection".to_string(),
                },
            });
        };

        let outbound = match (&handle.outbound, handle.state) {
            (Some(outbound), ConnectionState::Open) => outbound.clone(),
            (_, state) => {
                return Err(SendFailure {
                    content,
                    error: ClientError::NotOpen {
                        conversation: conversation.to_string(),
                        state: state.to_string(),
                    },
                });
            }
        };

        let message = ChatMessage::new(sender.as_str(), content);
        let payload = match serde_json::to_string(&message) {
            Ok(payload) => payload,
            Err(err) => {
                return Err(SendFailure {
                    content: message.content,
                    error: err.into(),
                });
            }
        };

        if outbound.send(OutboundFrame::Text(payload)).await.is_err() {
            handle.state = ConnectionState::Errored;
            return Err(SendFailure {
                content: message.content,
                error: ClientError::Network(format!("connection for {conversation} dropped")),
            });
        }

        log::debug!("Sent message on {conversation}");
        handle.recent_sent.push_back(message.clone());
        if handle.recent_sent.len() > RECENT_SENT_LIMIT {
            handle.recent_sent.pop_front();
        }
        Ok(message)
    }

    /// Release the handle of `conversation`. Safe to call repeatedly.
    pub fn close(&mut self, conversation: &Conversation) -> bool {
        let matches = self
            .slots
            .get(&conversation.scope)
            .is_some_and(|handle| &handle.conversation == conversation);
        if !matches {
            return false;
        }
        self.slots
            .remove(&conversation.scope)
            .is_some_and(|mut handle| handle.release())
    }

    /// Release every handle (logout, session expiry). Returns how many were live.
    pub fn close_all(&mut self) -> usize {
        self.slots
            .drain()
            .map(|(_, mut handle)| handle.release())
            .filter(|released| *released)
            .count()
    }

    pub async fn next_frame(&mut self) -> Option<TaggedFrame> {
        self.frames_rx.recv().await
    }

    /// Apply a tagged frame to handle state and classify it.
    pub fn handle_frame(&mut self, tagged: TaggedFrame) -> Inbound {
        let Some(handle) = self
            .slots
            .get_mut(&tagged.conversation.scope)
            .filter(|handle| {
                handle.conversation == tagged.conversation && handle.generation == tagged.generation
            })
        else {
            log::debug!(
                "Dropping frame for released {} (generation {})",
                tagged.conversation,
                tagged.generation
            );
            return Inbound::Stale;
        };

        match tagged.frame {
            InboundFrame::Text(raw) => match serde_json::from_str::<ChatMessage>(&raw) {
                Ok(message) => {
                    if let Some(index) = handle.recent_sent.iter().position(|sent| sent == &message)
                    {
                        handle.recent_sent.remove(index);
                        return Inbound::Echo;
                    }
                    Inbound::Message(message)
                }
                Err(err) => {
                    log::warn!("Malformed frame on {}: {err}", tagged.conversation);
                    Inbound::Malformed(ClientError::Protocol(format!(
                        "malformed frame on {}: {err}",
                        tagged.conversation
                    )))
                }
            },
            InboundFrame::Closed => {
                log::info!("Connection {} closed by peer", tagged.conversation);
                handle.outbound = None;
                handle.state = ConnectionState::Closed;
                Inbound::StateChanged(ConnectionState::Closed)
            }
            InboundFrame::Error(err) => {
                log::warn!("Connection {} errored: {err}", tagged.conversation);
                handle.outbound = None;
                handle.state = ConnectionState::Errored;
                Inbound::StateChanged(ConnectionState::Errored)
            }
        }
    }
}

async fn emit_state(
    events: &mpsc::Sender<NetworkEvent>,
    conversation: &Conversation,
    generation: u64,
    state: ConnectionState,
    attempt: u32,
) {
    let event = NetworkEvent::ConnectionState {
        conversation: conversation.clone(),
        generation,
        state,
        attempt,
    };
    if let Err(err) = events.send(event).await {
        log::warn!("Failed to notify UI about connection state: {err}");
    }
}

#[cfg(test)]
pub mod testing {
    //! Channel-backed connector standing in for a websocket server.

    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Server side of one fake link.
    pub struct Remote {
        pub url: String,
        pub token: Option<String>,
        pub outbound: mpsc::Receiver<OutboundFrame>,
        pub inbound: mpsc::Sender<InboundFrame>,
    }

    impl Remote {
        /// Frames the client wrote so far.
        pub fn drain(&mut self) -> Vec<OutboundFrame> {
            let mut frames = Vec::new();
            while let Ok(frame) = self.outbound.try_recv() {
                frames.push(frame);
            }
            frames
        }

        pub fn close_count(&mut self) -> usize {
            self.drain()
                .into_iter()
                .filter(|frame| *frame == OutboundFrame::Close)
                .count()
        }
    }

    #[derive(Clone, Default)]
    pub struct FakeConnector {
        pub remotes: Arc<Mutex<Vec<Remote>>>,
        pub failures: Arc<Mutex<VecDeque<ClientError>>>,
        pub attempts: Arc<Mutex<u32>>,
    }

    impl FakeConnector {
        pub fn failing_with(errors: Vec<ClientError>) -> Self {
            let connector = Self::default();
            connector.failures.lock().unwrap().extend(errors);
            connector
        }

        pub fn take_remote(&self, index: usize) -> Remote {
            self.remotes.lock().unwrap().remove(index)
        }

        pub fn remote_count(&self) -> usize {
            self.remotes.lock().unwrap().len()
        }

        pub fn attempts(&self) -> u32 {
            *self.attempts.lock().unwrap()
        }
    }

    #[async_trait]
    impl Connector for FakeConnector {
        async fn connect(&self, url: &str, token: Option<&str>) -> Result<Link> {
            *self.attempts.lock().unwrap() += 1;
            if let Some(err) = self.failures.lock().unwrap().pop_front() {
                return Err(err);
            }
            let (out_tx, out_rx) = mpsc::channel(16);
            let (in_tx, in_rx) = mpsc::channel(16);
            self.remotes.lock().unwrap().push(Remote {
                url: url.to_string(),
                token: token.map(str::to_string),
                outbound: out_rx,
                inbound: in_tx,
            });
            Ok(Link {
                outbound: out_tx,
                inbound: in_rx,
            })
        }
    }
}
