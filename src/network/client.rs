use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::common::{
    Action, ConnectionState, Conversation, Friend, NetworkCommand, NetworkEvent, Post,
    Registration, Scope,
};
use crate::config::AppConfig;
use crate::error::{ClientError, ErrorKind, Result};
use crate::session::SessionContext;

use super::api::ApiClient;
use super::board::{Board, VoteOutcome};
use super::transport::{Connector, Inbound, TaggedFrame, Transport};

/// Network worker: owns the API client, the realtime transport and the
/// session, and talks to the UI only through the two channels.
pub struct ChatClient<C: Connector> {
    event_sender: mpsc::Sender<NetworkEvent>,
    command_receiver: mpsc::Receiver<NetworkCommand>,
    api: ApiClient,
    transport: Transport<C>,
    context: SessionContext,
    board: Board,
    /// Commands that arrived while a connection attempt was in flight.
    deferred: VecDeque<NetworkCommand>,
}

impl<C: Connector> ChatClient<C> {
    pub fn new(
        config: &AppConfig,
        connector: C,
        context: SessionContext,
        event_sender: mpsc::Sender<NetworkEvent>,
        command_receiver: mpsc::Receiver<NetworkCommand>,
    ) -> Result<Self> {
        let api = ApiClient::new(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        let transport = Transport::new(
            connector,
            &config.ws_base_url,
            config.retry,
            event_sender.clone(),
        );

        Ok(Self {
            event_sender,
            command_receiver,
            api,
            transport,
            context,
            board: Board::new(config.vote_policy),
            deferred: VecDeque::new(),
        })
    }

    pub async fn run(mut self) -> Result<()> {
        log::info!("Network event loop started");

        loop {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    if let Some(command) = command {
                        self.process(command).await;
                    } else {
                        break;
                    }
                }
                Some(frame) = self.transport.next_frame() => {
                    self.handle_frame(frame).await;
                }
            }
        }

        let released = self.transport.close_all();
        log::info!("Network event loop stopped ({released} connections released)");
        Ok(())
    }

    /// Handle `command`, then whatever queued up behind it.
    async fn process(&mut self, command: NetworkCommand) {
        self.handle_command(command).await;
        while let Some(next) = self.deferred.pop_front() {
            self.handle_command(next).await;
        }
    }

    async fn handle_command(&mut self, command: NetworkCommand) {
        match command {
            NetworkCommand::RestoreSession => self.restore_session().await,
            NetworkCommand::Login { login_id, password } => {
                if let Err(err) = self.login(&login_id, &password).await {
                    self.fail(Action::Login, err).await;
                }
            }
            NetworkCommand::Register(registration) => self.register(registration).await,
            NetworkCommand::Logout => {
                self.end_session();
                self.emit(NetworkEvent::LoggedOut).await;
            }
            NetworkCommand::OpenConversation(conversation) => {
                self.open_conversation(conversation).await;
            }
            NetworkCommand::CloseConversation(conversation) => {
                self.close_conversation(conversation).await;
            }
            NetworkCommand::SendMessage {
                conversation,
                content,
            } => self.send_message(conversation, content).await,
            NetworkCommand::ListPosts { server } => {
                let result = self.list_posts(&server).await;
                let result = result.map(|posts| NetworkEvent::PostsLoaded { server, posts });
                self.finish(Action::Board, result).await;
            }
            NetworkCommand::CreatePost {
                server,
                title,
                content,
            } => {
                let result = self.create_post(&server, &title, &content).await;
                let result = result.map(|post| NetworkEvent::PostCreated { server, post });
                self.finish(Action::Board, result).await;
            }
            NetworkCommand::DeletePost { server, post } => {
                let result = self.delete_post(&post).await;
                self.finish(
                    Action::Board,
                    result.map(|()| NetworkEvent::PostDeleted {
                        server,
                        post_id: post.id,
                    }),
                )
                .await;
            }
            NetworkCommand::AddComment {
                server,
                post_id,
                comment,
            } => {
                let result = self.add_comment(&post_id, &comment).await;
                let result = result.map(|post| NetworkEvent::PostUpdated { server, post });
                self.finish(Action::Board, result).await;
            }
            NetworkCommand::Upvote { server, post_id } => match self.upvote(&post_id).await {
                Ok(VoteOutcome::Counted(post)) => {
                    self.emit(NetworkEvent::PostUpdated { server, post }).await;
                }
                Ok(VoteOutcome::AlreadyVoted) => {
                    self.emit(NetworkEvent::Failed {
                        action: Action::Board,
                        error: ClientError::validation("already upvoted"),
                    })
                    .await;
                }
                Err(err) => self.fail(Action::Board, err).await,
            },
            NetworkCommand::LoadFriends => {
                let result = self.load_friends().await;
                self.finish(Action::Friends, result.map(NetworkEvent::FriendsLoaded))
                    .await;
            }
            NetworkCommand::AddFriend { friend_id } => {
                let result = self.add_friend(&friend_id).await;
                self.finish(Action::Friends, result.map(NetworkEvent::FriendAdded))
                    .await;
            }
        }
    }

    async fn handle_frame(&mut self, frame: TaggedFrame) {
        let conversation = frame.conversation.clone();
        let generation = frame.generation;

        match self.transport.handle_frame(frame) {
            Inbound::Message(message) => {
                self.emit(NetworkEvent::MessageReceived {
                    conversation,
                    generation,
                    message,
                })
                .await;
            }
            Inbound::StateChanged(state) => {
                self.emit(NetworkEvent::ConnectionState {
                    conversation,
                    generation,
                    state,
                    attempt: 0,
                })
                .await;
            }
            Inbound::Malformed(error) => self.fail(Action::Receive, error).await,
            Inbound::Echo | Inbound::Stale => {}
        }
    }

    async fn restore_session(&mut self) {
        let Some(stored) = self.context.persisted() else {
            log::info!("No persisted session to restore");
            return;
        };

        match self.api.profile(&stored.token).await {
            Ok(user) => match self.context.init(stored.token, user.clone()) {
                Ok(()) => self.emit(NetworkEvent::LoggedIn { user }).await,
                Err(err) => self.fail(Action::RestoreSession, err).await,
            },
            Err(err) => {
                if err.kind() == ErrorKind::Auth {
                    log::info!("Persisted session rejected; clearing it");
                    self.context.teardown();
                }
                self.fail(Action::RestoreSession, err).await;
            }
        }
    }

    async fn login(&mut self, login_id: &str, password: &str) -> Result<()> {
        if login_id.trim().is_empty() || password.is_empty() {
            return Err(ClientError::validation("login id and password are required"));
        }

        let token = self.api.login(login_id.trim(), password).await?;
        let user = self.api.profile(&token).await?;
        self.context.init(token, user.clone())?;
        self.emit(NetworkEvent::LoggedIn { user }).await;
        Ok(())
    }

    async fn register(&mut self, registration: Registration) {
        let fields = [
            &registration.email,
            &registration.username,
            &registration.user_id,
            &registration.password,
            &registration.birthday,
        ];
        if fields.iter().any(|field| field.trim().is_empty()) {
            self.fail(
                Action::Register,
                ClientError::validation("all fields are required"),
            )
            .await;
            return;
        }

        if let Err(err) = self.api.register(&registration).await {
            self.fail(Action::Register, err).await;
            return;
        }
        log::info!("Registered {}", registration.user_id);
        self.emit(NetworkEvent::Registered).await;

        if let Err(err) = self.login(&registration.user_id, &registration.password).await {
            self.fail(Action::Login, err).await;
        }
    }

    async fn open_conversation(&mut self, conversation: Conversation) {
        let token = match self.context.require_token() {
            Ok(token) => token,
            Err(err) => return self.fail(Action::Connect, err).await,
        };

        let opened = tokio::select! {
            biased;
            result = self.transport.open(&conversation, Some(&token)) => Some(result),
            () = wait_for_interrupt(&mut self.command_receiver, &mut self.deferred, &conversation) => None,
        };
        let generation = match opened {
            Some(Ok(generation)) => generation,
            Some(Err(err)) => return self.fail(Action::Connect, err).await,
            None => {
                log::info!("Connection attempt for {conversation} abandoned");
                return self.close_conversation(conversation).await;
            }
        };

        if conversation.scope == Scope::PrivateFriend {
            match self.api.friend_history(&token, &conversation.key).await {
                Ok(messages) => {
                    self.emit(NetworkEvent::HistoryLoaded {
                        conversation,
                        generation,
                        messages,
                    })
                    .await;
                }
                Err(err) => self.fail(Action::History, err).await,
            }
        }
    }

    async fn close_conversation(&mut self, conversation: Conversation) {
        let generation = self
            .transport
            .handle(&conversation)
            .map(|handle| handle.generation());
        if let (Some(generation), true) = (generation, self.transport.close(&conversation)) {
            self.emit(NetworkEvent::ConnectionState {
                conversation,
                generation,
                state: ConnectionState::Closed,
                attempt: 0,
            })
            .await;
        }
    }

    async fn send_message(&mut self, conversation: Conversation, content: String) {
        let Some(user) = self.context.user().cloned() else {
            self.emit(NetworkEvent::SendFailed {
                conversation,
                content,
                error: ClientError::Auth("not logged in".to_string()),
            })
            .await;
            return;
        };
        if content.trim().is_empty() {
            self.emit(NetworkEvent::SendFailed {
                conversation,
                content,
                error: ClientError::validation("message is empty"),
            })
            .await;
            return;
        }

        match self.transport.send(&conversation, &user, content).await {
            Ok(message) => {
                let generation = self
                    .transport
                    .handle(&conversation)
                    .map_or(0, |handle| handle.generation());
                self.emit(NetworkEvent::MessageReceived {
                    conversation,
                    generation,
                    message,
                })
                .await;
            }
            Err(failure) => {
                log::warn!("Send on {conversation} failed: {}", failure.error);
                self.emit(NetworkEvent::SendFailed {
                    conversation,
                    content: failure.content,
                    error: failure.error,
                })
                .await;
            }
        }
    }

    async fn list_posts(&mut self, server: &str) -> Result<Vec<Post>> {
        let token = self.context.require_token()?;
        self.board.list(&self.api, &token, server).await
    }

    async fn create_post(&mut self, server: &str, title: &str, content: &str) -> Result<Post> {
        let token = self.context.require_token()?;
        self.board
            .create(&self.api, &token, server, title, content)
            .await
    }

    async fn delete_post(&mut self, post: &Post) -> Result<()> {
        let token = self.context.require_token()?;
        let user = self
            .context
            .user()
            .ok_or_else(|| ClientError::Auth("not logged in".to_string()))?;
        self.board.delete(&self.api, &token, user, post).await
    }

    async fn add_comment(&mut self, post_id: &str, comment: &str) -> Result<Post> {
        let token = self.context.require_token()?;
        self.board.comment(&self.api, &token, post_id, comment).await
    }

    async fn upvote(&mut self, post_id: &str) -> Result<VoteOutcome> {
        let token = self.context.require_token()?;
        self.board.upvote(&self.api, &token, post_id).await
    }

    async fn load_friends(&mut self) -> Result<Vec<Friend>> {
        let token = self.context.require_token()?;
        self.api.friends(&token).await
    }

    async fn add_friend(&mut self, friend_id: &str) -> Result<Friend> {
        let friend_id = friend_id.trim();
        if friend_id.is_empty() {
            return Err(ClientError::validation("friend id is required"));
        }
        let token = self.context.require_token()?;
        self.api.add_friend(&token, friend_id).await
    }

    /// Release every connection and forget the session.
    fn end_session(&mut self) {
        let released = self.transport.close_all();
        self.board.reset();
        self.context.teardown();
        log::info!("Session closed, {released} connections released");
    }

    async fn finish(&mut self, action: Action, result: Result<NetworkEvent>) {
        match result {
            Ok(event) => self.emit(event).await,
            Err(err) => self.fail(action, err).await,
        }
    }

    /// Report a failure. A rejected token on an authenticated session tears
    /// the session down before the failure is reported.
    async fn fail(&mut self, action: Action, error: ClientError) {
        log::warn!("{action:?} failed: {error}");
        if error.kind() == ErrorKind::Auth && self.context.is_authenticated() {
            self.end_session();
            self.emit(NetworkEvent::SessionExpired).await;
        }
        self.emit(NetworkEvent::Failed { action, error }).await;
    }

    async fn emit(&mut self, event: NetworkEvent) {
        if let Err(err) = self.event_sender.send(event).await {
            log::warn!("Failed to notify UI: {err}");
        }
    }
}

/// Resolve once a command arrives that makes connecting `opening` pointless:
/// logout, another conversation taking its scope, or its own close. Anything
/// else is queued in `deferred`. A closed command channel also resolves.
async fn wait_for_interrupt(
    commands: &mut mpsc::Receiver<NetworkCommand>,
    deferred: &mut VecDeque<NetworkCommand>,
    opening: &Conversation,
) {
    while let Some(command) = commands.recv().await {
        let supersedes = match &command {
            NetworkCommand::Logout => true,
            NetworkCommand::OpenConversation(next) => {
                next.scope == opening.scope && next != opening
            }
            NetworkCommand::CloseConversation(closed) => closed == opening,
            _ => false,
        };
        deferred.push_back(command);
        if supersedes {
            return;
        }
    }
}
