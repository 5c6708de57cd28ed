//! Glue between the view and the network worker.
//!
//! All user intent goes through [`Controller::dispatch`]; all worker output
//! goes through [`Controller::apply`]. Nothing else sends commands.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::common::{
    Action, Conversation, Friend, NetworkCommand, NetworkEvent, Post, Registration, Scope,
    Server,
};
use crate::config;
use crate::error::ClientError;
use crate::session::{ChangeKind, Subscription};

use super::navigation::Effect;
use super::state::{AppState, ConnectionStatus, PostForm};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    ShowRegister(bool),
    Login { login_id: String, password: String },
    Register(Registration),
    Logout,
    SelectServer(String),
    SelectChannel(String),
    OpenFriend(Friend),
    CloseFriend,
    /// The user is looking at this conversation; its unread count resets.
    Focus(Conversation),
    SendMessage {
        conversation: Conversation,
        content: String,
    },
    CreatePost { title: String, content: String },
    DeletePost(Post),
    AddComment { post_id: String, comment: String },
    Upvote { post_id: String },
    AddFriend(String),
    RenameChannel {
        server: String,
        from: String,
        to: String,
    },
}

pub struct Controller {
    pub state: AppState,
    command_sender: mpsc::Sender<NetworkCommand>,
    changes: Subscription,
    /// Generation of the link currently backing each scope's conversation.
    generations: HashMap<Scope, (Conversation, u64)>,
    focused: Option<Conversation>,
    config_path: Option<String>,
}

impl Controller {
    pub fn new(
        servers: Vec<Server>,
        command_sender: mpsc::Sender<NetworkCommand>,
        config_path: Option<String>,
    ) -> Self {
        let mut state = AppState::new(servers);
        let changes = state.store.subscribe();
        Self {
            state,
            command_sender,
            changes,
            generations: HashMap::new(),
            focused: None,
            config_path,
        }
    }

    pub fn focused(&self) -> Option<&Conversation> {
        self.focused.as_ref()
    }

    pub fn dispatch(&mut self, action: UiAction) {
        match action {
            UiAction::ShowRegister(registering) => {
                self.state.errors.clear();
                self.state.navigation.show_register(registering);
            }
            UiAction::Login { login_id, password } => {
                self.state.errors.remove(&Action::Login);
                self.send(NetworkCommand::Login { login_id, password });
            }
            UiAction::Register(registration) => {
                let fields = [
                    &registration.email,
                    &registration.username,
                    &registration.user_id,
                    &registration.password,
                    &registration.birthday,
                ];
                if fields.iter().any(|field| field.trim().is_empty()) {
                    self.record_error(
                        Action::Register,
                        &ClientError::validation("all fields are required"),
                    );
                    return;
                }
                self.state.errors.remove(&Action::Register);
                self.send(NetworkCommand::Register(registration));
            }
            UiAction::Logout => {
                let effects = self.state.navigation.logout();
                self.run_effects(effects);
                self.end_session();
            }
            UiAction::SelectServer(server) => {
                let effects = self.state.navigation.select_server(&server);
                self.run_effects(effects);
                self.focused = None;
            }
            UiAction::SelectChannel(channel) => {
                let effects = self.state.navigation.select_channel(&channel);
                self.run_effects(effects);
                self.focused = self.state.navigation.channel_conversation();
                self.mark_read();
            }
            UiAction::OpenFriend(friend) => {
                let effects = self.state.navigation.open_friend(friend);
                self.run_effects(effects);
                self.focused = self.state.navigation.friend_conversation();
                self.mark_read();
            }
            UiAction::CloseFriend => {
                let effects = self.state.navigation.close_friend();
                self.run_effects(effects);
                self.focused = self.state.navigation.channel_conversation();
                self.mark_read();
            }
            UiAction::Focus(conversation) => {
                if self.state.navigation.wants(&conversation) {
                    self.focused = Some(conversation);
                    self.mark_read();
                }
            }
            UiAction::SendMessage {
                conversation,
                content,
            } => {
                if content.trim().is_empty() {
                    return;
                }
                self.send(NetworkCommand::SendMessage {
                    conversation,
                    content,
                });
            }
            UiAction::CreatePost { title, content } => {
                let Some(server) = self.selected_server() else {
                    return;
                };
                if title.trim().is_empty() || content.trim().is_empty() {
                    self.record_error(
                        Action::Board,
                        &ClientError::validation("a post needs a title and content"),
                    );
                    return;
                }
                self.send(NetworkCommand::CreatePost {
                    server,
                    title,
                    content,
                });
            }
            UiAction::DeletePost(post) => {
                let Some(server) = self.selected_server() else {
                    return;
                };
                if self.state.user.as_ref().map(|user| user.as_str()) != Some(post.username.as_str())
                {
                    self.record_error(
                        Action::Board,
                        &ClientError::validation("only the author can delete this post"),
                    );
                    return;
                }
                self.send(NetworkCommand::DeletePost { server, post });
            }
            UiAction::AddComment { post_id, comment } => {
                if let Some(server) = self.selected_server() {
                    self.state.pending_comments.insert(post_id.clone());
                    self.send(NetworkCommand::AddComment {
                        server,
                        post_id,
                        comment,
                    });
                }
            }
            UiAction::Upvote { post_id } => {
                if let Some(server) = self.selected_server() {
                    self.send(NetworkCommand::Upvote { server, post_id });
                }
            }
            UiAction::AddFriend(friend_id) => {
                let friend_id = friend_id.trim().to_string();
                if !friend_id.is_empty() {
                    self.send(NetworkCommand::AddFriend { friend_id });
                }
            }
            UiAction::RenameChannel { server, from, to } => self.rename_channel(&server, &from, &to),
        }
    }

    pub fn apply(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::LoggedIn { user } => {
                self.state
                    .add_debug_event("LOGGED_IN", format!("Signed in as {user}"));
                self.state.user = Some(user);
                self.state.errors.clear();
                self.state.notice = None;
                self.state.login_form.password.clear();
                self.state.register_form = Registration::default();
                let effects = self.state.navigation.authenticated();
                self.run_effects(effects);
            }
            NetworkEvent::Registered => {
                self.state.notice = Some("Registration complete, signing in".to_string());
                self.state
                    .add_debug_event("REGISTERED", "Account created".to_string());
            }
            NetworkEvent::LoggedOut => {
                self.state
                    .add_debug_event("LOGGED_OUT", "Session closed".to_string());
                self.end_session();
            }
            NetworkEvent::SessionExpired => {
                self.state
                    .add_debug_event("SESSION_EXPIRED", "Token rejected by server".to_string());
                self.end_session();
                self.state.notice = Some("Session expired, please sign in again".to_string());
            }
            NetworkEvent::ConnectionState {
                conversation,
                generation,
                state,
                attempt,
            } => {
                self.state.add_debug_event(
                    "CONNECTION",
                    format!("{conversation} #{generation} {state} (attempt {attempt})"),
                );
                if self.state.navigation.wants(&conversation) {
                    let newer = match self.generations.get(&conversation.scope) {
                        Some((known, current)) => known != &conversation || generation >= *current,
                        None => true,
                    };
                    if newer {
                        self.generations
                            .insert(conversation.scope, (conversation.clone(), generation));
                    }
                }
                self.state.connections.insert(
                    conversation,
                    ConnectionStatus {
                        generation,
                        state,
                        attempt,
                    },
                );
            }
            NetworkEvent::MessageReceived {
                conversation,
                generation,
                message,
            } => {
                if self.is_current(&conversation, generation) {
                    self.state.store.append(&conversation, message);
                } else {
                    log::debug!("Ignoring message for stale {conversation} #{generation}");
                }
            }
            NetworkEvent::HistoryLoaded {
                conversation,
                generation,
                messages,
            } => {
                if self.is_current(&conversation, generation) {
                    self.state.store.replace_history(&conversation, messages);
                } else {
                    log::debug!("Ignoring history for stale {conversation} #{generation}");
                }
            }
            NetworkEvent::SendFailed {
                conversation,
                content,
                error,
            } => {
                self.record_error(Action::Send, &error);
                self.state.restore_draft(&conversation, content);
            }
            NetworkEvent::PostsLoaded { server, posts } => {
                self.state.errors.remove(&Action::Board);
                self.state.posts.insert(server, posts);
            }
            NetworkEvent::PostUpdated { server, post } => {
                self.state.errors.remove(&Action::Board);
                if self.state.pending_comments.remove(&post.id) {
                    self.state.comment_drafts.remove(&post.id);
                }
                self.state.upsert_post(&server, post);
            }
            NetworkEvent::PostCreated { server, post } => {
                self.state.errors.remove(&Action::Board);
                self.state.post_form = PostForm::default();
                self.state.upsert_post(&server, post);
            }
            NetworkEvent::PostDeleted { server, post_id } => {
                self.state.remove_post(&server, &post_id);
            }
            NetworkEvent::FriendsLoaded(friends) => self.state.friends = friends,
            NetworkEvent::FriendAdded(friend) => {
                self.state.errors.remove(&Action::Friends);
                self.state.friend_input.clear();
                self.state.add_friend(friend);
            }
            NetworkEvent::Failed { action, error } => {
                if action == Action::Board {
                    self.state.pending_comments.clear();
                }
                self.record_error(action, &error);
            }
        }

        self.collect_unread();
    }

    fn is_current(&self, conversation: &Conversation, generation: u64) -> bool {
        self.state.navigation.wants(conversation)
            && matches!(
                self.generations.get(&conversation.scope),
                Some((known, current)) if known == conversation && *current == generation
            )
    }

    fn selected_server(&self) -> Option<String> {
        self.state.navigation.selected_server().map(str::to_string)
    }

    fn rename_channel(&mut self, server: &str, from: &str, to: &str) {
        match self.state.navigation.rename_channel(server, from, to) {
            Ok(effects) => {
                self.state.rename = None;
                self.run_effects(effects);
                if self.focused == Some(Conversation::channel(server, from)) {
                    self.focused = self.state.navigation.channel_conversation();
                }
                if let Some(path) = &self.config_path {
                    config::persist_channel_rename(path, server, from, to.trim());
                }
            }
            Err(err) => self.state.notice = Some(err.to_string()),
        }
    }

    fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            let command = match effect {
                Effect::OpenConversation(conversation) => {
                    self.generations.remove(&conversation.scope);
                    NetworkCommand::OpenConversation(conversation)
                }
                Effect::CloseConversation(conversation) => {
                    if self
                        .generations
                        .get(&conversation.scope)
                        .is_some_and(|(known, _)| known == &conversation)
                    {
                        self.generations.remove(&conversation.scope);
                    }
                    NetworkCommand::CloseConversation(conversation)
                }
                Effect::ListPosts { server } => NetworkCommand::ListPosts { server },
                Effect::LoadFriends => NetworkCommand::LoadFriends,
                Effect::EndSession => NetworkCommand::Logout,
            };
            self.send(command);
        }
    }

    fn send(&mut self, command: NetworkCommand) {
        if let Err(err) = self.command_sender.try_send(command) {
            log::warn!("Failed to send command to network: {err}");
        }
    }

    fn end_session(&mut self) {
        self.generations.clear();
        self.focused = None;
        self.state.clear_session();
    }

    fn record_error(&mut self, action: Action, error: &ClientError) {
        self.state
            .add_debug_event("ERROR", format!("{action:?}: {error}"));
        self.state.errors.insert(action, error.to_string());
    }

    fn mark_read(&mut self) {
        if let Some(conversation) = &self.focused {
            self.state.unread.remove(conversation);
        }
    }

    /// Count appends to conversations the user is not looking at.
    fn collect_unread(&mut self) {
        while let Ok(change) = self.changes.changes.try_recv() {
            match (change.kind, change.conversation) {
                (ChangeKind::Appended, Some(conversation))
                    if self.focused.as_ref() != Some(&conversation) =>
                {
                    *self.state.unread.entry(conversation).or_default() += 1;
                }
                (ChangeKind::Cleared, _) => self.state.unread.clear(),
                _ => {}
            }
        }
    }
}
