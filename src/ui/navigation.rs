//! Screen state machine. Pure: every transition returns the effects the
//! controller has to turn into network commands.

use crate::common::{ChannelKind, Conversation, Friend, Server};
use crate::error::{ClientError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Unauthenticated {
        registering: bool,
    },
    Home,
    ServerSelected {
        server: String,
    },
    ChannelSelected {
        server: String,
        channel: String,
        kind: ChannelKind,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    OpenConversation(Conversation),
    CloseConversation(Conversation),
    ListPosts { server: String },
    LoadFriends,
    /// Log out: the worker releases every handle and forgets the token.
    EndSession,
}

pub struct Navigation {
    screen: Screen,
    friend: Option<Friend>,
    servers: Vec<Server>,
}

impl Navigation {
    pub fn new(servers: Vec<Server>) -> Self {
        Self {
            screen: Screen::Unauthenticated { registering: false },
            friend: None,
            servers,
        }
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn friend(&self) -> Option<&Friend> {
        self.friend.as_ref()
    }

    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self.screen, Screen::Unauthenticated { .. })
    }

    pub fn selected_server(&self) -> Option<&str> {
        match &self.screen {
            Screen::ServerSelected { server } | Screen::ChannelSelected { server, .. } => {
                Some(server)
            }
            _ => None,
        }
    }

    /// Conversation of the selected message channel, if any.
    pub fn channel_conversation(&self) -> Option<Conversation> {
        match &self.screen {
            Screen::ChannelSelected {
                server,
                channel,
                kind: ChannelKind::Message,
            } => Some(Conversation::channel(server, channel)),
            _ => None,
        }
    }

    pub fn friend_conversation(&self) -> Option<Conversation> {
        self.friend
            .as_ref()
            .map(|friend| Conversation::friend(&friend.id))
    }

    /// Whether frames for `conversation` are currently wanted on screen.
    pub fn wants(&self, conversation: &Conversation) -> bool {
        self.channel_conversation().as_ref() == Some(conversation)
            || self.friend_conversation().as_ref() == Some(conversation)
    }

    pub fn show_register(&mut self, registering: bool) {
        if let Screen::Unauthenticated { registering: current } = &mut self.screen {
            *current = registering;
        }
    }

    /// Login (or register + login) succeeded.
    pub fn authenticated(&mut self) -> Vec<Effect> {
        if self.is_authenticated() {
            return Vec::new();
        }
        self.screen = Screen::Home;
        vec![Effect::LoadFriends]
    }

    pub fn select_server(&mut self, name: &str) -> Vec<Effect> {
        if !self.is_authenticated() || !self.servers.iter().any(|server| server.name == name) {
            return Vec::new();
        }
        if let Screen::ServerSelected { server } = &self.screen {
            if server == name {
                return Vec::new();
            }
        }

        let effects = self.leave_channel();
        self.screen = Screen::ServerSelected {
            server: name.to_string(),
        };
        effects
    }

    /// Select a channel of the current server; the channel's declared kind
    /// decides between a realtime link and a post listing.
    pub fn select_channel(&mut self, name: &str) -> Vec<Effect> {
        let Some(server) = self.selected_server().map(str::to_string) else {
            return Vec::new();
        };
        let Some(kind) = self
            .servers
            .iter()
            .find(|entry| entry.name == server)
            .and_then(|entry| entry.channel(name))
            .map(|channel| channel.kind)
        else {
            return Vec::new();
        };
        if let Screen::ChannelSelected { channel, .. } = &self.screen {
            if channel == name {
                return Vec::new();
            }
        }

        let mut effects = self.leave_channel();
        effects.push(match kind {
            ChannelKind::Message => Effect::OpenConversation(Conversation::channel(&server, name)),
            ChannelKind::Board => Effect::ListPosts {
                server: server.clone(),
            },
        });
        self.screen = Screen::ChannelSelected {
            server,
            channel: name.to_string(),
            kind,
        };
        effects
    }

    /// Open the friend chat overlay; server/channel state is untouched.
    pub fn open_friend(&mut self, friend: Friend) -> Vec<Effect> {
        if !self.is_authenticated() {
            return Vec::new();
        }
        if self.friend.as_ref().is_some_and(|open| open.id == friend.id) {
            return Vec::new();
        }
        let conversation = Conversation::friend(&friend.id);
        self.friend = Some(friend);
        vec![Effect::OpenConversation(conversation)]
    }

    pub fn close_friend(&mut self) -> Vec<Effect> {
        match self.friend.take() {
            Some(friend) => vec![Effect::CloseConversation(Conversation::friend(&friend.id))],
            None => Vec::new(),
        }
    }

    pub fn logout(&mut self) -> Vec<Effect> {
        if !self.is_authenticated() {
            return Vec::new();
        }
        self.reset();
        vec![Effect::EndSession]
    }

    /// The worker already dropped the session (expiry or logout echo).
    pub fn session_ended(&mut self) {
        self.reset();
    }

    /// Rename a channel of `server`. A selected message channel is reopened
    /// under its new key.
    pub fn rename_channel(&mut self, server: &str, from: &str, to: &str) -> Result<Vec<Effect>> {
        let to = to.trim();
        if to.is_empty() {
            return Err(ClientError::validation("channel name is empty"));
        }
        if to.contains('/') {
            return Err(ClientError::validation("channel name cannot contain '/'"));
        }
        let entry = self
            .servers
            .iter_mut()
            .find(|entry| entry.name == server)
            .ok_or_else(|| ClientError::validation(format!("unknown server {server}")))?;
        if from == to {
            return Ok(Vec::new());
        }
        if entry.channel(to).is_some() {
            return Err(ClientError::validation(format!(
                "{server} already has a channel named {to}"
            )));
        }
        let channel = entry
            .channels
            .iter_mut()
            .find(|channel| channel.name == from)
            .ok_or_else(|| ClientError::validation(format!("unknown channel {from}")))?;
        channel.name = to.to_string();

        let mut effects = Vec::new();
        if let Screen::ChannelSelected {
            server: selected_server,
            channel: selected,
            kind,
        } = &mut self.screen
        {
            if selected_server.as_str() == server && selected.as_str() == from {
                *selected = to.to_string();
                if *kind == ChannelKind::Message {
                    effects.push(Effect::CloseConversation(Conversation::channel(server, from)));
                    effects.push(Effect::OpenConversation(Conversation::channel(server, to)));
                }
            }
        }
        Ok(effects)
    }

    fn leave_channel(&mut self) -> Vec<Effect> {
        self.channel_conversation()
            .map(Effect::CloseConversation)
            .into_iter()
            .collect()
    }

    fn reset(&mut self) {
        self.screen = Screen::Unauthenticated { registering: false };
        self.friend = None;
    }
}
