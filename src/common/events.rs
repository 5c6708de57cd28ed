use crate::error::ClientError;

use super::types::{ChatMessage, ConnectionState, Conversation, Friend, Post, UserId};

/// Which user action a failure belongs to, so the view can put the error
/// next to the form that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Login,
    Register,
    RestoreSession,
    Connect,
    /// Inbound realtime traffic (malformed frames).
    Receive,
    Send,
    Board,
    Friends,
    History,
}

/// Sự kiện từ tầng mạng gửi lên UI.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    LoggedIn {
        user: UserId,
    },
    /// Registration accepted; a login with the same credentials follows.
    Registered,
    LoggedOut,
    /// The backend rejected the token; the session has been torn down.
    SessionExpired,
    ConnectionState {
        conversation: Conversation,
        generation: u64,
        state: ConnectionState,
        attempt: u32,
    },
    MessageReceived {
        conversation: Conversation,
        generation: u64,
        message: ChatMessage,
    },
    HistoryLoaded {
        conversation: Conversation,
        generation: u64,
        messages: Vec<ChatMessage>,
    },
    /// The composed text could not be delivered and is handed back.
    SendFailed {
        conversation: Conversation,
        content: String,
        error: ClientError,
    },
    PostsLoaded {
        server: String,
        posts: Vec<Post>,
    },
    PostUpdated {
        server: String,
        post: Post,
    },
    PostCreated {
        server: String,
        post: Post,
    },
    PostDeleted {
        server: String,
        post_id: String,
    },
    FriendsLoaded(Vec<Friend>),
    FriendAdded(Friend),
    Failed {
        action: Action,
        error: ClientError,
    },
}
