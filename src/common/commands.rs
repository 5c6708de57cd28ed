use super::types::{Conversation, Post};

/// Registration form, sent as-is to the auth endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub user_id: String,
    pub password: String,
    pub birthday: String,
}

/// Lệnh UI gửi xuống tầng mạng.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkCommand {
    /// Re-validate a token persisted by a previous run.
    RestoreSession,
    Login {
        login_id: String,
        password: String,
    },
    Register(Registration),
    Logout,
    /// Open the realtime link of a conversation, replacing the previous link
    /// of the same scope.
    OpenConversation(Conversation),
    CloseConversation(Conversation),
    SendMessage {
        conversation: Conversation,
        content: String,
    },
    ListPosts {
        server: String,
    },
    CreatePost {
        server: String,
        title: String,
        content: String,
    },
    DeletePost {
        server: String,
        post: Post,
    },
    AddComment {
        server: String,
        post_id: String,
        comment: String,
    },
    Upvote {
        server: String,
        post_id: String,
    },
    LoadFriends,
    AddFriend {
        friend_id: String,
    },
}
