pub mod commands;
pub mod events;
pub mod types;

pub use commands::{NetworkCommand, Registration};
pub use events::{Action, NetworkEvent};
pub use types::{
    Channel, ChannelKind, ChatMessage, Comment, ConnectionState, Conversation, Friend, Post,
    Scope, Server, UserId,
};
