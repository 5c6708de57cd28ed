use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Authenticated identity. The backend may hand out numeric ids; they are
/// normalised to their decimal string form at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(text) => Ok(UserId(text)),
            Raw::Number(number) => Ok(UserId(number.to_string())),
        }
    }
}

/// Domain model đại diện một tin nhắn chat.
///
/// Also the wire frame of the realtime endpoint: `{sender, content, timestamp}`
/// with `timestamp` as an RFC 3339 UTC string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    PublicChannel,
    PrivateFriend,
}

impl Scope {
    pub fn label(self) -> &'static str {
        match self {
            Scope::PublicChannel => "channel",
            Scope::PrivateFriend => "friend",
        }
    }
}

/// A named message stream: a public channel (`key = "<server>/<channel>"`)
/// or a private friend thread (`key = friend id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Conversation {
    pub scope: Scope,
    pub key: String,
}

impl Conversation {
    pub fn channel(server: &str, channel: &str) -> Self {
        Self {
            scope: Scope::PublicChannel,
            key: format!("{server}/{channel}"),
        }
    }

    pub fn friend(friend_id: &str) -> Self {
        Self {
            scope: Scope::PrivateFriend,
            key: friend_id.to_string(),
        }
    }

    /// Unencoded path segments of the realtime endpoint, relative to the
    /// websocket base URL.
    pub fn socket_segments(&self) -> Vec<&str> {
        match self.scope {
            Scope::PublicChannel => {
                let (server, channel) = self.key.split_once('/').unwrap_or((self.key.as_str(), ""));
                vec!["ws", "channels", server, channel]
            }
            Scope::PrivateFriend => vec!["ws", "friends", &self.key],
        }
    }
}

impl fmt::Display for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope.label(), self.key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Message,
    Board,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub kind: ChannelKind,
}

impl Channel {
    pub fn new(name: &str, kind: ChannelKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub name: String,
    #[serde(default)]
    pub channels: Vec<Channel>,
}

impl Server {
    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|channel| channel.name == name)
    }
}

/// A comment on a board post. Older backends send bare strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CommentRepr")]
pub struct Comment {
    pub author: Option<String>,
    pub content: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CommentRepr {
    Plain(String),
    Full {
        #[serde(default, alias = "username")]
        author: Option<String>,
        #[serde(alias = "comment")]
        content: String,
    },
}

impl From<CommentRepr> for Comment {
    fn from(repr: CommentRepr) -> Self {
        match repr {
            CommentRepr::Plain(content) => Comment {
                author: None,
                content,
            },
            CommentRepr::Full { author, content } => Comment { author, content },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub votes: i64,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friend {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub profile_image: Option<String>,
}

/// Connection lifecycle of one conversation's realtime link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    Errored,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
            ConnectionState::Errored => "errored",
        };
        f.write_str(label)
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    UserId::deserialize(deserializer).map(|id| id.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_accepts_string_and_number() {
        let from_text: UserId = serde_json::from_str(r#""alice""#).unwrap();
        let from_number: UserId = serde_json::from_str("42").unwrap();
        assert_eq!(from_text, UserId::new("alice"));
        assert_eq!(from_number, UserId::new("42"));
    }

    #[test]
    fn test_message_frame_uses_rfc3339_timestamp() {
        let json = r#"{"sender":"bob","content":"hi","timestamp":"2024-05-01T10:00:00Z"}"#;
        let message: ChatMessage = serde_json::from_str(json).unwrap();
        assert_eq!(message.sender, "bob");
        assert_eq!(message.timestamp.to_rfc3339(), "2024-05-01T10:00:00+00:00");

        let encoded = serde_json::to_value(&message).unwrap();
        assert_eq!(encoded["timestamp"], "2024-05-01T10:00:00Z");
    }

    #[test]
    fn test_message_frame_rejects_epoch_timestamp() {
        let json = r#"{"sender":"bob","content":"hi","timestamp":1714557600000}"#;
        assert!(serde_json::from_str::<ChatMessage>(json).is_err());
    }

    #[test]
    fn test_post_with_plain_and_structured_comments() {
        let json = r#"{
            "id": 7,
            "title": "Welcome",
            "content": "Read the rules",
            "votes": 3,
            "comments": ["first!", {"author": "carol", "content": "thanks"}],
            "username": "alice"
        }"#;
        let post: Post = serde_json::from_str(json).unwrap();
        assert_eq!(post.id, "7");
        assert_eq!(post.comments[0].author, None);
        assert_eq!(post.comments[1].author.as_deref(), Some("carol"));
    }

    #[test]
    fn test_conversation_keys_and_paths() {
        let channel = Conversation::channel("Server1", "general");
        assert_eq!(channel.key, "Server1/general");
        assert_eq!(
            channel.socket_segments(),
            vec!["ws", "channels", "Server1", "general"]
        );
        assert_eq!(channel.to_string(), "channel:Server1/general");

        let friend = Conversation::friend("17");
        assert_eq!(friend.scope, Scope::PrivateFriend);
        assert_eq!(friend.socket_segments(), vec!["ws", "friends", "17"]);

        let spaced = Conversation::channel("Server1", "my room");
        assert_eq!(spaced.socket_segments()[3], "my room");
    }
}
