use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::common::{
    Action, ConnectionState, Conversation, Friend, Post, Registration, Server, UserId,
};
use crate::session::SessionStore;

use super::navigation::Navigation;

const DEBUG_EVENT_LIMIT: usize = 100;

/// Debug event để hiển thị thông tin mạng
#[derive(Debug, Clone)]
pub struct DebugEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub generation: u64,
    pub state: ConnectionState,
    pub attempt: u32,
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub login_id: String,
    pub password: String,
}

#[derive(Debug, Clone, Default)]
pub struct PostForm {
    pub title: String,
    pub content: String,
}

/// Inline rename editor of the channel list.
#[derive(Debug, Clone, Default)]
pub struct RenameForm {
    pub server: String,
    pub from: String,
    pub to: String,
}

/// Trạng thái cục bộ của UI.
pub struct AppState {
    pub store: SessionStore,
    pub navigation: Navigation,
    pub user: Option<UserId>,
    pub login_form: LoginForm,
    pub register_form: Registration,
    /// Unsent text per conversation; failed sends land back here.
    pub drafts: HashMap<Conversation, String>,
    pub post_form: PostForm,
    /// Comment box per post id.
    pub comment_drafts: HashMap<String, String>,
    /// Posts with a submitted comment the server has not confirmed yet.
    pub pending_comments: HashSet<String>,
    pub friend_input: String,
    pub rename: Option<RenameForm>,
    /// Confirmed posts per server.
    pub posts: HashMap<String, Vec<Post>>,
    pub friends: Vec<Friend>,
    pub connections: BTreeMap<Conversation, ConnectionStatus>,
    pub unread: HashMap<Conversation, usize>,
    pub errors: HashMap<Action, String>,
    pub notice: Option<String>,
    pub debug_events: Vec<DebugEvent>,
}

impl AppState {
    pub fn new(servers: Vec<Server>) -> Self {
        Self {
            store: SessionStore::new(),
            navigation: Navigation::new(servers),
            user: None,
            login_form: LoginForm::default(),
            register_form: Registration::default(),
            drafts: HashMap::new(),
            post_form: PostForm::default(),
            comment_drafts: HashMap::new(),
            pending_comments: HashSet::new(),
            friend_input: String::new(),
            rename: None,
            posts: HashMap::new(),
            friends: Vec::new(),
            connections: BTreeMap::new(),
            unread: HashMap::new(),
            errors: HashMap::new(),
            notice: None,
            debug_events: Vec::new(),
        }
    }

    pub fn draft_mut(&mut self, conversation: &Conversation) -> &mut String {
        self.drafts.entry(conversation.clone()).or_default()
    }

    /// Put undelivered text back in front of whatever was typed since.
    pub fn restore_draft(&mut self, conversation: &Conversation, content: String) {
        let draft = self.draft_mut(conversation);
        if draft.is_empty() {
            *draft = content;
        } else {
            *draft = format!("{content} {draft}");
        }
    }

    pub fn posts_for(&self, server: &str) -> &[Post] {
        self.posts.get(server).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn upsert_post(&mut self, server: &str, post: Post) {
        let posts = self.posts.entry(server.to_string()).or_default();
        match posts.iter().position(|existing| existing.id == post.id) {
            Some(index) => posts[index] = post,
            None => posts.insert(0, post),
        }
    }

    pub fn remove_post(&mut self, server: &str, post_id: &str) {
        if let Some(posts) = self.posts.get_mut(server) {
            posts.retain(|post| post.id != post_id);
        }
    }

    pub fn add_friend(&mut self, friend: Friend) {
        if !self.friends.iter().any(|known| known.id == friend.id) {
            self.friends.push(friend);
        }
    }

    pub fn unread_count(&self, conversation: &Conversation) -> usize {
        self.unread.get(conversation).copied().unwrap_or(0)
    }

    pub fn error(&self, action: Action) -> Option<&str> {
        self.errors.get(&action).map(String::as_str)
    }

    /// Forget everything that belonged to the signed-in user.
    pub fn clear_session(&mut self) {
        self.store.clear();
        self.navigation.session_ended();
        self.user = None;
        self.login_form.password.clear();
        self.drafts.clear();
        self.post_form = PostForm::default();
        self.comment_drafts.clear();
        self.pending_comments.clear();
        self.friend_input.clear();
        self.rename = None;
        self.posts.clear();
        self.friends.clear();
        self.connections.clear();
        self.unread.clear();
    }

    pub fn add_debug_event(&mut self, event_type: &str, message: String) {
        self.debug_events.push(DebugEvent {
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            message,
        });

        // Giữ tối đa 100 events để không chiếm quá nhiều bộ nhớ
        if self.debug_events.len() > DEBUG_EVENT_LIMIT {
            self.debug_events.remove(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn post(id: &str, votes: i64) -> Post {
        Post {
            id: id.into(),
            title: "t".into(),
            content: "c".into(),
            votes,
            comments: Vec::new(),
            username: "alice".into(),
        }
    }

    #[test]
    fn test_debug_events_are_capped() {
        let mut state = AppState::new(AppConfig::default().servers);
        for i in 0..150 {
            state.add_debug_event("TEST", format!("event {i}"));
        }
        assert_eq!(state.debug_events.len(), 100);
        assert_eq!(state.debug_events[0].message, "event 50");
    }

    #[test]
    fn test_upsert_replaces_by_id() {
        let mut state = AppState::new(Vec::new());
        state.upsert_post("Server1", post("p1", 0));
        state.upsert_post("Server1", post("p2", 0));
        state.upsert_post("Server1", post("p1", 3));

        let posts = state.posts_for("Server1");
        assert_eq!(posts.len(), 2);
        assert_eq!(posts.iter().find(|p| p.id == "p1").unwrap().votes, 3);
        assert!(state.posts_for("Server2").is_empty());

        state.remove_post("Server1", "p1");
        assert_eq!(state.posts_for("Server1").len(), 1);
    }

    #[test]
    fn test_restore_draft_keeps_newer_text() {
        let mut state = AppState::new(Vec::new());
        let general = Conversation::channel("Server1", "general");

        state.restore_draft(&general, "hello".into());
        assert_eq!(state.drafts[&general], "hello");

        *state.draft_mut(&general) = "again".into();
        state.restore_draft(&general, "hello".into());
        assert_eq!(state.drafts[&general], "hello again");
    }
}
