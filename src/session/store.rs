use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::common::{ChatMessage, Conversation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Appended,
    Replaced,
    Cleared,
}

/// Published to every live subscriber after a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    /// `None` when the whole store was cleared.
    pub conversation: Option<Conversation>,
    pub kind: ChangeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub struct Subscription {
    pub id: SubscriptionId,
    pub changes: mpsc::UnboundedReceiver<StoreChange>,
}

/// In-memory message history per conversation for the current run.
///
/// Histories are append-only between replacements; `history` returns
/// messages in the exact order they were appended.
#[derive(Default)]
pub struct SessionStore {
    histories: HashMap<Conversation, Vec<ChatMessage>>,
    subscribers: Vec<(SubscriptionId, mpsc::UnboundedSender<StoreChange>)>,
    next_subscription: u64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, conversation: &Conversation, message: ChatMessage) {
        self.histories
            .entry(conversation.clone())
            .or_default()
            .push(message);
        self.publish(Some(conversation.clone()), ChangeKind::Appended);
    }

    pub fn history(&self, conversation: &Conversation) -> &[ChatMessage] {
        self.histories
            .get(conversation)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Swap in a bulk-loaded history, discarding what was there.
    pub fn replace_history(&mut self, conversation: &Conversation, messages: Vec<ChatMessage>) {
        self.histories.insert(conversation.clone(), messages);
        self.publish(Some(conversation.clone()), ChangeKind::Replaced);
    }

    pub fn clear(&mut self) {
        self.histories.clear();
        self.publish(None, ChangeKind::Cleared);
    }

    pub fn subscribe(&mut self) -> Subscription {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        let (sender, changes) = mpsc::unbounded_channel();
        self.subscribers.push((id, sender));
        Subscription { id, changes }
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn publish(&mut self, conversation: Option<Conversation>, kind: ChangeKind) {
        let change = StoreChange { conversation, kind };
        // Receivers dropped without unsubscribing are pruned here.
        self.subscribers
            .retain(|(_, sender)| sender.send(change.clone()).is_ok());
    }
}
