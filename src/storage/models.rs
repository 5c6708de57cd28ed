/// Credential persisted between runs (single row).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub token: String,
    pub user_id: Option<String>,
    pub saved_at: i64,
}
