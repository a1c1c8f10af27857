use serde::{Serialize, Deserialize};

/// Denormalized per-(chat, user) tallies, recomputable from the source
/// tables. A cache, never authoritative.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChatCounter {
    pub id: String,
    pub chat_id: Option<String>,
    pub user_id: Option<String>,
    pub chats_count: i64,
    pub messages_count: i64,
    pub unread_messages_count: i64,
}
