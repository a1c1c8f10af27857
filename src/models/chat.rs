use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};

use super::{MessageView, UserView};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Chat {
    pub id: String,
    pub title: Option<String>,
    pub avatar: Option<String>,
    pub creator_id: Option<String>,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone)]
pub struct ChatView {
    pub id: String,
    pub title: Option<String>,
    pub avatar: Option<String>,
    pub creator: UserView,
    pub members: Vec<UserView>,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_message: Option<MessageView>,
    pub unread_messages_count: i64,
}
