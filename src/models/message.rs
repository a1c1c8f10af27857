use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};

use super::UserView;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: Option<String>,
    pub text: Option<String>,
    pub voice: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MessageFile {
    pub id: String,
    pub message_id: String,
    pub item: String,
}

/// Wire shape of a message; also the payload of publish events.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MessageView {
    pub id: String,
    pub chat: String,
    pub text: Option<String>,
    pub voice: Option<String>,
    pub files: Vec<String>,
    pub sender: UserView,
    pub was_read_by: Vec<UserView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
