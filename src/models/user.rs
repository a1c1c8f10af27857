use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub is_online: bool,
    pub last_online_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// What other users see. Password hashes never leave the store.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub is_online: bool,
    pub last_online_at: Option<DateTime<Utc>>,
}

/// A `None` (deleted account) renders as the synthetic placeholder instead
/// of vanishing from message history.
pub fn render_user(user: Option<&User>) -> UserView {
    match user {
        Some(u) => UserView {
            id: u.id.clone(),
            username: u.username.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            bio: u.bio.clone(),
            avatar: u.avatar.clone(),
            is_online: u.is_online,
            last_online_at: Some(u.last_online_at),
        },
        None => UserView {
            id: "deleted".to_string(),
            username: "deleted".to_string(),
            first_name: "Deleted".to_string(),
            last_name: "User".to_string(),
            bio: None,
            avatar: None,
            is_online: false,
            last_online_at: None,
        },
    }
}

pub fn deleted_user_full_name() -> String {
    let placeholder = render_user(None);
    format!("{} {}", placeholder.first_name, placeholder.last_name)
}
