pub mod auth;
pub mod users;
pub mod chats;
pub mod messages;
pub mod realtime;
