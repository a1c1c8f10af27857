//! Query layer shared by services and jobs. Every function takes
//! `&mut SqliteConnection`, so callers decide the transaction boundary.

pub mod users;
pub mod chats;
pub mod messages;
pub mod counters;
