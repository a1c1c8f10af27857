pub mod user;
pub mod chat;
pub mod message;
pub mod counter;

pub use user::{User, UserView, render_user, deleted_user_full_name};
pub use chat::{Chat, ChatView};
pub use message::{Message, MessageFile, MessageView};
pub use counter::ChatCounter;
