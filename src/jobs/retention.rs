use chrono::{Duration, Utc};

use crate::config::Config;
use crate::db::Db;
use crate::store;

pub async fn sweep_old_messages(db: &Db, cfg: &Config) -> Result<u64, sqlx::Error> {
    let mut tx = db.0.begin().await?;
    let threshold = Utc::now() - Duration::days(cfg.limits.message_retention_days);
    let deleted =
        store::messages::delete_created_before(&mut tx, threshold, &cfg.bot_username).await?;
    tx.commit().await?;

    if deleted > 0 {
        log::info!("retention: removed {deleted} messages older than {threshold}");
    }
    Ok(deleted)
}

// Inactivity is measured by `updated_at`, which tracks the latest message.
pub async fn sweep_old_chats(db: &Db, cfg: &Config) -> Result<u64, sqlx::Error> {
    let mut tx = db.0.begin().await?;
    let threshold = Utc::now() - Duration::days(cfg.limits.chat_retention_days);
    let deleted =
        store::chats::delete_inactive_before(&mut tx, threshold, &cfg.bot_username).await?;
    tx.commit().await?;

    if deleted > 0 {
        log::info!("retention: removed {deleted} chats inactive since {threshold}");
    }
    Ok(deleted)
}
