use chrono::{Duration, Utc};

use crate::config::Config;
use crate::db::Db;
use crate::store;

/// Flips users offline once they have been quiet longer than the timeout.
pub async fn set_users_offline(db: &Db, cfg: &Config) -> Result<u64, sqlx::Error> {
    let mut conn = db.0.acquire().await?;
    let threshold = Utc::now() - Duration::seconds(cfg.limits.presence_timeout_secs);
    let flipped = store::users::set_stale_offline(&mut conn, threshold).await?;

    if flipped > 0 {
        log::debug!("presence: {flipped} users went offline");
    }
    Ok(flipped)
}
