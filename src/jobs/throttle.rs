use chrono::{DateTime, Duration, Utc};
use sqlx::{Row, SqliteConnection};

/// True when the key has not been stamped within `interval` (expired
/// entries count as never run). Read-only, so a failed guarded body
/// leaves the window open for the retry.
pub async fn ready(
    conn: &mut SqliteConnection,
    key: &str,
    interval: Duration,
) -> Result<bool, sqlx::Error> {
    let now = Utc::now();

    let row = sqlx::query("SELECT last_run_at, expires_at FROM throttle WHERE key = ?")
        .bind(key)
        .fetch_optional(conn)
        .await?;

    if let Some(r) = row {
        let last_run_at: DateTime<Utc> = r.get("last_run_at");
        let expires_at: DateTime<Utc> = r.get("expires_at");
        if expires_at > now && now - last_run_at < interval {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Stamps the key once the guarded work succeeded. Soft gate, not a lock:
/// two near-simultaneous callers can both pass `ready`, so guarded work
/// must stay safe to run twice.
pub async fn stamp(
    conn: &mut SqliteConnection,
    key: &str,
    ttl: Duration,
) -> Result<(), sqlx::Error> {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO throttle(key, last_run_at, expires_at) VALUES (?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET
            last_run_at = excluded.last_run_at,
            expires_at = excluded.expires_at",
    )
    .bind(key)
    .bind(now)
    .bind(now + ttl)
    .execute(conn)
    .await?;
    Ok(())
}
