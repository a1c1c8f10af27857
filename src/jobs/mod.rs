//! Durable job queue in the `jobs` table plus a periodic scheduler.
//! Execution is at-least-once: a row is only removed after its body
//! returns, so job bodies must stay safe to re-run.

pub mod presence;
pub mod quota;
pub mod retention;
pub mod throttle;

use std::rc::Rc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqliteConnection};

use crate::config::Config;
use crate::db::Db;
use crate::publisher::EventPublisher;
use crate::services;
use crate::store;

const MAX_ATTEMPTS: i64 = 3;
const RETRY_BACKOFF_SECS: i64 = 60;
const POLL_INTERVAL: StdDuration = StdDuration::from_secs(1);
const SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(3600);
const OFFLINE_INTERVAL: StdDuration = StdDuration::from_secs(300);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Job {
    /// `message` is the payload snapshot taken at enqueue time; recipients
    /// are resolved when the job runs.
    Publish {
        event: String,
        message: serde_json::Value,
        chat_id: String,
    },
    EnforceUserQuota {
        user_id: String,
        chat_id: String,
    },
    ReadChatMessages {
        user_id: String,
        chat_id: String,
    },
    SweepOldMessages,
    SweepOldChats,
    SetUsersOffline,
}

impl Job {
    pub fn kind(&self) -> &'static str {
        match self {
            Job::Publish { .. } => "publish",
            Job::EnforceUserQuota { .. } => "enforce_user_quota",
            Job::ReadChatMessages { .. } => "read_chat_messages",
            Job::SweepOldMessages => "sweep_old_messages",
            Job::SweepOldChats => "sweep_old_chats",
            Job::SetUsersOffline => "set_users_offline",
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub id: String,
    pub kind: String,
    pub args: String,
    pub attempts: i64,
    pub run_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct JobQueue {
    pool: sqlx::SqlitePool,
}

impl JobQueue {
    pub fn new(db: &Db) -> Self {
        Self { pool: db.0.clone() }
    }

    pub async fn enqueue(&self, job: &Job) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        Self::enqueue_on(&mut conn, job).await
    }

    /// Enqueue inside the caller's transaction: the job row commits or
    /// rolls back together with the writes that warrant it.
    pub async fn enqueue_on(conn: &mut SqliteConnection, job: &Job) -> Result<(), sqlx::Error> {
        let args = serde_json::to_string(job).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO jobs(id, kind, args, run_at, attempts, created_at) VALUES (?, ?, ?, ?, 0, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(job.kind())
        .bind(args)
        .bind(now)
        .bind(now)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn due(&self, now: DateTime<Utc>) -> Result<Vec<QueuedJob>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, kind, args, attempts, run_at FROM jobs WHERE run_at <= ? ORDER BY run_at ASC LIMIT 20",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| QueuedJob {
                id: r.get("id"),
                kind: r.get("kind"),
                args: r.get("args"),
                attempts: r.get("attempts"),
                run_at: r.get("run_at"),
            })
            .collect())
    }

    pub async fn pending_count(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM jobs")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    async fn remove(&self, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reschedule(&self, id: &str, attempts: i64, run_at: DateTime<Utc>) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE jobs SET attempts = ?, run_at = ? WHERE id = ?")
            .bind(attempts)
            .bind(run_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// Lives on the actix arbiter because the publisher's client is not `Send`.
pub struct JobContext {
    pub db: Db,
    pub cfg: Config,
    pub queue: JobQueue,
    pub publisher: EventPublisher,
}

pub fn start(ctx: Rc<JobContext>) {
    let worker_ctx = ctx.clone();
    actix_web::rt::spawn(async move {
        let mut tick = actix_web::rt::time::interval(POLL_INTERVAL);
        loop {
            tick.tick().await;
            if let Err(e) = drain_due(&worker_ctx).await {
                log::error!("job queue poll failed: {e}");
            }
        }
    });

    schedule(ctx.clone(), Job::SetUsersOffline, OFFLINE_INTERVAL);
    schedule(ctx.clone(), Job::SweepOldMessages, SWEEP_INTERVAL);
    schedule(ctx, Job::SweepOldChats, SWEEP_INTERVAL);
}

fn schedule(ctx: Rc<JobContext>, job: Job, every: StdDuration) {
    actix_web::rt::spawn(async move {
        let mut tick = actix_web::rt::time::interval(every);
        tick.tick().await; // the first tick fires immediately
        loop {
            tick.tick().await;
            if let Err(e) = ctx.queue.enqueue(&job).await {
                log::warn!("failed to schedule {}: {e}", job.kind());
            }
        }
    });
}

/// Runs every due job once. Success removes the row; failure backs the job
/// off, and after `MAX_ATTEMPTS` the job is dropped with an error log.
pub async fn drain_due(ctx: &JobContext) -> Result<(), sqlx::Error> {
    let due = ctx.queue.due(Utc::now()).await?;

    for queued in due {
        let job: Job = match serde_json::from_str(&queued.args) {
            Ok(job) => job,
            Err(e) => {
                log::error!("dropping undecodable job {} ({}): {e}", queued.id, queued.kind);
                ctx.queue.remove(&queued.id).await?;
                continue;
            }
        };

        match run_job(ctx, &job).await {
            Ok(()) => ctx.queue.remove(&queued.id).await?,
            Err(e) => {
                let attempts = queued.attempts + 1;
                if attempts >= MAX_ATTEMPTS {
                    log::error!("job {} ({}) failed {attempts} times, giving up: {e}", queued.id, queued.kind);
                    ctx.queue.remove(&queued.id).await?;
                } else {
                    log::warn!("job {} ({}) failed (attempt {attempts}): {e}", queued.id, queued.kind);
                    ctx.queue
                        .reschedule(&queued.id, attempts, Utc::now() + Duration::seconds(RETRY_BACKOFF_SECS))
                        .await?;
                }
            }
        }
    }
    Ok(())
}

pub async fn run_job(ctx: &JobContext, job: &Job) -> anyhow::Result<()> {
    match job {
        Job::Publish { event, message, chat_id } => {
            let mut conn = ctx.db.0.acquire().await?;
            let members = store::chats::member_ids(&mut conn, chat_id).await?;
            drop(conn);
            if members.is_empty() {
                return Ok(());
            }
            let data = serde_json::json!({
                "event": event,
                "message": message,
            });
            ctx.publisher.broadcast(&members, data).await;
        }
        Job::EnforceUserQuota { user_id, chat_id } => {
            let key = format!("enforce_user_quota:{user_id}:{chat_id}");
            let mut conn = ctx.db.0.acquire().await?;
            let ready = throttle::ready(
                &mut conn,
                &key,
                Duration::minutes(ctx.cfg.limits.quota_throttle_mins),
            )
            .await?;
            drop(conn);
            if !ready {
                return Ok(());
            }
            quota::enforce_user_quota(&ctx.db, &ctx.cfg, user_id, chat_id).await?;
            // Stamped only after success, so a failed run does not burn
            // the window for the worker's retries.
            let mut conn = ctx.db.0.acquire().await?;
            throttle::stamp(
                &mut conn,
                &key,
                Duration::minutes(ctx.cfg.limits.quota_throttle_ttl_mins),
            )
            .await?;
        }
        Job::ReadChatMessages { user_id, chat_id } => {
            if let Some((payload, members)) =
                services::messages::read_chat_messages(&ctx.db, chat_id, user_id).await?
            {
                let data = serde_json::json!({
                    "event": "read_all",
                    "message": payload,
                });
                ctx.publisher.broadcast(&members, data).await;
            }
        }
        Job::SweepOldMessages => {
            retention::sweep_old_messages(&ctx.db, &ctx.cfg).await?;
        }
        Job::SweepOldChats => {
            retention::sweep_old_chats(&ctx.db, &ctx.cfg).await?;
        }
        Job::SetUsersOffline => {
            presence::set_users_offline(&ctx.db, &ctx.cfg).await?;
        }
    }
    Ok(())
}
