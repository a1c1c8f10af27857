use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;

use crate::config::Config;
use crate::errors::ApiError;

/// Best-effort fan-out to the realtime gateway. Transport failures are
/// logged and dropped, never surfaced to the caller.
#[derive(Clone)]
pub struct EventPublisher {
    client: awc::Client,
    url: String,
    api_key: String,
}

impl EventPublisher {
    pub fn new(cfg: &Config) -> Self {
        Self {
            client: awc::Client::default(),
            url: cfg.gateway_url.trim_end_matches('/').to_string(),
            api_key: cfg.gateway_api_key.clone(),
        }
    }

    pub async fn broadcast(&self, channels: &[String], data: serde_json::Value) {
        let body = serde_json::json!({
            "channels": channels,
            "data": data,
        });

        let result = self
            .client
            .post(format!("{}/broadcast", self.url))
            .insert_header(("X-API-Key", self.api_key.as_str()))
            .send_json(&body)
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => {
                log::warn!("gateway broadcast returned {}", resp.status());
            }
            Err(e) => {
                log::warn!("gateway broadcast failed: {e}");
            }
        }
    }
}

#[derive(Serialize)]
struct ConnectionClaims<'a> {
    sub: &'a str,
    exp: i64,
}

#[derive(Serialize)]
struct SubscriptionClaims<'a> {
    sub: &'a str,
    channel: &'a str,
    exp: i64,
}

pub fn connection_token(cfg: &Config, user_id: &str) -> Result<String, ApiError> {
    let claims = ConnectionClaims {
        sub: user_id,
        exp: Utc::now().timestamp() + cfg.gateway_token_ttl_secs,
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(cfg.gateway_token_secret.as_bytes()),
    )
    .map_err(|_| ApiError::Internal)
}

pub fn subscription_token(cfg: &Config, user_id: &str, channel: &str) -> Result<String, ApiError> {
    let claims = SubscriptionClaims {
        sub: user_id,
        channel,
        exp: Utc::now().timestamp() + cfg.gateway_token_ttl_secs,
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(cfg.gateway_token_secret.as_bytes()),
    )
    .map_err(|_| ApiError::Internal)
}
