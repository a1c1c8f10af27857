use crate::{auth::AuthUser, config::Config, errors::ApiError, publisher};
use actix_web::{HttpResponse, web};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct SubscriptionReq {
    pub channel: String,
}

pub async fn connection_token(
    cfg: web::Data<Config>,
    user: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let token = publisher::connection_token(&cfg, &user.user_id)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "token": token })))
}

// Events are fanned out per-user, so the only legal channel is your own.
pub async fn subscription_token(
    cfg: web::Data<Config>,
    user: AuthUser,
    body: web::Json<SubscriptionReq>,
) -> Result<HttpResponse, ApiError> {
    if body.channel != user.user_id {
        return Err(ApiError::Forbidden);
    }
    let token = publisher::subscription_token(&cfg, &user.user_id, &body.channel)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "token": token })))
}
