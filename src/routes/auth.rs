use crate::{auth, config::Config, db::Db, errors::ApiError, models::{render_user, User}, store};
use actix_web::{HttpRequest, HttpResponse, web};
use chrono::Utc;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct RegisterReq {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginReq {
    pub username: String,
    pub password: String,
}

pub async fn register(
    db: web::Data<Db>,
    cfg: web::Data<Config>,
    req: HttpRequest,
    body: web::Json<RegisterReq>,
) -> Result<HttpResponse, ApiError> {
    let username = body.username.trim();
    if username.is_empty() || body.password.len() < 8 {
        return Err(ApiError::BadRequest(
            "username required, password must be at least 8 characters".into(),
        ));
    }
    if body.first_name.trim().is_empty() || body.last_name.trim().is_empty() {
        return Err(ApiError::BadRequest("first and last name are required".into()));
    }

    let mut tx = db.0.begin().await?;

    if store::users::get_by_username(&mut tx, username).await?.is_some() {
        return Err(ApiError::Conflict("username is taken".into()));
    }

    let ip = req
        .connection_info()
        .realip_remote_addr()
        .map(|s| s.to_string());

    if cfg.production {
        if let Some(ip) = &ip {
            let accounts = store::users::accounts_on_ip(&mut tx, ip).await?;
            if accounts >= cfg.limits.max_accounts_per_ip {
                return Err(ApiError::BadRequest(format!(
                    "no more than {} accounts per address",
                    cfg.limits.max_accounts_per_ip
                )));
            }
        }
    }

    let now = Utc::now();
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        username: username.to_string(),
        first_name: body.first_name.trim().to_string(),
        last_name: body.last_name.trim().to_string(),
        bio: body.bio.clone(),
        avatar: None,
        is_online: true,
        last_online_at: now,
        created_at: now,
    };

    let hash = auth::hash_password(&body.password)?;
    store::users::insert(&mut tx, &user, &hash).await?;
    if let Some(ip) = &ip {
        store::users::record_ip(&mut tx, &user.id, ip).await?;
    }
    tx.commit().await?;

    let token = auth::create_access_token(&user.id, &cfg)?;
    Ok(HttpResponse::Created().json(serde_json::json!({
        "token": token,
        "user": render_user(Some(&user)),
    })))
}

pub async fn login(
    db: web::Data<Db>,
    cfg: web::Data<Config>,
    body: web::Json<LoginReq>,
) -> Result<HttpResponse, ApiError> {
    let mut conn = db.0.acquire().await?;

    let (user_id, hash) = store::users::credentials(&mut conn, body.username.trim())
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if !auth::verify_password(&hash, &body.password) {
        return Err(ApiError::Unauthorized);
    }

    store::users::touch_online(&mut conn, &user_id, Utc::now()).await?;

    let token = auth::create_access_token(&user_id, &cfg)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "token": token })))
}
