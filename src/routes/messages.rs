use crate::{auth::AuthUser, config::Config, db::Db, errors::ApiError, jobs::JobQueue, services, store};
use actix_web::{HttpResponse, web};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct ChatQuery {
    pub chat: Option<String>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub chat: Option<String>,
    pub before: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct CreateMessageReq {
    pub chat: String,
    #[serde(flatten)]
    pub body: services::messages::NewMessage,
}

#[derive(Deserialize)]
pub struct EditMessageReq {
    pub text: String,
}

pub async fn list_messages(
    db: web::Data<Db>,
    user: AuthUser,
    q: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let chat_id = q
        .chat
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("chat id is required in url".into()))?;

    let limit = q.limit.unwrap_or(50).clamp(1, 200);

    // Resolve the pagination cursor (a message id) to its timestamp.
    let before = if let Some(before_id) = &q.before {
        let mut conn = db.0.acquire().await?;
        store::messages::get(&mut conn, before_id)
            .await?
            .filter(|m| m.chat_id == chat_id)
            .map(|m| m.created_at)
    } else {
        None
    };

    let msgs = services::messages::list(&db, chat_id, &user.user_id, before, limit).await?;
    Ok(HttpResponse::Ok().json(msgs))
}

pub async fn post_message(
    db: web::Data<Db>,
    cfg: web::Data<Config>,
    user: AuthUser,
    body: web::Json<CreateMessageReq>,
) -> Result<HttpResponse, ApiError> {
    let msg = services::messages::create(&db, &cfg, &body.chat, &user.user_id, &body.body).await?;
    Ok(HttpResponse::Created().json(msg))
}

pub async fn get_message(
    db: web::Data<Db>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let msg = services::messages::get(&db, &path.into_inner(), &user.user_id).await?;
    Ok(HttpResponse::Ok().json(msg))
}

pub async fn edit_message(
    db: web::Data<Db>,
    cfg: web::Data<Config>,
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<EditMessageReq>,
) -> Result<HttpResponse, ApiError> {
    let msg =
        services::messages::update(&db, &cfg, &path.into_inner(), &user.user_id, &body.text).await?;
    Ok(HttpResponse::Ok().json(msg))
}

pub async fn delete_message(
    db: web::Data<Db>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    services::messages::delete(&db, &path.into_inner(), &user.user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn read_message(
    db: web::Data<Db>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let msg = services::messages::read(&db, &path.into_inner(), &user.user_id).await?;
    Ok(HttpResponse::Ok().json(msg))
}

pub async fn read_all_messages(
    db: web::Data<Db>,
    queue: web::Data<JobQueue>,
    user: AuthUser,
    q: web::Query<ChatQuery>,
) -> Result<HttpResponse, ApiError> {
    let chat_id = q
        .chat
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("chat id is required in url".into()))?;

    services::messages::read_all(&db, &queue, chat_id, &user.user_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "detail": "job is running" })))
}
