use crate::{auth::AuthUser, config::Config, db::Db, errors::ApiError, services};
use actix_web::{HttpResponse, web};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct CreateQuery {
    pub fallback: Option<String>,
}

pub async fn list_chats(db: web::Data<Db>, user: AuthUser) -> Result<HttpResponse, ApiError> {
    let chats = services::chats::list(&db, &user.user_id).await?;
    Ok(HttpResponse::Ok().json(chats))
}

pub async fn create_chat(
    db: web::Data<Db>,
    cfg: web::Data<Config>,
    user: AuthUser,
    q: web::Query<CreateQuery>,
    body: web::Json<services::chats::NewChat>,
) -> Result<HttpResponse, ApiError> {
    let fallback = q.fallback.as_deref() == Some("on");
    let chat = services::chats::create(&db, &cfg, &user.user_id, &body, fallback).await?;
    Ok(HttpResponse::Created().json(chat))
}

pub async fn get_chat(
    db: web::Data<Db>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let chat = services::chats::get(&db, &path.into_inner(), &user.user_id).await?;
    Ok(HttpResponse::Ok().json(chat))
}

pub async fn patch_chat(
    db: web::Data<Db>,
    cfg: web::Data<Config>,
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<services::chats::ChatPatch>,
) -> Result<HttpResponse, ApiError> {
    let chat = services::chats::patch(&db, &cfg, &path.into_inner(), &user.user_id, &body).await?;
    Ok(HttpResponse::Ok().json(chat))
}

pub async fn delete_chat(
    db: web::Data<Db>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    services::chats::delete(&db, &path.into_inner(), &user.user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn leave_chat(
    db: web::Data<Db>,
    cfg: web::Data<Config>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    services::chats::leave(&db, &cfg, &path.into_inner(), &user.user_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "detail": "you left the chat" })))
}
