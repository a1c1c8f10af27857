use crate::{auth::AuthUser, db::Db, errors::ApiError, models::render_user, store};
use actix_web::{HttpResponse, web};

pub async fn me(db: web::Data<Db>, user: AuthUser) -> Result<HttpResponse, ApiError> {
    let mut conn = db.0.acquire().await?;
    let u = store::users::get(&mut conn, &user.user_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(HttpResponse::Ok().json(render_user(Some(&u))))
}

pub async fn get_user(
    db: web::Data<Db>,
    _user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let mut conn = db.0.acquire().await?;
    let u = store::users::get(&mut conn, &id).await?.ok_or(ApiError::NotFound)?;
    Ok(HttpResponse::Ok().json(render_user(Some(&u))))
}
