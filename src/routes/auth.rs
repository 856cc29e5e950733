use super::Db;
use crate::auth::{Auth, Caller, LoginParams, RegisterParams, Session};
use crate::database::UserDb;
use crate::error::{internal, Error, Result};
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Runs a password-hashing call on the blocking pool.
async fn blocking<F>(f: F) -> Result<Session>
where
    F: FnOnce() -> Result<Session> + Send + 'static,
{
    web::block(f)
        .await
        .map_err(|err| internal(err, "Blocking pool error"))?
}

async fn register(
    params: web::Json<RegisterParams>,
    auth: web::Data<Auth>,
    db: Db,
) -> Result<HttpResponse> {
    let params = params.into_inner();
    let session = blocking(move || auth.register(&db, params)).await?;
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "User registered successfully",
        "token": session.token,
        "user": session.user,
    })))
}

async fn login(params: web::Json<LoginParams>, auth: web::Data<Auth>, db: Db) -> Result<HttpResponse> {
    let params = params.into_inner();
    let session = blocking(move || auth.login(&db, params)).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Login successful",
        "token": session.token,
        "user": session.user,
    })))
}

async fn profile(caller: Caller, db: Db) -> Result<HttpResponse> {
    let user = db
        .get_user(caller.id)?
        .ok_or_else(|| Error::not_found("User not found"))?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "user": user.public(caller.id),
    })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/register", web::post().to(register))
        .route("/login", web::post().to(login))
        .route("/profile", web::get().to(profile));
}
