use super::{Db, PageQuery};
use crate::auth::Caller;
use crate::database::{NewWatchlistEntry, WatchlistDb};
use crate::error::Result;
use crate::model::TmdbId;
use actix_web::{web, HttpResponse};
use log::debug;
use serde_json::json;

async fn add(caller: Caller, db: Db, entry: web::Json<NewWatchlistEntry>) -> Result<HttpResponse> {
    let entry = db.add_to_watchlist(caller.id, entry.into_inner())?;
    debug!("User {} added movie {} to watchlist", caller.id, entry.doc.tmdb_id);
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Added to watchlist",
        "data": entry,
    })))
}

async fn list(caller: Caller, db: Db, query: web::Query<PageQuery>) -> Result<HttpResponse> {
    let page = db.watchlist(caller.id, query.page())?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "pagination": page.pagination(),
        "data": page.items,
    })))
}

async fn check(caller: Caller, db: Db, tmdb_id: web::Path<TmdbId>) -> Result<HttpResponse> {
    let in_watchlist = db.in_watchlist(caller.id, tmdb_id.into_inner())?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "inWatchlist": in_watchlist,
    })))
}

async fn remove(caller: Caller, db: Db, tmdb_id: web::Path<TmdbId>) -> Result<HttpResponse> {
    db.remove_from_watchlist(caller.id, tmdb_id.into_inner())?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Removed from watchlist",
    })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/add", web::post().to(add))
        .route("", web::get().to(list))
        .route("/check/{tmdb_id}", web::get().to(check))
        .route("/{tmdb_id}", web::delete().to(remove));
}
