/// Test service over a `tests::Fixture`.
#[cfg(test)]
macro_rules! test_app {
    ($fixture:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($fixture.db.clone()))
                .app_data($fixture.auth.clone())
                .wrap(crate::routes::cors(None))
                .configure(crate::routes::configure),
        )
        .await
    };
}

mod auth;
mod lists;
mod reviews;
mod watchlist;

use crate::database::UserDb;
use crate::error::{Error, Result};
use crate::model::{Author, Id};
use actix_cors::Cors;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

type Db = web::Data<sled::Db>;

/// `?page=`; anything missing, unparsable or below one means the first page.
#[derive(Deserialize, Debug, Default)]
struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    fn page(&self) -> usize {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<usize>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1)
    }
}

/// Resolves owner ids to authors, looking each user up once.
struct Authors<'a> {
    db: &'a sled::Db,
    cache: HashMap<Id, Author>,
}

impl<'a> Authors<'a> {
    fn new(db: &'a sled::Db) -> Self {
        Authors {
            db,
            cache: HashMap::new(),
        }
    }

    fn get(&mut self, id: Id) -> Result<Author> {
        if let Some(author) = self.cache.get(&id) {
            return Ok(author.clone());
        }
        let author = self.db.get_author(id)?;
        self.cache.insert(id, author.clone());
        Ok(author)
    }
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "Server is running",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn not_found(req: HttpRequest) -> HttpResponse {
    HttpResponse::NotFound().json(json!({
        "success": false,
        "message": "Route not found",
        "path": req.path(),
    }))
}

/// Any origin unless `origin` pins one down.
pub fn cors(origin: Option<&str>) -> Cors {
    match origin {
        Some(origin) => Cors::default()
            .allowed_origin(origin)
            .allow_any_method()
            .allow_any_header()
            .max_age(3600),
        None => Cors::permissive(),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| Error::validation(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| Error::validation(format!("Invalid id: {}", err)).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| Error::validation(err.to_string()).into()),
    )
    .route("/api/health", web::get().to(health))
    .service(web::scope("/api/auth").configure(auth::configure))
    .service(web::scope("/api/reviews").configure(reviews::configure))
    .service(web::scope("/api/lists").configure(lists::configure))
    .service(web::scope("/api/watchlist").configure(watchlist::configure))
    .default_service(web::to(not_found));
}
