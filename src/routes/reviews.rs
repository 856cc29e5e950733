use super::{Authors, Db, PageQuery};
use crate::auth::Caller;
use crate::database::{NewReview, ReviewChanges, ReviewDb, FEED_DEFAULT_LIMIT};
use crate::error::Result;
use crate::model::*;
use actix_web::{web, HttpResponse};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Serialize, Debug)]
struct ReviewView {
    #[serde(flatten)]
    review: Document<Review>,
    author: Author,
}

#[derive(Deserialize, Debug)]
struct FeedQuery {
    limit: Option<String>,
}

impl FeedQuery {
    fn limit(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|l| l.trim().parse::<usize>().ok())
            .filter(|l| *l >= 1)
            .unwrap_or(FEED_DEFAULT_LIMIT)
    }
}

fn with_authors(db: &sled::Db, reviews: Vec<Document<Review>>) -> Result<Vec<ReviewView>> {
    let mut authors = Authors::new(db);
    reviews
        .into_iter()
        .map(|review| -> Result<ReviewView> {
            Ok(ReviewView {
                author: authors.get(review.doc.user)?,
                review,
            })
        })
        .collect()
}

fn with_author(db: &sled::Db, review: Document<Review>) -> Result<ReviewView> {
    Ok(ReviewView {
        author: Authors::new(db).get(review.doc.user)?,
        review,
    })
}

async fn create(caller: Caller, db: Db, review: web::Json<NewReview>) -> Result<HttpResponse> {
    let review = db.create_review(caller.id, review.into_inner())?;
    info!("User {} reviewed movie {}", caller.id, review.doc.tmdb_id);
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Review created successfully",
        "review": with_author(&db, review)?,
    })))
}

async fn own(caller: Caller, db: Db, query: web::Query<PageQuery>) -> Result<HttpResponse> {
    by_owner(&db, caller.id, query.page())
}

async fn by_user(db: Db, user: web::Path<Id>, query: web::Query<PageQuery>) -> Result<HttpResponse> {
    by_owner(&db, user.into_inner(), query.page())
}

fn by_owner(db: &sled::Db, user: Id, page: usize) -> Result<HttpResponse> {
    let page = db.reviews_by_user(user, page)?;
    let pagination = page.pagination();
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": with_authors(db, page.items)?,
        "pagination": pagination,
    })))
}

async fn feed(db: Db, query: web::Query<FeedQuery>) -> Result<HttpResponse> {
    let reviews = db.review_feed(query.limit())?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "reviews": with_authors(&db, reviews)?,
    })))
}

async fn by_movie(db: Db, tmdb_id: web::Path<TmdbId>) -> Result<HttpResponse> {
    let reviews = db.reviews_by_movie(tmdb_id.into_inner())?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "reviews": with_authors(&db, reviews)?,
    })))
}

async fn get(db: Db, id: web::Path<Id>) -> Result<HttpResponse> {
    let review = db.get_review(id.into_inner())?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "review": with_author(&db, review)?,
    })))
}

async fn update(
    caller: Caller,
    db: Db,
    id: web::Path<Id>,
    changes: web::Json<ReviewChanges>,
) -> Result<HttpResponse> {
    let review = db.update_review(id.into_inner(), caller.id, changes.into_inner())?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Review updated successfully",
        "review": with_author(&db, review)?,
    })))
}

async fn delete(caller: Caller, db: Db, id: web::Path<Id>) -> Result<HttpResponse> {
    let id = id.into_inner();
    db.delete_review(id, caller.id)?;
    info!("User {} deleted review {}", caller.id, id);
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Review deleted successfully",
    })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::post().to(create))
        .route("", web::get().to(own))
        .route("/feed", web::get().to(feed))
        .route("/movie/{id}", web::get().to(by_movie))
        .route("/user/{id}", web::get().to(by_user))
        .route("/{id}", web::get().to(get))
        .route("/{id}", web::patch().to(update))
        .route("/{id}", web::delete().to(delete));
}
