use super::{Authors, Db, PageQuery};
use crate::auth::Caller;
use crate::database::{ListChanges, ListDb, NewList, NewListMovie};
use crate::error::Result;
use crate::model::*;
use actix_web::{web, HttpResponse};
use log::info;
use serde::Serialize;
use serde_json::json;

#[derive(Serialize, Debug)]
struct ListView {
    #[serde(flatten)]
    list: Document<List>,
    author: Author,
}

async fn create(caller: Caller, db: Db, list: web::Json<NewList>) -> Result<HttpResponse> {
    let list = db.create_list(caller.id, list.into_inner())?;
    info!("User {} created list {}", caller.id, list.id);
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "List created successfully",
        "list": list,
    })))
}

async fn mine(caller: Caller, db: Db, query: web::Query<PageQuery>) -> Result<HttpResponse> {
    let page = db.lists_for_owner(caller.id, query.page())?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "pagination": page.pagination(),
        "data": page.items,
    })))
}

async fn get(caller: Caller, db: Db, id: web::Path<Id>) -> Result<HttpResponse> {
    let list = db.get_list(id.into_inner(), caller.id)?;
    let author = Authors::new(&db).get(list.doc.user)?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "list": ListView { list, author },
    })))
}

async fn add_movie(
    caller: Caller,
    db: Db,
    id: web::Path<Id>,
    movie: web::Json<NewListMovie>,
) -> Result<HttpResponse> {
    let list = db.add_movie(id.into_inner(), caller.id, movie.into_inner())?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Movie added to list",
        "list": list,
    })))
}

async fn remove_movie(
    caller: Caller,
    db: Db,
    path: web::Path<(Id, TmdbId)>,
) -> Result<HttpResponse> {
    let (id, tmdb_id) = path.into_inner();
    let list = db.remove_movie(id, caller.id, tmdb_id)?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Movie removed from list",
        "list": list,
    })))
}

async fn update(
    caller: Caller,
    db: Db,
    id: web::Path<Id>,
    changes: web::Json<ListChanges>,
) -> Result<HttpResponse> {
    let list = db.update_list(id.into_inner(), caller.id, changes.into_inner())?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "List updated successfully",
        "list": list,
    })))
}

async fn delete(caller: Caller, db: Db, id: web::Path<Id>) -> Result<HttpResponse> {
    let id = id.into_inner();
    db.delete_list(id, caller.id)?;
    info!("User {} deleted list {}", caller.id, id);
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "List deleted successfully",
    })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::post().to(create))
        .route("", web::get().to(mine))
        .route("/{id}", web::get().to(get))
        .route("/{id}/movies", web::post().to(add_movie))
        .route("/{id}/movies/{tmdb_id}", web::delete().to(remove_movie))
        .route("/{id}", web::patch().to(update))
        .route("/{id}", web::delete().to(delete));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::tests::{send, with_token, Fixture};
    use actix_web::{http::StatusCode, test::TestRequest};

    fn fight_club(uri: &str, token: &str) -> TestRequest {
        with_token(TestRequest::post().uri(uri), token)
            .set_json(json!({"tmdbId": 550, "movieTitle": "Fight Club"}))
    }

    #[actix_rt::test]
    async fn duplicate_movie_scenario() {
        let fixture = Fixture::new();
        let (_, alice) = fixture.user("alice");
        let app = test_app!(fixture);

        let (status, created) = send(
            &app,
            with_token(TestRequest::post().uri("/api/lists"), &alice)
                .set_json(json!({"name": "Favorites"}))
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["list"]["isPublic"], false);
        let movies = format!("/api/lists/{}/movies", created["list"]["id"]);

        let (status, body) = send(&app, fight_club(&movies, &alice).to_request()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["list"]["movies"][0]["tmdbId"], 550);

        let (status, body) = send(&app, fight_club(&movies, &alice).to_request()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Movie already in list");

        let (_, body) = send(
            &app,
            with_token(
                TestRequest::get().uri(&format!("/api/lists/{}", created["list"]["id"])),
                &alice,
            )
            .to_request(),
        )
        .await;
        assert_eq!(body["list"]["movies"].as_array().unwrap().len(), 1);
        assert_eq!(body["list"]["author"]["username"], "alice");

        let (status, body) = send(
            &app,
            with_token(
                TestRequest::delete().uri(&format!("{}/13", movies)),
                &alice,
            )
            .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["list"]["movies"].as_array().unwrap().len(), 1);
    }

    #[actix_rt::test]
    async fn private_lists_stay_private() {
        let fixture = Fixture::new();
        let (_, alice) = fixture.user("alice");
        let (_, bob) = fixture.user("bob");
        let app = test_app!(fixture);

        let (_, private) = send(
            &app,
            with_token(TestRequest::post().uri("/api/lists"), &alice)
                .set_json(json!({"name": "Guilty pleasures"}))
                .to_request(),
        )
        .await;
        let (_, public) = send(
            &app,
            with_token(TestRequest::post().uri("/api/lists"), &alice)
                .set_json(json!({"name": "Classics", "isPublic": true}))
                .to_request(),
        )
        .await;
        let private_uri = format!("/api/lists/{}", private["list"]["id"]);
        let public_uri = format!("/api/lists/{}", public["list"]["id"]);

        let (status, _) = send(
            &app,
            with_token(TestRequest::get().uri(&private_uri), &bob).to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) = send(
            &app,
            with_token(TestRequest::get().uri(&public_uri), &bob).to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["list"]["name"], "Classics");

        let (status, _) = send(
            &app,
            with_token(TestRequest::patch().uri(&public_uri), &bob)
                .set_json(json!({"name": "Mine now"}))
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(
            &app,
            with_token(TestRequest::delete().uri(&public_uri), &bob).to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(
            &app,
            fight_club(&format!("{}/movies", public_uri), &bob).to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app,
            with_token(TestRequest::patch().uri(&private_uri), &alice)
                .set_json(json!({"isPublic": true}))
                .to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["list"]["isPublic"], true);
        assert_eq!(body["list"]["name"], "Guilty pleasures");

        let (status, _) = send(
            &app,
            with_token(TestRequest::delete().uri(&private_uri), &alice).to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(
            &app,
            with_token(TestRequest::get().uri(&private_uri), &alice).to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn own_lists_are_paginated() {
        let fixture = Fixture::new();
        let (_, alice) = fixture.user("alice");
        let app = test_app!(fixture);
        for i in 0..12 {
            send(
                &app,
                with_token(TestRequest::post().uri("/api/lists"), &alice)
                    .set_json(json!({ "name": format!("List {}", i) }))
                    .to_request(),
            )
            .await;
        }
        let (status, body) = send(
            &app,
            with_token(TestRequest::get().uri("/api/lists?page=2"), &alice).to_request(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert_eq!(
            body["pagination"],
            json!({"total": 12, "page": 2, "limit": 10, "pages": 2})
        );
    }

    #[actix_rt::test]
    async fn duplicate_name_conflicts() {
        let fixture = Fixture::new();
        let (_, alice) = fixture.user("alice");
        let app = test_app!(fixture);
        let create = || {
            with_token(TestRequest::post().uri("/api/lists"), &alice)
                .set_json(json!({"name": "Watchlist"}))
                .to_request()
        };
        let (status, _) = send(&app, create()).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = send(&app, create()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["statusCode"], 409);
    }
}
