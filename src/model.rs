use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Id = u64;
pub type TmdbId = i64;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    // never written
    pub watchlist: Vec<TmdbId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Id,
    pub username: String,
    pub email: String,
    pub watchlist: Vec<TmdbId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn public(&self, id: Id) -> PublicUser {
        PublicUser {
            id,
            username: self.username.clone(),
            email: self.email.clone(),
            watchlist: self.watchlist.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Author {
    pub id: Id,
    pub username: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub user: Id,
    pub tmdb_id: TmdbId,
    pub movie_title: String,
    pub poster_path: Option<String>,
    pub rating: u8,
    pub content: Option<String>,
    pub watched_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListMovie {
    pub tmdb_id: TmdbId,
    pub movie_title: String,
    pub poster_path: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub user: Id,
    pub name: String,
    pub description: String,
    pub movies: Vec<ListMovie>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistEntry {
    pub user: Id,
    pub tmdb_id: TmdbId,
    pub movie_title: String,
    pub poster_path: Option<String>,
    pub added_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Document<T> {
    pub id: Id,
    #[serde(flatten)]
    pub doc: T,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Pagination {
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub pages: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

impl<T> Page<T> {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            total: self.total,
            page: self.page,
            limit: self.limit,
            pages: (self.total + self.limit - 1) / self.limit,
        }
    }
}
