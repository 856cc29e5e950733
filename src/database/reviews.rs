use super::{
    decode, decode_tx, deserialize_id, encode_tx, index_ids, index_key, load, load_indexed,
    non_blank, paginate, serialize_id, transaction_error,
};
use crate::error::{Error, Result};
use crate::model::*;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer};
use sled::transaction::{abort, ConflictableTransactionError};
use sled::Transactional;

pub const REVIEWS_PAGE_SIZE: usize = 10;
pub const FEED_DEFAULT_LIMIT: usize = 20;
pub const FEED_MAX_LIMIT: usize = 50;
const MAX_CONTENT_CHARS: usize = 5000;

const REVIEWS: &[u8] = b"reviews";
const REVIEWS_BY_USER: &[u8] = b"reviews_by_user";
const REVIEWS_BY_MOVIE: &[u8] = b"reviews_by_movie";

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub tmdb_id: Option<TmdbId>,
    pub movie_title: Option<String>,
    pub poster_path: Option<String>,
    pub rating: Option<i64>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "watched_date")]
    pub watched_date: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ReviewChanges {
    pub rating: Option<i64>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "watched_date")]
    pub watched_date: Option<DateTime<Utc>>,
}

/// RFC 3339 date-times, or plain `YYYY-MM-DD` dates taken as midnight UTC.
fn watched_date<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Option::<String>::deserialize(deserializer)? {
        Some(value) => value,
        None => return Ok(None),
    };
    if let Ok(date_time) = DateTime::parse_from_rfc3339(&value) {
        return Ok(Some(date_time.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(&value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| Some(Utc.from_utc_datetime(&midnight)))
        .ok_or_else(|| de::Error::custom(format!("watchedDate is not a valid date: {:?}", value)))
}

pub trait ReviewDb {
    fn create_review(&self, owner: Id, review: NewReview) -> Result<Document<Review>>;
    fn get_review(&self, id: Id) -> Result<Document<Review>>;
    fn reviews_by_movie(&self, tmdb_id: TmdbId) -> Result<Vec<Document<Review>>>;
    fn reviews_by_user(&self, user: Id, page: usize) -> Result<Page<Document<Review>>>;
    /// The newest reviews of all users, at most `FEED_MAX_LIMIT`.
    fn review_feed(&self, limit: usize) -> Result<Vec<Document<Review>>>;
    fn update_review(&self, id: Id, owner: Id, changes: ReviewChanges)
        -> Result<Document<Review>>;
    fn delete_review(&self, id: Id, owner: Id) -> Result<()>;
}

fn check_rating(rating: i64) -> Result<u8> {
    if (1..=5).contains(&rating) {
        Ok(rating as u8)
    } else {
        Err(Error::validation("Rating must be between 1 and 5"))
    }
}

fn check_content(content: &Option<String>) -> Result<()> {
    match content {
        Some(content) if content.chars().count() > MAX_CONTENT_CHARS => Err(Error::validation(
            "Review content cannot exceed 5000 characters",
        )),
        _ => Ok(()),
    }
}

fn movie_key(tmdb_id: TmdbId, id: Id) -> Vec<u8> {
    index_key(tmdb_id.to_be_bytes(), &serialize_id(id))
}

fn user_key(user: Id, id: Id) -> Vec<u8> {
    index_key(serialize_id(user), &serialize_id(id))
}

impl ReviewDb for sled::Db {
    fn create_review(&self, owner: Id, review: NewReview) -> Result<Document<Review>> {
        let (tmdb_id, movie_title, rating) =
            match (review.tmdb_id, non_blank(review.movie_title), review.rating) {
                (Some(tmdb_id), Some(movie_title), Some(rating)) => (tmdb_id, movie_title, rating),
                _ => {
                    return Err(Error::validation(
                        "Please provide tmdbId, movieTitle, and rating",
                    ))
                }
            };
        let rating = check_rating(rating)?;
        check_content(&review.content)?;

        let now = Utc::now();
        let doc = Review {
            user: owner,
            tmdb_id,
            movie_title,
            poster_path: review.poster_path,
            rating,
            content: review.content,
            watched_date: review.watched_date.unwrap_or(now),
            created_at: now,
            updated_at: now,
        };

        let reviews = self.open_tree(REVIEWS)?;
        let by_user = self.open_tree(REVIEWS_BY_USER)?;
        let by_movie = self.open_tree(REVIEWS_BY_MOVIE)?;
        let id = self.generate_id()?;
        (&reviews, &by_user, &by_movie)
            .transaction(|(reviews, by_user, by_movie)| {
                reviews.insert(&serialize_id(id), encode_tx(&doc)?)?;
                by_user.insert(user_key(owner, id), Vec::<u8>::new())?;
                by_movie.insert(movie_key(tmdb_id, id), Vec::<u8>::new())?;
                Ok(())
            })
            .map_err(transaction_error)?;
        Ok(Document { id, doc })
    }

    fn get_review(&self, id: Id) -> Result<Document<Review>> {
        let reviews = self.open_tree(REVIEWS)?;
        load(&reviews, id)?.ok_or_else(|| Error::not_found("Review not found"))
    }

    fn reviews_by_movie(&self, tmdb_id: TmdbId) -> Result<Vec<Document<Review>>> {
        let reviews = self.open_tree(REVIEWS)?;
        let by_movie = self.open_tree(REVIEWS_BY_MOVIE)?;
        index_ids(&by_movie, &tmdb_id.to_be_bytes())?
            .into_iter()
            .map(|id| load_indexed(&reviews, id))
            .collect()
    }

    fn reviews_by_user(&self, user: Id, page: usize) -> Result<Page<Document<Review>>> {
        let reviews = self.open_tree(REVIEWS)?;
        let by_user = self.open_tree(REVIEWS_BY_USER)?;
        let ids = index_ids(&by_user, &serialize_id(user))?;
        paginate(ids, page, REVIEWS_PAGE_SIZE, |id| load_indexed(&reviews, id))
    }

    fn review_feed(&self, limit: usize) -> Result<Vec<Document<Review>>> {
        let reviews = self.open_tree(REVIEWS)?;
        reviews
            .iter()
            .rev()
            .take(limit.min(FEED_MAX_LIMIT))
            .map(|entry| -> Result<Document<Review>> {
                let (key, value) = entry?;
                Ok(Document {
                    id: deserialize_id(&key)?,
                    doc: decode(&value)?,
                })
            })
            .collect()
    }

    fn update_review(
        &self,
        id: Id,
        owner: Id,
        changes: ReviewChanges,
    ) -> Result<Document<Review>> {
        let reviews = self.open_tree(REVIEWS)?;
        let doc = reviews
            .transaction(|reviews| {
                let mut review: Review = match reviews.get(serialize_id(id))? {
                    Some(data) => decode_tx(&data)?,
                    None => return abort(Error::not_found("Review not found")),
                };
                if review.user != owner {
                    return abort(Error::forbidden("Not authorized to update this review"));
                }
                if let Some(rating) = changes.rating {
                    review.rating = check_rating(rating).map_err(ConflictableTransactionError::Abort)?;
                }
                if changes.content.is_some() {
                    check_content(&changes.content).map_err(ConflictableTransactionError::Abort)?;
                    review.content = changes.content.clone();
                }
                if let Some(watched_date) = changes.watched_date {
                    review.watched_date = watched_date;
                }
                review.updated_at = Utc::now();
                reviews.insert(&serialize_id(id), encode_tx(&review)?)?;
                Ok(review)
            })
            .map_err(transaction_error)?;
        Ok(Document { id, doc })
    }

    fn delete_review(&self, id: Id, owner: Id) -> Result<()> {
        let reviews = self.open_tree(REVIEWS)?;
        let by_user = self.open_tree(REVIEWS_BY_USER)?;
        let by_movie = self.open_tree(REVIEWS_BY_MOVIE)?;
        (&reviews, &by_user, &by_movie)
            .transaction(|(reviews, by_user, by_movie)| {
                let review: Review = match reviews.get(serialize_id(id))? {
                    Some(data) => decode_tx(&data)?,
                    None => return abort(Error::not_found("Review not found")),
                };
                if review.user != owner {
                    return abort(Error::forbidden("Not authorized to delete this review"));
                }
                reviews.remove(&serialize_id(id))?;
                by_user.remove(user_key(owner, id))?;
                by_movie.remove(movie_key(review.tmdb_id, id))?;
                Ok(())
            })
            .map_err(transaction_error)
    }
}
