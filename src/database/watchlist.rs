use super::{
    deserialize_id, encode_tx, index_key, load_indexed, non_blank, paginate, serialize_id,
    transaction_error,
};
use crate::error::{Error, Result};
use crate::model::*;
use chrono::Utc;
use serde::Deserialize;
use sled::transaction::abort;
use sled::Transactional;

pub const WATCHLIST_PAGE_SIZE: usize = 20;

const WATCHLIST: &[u8] = b"watchlist";
// owner ‖ tmdb id -> entry id
const WATCHLIST_INDEX: &[u8] = b"watchlist_index";

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewWatchlistEntry {
    pub tmdb_id: Option<TmdbId>,
    pub movie_title: Option<String>,
    pub poster_path: Option<String>,
}

pub trait WatchlistDb {
    fn add_to_watchlist(
        &self,
        owner: Id,
        entry: NewWatchlistEntry,
    ) -> Result<Document<WatchlistEntry>>;
    fn watchlist(&self, owner: Id, page: usize) -> Result<Page<Document<WatchlistEntry>>>;
    fn remove_from_watchlist(&self, owner: Id, tmdb_id: TmdbId) -> Result<()>;
    fn in_watchlist(&self, owner: Id, tmdb_id: TmdbId) -> Result<bool>;
}

fn entry_key(owner: Id, tmdb_id: TmdbId) -> Vec<u8> {
    index_key(serialize_id(owner), &tmdb_id.to_be_bytes())
}

impl WatchlistDb for sled::Db {
    fn add_to_watchlist(
        &self,
        owner: Id,
        entry: NewWatchlistEntry,
    ) -> Result<Document<WatchlistEntry>> {
        let doc = match (entry.tmdb_id, non_blank(entry.movie_title)) {
            (Some(tmdb_id), Some(movie_title)) => WatchlistEntry {
                user: owner,
                tmdb_id,
                movie_title,
                poster_path: entry.poster_path,
                added_at: Utc::now(),
            },
            _ => return Err(Error::validation("Missing required fields")),
        };
        let watchlist = self.open_tree(WATCHLIST)?;
        let index = self.open_tree(WATCHLIST_INDEX)?;
        let id = self.generate_id()?;
        (&watchlist, &index)
            .transaction(|(watchlist, index)| {
                if index
                    .insert(entry_key(owner, doc.tmdb_id), &serialize_id(id))?
                    .is_some()
                {
                    return abort(Error::Duplicate("Movie already in watchlist".to_owned()));
                }
                watchlist.insert(&serialize_id(id), encode_tx(&doc)?)?;
                Ok(())
            })
            .map_err(transaction_error)?;
        Ok(Document { id, doc })
    }

    fn watchlist(&self, owner: Id, page: usize) -> Result<Page<Document<WatchlistEntry>>> {
        let watchlist = self.open_tree(WATCHLIST)?;
        let index = self.open_tree(WATCHLIST_INDEX)?;
        let mut entries = index
            .scan_prefix(serialize_id(owner))
            .map(|entry| -> Result<Document<WatchlistEntry>> {
                let (_, id) = entry?;
                load_indexed(&watchlist, deserialize_id(id)?)
            })
            .collect::<Result<Vec<_>>>()?;
        entries.sort_by(|a, b| {
            b.doc
                .added_at
                .cmp(&a.doc.added_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        paginate(entries, page, WATCHLIST_PAGE_SIZE, Ok)
    }

    fn remove_from_watchlist(&self, owner: Id, tmdb_id: TmdbId) -> Result<()> {
        let watchlist = self.open_tree(WATCHLIST)?;
        let index = self.open_tree(WATCHLIST_INDEX)?;
        (&watchlist, &index)
            .transaction(|(watchlist, index)| {
                let id = match index.remove(entry_key(owner, tmdb_id))? {
                    Some(id) => id,
                    None => return abort(Error::not_found("Not found in watchlist")),
                };
                watchlist.remove(id)?;
                Ok(())
            })
            .map_err(transaction_error)
    }

    fn in_watchlist(&self, owner: Id, tmdb_id: TmdbId) -> Result<bool> {
        let index = self.open_tree(WATCHLIST_INDEX)?;
        Ok(index.contains_key(entry_key(owner, tmdb_id))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::temporary;

    fn movie(tmdb_id: TmdbId) -> NewWatchlistEntry {
        NewWatchlistEntry {
            tmdb_id: Some(tmdb_id),
            movie_title: Some(format!("Movie {}", tmdb_id)),
            poster_path: Some("/poster.jpg".to_owned()),
        }
    }

    #[test]
    fn add_twice_is_duplicate() {
        let db = temporary();
        assert!(!db.in_watchlist(1, 550).unwrap());
        db.add_to_watchlist(1, movie(550)).unwrap();
        assert!(db.in_watchlist(1, 550).unwrap());
        assert!(!db.in_watchlist(2, 550).unwrap());
        assert!(matches!(
            db.add_to_watchlist(1, movie(550)),
            Err(Error::Duplicate(_))
        ));
        assert_eq!(db.watchlist(1, 1).unwrap().total, 1);
        db.add_to_watchlist(2, movie(550)).unwrap();
    }

    #[test]
    fn requires_id_and_title() {
        let db = temporary();
        let mut untitled = movie(550);
        untitled.movie_title = None;
        assert!(matches!(
            db.add_to_watchlist(1, untitled),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            db.add_to_watchlist(1, NewWatchlistEntry::default()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn remove() {
        let db = temporary();
        db.add_to_watchlist(1, movie(550)).unwrap();
        assert!(matches!(
            db.remove_from_watchlist(2, 550),
            Err(Error::NotFound(_))
        ));
        db.remove_from_watchlist(1, 550).unwrap();
        assert!(!db.in_watchlist(1, 550).unwrap());
        assert!(matches!(
            db.remove_from_watchlist(1, 550),
            Err(Error::NotFound(_))
        ));
        db.add_to_watchlist(1, movie(550)).unwrap();
    }

    #[test]
    fn pages_of_twenty_newest_first() {
        let db = temporary();
        for tmdb_id in 1..=25 {
            db.add_to_watchlist(1, movie(tmdb_id)).unwrap();
        }
        let first = db.watchlist(1, 1).unwrap();
        assert_eq!(first.items.len(), 20);
        assert_eq!(first.items[0].doc.tmdb_id, 25);
        assert_eq!(first.pagination().pages, 2);
        let second = db.watchlist(1, 2).unwrap();
        assert_eq!(second.items.len(), 5);
        assert_eq!(second.items[4].doc.tmdb_id, 1);
    }
}
