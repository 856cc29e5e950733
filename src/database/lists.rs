use super::{
    decode_tx, encode_tx, index_ids, index_key, load, load_indexed, non_blank, paginate,
    serialize_id, transaction_error, TxResult,
};
use crate::error::{Error, Result};
use crate::model::*;
use chrono::Utc;
use serde::Deserialize;
use sled::transaction::{abort, TransactionalTree};
use sled::Transactional;

pub const LISTS_PAGE_SIZE: usize = 10;

const LISTS: &[u8] = b"lists";
const LISTS_BY_USER: &[u8] = b"lists_by_user";
// owner ‖ name -> list id
const LISTS_NAME: &[u8] = b"lists_name";

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewList {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ListChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewListMovie {
    pub tmdb_id: Option<TmdbId>,
    pub movie_title: Option<String>,
    pub poster_path: Option<String>,
}

pub trait ListDb {
    fn create_list(&self, owner: Id, list: NewList) -> Result<Document<List>>;
    fn lists_for_owner(&self, owner: Id, page: usize) -> Result<Page<Document<List>>>;
    fn get_list(&self, id: Id, requester: Id) -> Result<Document<List>>;
    fn add_movie(&self, id: Id, owner: Id, movie: NewListMovie) -> Result<Document<List>>;
    fn remove_movie(&self, id: Id, owner: Id, tmdb_id: TmdbId) -> Result<Document<List>>;
    fn update_list(&self, id: Id, owner: Id, changes: ListChanges) -> Result<Document<List>>;
    fn delete_list(&self, id: Id, owner: Id) -> Result<()>;
}

fn name_key(owner: Id, name: &str) -> Vec<u8> {
    index_key(serialize_id(owner), name.as_bytes())
}

fn duplicate_name() -> Error {
    Error::Conflict("A list with this name already exists".to_owned())
}

fn owned_list(lists: &TransactionalTree, id: Id, owner: Id, action: &str) -> TxResult<List> {
    let list: List = match lists.get(serialize_id(id))? {
        Some(data) => decode_tx(&data)?,
        None => return abort(Error::not_found("List not found")),
    };
    if list.user != owner {
        return abort(Error::forbidden(format!(
            "Not authorized to {} this list",
            action
        )));
    }
    Ok(list)
}

impl ListDb for sled::Db {
    fn create_list(&self, owner: Id, list: NewList) -> Result<Document<List>> {
        let name = non_blank(list.name)
            .ok_or_else(|| Error::validation("Please provide a list name"))?
            .trim()
            .to_owned();
        let now = Utc::now();
        let doc = List {
            user: owner,
            name,
            description: list.description.unwrap_or_default().trim().to_owned(),
            movies: vec![],
            is_public: list.is_public.unwrap_or(false),
            created_at: now,
            updated_at: now,
        };

        let lists = self.open_tree(LISTS)?;
        let by_user = self.open_tree(LISTS_BY_USER)?;
        let names = self.open_tree(LISTS_NAME)?;
        let id = self.generate_id()?;
        (&lists, &by_user, &names)
            .transaction(|(lists, by_user, names)| {
                if names
                    .insert(name_key(owner, &doc.name), &serialize_id(id))?
                    .is_some()
                {
                    return abort(duplicate_name());
                }
                lists.insert(&serialize_id(id), encode_tx(&doc)?)?;
                by_user.insert(index_key(serialize_id(owner), &serialize_id(id)), Vec::<u8>::new())?;
                Ok(())
            })
            .map_err(transaction_error)?;
        Ok(Document { id, doc })
    }

    fn lists_for_owner(&self, owner: Id, page: usize) -> Result<Page<Document<List>>> {
        let lists = self.open_tree(LISTS)?;
        let by_user = self.open_tree(LISTS_BY_USER)?;
        let ids = index_ids(&by_user, &serialize_id(owner))?;
        paginate(ids, page, LISTS_PAGE_SIZE, |id| load_indexed(&lists, id))
    }

    fn get_list(&self, id: Id, requester: Id) -> Result<Document<List>> {
        let lists = self.open_tree(LISTS)?;
        let list: Document<List> =
            load(&lists, id)?.ok_or_else(|| Error::not_found("List not found"))?;
        if !list.doc.is_public && list.doc.user != requester {
            return Err(Error::forbidden("Not authorized to view this list"));
        }
        Ok(list)
    }

    fn add_movie(&self, id: Id, owner: Id, movie: NewListMovie) -> Result<Document<List>> {
        let movie = match (movie.tmdb_id, non_blank(movie.movie_title)) {
            (Some(tmdb_id), Some(movie_title)) => ListMovie {
                tmdb_id,
                movie_title,
                poster_path: movie.poster_path.unwrap_or_default(),
            },
            _ => return Err(Error::validation("Please provide tmdbId and movieTitle")),
        };
        let lists = self.open_tree(LISTS)?;
        let doc = lists
            .transaction(|lists| {
                let mut list = owned_list(lists, id, owner, "modify")?;
                if list.movies.iter().any(|m| m.tmdb_id == movie.tmdb_id) {
                    return abort(Error::Duplicate("Movie already in list".to_owned()));
                }
                list.movies.push(movie.clone());
                list.updated_at = Utc::now();
                lists.insert(&serialize_id(id), encode_tx(&list)?)?;
                Ok(list)
            })
            .map_err(transaction_error)?;
        Ok(Document { id, doc })
    }

    fn remove_movie(&self, id: Id, owner: Id, tmdb_id: TmdbId) -> Result<Document<List>> {
        let lists = self.open_tree(LISTS)?;
        let doc = lists
            .transaction(|lists| {
                let mut list = owned_list(lists, id, owner, "modify")?;
                let before = list.movies.len();
                list.movies.retain(|m| m.tmdb_id != tmdb_id);
                if list.movies.len() != before {
                    list.updated_at = Utc::now();
                    lists.insert(&serialize_id(id), encode_tx(&list)?)?;
                }
                Ok(list)
            })
            .map_err(transaction_error)?;
        Ok(Document { id, doc })
    }

    fn update_list(&self, id: Id, owner: Id, changes: ListChanges) -> Result<Document<List>> {
        let new_name = non_blank(changes.name).map(|name| name.trim().to_owned());
        let lists = self.open_tree(LISTS)?;
        let names = self.open_tree(LISTS_NAME)?;
        let doc = (&lists, &names)
            .transaction(|(lists, names)| {
                let mut list = owned_list(lists, id, owner, "modify")?;
                if let Some(name) = &new_name {
                    if *name != list.name {
                        if names.insert(name_key(owner, name), &serialize_id(id))?.is_some() {
                            return abort(duplicate_name());
                        }
                        names.remove(name_key(owner, &list.name))?;
                        list.name = name.clone();
                    }
                }
                if let Some(description) = &changes.description {
                    list.description = description.trim().to_owned();
                }
                if let Some(is_public) = changes.is_public {
                    list.is_public = is_public;
                }
                list.updated_at = Utc::now();
                lists.insert(&serialize_id(id), encode_tx(&list)?)?;
                Ok(list)
            })
            .map_err(transaction_error)?;
        Ok(Document { id, doc })
    }

    fn delete_list(&self, id: Id, owner: Id) -> Result<()> {
        let lists = self.open_tree(LISTS)?;
        let by_user = self.open_tree(LISTS_BY_USER)?;
        let names = self.open_tree(LISTS_NAME)?;
        (&lists, &by_user, &names)
            .transaction(|(lists, by_user, names)| {
                let list = owned_list(lists, id, owner, "delete")?;
                lists.remove(&serialize_id(id))?;
                by_user.remove(index_key(serialize_id(owner), &serialize_id(id)))?;
                names.remove(name_key(owner, &list.name))?;
                Ok(())
            })
            .map_err(transaction_error)
    }
}
