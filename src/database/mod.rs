//! Collections are sled trees keyed by big-endian id. Index trees are keyed
//! `owner ‖ id`, so reverse prefix scans come out newest first.

mod lists;
mod reviews;
mod users;
mod watchlist;

pub use lists::{ListChanges, ListDb, NewList, NewListMovie};
pub use reviews::{NewReview, ReviewChanges, ReviewDb, FEED_DEFAULT_LIMIT};
pub use users::UserDb;
pub use watchlist::{NewWatchlistEntry, WatchlistDb};

use crate::error::{Error, Result};
use crate::model::{Document, Id, Page};
use serde::{de::DeserializeOwned, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::convert::TryInto;

type TxResult<T> = std::result::Result<T, ConflictableTransactionError<Error>>;

fn serialize_id(id: Id) -> [u8; 8] {
    id.to_be_bytes()
}

fn deserialize_id<V: AsRef<[u8]>>(id: V) -> Result<Id> {
    let bytes: [u8; 8] = id
        .as_ref()
        .try_into()
        .map_err(|_| Error::Internal("Bad document id".to_owned()))?;
    Ok(u64::from_be_bytes(bytes))
}

fn index_key<P: AsRef<[u8]>>(prefix: P, suffix: &[u8]) -> Vec<u8> {
    let mut key = prefix.as_ref().to_vec();
    key.extend_from_slice(suffix);
    key
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

fn encode_tx<T: Serialize>(value: &T) -> TxResult<Vec<u8>> {
    encode(value).map_err(ConflictableTransactionError::Abort)
}

fn decode_tx<T: DeserializeOwned>(bytes: &[u8]) -> TxResult<T> {
    decode(bytes).map_err(ConflictableTransactionError::Abort)
}

fn transaction_error(err: TransactionError<Error>) -> Error {
    match err {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => Error::Storage(err),
    }
}

fn load<T: DeserializeOwned>(tree: &sled::Tree, id: Id) -> Result<Option<Document<T>>> {
    tree.get(serialize_id(id))?
        .map(|bytes| decode(&bytes).map(|doc| Document { id, doc }))
        .transpose()
}

fn load_indexed<T: DeserializeOwned>(tree: &sled::Tree, id: Id) -> Result<Document<T>> {
    load(tree, id)?.ok_or_else(|| Error::Internal(format!("Bad index entry {}", id)))
}

/// Ids under `prefix`, newest first.
fn index_ids(index: &sled::Tree, prefix: &[u8]) -> Result<Vec<Id>> {
    index
        .scan_prefix(prefix)
        .rev()
        .map(|entry| -> Result<Id> {
            let (key, _) = entry?;
            deserialize_id(&key[prefix.len()..])
        })
        .collect()
}

fn paginate<K, T, F>(keys: Vec<K>, page: usize, limit: usize, fetch: F) -> Result<Page<T>>
where
    F: FnMut(K) -> Result<T>,
{
    let page = page.max(1);
    let total = keys.len();
    let items = keys
        .into_iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .map(fetch)
        .collect::<Result<Vec<_>>>()?;
    Ok(Page {
        items,
        total,
        page,
        limit,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
pub(crate) fn temporary() -> sled::Db {
    sled::Config::new().temporary(true).open().unwrap()
}
