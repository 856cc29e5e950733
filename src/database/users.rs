use super::{decode, deserialize_id, encode_tx, serialize_id, transaction_error};
use crate::error::{Error, Result};
use crate::model::*;
use sled::transaction::abort;
use sled::Transactional;

pub trait UserDb {
    /// `Error::Conflict` if the email or username is taken.
    fn add_user(&self, user: &User) -> Result<Id>;
    fn get_user(&self, id: Id) -> Result<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<(Id, User)>>;
    fn get_author(&self, id: Id) -> Result<Author>;
}

const USERS: &[u8] = b"users";
const USERS_EMAIL: &[u8] = b"users_email";
const USERS_USERNAME: &[u8] = b"users_username";

impl UserDb for sled::Db {
    fn add_user(&self, user: &User) -> Result<Id> {
        let users = self.open_tree(USERS)?;
        let users_email = self.open_tree(USERS_EMAIL)?;
        let users_username = self.open_tree(USERS_USERNAME)?;
        let id = self.generate_id()?;
        (&users, &users_email, &users_username)
            .transaction(|(users, users_email, users_username)| {
                users.insert(&serialize_id(id), encode_tx(user)?)?;
                let email_taken = users_email
                    .insert(user.email.as_bytes(), &serialize_id(id))?
                    .is_some();
                let username_taken = users_username
                    .insert(user.username.as_bytes(), &serialize_id(id))?
                    .is_some();
                if email_taken || username_taken {
                    return abort(Error::Conflict(
                        "Email or username already registered".to_owned(),
                    ));
                }
                Ok(())
            })
            .map_err(transaction_error)?;
        Ok(id)
    }

    fn get_user(&self, id: Id) -> Result<Option<User>> {
        let users = self.open_tree(USERS)?;
        users
            .get(serialize_id(id))?
            .map(|d| decode(&d))
            .transpose()
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<(Id, User)>> {
        let users_email = self.open_tree(USERS_EMAIL)?;
        let users = self.open_tree(USERS)?;
        if let Some(id) = users_email.get(email)? {
            let data = users
                .get(&id)?
                .ok_or_else(|| Error::Internal("Bad index users_email".to_owned()))?;
            Ok(Some((deserialize_id(id)?, decode(&data)?)))
        } else {
            Ok(None)
        }
    }

    fn get_author(&self, id: Id) -> Result<Author> {
        let user = self
            .get_user(id)?
            .ok_or_else(|| Error::Internal(format!("Missing author {}", id)))?;
        Ok(Author {
            id,
            username: user.username,
        })
    }
}
