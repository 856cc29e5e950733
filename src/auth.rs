//! Accounts and stateless sessions.
//!
//! A session is an HS256 JWT carrying the user id and email that expires
//! seven days after it was issued. Nothing is stored server side, so logging
//! out is the client forgetting its token.

use crate::database::UserDb;
use crate::error::{Error, Result};
use crate::model::*;
use actix_web::{dev::Payload, http::header::AUTHORIZATION, web, FromRequest, HttpRequest};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};

const TOKEN_TTL_DAYS: i64 = 7;
const MIN_USERNAME_CHARS: usize = 3;
const MIN_PASSWORD_CHARS: usize = 6;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    id: Id,
    email: String,
    iat: i64,
    exp: i64,
}

/// Identity of the user making a request, taken from a verified token.
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    pub id: Id,
    pub email: String,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RegisterParams {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct LoginParams {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct Session {
    pub token: String,
    pub user: PublicUser,
}

pub struct Auth {
    secret: String,
    bcrypt_cost: u32,
}

fn invalid_credentials() -> Error {
    Error::Auth("Invalid credentials".to_owned())
}

fn not_authorized() -> Error {
    Error::Auth("Not authorized to access this route".to_owned())
}

/// Loose `local@domain.tld` check.
fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
                && domain
                    .rsplit_once('.')
                    .map_or(false, |(host, tld)| !host.is_empty() && tld.len() >= 2)
        }
        None => false,
    }
}

impl Auth {
    pub fn new(secret: impl Into<String>, bcrypt_cost: u32) -> Self {
        Auth {
            secret: secret.into(),
            bcrypt_cost,
        }
    }

    pub fn issue_token(&self, id: Id, email: &str) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            id,
            email: email.to_owned(),
            iat: now.timestamp(),
            exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        };
        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?)
    }

    pub fn verify_token(&self, token: &str) -> Result<Caller> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|err| {
            debug!("Rejected token: {}", err);
            not_authorized()
        })?;
        Ok(Caller {
            id: data.claims.id,
            email: data.claims.email,
        })
    }

    /// Creates an account and opens a session for it.
    pub fn register(&self, db: &sled::Db, params: RegisterParams) -> Result<Session> {
        let username = params.username.as_deref().map(str::trim).unwrap_or("");
        let email = params
            .email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .unwrap_or_default();
        let password = params.password.unwrap_or_default();
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(Error::validation(
                "Please provide username, email, and password",
            ));
        }
        if params.confirm_password.as_deref() != Some(password.as_str()) {
            return Err(Error::validation("Passwords do not match"));
        }
        if username.chars().count() < MIN_USERNAME_CHARS {
            return Err(Error::validation(
                "Username must be at least 3 characters",
            ));
        }
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(Error::validation(
                "Password must be at least 6 characters",
            ));
        }
        if !is_valid_email(&email) {
            return Err(Error::validation("Please provide a valid email"));
        }

        let now = Utc::now();
        let user = User {
            username: username.to_owned(),
            email,
            password_hash: bcrypt::hash(&password, self.bcrypt_cost)?,
            watchlist: vec![],
            created_at: now,
            updated_at: now,
        };
        let id = db.add_user(&user)?;
        info!("Registered user {} ({})", user.username, id);
        Ok(Session {
            token: self.issue_token(id, &user.email)?,
            user: user.public(id),
        })
    }

    /// Opens a session. Unknown emails and wrong passwords fail alike.
    pub fn login(&self, db: &sled::Db, params: LoginParams) -> Result<Session> {
        let (email, password) = match (params.email, params.password) {
            (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
                (email.trim().to_lowercase(), password)
            }
            _ => return Err(Error::validation("Please provide email and password")),
        };
        let (id, user) = db
            .get_user_by_email(&email)?
            .ok_or_else(invalid_credentials)?;
        if !bcrypt::verify(&password, &user.password_hash)? {
            debug!("Wrong password for user {}", id);
            return Err(invalid_credentials());
        }
        info!("User {} logged in", id);
        Ok(Session {
            token: self.issue_token(id, &user.email)?,
            user: user.public(id),
        })
    }
}

fn authenticate(req: &HttpRequest) -> Result<Caller> {
    let auth = req
        .app_data::<web::Data<Auth>>()
        .ok_or_else(|| Error::Internal("Auth is not configured".to_owned()))?;
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(not_authorized)?;
    auth.verify_token(token)
}

/// Handlers taking a `Caller` argument only run for requests bearing a valid
/// session token; everything else is answered with 401.
impl FromRequest for Caller {
    type Error = Error;
    type Future = Ready<Result<Self>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::temporary;
    use actix_web::test::TestRequest;

    fn auth() -> Auth {
        Auth::new("test-secret", 4)
    }

    fn alice() -> RegisterParams {
        RegisterParams {
            username: Some("alice".to_owned()),
            email: Some("A@X.com".to_owned()),
            password: Some("secret1".to_owned()),
            confirm_password: Some("secret1".to_owned()),
        }
    }

    fn login(email: &str, password: &str) -> LoginParams {
        LoginParams {
            email: Some(email.to_owned()),
            password: Some(password.to_owned()),
        }
    }

    #[test]
    fn token_round_trip() {
        let auth = auth();
        let token = auth.issue_token(7, "a@x.com").unwrap();
        let caller = auth.verify_token(&token).unwrap();
        assert_eq!(
            caller,
            Caller {
                id: 7,
                email: "a@x.com".to_owned()
            }
        );
    }

    #[test]
    fn bad_tokens() {
        let auth = auth();
        let token = auth.issue_token(7, "a@x.com").unwrap();
        assert!(matches!(
            Auth::new("other-secret", 4).verify_token(&token),
            Err(Error::Auth(_))
        ));
        assert!(matches!(
            auth.verify_token("invalid.token.here"),
            Err(Error::Auth(_))
        ));

        let past = Utc::now() - Duration::days(8);
        let expired = encode(
            &Header::default(),
            &Claims {
                id: 7,
                email: "a@x.com".to_owned(),
                iat: past.timestamp(),
                exp: (past + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
            },
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert!(matches!(auth.verify_token(&expired), Err(Error::Auth(_))));
    }

    #[test]
    fn register_then_login() {
        let db = temporary();
        let auth = auth();
        let session = auth.register(&db, alice()).unwrap();
        assert_eq!(session.user.email, "a@x.com");
        assert_eq!(auth.verify_token(&session.token).unwrap().id, session.user.id);

        let again = auth.login(&db, login("a@x.com", "secret1")).unwrap();
        assert_eq!(again.user.id, session.user.id);
        assert!(auth.login(&db, login(" A@x.COM", "secret1")).is_ok());
    }

    #[test]
    fn login_does_not_reveal_accounts() {
        let db = temporary();
        let auth = auth();
        auth.register(&db, alice()).unwrap();
        let wrong_password = auth.login(&db, login("a@x.com", "wrong")).unwrap_err();
        let unknown = auth.login(&db, login("b@x.com", "secret1")).unwrap_err();
        assert!(matches!(wrong_password, Error::Auth(_)));
        assert_eq!(wrong_password.to_string(), unknown.to_string());
        assert!(matches!(
            auth.login(&db, LoginParams::default()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn register_validation() {
        let db = temporary();
        let auth = auth();
        let mut mismatch = alice();
        mismatch.confirm_password = Some("secret2".to_owned());
        let mut short_password = alice();
        short_password.password = Some("abc".to_owned());
        short_password.confirm_password = Some("abc".to_owned());
        let mut bad_email = alice();
        bad_email.email = Some("alice-at-x".to_owned());
        let mut short_name = alice();
        short_name.username = Some("al".to_owned());

        for params in vec![
            RegisterParams::default(),
            mismatch,
            short_password,
            bad_email,
            short_name,
        ] {
            assert!(matches!(
                auth.register(&db, params),
                Err(Error::Validation(_))
            ));
        }
    }

    #[test]
    fn register_conflicts() {
        let db = temporary();
        let auth = auth();
        auth.register(&db, alice()).unwrap();
        let mut same_name = alice();
        same_name.email = Some("other@x.com".to_owned());
        assert!(matches!(
            auth.register(&db, same_name),
            Err(Error::Conflict(_))
        ));
        let mut same_email = alice();
        same_email.username = Some("alice2".to_owned());
        assert!(matches!(
            auth.register(&db, same_email),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@mail.example.org"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email("a@@x.com"));
    }

    #[test]
    fn caller_from_header() {
        let auth = web::Data::new(auth());
        let token = auth.issue_token(3, "c@x.com").unwrap();

        let req = TestRequest::default()
            .app_data(auth.clone())
            .insert_header((AUTHORIZATION, format!("Bearer {}", token)))
            .to_http_request();
        assert_eq!(authenticate(&req).unwrap().id, 3);

        let missing = TestRequest::default()
            .app_data(auth.clone())
            .to_http_request();
        assert!(matches!(authenticate(&missing), Err(Error::Auth(_))));

        let garbage = TestRequest::default()
            .app_data(auth.clone())
            .insert_header((AUTHORIZATION, "Bearer nope"))
            .to_http_request();
        assert!(matches!(authenticate(&garbage), Err(Error::Auth(_))));

        for header in &[format!("Bearer{}", token), format!("Token {}", token), token.clone()] {
            let req = TestRequest::default()
                .app_data(auth.clone())
                .insert_header((AUTHORIZATION, header.as_str()))
                .to_http_request();
            assert!(matches!(authenticate(&req), Err(Error::Auth(_))));
        }
    }
}
