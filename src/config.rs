use log::warn;
use std::io;
use std::str::FromStr;

const DEFAULT_JWT_SECRET: &str = "secret";
const DEFAULT_BCRYPT_COST: u32 = 10;

/// Server settings read from the environment (and `.env`, if present).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub jwt_secret: String,
    pub bcrypt_cost: u32,
    /// Browser origin allowed to call the API; any origin when unset.
    pub cors_origin: Option<String>,
}

fn parse<T: FromStr>(name: &str, value: Option<String>, default: T) -> io::Result<T> {
    match value {
        Some(value) => value.trim().parse().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not valid: {:?}", name, value),
            )
        }),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> io::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(var: F) -> io::Result<Self> {
        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set, using the insecure default");
            DEFAULT_JWT_SECRET.to_owned()
        });
        Ok(Config {
            host: var("HOST").unwrap_or_else(|| "127.0.0.1".to_owned()),
            port: parse("PORT", var("PORT"), 3000)?,
            database_path: var("DATABASE_PATH").unwrap_or_else(|| "cinelog.db".to_owned()),
            jwt_secret,
            bcrypt_cost: parse("BCRYPT_COST", var("BCRYPT_COST"), DEFAULT_BCRYPT_COST)?,
            cors_origin: var("CORS_ORIGIN").filter(|origin| !origin.trim().is_empty()),
        })
    }
}
