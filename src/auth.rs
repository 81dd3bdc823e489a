//! Accounts and sessions
//!
//! Passwords and session secrets are stored as argon2 hashes. A session
//! token has the form `mss_<session-id>.<secret>`: the id locates the row,
//! the secret is verified against its hash.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::config::AuthConfig;
use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::models::{Session, User};

const SESSION_TOKEN_PREFIX: &str = "mss_";
const INVALID_CREDENTIALS: &str = "Invalid login credentials";

/// Sign-up, sign-in and session lookup over the database
pub struct Identity<'a> {
    db: &'a Database,
    config: &'a AuthConfig,
}

impl<'a> Identity<'a> {
    pub fn new(db: &'a Database, config: &'a AuthConfig) -> Self {
        Self { db, config }
    }

    /// Register a new account and sign it in
    pub fn sign_up(&self, email: &str, password: &str) -> StoreResult<Session> {
        if !self.config.allow_signup {
            return Err(StoreError::auth("Signups not allowed for this instance"));
        }

        let email = normalize_email(email)?;
        if password.chars().count() < self.config.min_password_length {
            return Err(StoreError::auth(format!(
                "Password should be at least {} characters",
                self.config.min_password_length
            )));
        }

        let password_hash = hash_secret(password)?;
        let user = self.db.create_user(&email, &password_hash)?;
        tracing::info!(user_id = %user.id, "User signed up");

        self.start_session(user)
    }

    pub fn sign_in(&self, email: &str, password: &str) -> StoreResult<Session> {
        let email = normalize_email(email)?;
        let Some((user, password_hash)) = self.db.user_credentials(&email)? else {
            return Err(StoreError::auth(INVALID_CREDENTIALS));
        };

        if !verify_secret(password, &password_hash) {
            tracing::debug!(user_id = %user.id, "Rejected sign-in with wrong password");
            return Err(StoreError::auth(INVALID_CREDENTIALS));
        }

        tracing::info!(user_id = %user.id, "User signed in");
        self.start_session(user)
    }

    /// End the session behind `token`. Unknown tokens are ignored.
    pub fn sign_out(&self, token: &str) -> StoreResult<()> {
        if let Some((session_id, _)) = parse_session_token(token) {
            self.db.delete_session(session_id)?;
        }
        Ok(())
    }

    /// Resolve a bearer token to its user
    pub fn current_user(&self, token: &str) -> StoreResult<Option<User>> {
        let Some((session_id, secret)) = parse_session_token(token) else {
            return Ok(None);
        };

        match self.db.session(session_id)? {
            Some((user, token_hash)) if verify_secret(secret, &token_hash) => Ok(Some(user)),
            _ => Ok(None),
        }
    }

    fn start_session(&self, user: User) -> StoreResult<Session> {
        let session_id = uuid::Uuid::new_v4().simple().to_string();
        let secret = generate_secret();
        let token_hash = hash_secret(&secret)?;

        self.db.create_session(&session_id, &user.id, &token_hash)?;

        Ok(Session {
            token: format!("{SESSION_TOKEN_PREFIX}{session_id}.{secret}"),
            user,
        })
    }
}

fn normalize_email(email: &str) -> StoreResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(StoreError::auth("Unable to validate email address: invalid format")),
    }
}

fn parse_session_token(token: &str) -> Option<(&str, &str)> {
    let (session_id, secret) = token.strip_prefix(SESSION_TOKEN_PREFIX)?.split_once('.')?;
    if session_id.is_empty() || secret.is_empty() {
        return None;
    }
    Some((session_id, secret))
}

/// 32 random URL-safe characters
fn generate_secret() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

    bytes
        .iter()
        .map(|b| ALPHABET[(*b as usize) % ALPHABET.len()] as char)
        .collect()
}

/// Opaque random token such as `shr_Xk2...`
pub fn generate_token(prefix: &str) -> String {
    format!("{}_{}", prefix, generate_secret())
}

/// Hash a secret using argon2
pub fn hash_secret(secret: &str) -> StoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(secret.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

fn verify_secret(secret: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(secret.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}
