//! Server-side sessions.
//!
//! The browser only ever holds an opaque random token. The store keys rows by
//! `sha256(secret ":" token)`, so a leaked session database cannot be replayed
//! as cookies. Every session (anonymous ones included) carries the CSRF token
//! that forms rendered for it must echo back.

use async_trait::async_trait;
use chrono::Utc;
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::sqlite::SqlitePool;

use crate::models::{Id, User};
use crate::repo::{open_pool, RepoResult};

pub const SESSION_COOKIE: &str = "sid";
pub const SESSION_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Session {
    pub id: String, // digest of the cookie token, never the token itself
    pub user_id: Option<Id>,
    pub username: Option<String>,
    pub csrf_token: String,
    pub expires_at: i64, // unix seconds
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }
}

/// 256 random bits, hex encoded.
pub fn random_token() -> String {
    let mut buf = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Issues a new session; returns the cookie token alongside the record.
    async fn create(&self, user: Option<&User>) -> RepoResult<(String, Session)>;
    /// Unknown and expired tokens both yield `None`.
    async fn load(&self, token: &str) -> RepoResult<Option<Session>>;
    /// Replaces the CSRF token of a session and returns the new one.
    async fn rotate_csrf(&self, session_id: &str) -> RepoResult<String>;
    async fn destroy(&self, token: &str) -> RepoResult<()>;
}

#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
    secret: String,
}

impl SqliteSessionStore {
    pub async fn connect(url: &str, secret: impl Into<String>) -> Result<Self, sqlx::Error> {
        let store = Self { pool: open_pool(url).await?, secret: secret.into() };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn in_memory(secret: impl Into<String>) -> Result<Self, sqlx::Error> {
        Self::connect("sqlite::memory:", secret).await
    }

    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id INTEGER,
                username TEXT,
                csrf_token TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn digest(&self, token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b":");
        hasher.update(token.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create(&self, user: Option<&User>) -> RepoResult<(String, Session)> {
        let now = Utc::now().timestamp();
        // expired rows are only ever swept here; there is no background reaper
        sqlx::query("DELETE FROM sessions WHERE expires_at <= ?").bind(now).execute(&self.pool).await?;

        let token = random_token();
        let session = Session {
            id: self.digest(&token),
            user_id: user.map(|u| u.id),
            username: user.map(|u| u.username.clone()),
            csrf_token: random_token(),
            expires_at: now + SESSION_TTL_SECS,
        };
        sqlx::query("INSERT INTO sessions (id, user_id, username, csrf_token, expires_at) VALUES (?, ?, ?, ?, ?)")
            .bind(&session.id)
            .bind(session.user_id)
            .bind(&session.username)
            .bind(&session.csrf_token)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await?;
        Ok((token, session))
    }

    async fn load(&self, token: &str) -> RepoResult<Option<Session>> {
        let session = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ? AND expires_at > ?")
            .bind(self.digest(token))
            .bind(Utc::now().timestamp())
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    async fn rotate_csrf(&self, session_id: &str) -> RepoResult<String> {
        let csrf = random_token();
        sqlx::query("UPDATE sessions SET csrf_token = ? WHERE id = ?")
            .bind(&csrf)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(csrf)
    }

    async fn destroy(&self, token: &str) -> RepoResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?").bind(self.digest(token)).execute(&self.pool).await?;
        Ok(())
    }
}

/// Compares a submitted CSRF token with the session's without short-circuiting.
pub fn csrf_matches(session: &Session, submitted: &str) -> bool {
    let expected = session.csrf_token.as_bytes();
    let given = submitted.as_bytes();
    if expected.len() != given.len() {
        return false;
    }
    expected.iter().zip(given).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}
