use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use futures_util::future::LocalBoxFuture;
use once_cell::sync::Lazy;
use tracing::warn;

use crate::error::AppError;
use crate::models::NewUser;
use crate::repo::{Repo, RepoError};
use crate::routes::AppState;
use crate::session::{Session, SessionStore, SESSION_COOKIE, SESSION_TTL_SECS};

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "ChangeMe123!";
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@example.com";
pub const MIN_PASSWORD_LENGTH: usize = 12;

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    /// Unknown user and wrong password are deliberately the same error.
    #[error("invalid credentials")] InvalidCredentials,
    #[error("password hashing failed: {0}")] Hash(String),
    #[error("blocking pool unavailable")] Blocking,
    #[error(transparent)] Repo(#[from] RepoError),
}

/// Argon2id with a random salt, PHC string output.
pub fn hash_password(plain: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// A malformed stored hash never verifies.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(plain.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!("Password must be at least {MIN_PASSWORD_LENGTH} characters long"));
    }
    Ok(())
}

// verified against for unknown usernames so both failure paths cost the same
static DUMMY_HASH: Lazy<String> =
    Lazy::new(|| hash_password("not-a-real-password").unwrap_or_default());

/// Checks credentials and opens an authenticated session.
pub async fn login(
    repo: &dyn Repo,
    sessions: &dyn SessionStore,
    username: &str,
    password: &str,
) -> Result<(String, Session), AuthError> {
    let user = repo.find_user_by_username(username).await?;
    let stored = user.as_ref().map(|u| u.password_hash.clone());
    let password = password.to_owned();
    // argon2 is CPU bound; keep it off the request workers
    let verified = web::block(move || match stored {
        Some(hash) => verify_password(&password, &hash),
        None => {
            let _ = verify_password(&password, &DUMMY_HASH);
            false
        }
    })
    .await
    .map_err(|_| AuthError::Blocking)?;
    match user {
        Some(user) if verified => Ok(sessions.create(Some(&user)).await?),
        _ => Err(AuthError::InvalidCredentials),
    }
}

pub async fn logout(sessions: &dyn SessionStore, token: &str) -> Result<(), AuthError> {
    Ok(sessions.destroy(token).await?)
}

/// Seeds the placeholder admin account on an empty user table.
/// Returns whether a user was created.
pub async fn ensure_default_admin(repo: &dyn Repo) -> Result<bool, AuthError> {
    if repo.count_users().await? > 0 {
        return Ok(false);
    }
    repo.create_user(NewUser {
        username: DEFAULT_ADMIN_USERNAME.into(),
        password_hash: hash_password(DEFAULT_ADMIN_PASSWORD)?,
        email: Some(DEFAULT_ADMIN_EMAIL.into()),
    })
    .await?;
    warn!(
        username = DEFAULT_ADMIN_USERNAME,
        "default user created with password {DEFAULT_ADMIN_PASSWORD}; change it now with `set-password`"
    );
    Ok(true)
}

pub fn session_cookie(token: &str, secure: bool) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token.to_owned())
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(SESSION_TTL_SECS))
        .finish()
}

pub fn expired_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, "")
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::ZERO)
        .finish()
}

/// Whoever is making the request: the cookie token and its live session, if any.
pub struct Visitor {
    pub token: Option<String>,
    pub session: Option<Session>,
}

impl Visitor {
    pub fn is_authenticated(&self) -> bool {
        self.session.as_ref().map(Session::is_authenticated).unwrap_or(false)
    }
}

impl FromRequest for Visitor {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, AppError>>;

    fn from_request(req: &HttpRequest, _pl: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = req.cookie(SESSION_COOKIE).map(|c| c.value().to_owned());
        Box::pin(async move {
            let state = state.ok_or(AppError::Internal)?;
            let session = match token.as_deref() {
                Some(t) if !t.is_empty() => state.sessions.load(t).await?,
                _ => None,
            };
            Ok(Visitor { token, session })
        })
    }
}

/// Route guard: resolves only for a logged-in session, otherwise the request
/// is redirected to the login page.
pub struct AdminSession(pub Session);

impl FromRequest for AdminSession {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, AppError>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        let visitor = Visitor::from_request(req, pl);
        Box::pin(async move {
            match visitor.await?.session {
                Some(session) if session.is_authenticated() => Ok(AdminSession(session)),
                _ => Err(AppError::Unauthenticated),
            }
        })
    }
}
