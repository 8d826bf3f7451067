use std::path::Path;
use std::sync::Arc;

use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use minijinja::{context, Value};

use crate::config::Config;
use crate::error::AppError;
use crate::rate_limit::{LoginRateLimiter, RateLimitConfig};
use crate::render::Renderer;
use crate::repo::{Repo, SqliteRepo};
use crate::session::{csrf_matches, Session, SessionStore, SqliteSessionStore};
use crate::upload::{FileStore, FsFileStore};

pub mod admin;
pub mod api;
pub mod auth;
pub mod public;

/// Urlencoded form bodies.
pub const FORM_LIMIT: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub sessions: Arc<dyn SessionStore>,
    pub files: Arc<dyn FileStore>,
    pub renderer: Arc<Renderer>,
    pub limiter: LoginRateLimiter,
    pub secure_cookies: bool,
}

impl AppState {
    /// Opens both databases and creates any missing tables.
    pub async fn connect(cfg: &Config) -> Result<Self, sqlx::Error> {
        let repo = SqliteRepo::connect(&cfg.database_url).await?;
        repo.migrate().await?;
        let sessions = SqliteSessionStore::connect(&cfg.sessions_url, cfg.session_secret.clone()).await?;
        Ok(Self {
            repo: Arc::new(repo),
            sessions: Arc::new(sessions),
            files: Arc::new(FsFileStore::new(&cfg.upload_dir)),
            renderer: Arc::new(Renderer::new(cfg.production)),
            limiter: LoginRateLimiter::new(RateLimitConfig::from_env()),
            secure_cookies: cfg.production,
        })
    }

    /// Throwaway in-memory stores with uploads under `upload_dir`.
    pub async fn in_memory(upload_dir: &Path) -> Result<Self, sqlx::Error> {
        Ok(Self {
            repo: Arc::new(SqliteRepo::in_memory().await?),
            sessions: Arc::new(SqliteSessionStore::in_memory("test-session-secret").await?),
            files: Arc::new(FsFileStore::new(upload_dir)),
            renderer: Arc::new(Renderer::new(true)),
            limiter: LoginRateLimiter::new(RateLimitConfig::default()),
            secure_cookies: false,
        })
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::FormConfig::default().limit(FORM_LIMIT))
        .route("/", web::get().to(public::home))
        .route("/blog", web::get().to(public::blog_list))
        .route("/blog/{slug}", web::get().to(public::blog_post))
        .route("/code", web::get().to(public::code_list))
        .route("/code/{slug}", web::get().to(public::code_detail))
        .route("/about", web::get().to(public::about))
        .route("/uploads/{name}", web::get().to(public::uploaded_file))
        .route("/css/{path:.*}", web::get().to(public::css))
        .route("/js/{path:.*}", web::get().to(public::js))
        .service(
            web::resource("/login")
                .route(web::get().to(auth::login_page))
                .route(web::post().to(auth::login_submit)),
        )
        .route("/logout", web::get().to(auth::logout))
        .route("/notes", web::get().to(admin::notes_page))
        .service(
            web::scope("/admin")
                .route("", web::get().to(admin::dashboard))
                // "new" must win over the {id} matchers
                .route("/blog/new", web::get().to(admin::new_post))
                .route("/blog/{id}", web::get().to(admin::edit_post))
                .route("/blog", web::post().to(admin::save_post))
                .route("/blog/{id}/delete", web::post().to(admin::delete_post))
                .route("/code/new", web::get().to(admin::new_snippet))
                .route("/code/{id}", web::get().to(admin::edit_snippet))
                .route("/code", web::post().to(admin::save_snippet))
                .route("/code/{id}/delete", web::post().to(admin::delete_snippet))
                .route("/notes/new", web::get().to(admin::new_note))
                .route("/notes/{id}", web::get().to(admin::edit_note))
                .route("/notes", web::post().to(admin::save_note))
                .route("/notes/{id}/delete", web::post().to(admin::delete_note))
                .route("/comment", web::post().to(admin::add_comment)),
        )
        .service(
            web::scope("/api")
                .route("/search", web::get().to(api::search))
                .route("/openapi.json", web::get().to(api::openapi_json)),
        );
}

/// Renders a full page. Every template sees `is_authenticated` and `current_path`.
pub(crate) fn page(
    state: &AppState,
    req: &HttpRequest,
    authenticated: bool,
    template: &str,
    ctx: Value,
) -> Result<HttpResponse, AppError> {
    let ctx = context! { is_authenticated => authenticated, current_path => req.path(), ..ctx };
    let html = state.renderer.render(template, ctx)?;
    Ok(HttpResponse::Ok().content_type(mime::TEXT_HTML_UTF_8).body(html))
}

pub(crate) fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found().insert_header((header::LOCATION, location)).finish()
}

pub(crate) fn require_csrf(session: &Session, submitted: &str) -> Result<(), AppError> {
    if csrf_matches(session, submitted) { Ok(()) } else { Err(AppError::CsrfMismatch) }
}
