use actix_web::{web, HttpRequest, HttpResponse};
use minijinja::context;
use tracing::{info, warn};

use super::{page, redirect, require_csrf, AppState};
use crate::auth::{self as authn, expired_session_cookie, session_cookie, AuthError, Visitor};
use crate::error::AppError;
use crate::forms::LoginForm;

const LOGIN_ERROR: &str = "Identifiants incorrects";

fn client_ip(req: &HttpRequest) -> String {
    req.peer_addr().map(|addr| addr.ip().to_string()).unwrap_or_else(|| "unknown".into())
}

/// Shows the login form, opening an anonymous session to hold its CSRF token.
pub async fn login_page(req: HttpRequest, visitor: Visitor, data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    if visitor.is_authenticated() {
        return Ok(redirect("/admin"));
    }
    let (new_token, session) = match visitor.session {
        Some(session) => (None, session),
        None => {
            let (token, session) = data.sessions.create(None).await?;
            (Some(token), session)
        }
    };
    let mut resp = page(&data, &req, false, "login.html", context! { csrf_token => session.csrf_token })?;
    if let Some(token) = new_token {
        resp.add_cookie(&session_cookie(&token, data.secure_cookies))
            .map_err(|_| AppError::Internal)?;
    }
    Ok(resp)
}

pub async fn login_submit(
    req: HttpRequest,
    visitor: Visitor,
    data: web::Data<AppState>,
    form: web::Form<LoginForm>,
) -> Result<HttpResponse, AppError> {
    let ip = client_ip(&req);
    if !data.limiter.allow_login(&ip) {
        warn!(%ip, "login rate limit exceeded");
        return Err(AppError::RateLimited);
    }
    let form = form.into_inner();
    let session = visitor.session.as_ref().ok_or(AppError::CsrfMismatch)?;
    require_csrf(session, &form.csrf)?;

    match authn::login(data.repo.as_ref(), data.sessions.as_ref(), &form.username, &form.password).await {
        Ok((token, fresh)) => {
            // the pre-login session is dropped so its id can't be fixated
            if let Some(old) = visitor.token.as_deref() {
                data.sessions.destroy(old).await?;
            }
            info!(username = fresh.username.as_deref().unwrap_or_default(), %ip, "login succeeded");
            let mut resp = redirect("/admin");
            resp.add_cookie(&session_cookie(&token, data.secure_cookies))
                .map_err(|_| AppError::Internal)?;
            Ok(resp)
        }
        Err(AuthError::InvalidCredentials) => {
            warn!(%ip, "login failed");
            let csrf_token = data.sessions.rotate_csrf(&session.id).await?;
            page(&data, &req, false, "login.html", context! { error => LOGIN_ERROR, csrf_token })
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn logout(visitor: Visitor, data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    if let Some(token) = visitor.token.as_deref().filter(|t| !t.is_empty()) {
        authn::logout(data.sessions.as_ref(), token).await?;
    }
    let mut resp = redirect("/");
    resp.add_cookie(&expired_session_cookie(data.secure_cookies))
        .map_err(|_| AppError::Internal)?;
    Ok(resp)
}
