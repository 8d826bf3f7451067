use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};

use crate::auth::AuthError;
use crate::repo::RepoError;
use crate::upload::FileStoreError;

/// Shown verbatim to clients over the login attempt limit.
pub const RATE_LIMITED_MESSAGE: &str = "Trop de tentatives de connexion, réessayez plus tard.";

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Page introuvable")] NotFound,
    #[error("Ce slug est déjà utilisé")] Conflict,
    #[error("{0}")] BadRequest(String),
    #[error("Jeton CSRF invalide")] CsrfMismatch,
    #[error("{}", RATE_LIMITED_MESSAGE)] RateLimited,
    #[error("authentication required")] Unauthenticated,
    #[error("Fichier trop volumineux")] PayloadTooLarge,
    #[error("Erreur interne du serveur")] Internal,
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => AppError::NotFound,
            RepoError::Conflict => AppError::Conflict,
            RepoError::Internal(msg) => {
                tracing::error!(error = %msg, "storage failure");
                AppError::Internal
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Repo(e) => e.into(),
            other => {
                tracing::error!(error = %other, "auth failure");
                AppError::Internal
            }
        }
    }
}

impl From<FileStoreError> for AppError {
    fn from(e: FileStoreError) -> Self {
        match e {
            FileStoreError::NotFound => AppError::NotFound,
            FileStoreError::Io(err) => {
                tracing::error!(error = %err, "upload storage failure");
                AppError::Internal
            }
        }
    }
}

impl From<minijinja::Error> for AppError {
    fn from(e: minijinja::Error) -> Self {
        tracing::error!(error = %e, "template rendering failed");
        AppError::Internal
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = e
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |err| match &err.message {
                    Some(msg) => msg.to_string(),
                    None => format!("Le champ {field} est invalide"),
                })
            })
            .collect();
        messages.sort();
        AppError::BadRequest(messages.join("; "))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::CsrfMismatch => StatusCode::FORBIDDEN,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Unauthenticated => StatusCode::FOUND,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // protected pages bounce anonymous visitors to the login form
        if let AppError::Unauthenticated = self {
            return HttpResponse::Found().insert_header((header::LOCATION, "/login")).finish();
        }
        HttpResponse::build(self.status_code())
            .content_type(mime::TEXT_PLAIN_UTF_8)
            .body(self.to_string())
    }
}
