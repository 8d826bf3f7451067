use actix_web::{web, HttpResponse};
use serde::Deserialize;
use utoipa::{IntoParams, OpenApi};

use super::AppState;
use crate::error::AppError;
use crate::models::SearchHit;
use crate::openapi::ApiDoc;

const SEARCH_LIMIT: i64 = 5;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Title substring; absent matches everything.
    pub q: Option<String>,
    /// `blog` or `code`; anything else yields no results.
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/search",
    params(SearchParams),
    responses(
        (status = 200, description = "Up to five published matches", body = [SearchHit])
    )
)]
pub async fn search(data: web::Data<AppState>, params: web::Query<SearchParams>) -> Result<HttpResponse, AppError> {
    let SearchParams { q, kind } = params.into_inner();
    let term = q.unwrap_or_default();
    let hits: Vec<SearchHit> = match kind.as_deref() {
        Some("blog") => data.repo.search_posts(&term, SEARCH_LIMIT).await?,
        Some("code") => data.repo.search_snippets(&term, SEARCH_LIMIT).await?,
        _ => Vec::new(),
    };
    Ok(HttpResponse::Ok().json(hits))
}

pub async fn openapi_json() -> HttpResponse {
    HttpResponse::Ok().json(ApiDoc::openapi())
}
