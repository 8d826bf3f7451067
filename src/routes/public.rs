use actix_web::{web, HttpRequest, HttpResponse};
use minijinja::context;
use rust_embed::RustEmbed;
use serde::Deserialize;

use super::{page, AppState};
use crate::auth::Visitor;
use crate::error::AppError;
use crate::models::ListQuery;
use crate::upload::sniff_content_type;

const HOME_TEASERS: i64 = 3;

#[derive(RustEmbed)]
#[folder = "static/"]
struct Assets;

#[derive(Debug, Default, Deserialize)]
pub struct ListFilter {
    pub search: Option<String>,
    pub tag: Option<String>,
}

pub async fn home(req: HttpRequest, visitor: Visitor, data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let posts = data.repo.list_posts(&ListQuery::public().limit(HOME_TEASERS)).await?;
    let snippets = data.repo.list_snippets(&ListQuery::public().limit(HOME_TEASERS)).await?;
    page(&data, &req, visitor.is_authenticated(), "index.html", context! { posts, snippets })
}

pub async fn blog_list(
    req: HttpRequest,
    visitor: Visitor,
    data: web::Data<AppState>,
    filter: web::Query<ListFilter>,
) -> Result<HttpResponse, AppError> {
    let ListFilter { search, tag } = filter.into_inner();
    let query = ListQuery::public().search(search.clone()).tag(tag.clone());
    let posts = data.repo.list_posts(&query).await?;
    page(&data, &req, visitor.is_authenticated(), "blog.html", context! { posts, search, tag })
}

pub async fn blog_post(
    req: HttpRequest,
    visitor: Visitor,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let post = data.repo.published_post(&path.into_inner()).await?;
    page(&data, &req, visitor.is_authenticated(), "blog_post.html", context! { post })
}

pub async fn code_list(
    req: HttpRequest,
    visitor: Visitor,
    data: web::Data<AppState>,
    filter: web::Query<ListFilter>,
) -> Result<HttpResponse, AppError> {
    let ListFilter { search, tag } = filter.into_inner();
    let query = ListQuery::public().search(search.clone()).tag(tag.clone());
    let snippets = data.repo.list_snippets(&query).await?;
    page(&data, &req, visitor.is_authenticated(), "code.html", context! { snippets, search, tag })
}

pub async fn code_detail(
    req: HttpRequest,
    visitor: Visitor,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let snippet = data.repo.published_snippet(&path.into_inner()).await?;
    page(&data, &req, visitor.is_authenticated(), "code_detail.html", context! { snippet })
}

pub async fn about(req: HttpRequest, visitor: Visitor, data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    page(&data, &req, visitor.is_authenticated(), "about.html", context! {})
}

pub async fn uploaded_file(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, AppError> {
    let bytes = data.files.load(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().content_type(sniff_content_type(&bytes)).body(bytes))
}

fn asset(path: &str, content_type: mime::Mime) -> Result<HttpResponse, AppError> {
    if path.split('/').any(|seg| seg == "..") {
        return Err(AppError::NotFound);
    }
    let file = Assets::get(path).ok_or(AppError::NotFound)?;
    Ok(HttpResponse::Ok().content_type(content_type).body(file.data.into_owned()))
}

pub async fn css(path: web::Path<String>) -> Result<HttpResponse, AppError> {
    asset(&format!("css/{}", path.into_inner()), mime::TEXT_CSS_UTF_8)
}

pub async fn js(path: web::Path<String>) -> Result<HttpResponse, AppError> {
    asset(&format!("js/{}", path.into_inner()), mime::APPLICATION_JAVASCRIPT_UTF_8)
}
