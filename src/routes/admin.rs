use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse};
use minijinja::context;
use tracing::{info, warn};
use validator::Validate;

use super::{page, redirect, require_csrf, AppState};
use crate::auth::AdminSession;
use crate::error::AppError;
use crate::forms::{CommentForm, CsrfForm, NoteForm, PostForm, SnippetForm};
use crate::models::{CommentOwner, Id, ListQuery, NewComment};
use crate::upload::read_multipart;

const DASHBOARD_ROWS: i64 = 5;

pub async fn dashboard(req: HttpRequest, AdminSession(session): AdminSession, data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let posts = data.repo.list_posts(&ListQuery::all().limit(DASHBOARD_ROWS)).await?;
    let snippets = data.repo.list_snippets(&ListQuery::all().limit(DASHBOARD_ROWS)).await?;
    let notes = data.repo.list_notes(Some(DASHBOARD_ROWS)).await?;
    page(&data, &req, true, "admin/dashboard.html", context! {
        posts,
        snippets,
        notes,
        username => session.username,
        csrf_token => session.csrf_token,
    })
}

pub async fn notes_page(req: HttpRequest, AdminSession(session): AdminSession, data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let notes = data.repo.list_notes(None).await?;
    page(&data, &req, true, "notes.html", context! { notes, csrf_token => session.csrf_token })
}

// ---- blog posts ----

pub async fn new_post(req: HttpRequest, AdminSession(session): AdminSession, data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    page(&data, &req, true, "admin/edit_post.html", context! { csrf_token => session.csrf_token })
}

pub async fn edit_post(
    req: HttpRequest,
    AdminSession(session): AdminSession,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, AppError> {
    let post = data.repo.get_post(path.into_inner()).await?;
    let comments = data.repo.list_comments(CommentOwner::Blog(post.id)).await?;
    page(&data, &req, true, "admin/edit_post.html", context! {
        post,
        comments,
        csrf_token => session.csrf_token,
    })
}

pub async fn save_post(
    AdminSession(session): AdminSession,
    data: web::Data<AppState>,
    form: web::Form<PostForm>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    require_csrf(&session, &form.csrf)?;
    form.validate()?;
    let (id, post) = form.into_new();
    let saved = match id {
        Some(id) => data.repo.update_post(id, post).await?,
        None => data.repo.create_post(post).await?,
    };
    info!(id = saved.id, slug = %saved.slug, "blog post saved");
    Ok(redirect("/admin"))
}

pub async fn delete_post(
    AdminSession(session): AdminSession,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    form: web::Form<CsrfForm>,
) -> Result<HttpResponse, AppError> {
    require_csrf(&session, &form.csrf)?;
    let id = path.into_inner();
    data.repo.delete_post(id).await?;
    info!(id, "blog post deleted");
    Ok(redirect("/admin"))
}

// ---- code snippets ----

pub async fn new_snippet(req: HttpRequest, AdminSession(session): AdminSession, data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    page(&data, &req, true, "admin/edit_code.html", context! { csrf_token => session.csrf_token })
}

pub async fn edit_snippet(
    req: HttpRequest,
    AdminSession(session): AdminSession,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, AppError> {
    let snippet = data.repo.get_snippet(path.into_inner()).await?;
    let comments = data.repo.list_comments(CommentOwner::Code(snippet.id)).await?;
    page(&data, &req, true, "admin/edit_code.html", context! {
        snippet,
        comments,
        csrf_token => session.csrf_token,
    })
}

/// Multipart editor. The body is buffered and the token checked before the
/// attachment (if any) is written to disk.
pub async fn save_snippet(
    AdminSession(session): AdminSession,
    data: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let multipart = read_multipart(payload).await?;
    let submitted = multipart.fields.get("_csrf").map(String::as_str).unwrap_or_default();
    require_csrf(&session, submitted)?;

    let fields = serde_json::to_value(&multipart.fields).map_err(|_| AppError::Internal)?;
    let form: SnippetForm =
        serde_json::from_value(fields).map_err(|e| AppError::BadRequest(format!("Formulaire invalide : {e}")))?;
    form.validate()?;
    if let Some(id) = form.id {
        // no orphaned upload for an unknown snippet
        data.repo.get_snippet(id).await?;
    }

    let file_path = match multipart.file {
        Some(file) => Some(data.files.save(&file.original_name, &file.bytes).await?),
        None => None,
    };
    let uploaded = file_path.clone();
    let (id, snippet) = form.into_new(file_path);
    let result = match id {
        Some(id) => data.repo.update_snippet(id, snippet).await,
        None => data.repo.create_snippet(snippet).await,
    };
    let saved = match result {
        Ok(saved) => saved,
        Err(e) => {
            // the row was never written, so nothing references the new file
            if let Some(path) = uploaded.as_deref() {
                if let Err(err) = data.files.remove(path).await {
                    warn!(%path, error = %err, "could not remove upload after failed save");
                }
            }
            return Err(e.into());
        }
    };
    info!(id = saved.id, slug = %saved.slug, file = ?saved.file_path, "code snippet saved");
    Ok(redirect("/admin"))
}

pub async fn delete_snippet(
    AdminSession(session): AdminSession,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    form: web::Form<CsrfForm>,
) -> Result<HttpResponse, AppError> {
    require_csrf(&session, &form.csrf)?;
    let id = path.into_inner();
    data.repo.delete_snippet(id).await?;
    info!(id, "code snippet deleted");
    Ok(redirect("/admin"))
}

// ---- notes ----

pub async fn new_note(req: HttpRequest, AdminSession(session): AdminSession, data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    page(&data, &req, true, "admin/edit_note.html", context! { csrf_token => session.csrf_token })
}

pub async fn edit_note(
    req: HttpRequest,
    AdminSession(session): AdminSession,
    data: web::Data<AppState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, AppError> {
    let note = data.repo.get_note(path.into_inner()).await?;
    page(&data, &req, true, "admin/edit_note.html", context! {
        note,
        csrf_token => session.csrf_token,
    })
}

pub async fn save_note(
    AdminSession(session): AdminSession,
    data: web::Data<AppState>,
    form: web::Form<NoteForm>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    require_csrf(&session, &form.csrf)?;
    form.validate()?;
    let (id, note) = form.into_new();
    let saved = match id {
        Some(id) => data.repo.update_note(id, note).await?,
        None => data.repo.create_note(note).await?,
    };
    info!(id = saved.id, "note saved");
    Ok(redirect("/notes"))
}

pub async fn delete_note(
    AdminSession(session): AdminSession,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    form: web::Form<CsrfForm>,
) -> Result<HttpResponse, AppError> {
    require_csrf(&session, &form.csrf)?;
    let id = path.into_inner();
    data.repo.delete_note(id).await?;
    info!(id, "note deleted");
    Ok(redirect("/notes"))
}

// ---- private comments ----

pub async fn add_comment(
    AdminSession(session): AdminSession,
    data: web::Data<AppState>,
    form: web::Form<CommentForm>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    require_csrf(&session, &form.csrf)?;
    form.validate()?;
    let owner = CommentOwner::new(form.item_type, form.item_id);
    match owner {
        CommentOwner::Blog(id) => { data.repo.get_post(id).await?; }
        CommentOwner::Code(id) => { data.repo.get_snippet(id).await?; }
    }
    let comment = data.repo.add_comment(NewComment { owner, comment: form.comment }).await?;
    info!(id = comment.id, item_type = ?owner.kind(), item_id = owner.id(), "private comment added");
    Ok(redirect(&owner.admin_path()))
}
