use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use actix_multipart::Multipart;
use async_trait::async_trait;
use futures_util::TryStreamExt as _;
use log::{error, info};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::error::AppError;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024; // 10 MiB
const MAX_TEXT_FIELD_BYTES: usize = 1024 * 1024;
const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("not_found")]
    NotFound,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Persists the bytes under a fresh name derived from `original_name`;
    /// returns the public path to store in `file_path`.
    async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<String, FileStoreError>;
    async fn load(&self, name: &str) -> Result<Vec<u8>, FileStoreError>;
    /// Deletes a file previously returned by `save`.
    async fn remove(&self, public_path: &str) -> Result<(), FileStoreError>;
}

/// Uploads on local disk, served back under `/uploads/`.
pub struct FsFileStore {
    root: PathBuf,
}

impl FsFileStore {
    pub const PUBLIC_PREFIX: &'static str = "/uploads";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// Reduces a client supplied filename to a safe single path component.
pub fn sanitize_filename(original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() { "upload".to_string() } else { cleaned.to_string() }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('.') && !name.contains(['/', '\\'])
}

#[async_trait]
impl FileStore for FsFileStore {
    async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<String, FileStoreError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let base = sanitize_filename(original_name);
        let mut stamp = chrono::Utc::now().timestamp_millis();
        loop {
            let name = format!("{stamp}-{base}");
            let path = self.root.join(&name);
            // create_new makes the name check and the claim one atomic step
            match tokio::fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(mut file) => {
                    if let Err(e) = file.write_all(bytes).await {
                        error!("writing upload {} failed: {e}", path.display());
                        let _ = tokio::fs::remove_file(&path).await;
                        return Err(e.into());
                    }
                    file.flush().await?;
                    info!("stored upload {} ({} bytes)", path.display(), bytes.len());
                    return Ok(format!("{}/{}", Self::PUBLIC_PREFIX, name));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => stamp += 1,
                Err(e) => {
                    error!("creating upload {} failed: {e}", path.display());
                    return Err(e.into());
                }
            }
        }
    }

    async fn load(&self, name: &str) -> Result<Vec<u8>, FileStoreError> {
        if !is_plain_name(name) { return Err(FileStoreError::NotFound); }
        match tokio::fs::read(self.root.join(name)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(FileStoreError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, public_path: &str) -> Result<(), FileStoreError> {
        let name = public_path
            .strip_prefix(Self::PUBLIC_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|name| is_plain_name(name))
            .ok_or(FileStoreError::NotFound)?;
        match tokio::fs::remove_file(self.root.join(name)).await {
            Ok(()) => {
                info!("removed upload {name}");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(FileStoreError::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}

/// Content type for serving an upload back. Never HTML.
pub fn sniff_content_type(bytes: &[u8]) -> String {
    match infer::get(bytes) {
        // infer recognises html/xml too; those must stay inert
        Some(kind) if kind.matcher_type() != infer::MatcherType::Text => return kind.mime_type().to_string(),
        _ => {}
    }
    if std::str::from_utf8(bytes).is_ok() {
        mime::TEXT_PLAIN_UTF_8.to_string()
    } else {
        mime::APPLICATION_OCTET_STREAM.to_string()
    }
}

#[derive(Debug)]
pub struct UploadedFile {
    pub original_name: String,
    pub bytes: Vec<u8>,
}

/// A fully buffered multipart form: text fields plus at most one file.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub file: Option<UploadedFile>,
}

/// Buffers the whole multipart body. Nothing touches the disk here so the
/// caller can check the CSRF token before anything is persisted.
pub async fn read_multipart(mut payload: Multipart) -> Result<MultipartForm, AppError> {
    let mut form = MultipartForm::default();
    while let Some(mut field) = payload.try_next().await.map_err(|e| {
        error!("multipart error: {e}");
        AppError::BadRequest("Corps multipart invalide".into())
    })? {
        let disposition = field.content_disposition();
        let Some(name) = disposition.get_name().map(str::to_owned) else { continue; };
        let filename = disposition.get_filename().map(str::to_owned);
        let limit = if name == UPLOAD_FIELD { MAX_UPLOAD_BYTES } else { MAX_TEXT_FIELD_BYTES };

        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(|e| {
            error!("stream read error: {e}");
            AppError::BadRequest("Corps multipart invalide".into())
        })? {
            if bytes.len() + chunk.len() > limit { return Err(AppError::PayloadTooLarge); }
            bytes.extend_from_slice(&chunk);
        }

        if name == UPLOAD_FIELD {
            // browsers send an empty part when no file was picked
            let original_name = filename.unwrap_or_default();
            if original_name.is_empty() && bytes.is_empty() { continue; }
            if form.file.is_some() {
                return Err(AppError::BadRequest("Un seul fichier par requête".into()));
            }
            form.file = Some(UploadedFile { original_name, bytes });
        } else {
            let value = String::from_utf8(bytes)
                .map_err(|_| AppError::BadRequest(format!("Le champ {name} n'est pas de l'UTF-8 valide")))?;
            form.fields.insert(name, value);
        }
    }
    Ok(form)
}
