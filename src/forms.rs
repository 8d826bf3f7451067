//! Admin form payloads and their validation.

use std::borrow::Cow;
use std::fmt::Display;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer};
use validator::{Validate, ValidationError};

use crate::models::{Id, ItemType, NewBlogPost, NewCodeSnippet, NewNote};

/// Hidden `id` fields arrive as `""` on create forms.
fn empty_as_none<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw: Option<String> = Option::deserialize(de)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(de::Error::custom),
    }
}

/// Blank optional text is stored as NULL.
fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn checkbox(value: &Option<String>) -> bool {
    value.as_deref() == Some("on")
}

pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if slug.is_empty() {
        return Err(ValidationError::new("required").with_message(Cow::Borrowed("Le slug est requis")));
    }
    if !slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(ValidationError::new("slug")
            .with_message(Cow::Borrowed("Le slug ne peut contenir que des lettres, des chiffres, '-' et '_'")));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct PostForm {
    #[serde(rename = "_csrf", default)]
    pub csrf: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub id: Option<Id>,
    #[serde(default)]
    #[validate(length(min = 1, message = "Le titre est requis"))]
    pub title: String,
    #[serde(default)]
    #[validate(custom(function = "validate_slug"))]
    pub slug: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Le contenu est requis"))]
    pub content: String,
    pub excerpt: Option<String>,
    pub tags: Option<String>,
    pub published: Option<String>,
}

impl PostForm {
    pub fn into_new(self) -> (Option<Id>, NewBlogPost) {
        let published = checkbox(&self.published);
        (
            self.id,
            NewBlogPost {
                title: self.title,
                slug: self.slug,
                content: self.content,
                excerpt: blank_to_none(self.excerpt),
                tags: blank_to_none(self.tags),
                published,
            },
        )
    }
}

/// Text fields of the multipart snippet editor; the file travels separately.
#[derive(Debug, Deserialize, Validate)]
pub struct SnippetForm {
    #[serde(rename = "_csrf", default)]
    pub csrf: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub id: Option<Id>,
    #[serde(default)]
    #[validate(length(min = 1, message = "Le titre est requis"))]
    pub title: String,
    #[serde(default)]
    #[validate(custom(function = "validate_slug"))]
    pub slug: String,
    pub description: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, message = "Le code est requis"))]
    pub code: String,
    pub language: Option<String>,
    pub tags: Option<String>,
    pub published: Option<String>,
}

impl SnippetForm {
    pub fn into_new(self, file_path: Option<String>) -> (Option<Id>, NewCodeSnippet) {
        let published = checkbox(&self.published);
        (
            self.id,
            NewCodeSnippet {
                title: self.title,
                slug: self.slug,
                description: blank_to_none(self.description),
                code: self.code,
                language: blank_to_none(self.language),
                tags: blank_to_none(self.tags),
                file_path,
                published,
            },
        )
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct NoteForm {
    #[serde(rename = "_csrf", default)]
    pub csrf: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub id: Option<Id>,
    #[serde(default)]
    #[validate(length(min = 1, message = "Le titre est requis"))]
    pub title: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Le contenu est requis"))]
    pub content: String,
    pub tags: Option<String>,
}

impl NoteForm {
    pub fn into_new(self) -> (Option<Id>, NewNote) {
        (self.id, NewNote { title: self.title, content: self.content, tags: blank_to_none(self.tags) })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CommentForm {
    #[serde(rename = "_csrf", default)]
    pub csrf: String,
    pub item_type: ItemType,
    pub item_id: Id,
    #[serde(default)]
    #[validate(length(min = 1, message = "Le commentaire est requis"))]
    pub comment: String,
}

/// Bodies that carry nothing but the CSRF token (delete buttons).
#[derive(Debug, Deserialize)]
pub struct CsrfForm {
    #[serde(rename = "_csrf", default)]
    pub csrf: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(rename = "_csrf", default)]
    pub csrf: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}
