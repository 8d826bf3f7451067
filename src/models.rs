use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// SQLite rowids
pub type Id = i64;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Id,
    pub username: String,
    #[sqlx(rename = "password")]
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlogPost {
    pub id: Id,
    pub title: String,
    pub slug: String,
    pub content: String, // markdown source
    pub excerpt: Option<String>,
    pub tags: Option<String>, // comma separated
    pub published: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Writable fields of a blog post, used for both insert and full update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewBlogPost {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub tags: Option<String>,
    pub published: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CodeSnippet {
    pub id: Id,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub code: String,
    pub language: Option<String>,
    pub tags: Option<String>,
    pub file_path: Option<String>, // public path of the attached upload
    pub published: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Writable fields of a snippet. On update a `None` file_path keeps the stored one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewCodeSnippet {
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub code: String,
    pub language: Option<String>,
    pub tags: Option<String>,
    pub file_path: Option<String>,
    pub published: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Note {
    pub id: Id,
    pub title: String,
    pub content: String,
    pub tags: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    pub tags: Option<String>,
}

/// Discriminator stored in `private_comments.item_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ItemType {
    Blog,
    Code,
}

/// What a private comment hangs off. Comments are not foreign-keyed, so every
/// delete of an owner must go through `CommentRepo::delete_comments_for`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentOwner {
    Blog(Id),
    Code(Id),
}

impl CommentOwner {
    pub fn new(kind: ItemType, id: Id) -> Self {
        match kind {
            ItemType::Blog => CommentOwner::Blog(id),
            ItemType::Code => CommentOwner::Code(id),
        }
    }

    pub fn kind(&self) -> ItemType {
        match self {
            CommentOwner::Blog(_) => ItemType::Blog,
            CommentOwner::Code(_) => ItemType::Code,
        }
    }

    pub fn id(&self) -> Id {
        match *self {
            CommentOwner::Blog(id) | CommentOwner::Code(id) => id,
        }
    }

    /// Editor page the owner is managed from.
    pub fn admin_path(&self) -> String {
        match self {
            CommentOwner::Blog(id) => format!("/admin/blog/{id}"),
            CommentOwner::Code(id) => format!("/admin/code/{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct PrivateComment {
    pub id: Id,
    pub item_type: ItemType,
    pub item_id: Id,
    pub comment: String,
    pub created_at: NaiveDateTime,
}

impl PrivateComment {
    pub fn owner(&self) -> CommentOwner {
        CommentOwner::new(self.item_type, self.item_id)
    }
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub owner: CommentOwner,
    pub comment: String,
}

/// Row returned by the live search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct SearchHit {
    pub id: Id,
    pub title: String,
    pub slug: String,
}

/// Filters for the list queries. Empty strings are treated as "no filter".
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub search: Option<String>,
    pub tag: Option<String>,
    pub published_only: bool,
    pub limit: Option<i64>,
}

impl ListQuery {
    /// Everything a visitor may see.
    pub fn public() -> Self {
        Self { published_only: true, ..Self::default() }
    }

    /// Everything, for the admin views.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn search(mut self, term: Option<String>) -> Self {
        self.search = term.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn tag(mut self, tag: Option<String>) -> Self {
        self.tag = tag.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }
}
