use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};

use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    #[error("storage error: {0}")] Internal(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => RepoError::Conflict,
            other => RepoError::Internal(other.to_string()),
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn count_users(&self) -> RepoResult<i64>;
    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    async fn create_user(&self, new: NewUser) -> RepoResult<User>;
    async fn set_password(&self, username: &str, password_hash: &str) -> RepoResult<()>;
}

#[async_trait]
pub trait PostRepo: Send + Sync {
    async fn list_posts(&self, query: &ListQuery) -> RepoResult<Vec<BlogPost>>;
    async fn get_post(&self, id: Id) -> RepoResult<BlogPost>;
    /// Only returns published posts.
    async fn published_post(&self, slug: &str) -> RepoResult<BlogPost>;
    async fn create_post(&self, new: NewBlogPost) -> RepoResult<BlogPost>;
    async fn update_post(&self, id: Id, upd: NewBlogPost) -> RepoResult<BlogPost>;
    /// Deletes the post and its private comments.
    async fn delete_post(&self, id: Id) -> RepoResult<()>;
    async fn search_posts(&self, term: &str, limit: i64) -> RepoResult<Vec<SearchHit>>;
}

#[async_trait]
pub trait SnippetRepo: Send + Sync {
    async fn list_snippets(&self, query: &ListQuery) -> RepoResult<Vec<CodeSnippet>>;
    async fn get_snippet(&self, id: Id) -> RepoResult<CodeSnippet>;
    /// Only returns published snippets.
    async fn published_snippet(&self, slug: &str) -> RepoResult<CodeSnippet>;
    async fn create_snippet(&self, new: NewCodeSnippet) -> RepoResult<CodeSnippet>;
    async fn update_snippet(&self, id: Id, upd: NewCodeSnippet) -> RepoResult<CodeSnippet>;
    /// Deletes the snippet and its private comments.
    async fn delete_snippet(&self, id: Id) -> RepoResult<()>;
    async fn search_snippets(&self, term: &str, limit: i64) -> RepoResult<Vec<SearchHit>>;
}

#[async_trait]
pub trait NoteRepo: Send + Sync {
    async fn list_notes(&self, limit: Option<i64>) -> RepoResult<Vec<Note>>;
    async fn get_note(&self, id: Id) -> RepoResult<Note>;
    async fn create_note(&self, new: NewNote) -> RepoResult<Note>;
    async fn update_note(&self, id: Id, upd: NewNote) -> RepoResult<Note>;
    async fn delete_note(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait CommentRepo: Send + Sync {
    async fn list_comments(&self, owner: CommentOwner) -> RepoResult<Vec<PrivateComment>>;
    async fn add_comment(&self, new: NewComment) -> RepoResult<PrivateComment>;
    /// Returns the number of comments removed.
    async fn delete_comments_for(&self, owner: CommentOwner) -> RepoResult<u64>;
}

pub trait Repo: UserRepo + PostRepo + SnippetRepo + NoteRepo + CommentRepo {}

impl<T> Repo for T where T: UserRepo + PostRepo + SnippetRepo + NoteRepo + CommentRepo {}

/// Opens a SQLite pool, creating the database file when missing.
///
/// In-memory databases live and die with their connection, so those pools are
/// pinned to a single connection that is never recycled.
pub async fn open_pool(url: &str) -> Result<SqlitePool, sqlx::Error> {
    let opts = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = if url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?
    } else {
        SqlitePoolOptions::new().max_connections(5).connect_with(opts).await?
    };
    Ok(pool)
}

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT UNIQUE NOT NULL,
        password TEXT NOT NULL,
        email TEXT,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS blog_posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        slug TEXT UNIQUE NOT NULL,
        content TEXT NOT NULL,
        excerpt TEXT,
        tags TEXT,
        published BOOLEAN DEFAULT 1,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS code_snippets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        slug TEXT UNIQUE NOT NULL,
        description TEXT,
        code TEXT NOT NULL,
        language TEXT,
        tags TEXT,
        file_path TEXT,
        published BOOLEAN DEFAULT 1,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS private_comments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        item_type TEXT NOT NULL,
        item_id INTEGER NOT NULL,
        comment TEXT NOT NULL,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS notes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        tags TEXT,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )"#,
];

/// `%term%` with LIKE wildcards in the user input escaped (pair with `ESCAPE '\'`).
fn like_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

fn push_list_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &ListQuery, body_column: &str) {
    if query.published_only {
        qb.push(" AND published = 1");
    }
    if let Some(term) = query.search.as_deref() {
        let pattern = like_pattern(term);
        qb.push(" AND (title LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR ")
            .push(body_column)
            .push(" LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    if let Some(tag) = query.tag.as_deref() {
        qb.push(" AND tags LIKE ").push_bind(like_pattern(tag)).push(" ESCAPE '\\'");
    }
}

#[derive(Clone)]
pub struct SqliteRepo { pool: SqlitePool }

impl SqliteRepo {
    pub fn new(pool: SqlitePool) -> Self { Self { pool } }

    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        Ok(Self::new(open_pool(url).await?))
    }

    /// Fresh private database, mostly for tests.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let repo = Self::connect("sqlite::memory:").await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Creates any missing table. Safe to run on every start.
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        for ddl in SCHEMA {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool { &self.pool }
}

#[async_trait]
impl UserRepo for SqliteRepo {
    async fn count_users(&self) -> RepoResult<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(&self.pool).await?;
        Ok(n)
    }
    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool).await?;
        Ok(user)
    }
    async fn create_user(&self, new: NewUser) -> RepoResult<User> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (username, password, email) VALUES (?, ?, ?) RETURNING *"
        )
            .bind(&new.username).bind(&new.password_hash).bind(&new.email)
            .fetch_one(&self.pool).await?;
        Ok(user)
    }
    async fn set_password(&self, username: &str, password_hash: &str) -> RepoResult<()> {
        let res = sqlx::query("UPDATE users SET password = ? WHERE username = ?")
            .bind(password_hash).bind(username)
            .execute(&self.pool).await?;
        if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
        Ok(())
    }
}

#[async_trait]
impl PostRepo for SqliteRepo {
    async fn list_posts(&self, query: &ListQuery) -> RepoResult<Vec<BlogPost>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM blog_posts WHERE 1 = 1");
        push_list_filters(&mut qb, query, "content");
        qb.push(" ORDER BY created_at DESC, id DESC");
        if let Some(limit) = query.limit { qb.push(" LIMIT ").push_bind(limit); }
        Ok(qb.build_query_as::<BlogPost>().fetch_all(&self.pool).await?)
    }
    async fn get_post(&self, id: Id) -> RepoResult<BlogPost> {
        let post = sqlx::query_as::<_, BlogPost>("SELECT * FROM blog_posts WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool).await?;
        Ok(post)
    }
    async fn published_post(&self, slug: &str) -> RepoResult<BlogPost> {
        let post = sqlx::query_as::<_, BlogPost>("SELECT * FROM blog_posts WHERE slug = ? AND published = 1")
            .bind(slug)
            .fetch_one(&self.pool).await?;
        Ok(post)
    }
    async fn create_post(&self, new: NewBlogPost) -> RepoResult<BlogPost> {
        let post = sqlx::query_as::<_, BlogPost>(
            "INSERT INTO blog_posts (title, slug, content, excerpt, tags, published) VALUES (?, ?, ?, ?, ?, ?) RETURNING *"
        )
            .bind(&new.title).bind(&new.slug).bind(&new.content)
            .bind(&new.excerpt).bind(&new.tags).bind(new.published)
            .fetch_one(&self.pool).await?;
        Ok(post)
    }
    async fn update_post(&self, id: Id, upd: NewBlogPost) -> RepoResult<BlogPost> {
        let post = sqlx::query_as::<_, BlogPost>(
            "UPDATE blog_posts SET title = ?, slug = ?, content = ?, excerpt = ?, tags = ?, published = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ? RETURNING *"
        )
            .bind(&upd.title).bind(&upd.slug).bind(&upd.content)
            .bind(&upd.excerpt).bind(&upd.tags).bind(upd.published)
            .bind(id)
            .fetch_one(&self.pool).await?;
        Ok(post)
    }
    async fn delete_post(&self, id: Id) -> RepoResult<()> {
        let res = sqlx::query("DELETE FROM blog_posts WHERE id = ?").bind(id).execute(&self.pool).await?;
        if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
        // separate statement: a crash in between leaves orphaned comments behind
        self.delete_comments_for(CommentOwner::Blog(id)).await?;
        Ok(())
    }
    async fn search_posts(&self, term: &str, limit: i64) -> RepoResult<Vec<SearchHit>> {
        let hits = sqlx::query_as::<_, SearchHit>(
            "SELECT id, title, slug FROM blog_posts WHERE published = 1 AND title LIKE ? ESCAPE '\\' ORDER BY created_at DESC, id DESC LIMIT ?"
        )
            .bind(like_pattern(term)).bind(limit)
            .fetch_all(&self.pool).await?;
        Ok(hits)
    }
}

#[async_trait]
impl SnippetRepo for SqliteRepo {
    async fn list_snippets(&self, query: &ListQuery) -> RepoResult<Vec<CodeSnippet>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM code_snippets WHERE 1 = 1");
        push_list_filters(&mut qb, query, "description");
        qb.push(" ORDER BY created_at DESC, id DESC");
        if let Some(limit) = query.limit { qb.push(" LIMIT ").push_bind(limit); }
        Ok(qb.build_query_as::<CodeSnippet>().fetch_all(&self.pool).await?)
    }
    async fn get_snippet(&self, id: Id) -> RepoResult<CodeSnippet> {
        let snippet = sqlx::query_as::<_, CodeSnippet>("SELECT * FROM code_snippets WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool).await?;
        Ok(snippet)
    }
    async fn published_snippet(&self, slug: &str) -> RepoResult<CodeSnippet> {
        let snippet = sqlx::query_as::<_, CodeSnippet>("SELECT * FROM code_snippets WHERE slug = ? AND published = 1")
            .bind(slug)
            .fetch_one(&self.pool).await?;
        Ok(snippet)
    }
    async fn create_snippet(&self, new: NewCodeSnippet) -> RepoResult<CodeSnippet> {
        let snippet = sqlx::query_as::<_, CodeSnippet>(
            "INSERT INTO code_snippets (title, slug, description, code, language, tags, published, file_path) VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING *"
        )
            .bind(&new.title).bind(&new.slug).bind(&new.description).bind(&new.code)
            .bind(&new.language).bind(&new.tags).bind(new.published).bind(&new.file_path)
            .fetch_one(&self.pool).await?;
        Ok(snippet)
    }
    async fn update_snippet(&self, id: Id, upd: NewCodeSnippet) -> RepoResult<CodeSnippet> {
        // COALESCE keeps the previous attachment when no new file came with the edit
        let snippet = sqlx::query_as::<_, CodeSnippet>(
            "UPDATE code_snippets SET title = ?, slug = ?, description = ?, code = ?, language = ?, tags = ?, published = ?, file_path = COALESCE(?, file_path), updated_at = CURRENT_TIMESTAMP WHERE id = ? RETURNING *"
        )
            .bind(&upd.title).bind(&upd.slug).bind(&upd.description).bind(&upd.code)
            .bind(&upd.language).bind(&upd.tags).bind(upd.published).bind(&upd.file_path)
            .bind(id)
            .fetch_one(&self.pool).await?;
        Ok(snippet)
    }
    async fn delete_snippet(&self, id: Id) -> RepoResult<()> {
        let res = sqlx::query("DELETE FROM code_snippets WHERE id = ?").bind(id).execute(&self.pool).await?;
        if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
        self.delete_comments_for(CommentOwner::Code(id)).await?;
        Ok(())
    }
    async fn search_snippets(&self, term: &str, limit: i64) -> RepoResult<Vec<SearchHit>> {
        let hits = sqlx::query_as::<_, SearchHit>(
            "SELECT id, title, slug FROM code_snippets WHERE published = 1 AND title LIKE ? ESCAPE '\\' ORDER BY created_at DESC, id DESC LIMIT ?"
        )
            .bind(like_pattern(term)).bind(limit)
            .fetch_all(&self.pool).await?;
        Ok(hits)
    }
}

#[async_trait]
impl NoteRepo for SqliteRepo {
    async fn list_notes(&self, limit: Option<i64>) -> RepoResult<Vec<Note>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM notes ORDER BY updated_at DESC, id DESC");
        if let Some(limit) = limit { qb.push(" LIMIT ").push_bind(limit); }
        Ok(qb.build_query_as::<Note>().fetch_all(&self.pool).await?)
    }
    async fn get_note(&self, id: Id) -> RepoResult<Note> {
        let note = sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool).await?;
        Ok(note)
    }
    async fn create_note(&self, new: NewNote) -> RepoResult<Note> {
        let note = sqlx::query_as::<_, Note>("INSERT INTO notes (title, content, tags) VALUES (?, ?, ?) RETURNING *")
            .bind(&new.title).bind(&new.content).bind(&new.tags)
            .fetch_one(&self.pool).await?;
        Ok(note)
    }
    async fn update_note(&self, id: Id, upd: NewNote) -> RepoResult<Note> {
        let note = sqlx::query_as::<_, Note>(
            "UPDATE notes SET title = ?, content = ?, tags = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ? RETURNING *"
        )
            .bind(&upd.title).bind(&upd.content).bind(&upd.tags)
            .bind(id)
            .fetch_one(&self.pool).await?;
        Ok(note)
    }
    async fn delete_note(&self, id: Id) -> RepoResult<()> {
        let res = sqlx::query("DELETE FROM notes WHERE id = ?").bind(id).execute(&self.pool).await?;
        if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
        Ok(())
    }
}

#[async_trait]
impl CommentRepo for SqliteRepo {
    async fn list_comments(&self, owner: CommentOwner) -> RepoResult<Vec<PrivateComment>> {
        let comments = sqlx::query_as::<_, PrivateComment>(
            "SELECT * FROM private_comments WHERE item_type = ? AND item_id = ? ORDER BY created_at ASC, id ASC"
        )
            .bind(owner.kind()).bind(owner.id())
            .fetch_all(&self.pool).await?;
        Ok(comments)
    }
    async fn add_comment(&self, new: NewComment) -> RepoResult<PrivateComment> {
        let comment = sqlx::query_as::<_, PrivateComment>(
            "INSERT INTO private_comments (item_type, item_id, comment) VALUES (?, ?, ?) RETURNING *"
        )
            .bind(new.owner.kind()).bind(new.owner.id()).bind(&new.comment)
            .fetch_one(&self.pool).await?;
        Ok(comment)
    }
    async fn delete_comments_for(&self, owner: CommentOwner) -> RepoResult<u64> {
        let res = sqlx::query("DELETE FROM private_comments WHERE item_type = ? AND item_id = ?")
            .bind(owner.kind()).bind(owner.id())
            .execute(&self.pool).await?;
        Ok(res.rows_affected())
    }
}
