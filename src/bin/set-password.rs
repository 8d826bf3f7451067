//! Rotates a user's password: `set-password <USERNAME> <PASSWORD>`.

use anyhow::{bail, Context};
use folio::auth::{hash_password, validate_password_strength};
use folio::repo::{RepoError, SqliteRepo, UserRepo};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }
    let mut args = std::env::args().skip(1);
    let (Some(username), Some(password)) = (args.next(), args.next()) else {
        eprintln!("Usage: set-password <USERNAME> <PASSWORD>");
        std::process::exit(2);
    };
    if let Err(msg) = validate_password_strength(&password) {
        bail!(msg);
    }

    let url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://database.db".into());
    let repo = SqliteRepo::connect(&url).await.with_context(|| format!("opening {url}"))?;
    repo.migrate().await.context("creating schema")?;

    let hash = hash_password(&password)?;
    match repo.set_password(&username, &hash).await {
        Ok(()) => {
            println!("Password updated for {username}");
            Ok(())
        }
        Err(RepoError::NotFound) => bail!("no such user: {username}"),
        Err(e) => Err(e.into()),
    }
}
