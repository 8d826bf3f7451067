use actix_web::{middleware::Compress, web, App, HttpServer};
use anyhow::Context;
use tracing::{info, warn, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;

use folio::auth::ensure_default_admin;
use folio::{config, AppState, Config, SecurityHeaders};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // .env is a development convenience only; production sets real variables
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cfg = Config::from_env().context("invalid configuration")?;
    if cfg.uses_dev_secret() {
        warn!("SESSION_SECRET not set; using the development placeholder");
    }
    info!(
        port = cfg.port,
        production = cfg.production,
        database = %cfg.database_url,
        sessions = %cfg.sessions_url,
        uploads = %cfg.upload_dir.display(),
        "Bootstrapping folio"
    );

    let state = AppState::connect(&cfg).await.context("opening databases")?;
    ensure_default_admin(state.repo.as_ref()).await.context("seeding the default admin")?;

    let security = if cfg.production { SecurityHeaders::from_env().with_hsts(true) } else { SecurityHeaders::from_env() };
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(security.clone())
            .app_data(web::Data::new(state.clone()))
            .configure(config)
    })
    .bind(("0.0.0.0", cfg.port))?;

    info!("Listening on http://0.0.0.0:{}", cfg.port);
    server.run().await?;
    Ok(())
}
