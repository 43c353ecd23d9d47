use anyhow::Context;
use postboard_core::{config, Postboard};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = config::get_or_init()
        .await
        .context("failed to load config")?;

    let board = Postboard::start(config)
        .await
        .context("failed to open the data store")?;

    postboard_web::serve(board).await.context("server error")?;

    Ok(())
}
