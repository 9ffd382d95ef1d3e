use std::sync::Arc;

use anyhow::Result;
use server::cache::{ConfigCache, MokaCache};
use server::http::{AppState, start_server};
use server::service::{MutationService, PullService};
use server::settings::Settings;
use server::storage::{ConfigStorage, ObjectStoreBackend, StorageConfig};
use tracing::{Level, info};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()),
        )
        .init();

    info!("Starting config center server");

    let settings = Settings::from_env()?;

    if let StorageConfig::Local { path } = &settings.storage {
        info!("Using storage path: {}", path.display());
        std::fs::create_dir_all(path)?;
    }

    let storage: Arc<dyn ConfigStorage> =
        Arc::new(ObjectStoreBackend::from_config(settings.storage.clone())?);
    let cache: Arc<dyn ConfigCache> = Arc::new(MokaCache::new(settings.cache_max_capacity));

    let mutations = MutationService::new(Arc::clone(&storage), Arc::clone(&cache))
        .with_store_timeout(settings.store_timeout);
    let pulls = PullService::new(storage, Arc::clone(&cache))
        .with_store_timeout(settings.store_timeout);

    let state = AppState::new(mutations, pulls, cache);
    start_server(state, settings.bind_address).await?;

    info!("Server stopped");
    Ok(())
}
