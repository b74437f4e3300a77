use anyhow::{Context, Result};
use clap::Parser;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use avatar_names::{
    NameCache, NameCacheConfig, NameKey, NameRecord,
    store::PersistentStore,
    transport::{HttpLookupTransport, LegacyDirectory},
};

#[derive(Parser)]
#[command(name = "avatar-names")]
#[command(version)]
#[command(about = "Resolve avatar ids and usernames to display names")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Batch lookup base URL (overrides config file)
    #[arg(short = 'u', long, value_name = "URL")]
    lookup_url: Option<String>,

    /// Stored cache to import at start and export at exit
    #[arg(short = 'f', long, value_name = "FILE")]
    cache_file: Option<PathBuf>,

    /// JSON map of agent id to full name used for legacy lookups
    #[arg(short = 'l', long, value_name = "FILE")]
    legacy_names: Option<PathBuf>,

    /// Use legacy names even when a lookup URL is configured
    #[arg(long)]
    no_display_names: bool,

    /// Give up on unresolved keys after this long
    #[arg(short, long, default_value = "10s", value_parser = humantime::parse_duration)]
    timeout: Duration,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Agent ids or usernames to resolve
    #[arg(required = true)]
    keys: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("avatar_names={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting avatar-names v{}", env!("CARGO_PKG_VERSION"));

    let mut config = NameCacheConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(url) = cli.lookup_url {
        config.name_lookup_url = Some(url);
    }
    if let Some(path) = cli.cache_file {
        config.cache_file = Some(path);
    }
    if let Some(path) = cli.legacy_names {
        config.legacy_names_file = Some(path);
    }
    if cli.no_display_names {
        config.use_display_names = false;
    }
    config.validate()?;

    let store = config.cache_file.clone().map(PersistentStore::new);
    let transport = HttpLookupTransport::new(config.request_timeout)?;
    let legacy = LegacyDirectory::new();
    if let Some(path) = &config.legacy_names_file {
        legacy
            .load_file(path)
            .with_context(|| format!("Failed to read legacy names from {}", path.display()))?;
    }
    let mut cache = NameCache::new(config, Box::new(transport), Box::new(legacy));

    if let Some(store) = &store
        && let Some(document) = store.load().context("Failed to read stored names")?
    {
        cache.import(document);
    }

    let wanted: BTreeSet<NameKey> = cli.keys.iter().map(|key| NameKey::parse_any(key)).collect();
    let resolved: Arc<Mutex<BTreeMap<NameKey, NameRecord>>> = Arc::default();

    for key in &wanted {
        let resolved = resolved.clone();
        cache.get_key_with(key, move |key, record| {
            resolved
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key.clone(), record.clone());
        });
    }

    let deadline = tokio::time::Instant::now() + cli.timeout;
    let mut interval = tokio::time::interval(Duration::from_millis(100));
    loop {
        interval.tick().await;
        cache.tick();

        let done = resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
            >= wanted.len();
        if done || tokio::time::Instant::now() >= deadline {
            break;
        }
    }

    let resolved = resolved.lock().unwrap_or_else(PoisonError::into_inner).clone();
    for key in &wanted {
        match resolved.get(key) {
            Some(record) => println!(
                "{}\t{}\t{}{}",
                key,
                record.agent_id,
                record.complete_name(),
                if record.is_temporary { "\t(legacy)" } else { "" }
            ),
            None => {
                warn!("No name resolved for {} within {:?}", key, cli.timeout);
                println!("{key}\t-\tunresolved");
            }
        }
    }

    if let Some(store) = &store {
        store
            .save(&cache.export())
            .context("Failed to write stored names")?;
    }

    cache.shutdown();
    Ok(())
}
