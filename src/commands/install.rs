// ABOUTME: Install command implementation.
// ABOUTME: Turns install flags into an InstallSpec, resolves the tag and runs the provider's install.

use keel::config::{
    self, BackupPolicy, CacheConfig, CacheEngine, DatabaseMode, DbEngine, RecordStore,
    StorageConfig, StorageKind,
};
use keel::error::{Error, Result};
use keel::health;
use keel::output::Output;
use keel::provider::{self, InstallSpec, ProviderContext};
use keel::registry::{FeedClient, RegistryClient};
use keel::types::{Channel, DeploymentName, ImageRef};
use std::collections::BTreeMap;

use super::backend::report_warnings;
use crate::cli::{CacheArg, DatabaseEngineArg, InstallArgs, StorageArg};

fn storage_settings(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(Error::InvalidArgument(format!(
                "storage setting '{pair}' must look like KEY=VALUE"
            ))),
        })
        .collect()
}

fn database(args: &InstallArgs) -> DatabaseMode {
    match &args.database_url {
        Some(url) => DatabaseMode::External { url: url.clone() },
        None => DatabaseMode::Bundled {
            engine: match args.database_engine {
                DatabaseEngineArg::Mariadb => DbEngine::Mariadb,
                DatabaseEngineArg::Postgres => DbEngine::Postgres,
            },
        },
    }
}

fn cache(args: &InstallArgs) -> CacheConfig {
    let engine = match (args.cache, &args.redis_url) {
        (_, Some(_)) | (CacheArg::Redis, None) => CacheEngine::Redis,
        (CacheArg::Apcu, None) => CacheEngine::Apcu,
    };
    CacheConfig {
        engine,
        redis_url: args.redis_url.clone(),
    }
}

fn storage(args: &InstallArgs) -> Result<StorageConfig> {
    Ok(StorageConfig {
        kind: match args.storage {
            StorageArg::Local => StorageKind::Local,
            StorageArg::S3 => StorageKind::S3,
            StorageArg::Azure => StorageKind::Azure,
        },
        settings: storage_settings(&args.storage_settings)?,
    })
}

/// Tag from `--tag`, else from the image reference, else the newest release on the channel.
async fn resolve_tag(args: &InstallArgs, image: &ImageRef, channel: Channel) -> Result<String> {
    if let Some(tag) = args.tag.as_deref().or(image.tag()) {
        return Ok(tag.to_string());
    }
    let registry = RegistryClient::new(FeedClient::from_env()?);
    let release = registry
        .latest(channel)
        .await?
        .ok_or_else(|| Error::NoRelease(channel.to_string()))?;
    Ok(release.tag)
}

pub async fn install(
    store: &RecordStore,
    name: Option<DeploymentName>,
    args: InstallArgs,
    mut output: Output,
) -> Result<()> {
    output.start_timer();

    let name = name.unwrap_or_default();
    let channel: Channel = args.channel.parse()?;
    let image = ImageRef::parse(&args.image)?;
    let tag = resolve_tag(&args, &image, channel).await?;

    let spec = InstallSpec {
        name: name.clone(),
        channel,
        image: image.repository(),
        tag,
        domain: args.domain.trim().to_string(),
        database: database(&args),
        storage: storage(&args)?,
        cache: cache(&args),
        backup: BackupPolicy {
            enabled: !args.no_backups,
            ..BackupPolicy::default()
        },
    };

    let ctx = ProviderContext {
        store: store.clone(),
        name: name.clone(),
        work_dir: config::default_work_dir(&name),
        policy: store.health_policy()?,
        force_lock: args.force,
    };
    let mut backend = provider::create(&args.provider, ctx)?;

    output.progress(&format!("Checking {} prerequisites...", backend.name()));
    for check in backend.prerequisites().await.iter().filter(|c| !c.met) {
        output.warning(&format!("{} not met. {}", check.name, check.hint));
    }

    output.progress(&format!(
        "Installing {}:{} as '{}'...",
        spec.image, spec.tag, spec.name
    ));
    let record = backend.install(&spec).await;
    report_warnings(&mut backend, &output);
    let record = record?;

    output.success(&format!(
        "Installed {} at {}",
        record.image_ref(),
        health::base_url(&record.domain)
    ));
    Ok(())
}
