// ABOUTME: Update command implementation.
// ABOUTME: Picks the target tag from the registry (or --version), shows the changelog and applies it.

use keel::config::RecordStore;
use keel::error::{Error, Result};
use keel::output::Output;
use keel::registry::{FeedClient, RegistryClient};
use keel::types::{Channel, DeploymentName};
use serde::Serialize;

use super::backend::{confirm, open, report_warnings};

#[derive(Serialize)]
struct UpdateCheck<'a> {
    current: &'a str,
    latest: &'a str,
    channel: Channel,
    available: bool,
}

pub struct UpdateArgs {
    pub channel: Option<String>,
    pub target: Option<String>,
    pub check: bool,
    pub yes: bool,
    pub force: bool,
}

pub async fn update(
    store: &RecordStore,
    name: Option<&DeploymentName>,
    args: UpdateArgs,
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    let (record, mut backend) = open(store, name, args.force)?;

    let channel = match &args.channel {
        Some(c) => c.parse()?,
        None => record.channel,
    };

    let (target, changelog) = match args.target {
        Some(tag) => (tag, String::new()),
        None => {
            let registry = RegistryClient::new(FeedClient::from_env()?);
            let release = registry
                .latest(channel)
                .await?
                .ok_or_else(|| Error::NoRelease(channel.to_string()))?;
            (release.tag, release.changelog)
        }
    };

    if args.check {
        let check = UpdateCheck {
            current: &record.version,
            latest: &target,
            channel,
            available: target != record.version,
        };
        output.data(&check, || {
            if check.available {
                format!("Update available: {} -> {}", record.version, target)
            } else {
                format!("Up to date ({})", record.version)
            }
        });
        return Ok(());
    }

    // Re-applying the recorded tag repairs a drifted stack without asking.
    if target != record.version {
        if !changelog.trim().is_empty() {
            output.progress(&format!("Changes in {}:\n{}\n", target, changelog.trim()));
        }
        confirm(
            &format!("Update '{}' from {} to {}?", record.name, record.version, target),
            args.yes,
            &output,
        )?;
    }

    output.progress(&format!("Updating to {}...", target));
    let result = backend.update(&target).await;
    report_warnings(&mut backend, &output);
    let updated = result?;

    output.success(&format!(
        "Updated '{}' to {} (previous: {})",
        updated.name,
        updated.version,
        updated.previous_version.as_deref().unwrap_or("none")
    ));
    Ok(())
}
