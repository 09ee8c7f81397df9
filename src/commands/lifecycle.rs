// ABOUTME: Status, logs, backup, restore, rollback and destroy commands.
// ABOUTME: Each resolves the deployment, calls one provider operation and reports the outcome.

use futures::StreamExt;
use keel::config::RecordStore;
use keel::error::Result;
use keel::output::{Output, OutputMode};
use keel::provider::{self, DeploymentStatus, ProviderContext};
use keel::types::DeploymentName;
use std::path::PathBuf;

use super::backend::{confirm, open, report_warnings};

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn describe_status(status: &DeploymentStatus) -> String {
    let mut lines = vec![
        format!("Deployment: {}", status.name),
        format!("Provider:   {}", status.provider),
        format!("Domain:     {}", status.domain),
        format!("Channel:    {}", status.channel),
        format!("Version:    {}", status.version),
    ];
    if let Some(reported) = status
        .reported_version
        .as_deref()
        .filter(|v| *v != status.version)
    {
        lines.push(format!("Reported:   {}", reported));
    }
    lines.push(format!("Running:    {}", yes_no(status.running)));
    lines.push(format!("Healthy:    {}", yes_no(status.healthy)));
    lines.push(format!("Database:   {}", yes_no(status.db_connected)));
    lines.push(format!("Cache:      {}", yes_no(status.cache_ok)));
    if let Some(uptime) = &status.uptime {
        lines.push(format!("Uptime:     {}", uptime));
    }
    lines.push(format!(
        "Last backup: {}",
        status
            .last_backup
            .as_ref()
            .map(|b| b.to_string())
            .unwrap_or_else(|| "never".to_string())
    ));
    lines.push(format!(
        "Updated:    {}",
        status.last_update.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    lines.join("\n")
}

pub async fn status(store: &RecordStore, name: Option<&DeploymentName>, output: Output) -> Result<()> {
    let (_, backend) = open(store, name, false)?;
    let status = backend.status().await?;
    output.data(&status, || describe_status(&status));
    Ok(())
}

pub async fn logs(
    store: &RecordStore,
    name: Option<&DeploymentName>,
    follow: bool,
) -> Result<()> {
    let (_, backend) = open(store, name, false)?;
    let mut lines = backend.logs(follow).await?;
    while let Some(line) = lines.next().await {
        println!("{}", line?);
    }
    Ok(())
}

pub async fn backup(
    store: &RecordStore,
    name: Option<&DeploymentName>,
    force: bool,
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    let (record, mut backend) = open(store, name, force)?;

    output.progress(&format!("Backing up '{}'...", record.name));
    let result = backend.backup().await;
    report_warnings(&mut backend, &output);
    let artifact = result?;

    output.success(&format!(
        "Created backup {} ({} bytes) at {}",
        artifact.id,
        artifact.size,
        artifact.path.display()
    ));
    Ok(())
}

pub async fn backups(store: &RecordStore, name: Option<&DeploymentName>, output: Output) -> Result<()> {
    let (_, backend) = open(store, name, false)?;
    let artifacts = backend.list_backups().await?;

    output.data(&artifacts, || {
        if artifacts.is_empty() {
            return "No backups".to_string();
        }
        artifacts
            .iter()
            .rev()
            .map(|a| format!("{}  {:>12} bytes  {}", a.id, a.size, a.path.display()))
            .collect::<Vec<_>>()
            .join("\n")
    });
    Ok(())
}

pub async fn restore(
    store: &RecordStore,
    name: Option<&DeploymentName>,
    id: &str,
    yes: bool,
    force: bool,
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    let (record, mut backend) = open(store, name, force)?;

    confirm(
        &format!("Replace the database of '{}' with backup {}?", record.name, id),
        yes,
        &output,
    )?;

    output.progress(&format!("Restoring {}...", id));
    let result = backend.restore(id).await;
    report_warnings(&mut backend, &output);
    result?;

    output.success(&format!("Restored '{}' from {}", record.name, id));
    Ok(())
}

pub async fn rollback(
    store: &RecordStore,
    name: Option<&DeploymentName>,
    yes: bool,
    force: bool,
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    let (record, mut backend) = open(store, name, force)?;

    let target = record
        .previous_version
        .as_deref()
        .unwrap_or("the previous version");
    confirm(
        &format!("Roll '{}' back from {} to {}?", record.name, record.version, target),
        yes,
        &output,
    )?;

    output.progress("Rolling back...");
    let result = backend.rollback().await;
    report_warnings(&mut backend, &output);
    let restored = result?;

    output.success(&format!("Rolled '{}' back to {}", restored.name, restored.version));
    Ok(())
}

pub async fn destroy(
    store: &RecordStore,
    name: Option<&DeploymentName>,
    yes: bool,
    force: bool,
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    let (record, mut backend) = open(store, name, force)?;

    confirm(
        &format!(
            "Destroy '{}'? Containers and volumes are removed; backups in {} are kept.",
            record.name,
            record.work_dir.display()
        ),
        yes,
        &output,
    )?;

    output.progress(&format!("Destroying '{}'...", record.name));
    let result = backend.destroy().await;
    report_warnings(&mut backend, &output);
    result?;

    output.success(&format!("Destroyed '{}'", record.name));
    Ok(())
}

pub async fn prereqs(store: &RecordStore, provider_id: &str, output: Output) -> Result<()> {
    let name = DeploymentName::default();
    let ctx = ProviderContext {
        store: store.clone(),
        work_dir: keel::config::default_work_dir(&name),
        name,
        policy: store.health_policy()?,
        force_lock: false,
    };
    let backend = provider::create(provider_id, ctx)?;
    let checks = backend.prerequisites().await;

    output.data(&checks, || {
        let mut lines = vec![format!(
            "{} ({})",
            backend.name(),
            if backend.detect() { "detected" } else { "not detected" }
        )];
        for check in &checks {
            let mark = if check.met { "ok" } else { "missing" };
            lines.push(format!("  [{}] {} - {}", mark, check.name, check.description));
            if !check.met {
                lines.push(format!("        {}", check.hint));
            }
        }
        lines.join("\n")
    });

    if output.mode() != OutputMode::Json && checks.iter().any(|c| !c.met) {
        output.warning("some prerequisites are not met; operations may fail");
    }
    Ok(())
}

pub fn config_show(store: &RecordStore, name: Option<&DeploymentName>, output: Output) -> Result<()> {
    let record = store.resolve(name)?;
    let yaml = serde_yaml::to_string(&record)?;
    output.data(&record, || yaml.trim_end().to_string());
    Ok(())
}

pub fn config_path(store: &RecordStore, output: Output) -> Result<()> {
    let path: PathBuf = store.path().to_path_buf();
    output.data(&path, || path.display().to_string());
    Ok(())
}

pub fn version(output: Output) -> Result<()> {
    #[derive(serde::Serialize)]
    struct VersionInfo {
        version: &'static str,
        platform: String,
    }

    let info = VersionInfo {
        version: keel::selfupdate::VERSION,
        platform: keel::selfupdate::Platform::current().asset_name(),
    };
    output.data(&info, || format!("keel {} ({})", info.version, info.platform));
    Ok(())
}
