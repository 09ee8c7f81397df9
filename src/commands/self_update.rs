// ABOUTME: Self-update command implementation.
// ABOUTME: Replaces the running keel binary with the newest verified installer release.

use keel::diagnostics::Diagnostics;
use keel::error::Result;
use keel::output::Output;
use keel::registry::FeedClient;
use keel::selfupdate::{UpdateOutcome, Updater};

pub async fn self_update(mut output: Output) -> Result<()> {
    output.start_timer();
    let updater = Updater::new(FeedClient::from_env()?);
    let mut diag = Diagnostics::default();

    output.progress(&format!(
        "Checking for a newer keel (current: {})...",
        updater.current_version()
    ));
    let outcome = updater.perform(&mut diag).await;

    for warning in diag.take() {
        output.warning(&warning.message);
    }

    match outcome? {
        UpdateOutcome::DevBuild => {
            output.success("Development build; self-update is disabled");
        }
        UpdateOutcome::UpToDate { current } => {
            output.success(&format!("keel {} is up to date", current));
        }
        UpdateOutcome::Updated {
            from,
            to,
            path,
            verified,
        } => {
            if !verified {
                output.warning("release published no checksums; the download was not verified");
            }
            output.success(&format!(
                "Updated keel {} -> {} at {}",
                from,
                to,
                path.display()
            ));
        }
    }
    Ok(())
}
