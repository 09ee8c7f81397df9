// ABOUTME: Shared helper for resolving a deployment record and constructing its backend.
// ABOUTME: Also drains backend warnings into the output and asks for confirmation.

use keel::config::{DeploymentRecord, RecordStore};
use keel::error::{Error, Result};
use keel::output::{Output, OutputMode};
use keel::provider::{self, Backend, ProviderContext};
use keel::types::DeploymentName;
use std::io::{BufRead, IsTerminal, Write};

/// Parse the `--name` flag.
pub fn parse_name(name: Option<&str>) -> Result<Option<DeploymentName>> {
    name.map(DeploymentName::new).transpose().map_err(Error::from)
}

/// Resolve the addressed deployment and build the backend recorded for it.
pub fn open(
    store: &RecordStore,
    name: Option<&DeploymentName>,
    force_lock: bool,
) -> Result<(DeploymentRecord, Backend)> {
    let record = store.resolve(name)?;
    let ctx = ProviderContext {
        store: store.clone(),
        name: record.name.clone(),
        work_dir: record.work_dir.clone(),
        policy: store.health_policy()?,
        force_lock,
    };
    let backend = provider::create(&record.provider, ctx)?;
    Ok((record, backend))
}

/// Print warnings the backend collected as non-fatal.
pub fn report_warnings(backend: &mut Backend, output: &Output) {
    for warning in backend.take_warnings() {
        output.warning(&warning.message);
    }
}

/// Ask a yes/no question; `--yes` answers for the operator.
///
/// Without a terminal there is nobody to ask, so the operation is refused.
pub fn confirm(prompt: &str, yes: bool, output: &Output) -> Result<()> {
    if yes {
        return Ok(());
    }
    if output.mode() == OutputMode::Json || !std::io::stdin().is_terminal() {
        return Err(Error::InvalidArgument(
            "confirmation required; pass --yes to proceed".to_string(),
        ));
    }

    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;

    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Ok(()),
        _ => Err(Error::Aborted),
    }
}
