//! Local record commands: capture, show, clear.
//!
//! None of these touch the network.

use referral_sync::{CaptureOutcome, SyncConfig};
use url::Url;

use super::{CommandError, build_agent};

/// Merge the identifiers on `page` into the stored record.
pub fn capture(config: &SyncConfig, page: &str) -> Result<(), CommandError> {
    let page = Url::parse(page)?;
    let agent = build_agent(config)?;

    match agent.capture(&page) {
        CaptureOutcome::Stored(record) => tracing::info!(
            landing_page = %record.landing_page,
            "Referral record stored"
        ),
        CaptureOutcome::Empty => tracing::info!("No referral parameters on {page}"),
        CaptureOutcome::NotPersisted => {
            return Err(CommandError::NotPersisted(
                config.storage_dir.display().to_string(),
            ));
        }
    }
    Ok(())
}

/// Print the stored record as JSON, or `null` when there is none.
#[allow(clippy::print_stdout)]
pub fn show(config: &SyncConfig) -> Result<(), CommandError> {
    let agent = build_agent(config)?;
    let record = agent.read_record();
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Remove the stored record.
pub fn clear(config: &SyncConfig) -> Result<(), CommandError> {
    let agent = build_agent(config)?;
    agent.clear();
    tracing::info!("Referral record cleared");
    Ok(())
}
