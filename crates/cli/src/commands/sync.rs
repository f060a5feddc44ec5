//! Cart sync commands: reconcile, watch.

use referral_sync::{CartEvents, ReconcileOutcome, SyncConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use url::Url;

use super::{CommandError, build_agent};

/// Sync the stored record to the cart once.
pub async fn reconcile(config: &SyncConfig) -> Result<(), CommandError> {
    let agent = build_agent(config)?;

    match agent.reconcile().await {
        ReconcileOutcome::NoRecord => tracing::info!("No referral record stored"),
        ReconcileOutcome::InSync => tracing::info!("Cart already up to date"),
        ReconcileOutcome::Updated(fields) => {
            tracing::info!(fields = ?fields.names(), "Cart updated");
        }
        ReconcileOutcome::Failed => return Err(CommandError::SyncFailed),
    }
    Ok(())
}

/// Start the agent on `page` and fire one cart notification per stdin line.
///
/// Runs until stdin closes or Ctrl+C.
pub async fn watch(config: &SyncConfig, page: &str) -> Result<(), CommandError> {
    let page = Url::parse(page)?;
    let agent = build_agent(config)?;
    let events = CartEvents::new();

    let handle = agent.start(&events, &page);
    let outcome = handle.startup.await?;
    tracing::info!(?outcome, "Startup reconciliation finished");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(_) => {
                    events.notify();
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    // Closing the bus lets the listener finish once its reconciliations have
    drop(events);
    handle.listener.await?;
    Ok(())
}
