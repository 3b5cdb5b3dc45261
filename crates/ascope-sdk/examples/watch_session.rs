//! Watches every enabled provider under a project hash and prints each
//! monitor event as it arrives. Plain diagnostic output, no UI:
//!
//! ```text
//! cargo run -p ascope-sdk --example watch_session -- <project-hash>
//! ```

use ascope_sdk::{AscopeClient, MonitorEvent};
use futures::StreamExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let project_hash = std::env::args().nth(1).ok_or("usage: watch_session <project-hash>")?;

    let client = AscopeClient::connect_default()?;
    let mut stream = client.watch(&project_hash)?;

    while let Some(event) = stream.next().await {
        match event {
            MonitorEvent::SessionDiscovered { session_id, provider_id, path } => {
                println!("discovered {session_id} ({provider_id}) at {}", path.display());
            }
            MonitorEvent::PhaseChanged { session_id, phase } => {
                println!("{session_id} -> {phase:?}");
            }
            MonitorEvent::Updated { session_id, aggregator } => {
                println!(
                    "{session_id}: {} events, {} turns, {} tool calls",
                    aggregator.event_count,
                    aggregator.turn_count,
                    aggregator.tools.pending.len()
                );
            }
            MonitorEvent::Rotated { old_path, new_path } => {
                println!("rotated {} -> {}", old_path.display(), new_path.display());
            }
            MonitorEvent::CycleDetected(cycle) => {
                println!("{}: repeating tool-call pattern (window {})", cycle.session_id, cycle.window);
            }
            MonitorEvent::QuotaUpdate { session_id, quota } => {
                println!("{session_id}: quota {}/{} remaining {}", quota.used, quota.limit, quota.remaining());
            }
            MonitorEvent::Error { session_id, message } => {
                eprintln!("error ({session_id:?}): {message}");
            }
        }
    }

    Ok(())
}
