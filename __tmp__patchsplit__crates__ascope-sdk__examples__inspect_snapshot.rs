//! Lists and prints persisted snapshots for a project without starting a
//! live watch:
//!
//! ```text
//! cargo run -p ascope-sdk --example inspect_snapshot -- <project-hash>
//! ```

use ascope_sdk::{AscopeClient, Result};

fn main() -> Result<()> {
    let project_hash = std::env::args().nth(1).expect("usage: inspect_snapshot <project-hash>");

    let client = AscopeClient::connect_default()?;
    let store = client.snapshot_store();

    let sessions = store.list_sessions(&project_hash)?;
    if sessions.is_empty() {
        println!("no snapshots under {project_hash} ({})", store.root().display());
        return Ok(());
    }

    for session_id in sessions {
        let snapshot = store.require(&project_hash, &session_id)?;
        println!(
            "{session_id} [{}] updated {} ({} tracked file offsets)",
            snapshot.provider_id,
            snapshot.updated_at,
            snapshot.file_offsets.len()
        );
    }

    Ok(())
}


