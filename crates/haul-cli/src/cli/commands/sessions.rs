//! `haul sessions` – list recorded upload sessions.

use anyhow::Result;
use haul_core::store::SessionStore;

pub async fn run_sessions(store: &SessionStore) -> Result<()> {
    let records = store.list().await?;
    if records.is_empty() {
        println!("No upload sessions recorded.");
        return Ok(());
    }
    println!(
        "{:<24} {:<10} {:<9} {:<12} {}",
        "SESSION", "STATUS", "PARTS", "SIZE", "PATH"
    );
    for r in records {
        let session = r.to_session();
        println!(
            "{:<24} {:<10} {:<9} {:<12} {}",
            r.session_id,
            r.status.as_str(),
            format!("{}/{}", r.parts_committed, session.part_count()),
            r.total_size,
            r.source_path.display()
        );
    }
    Ok(())
}
