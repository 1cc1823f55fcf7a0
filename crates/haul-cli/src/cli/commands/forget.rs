//! `haul forget <id>` – drop a session record.

use anyhow::{bail, Result};
use haul_core::store::SessionStore;
use haul_core::upload::SessionId;

pub async fn run_forget(store: &SessionStore, id: &str) -> Result<()> {
    if !store.remove(&SessionId::new(id)).await? {
        bail!("no recorded session {}", id);
    }
    println!("Forgot session {id}");
    Ok(())
}
