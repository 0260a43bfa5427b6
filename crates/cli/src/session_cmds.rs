//! The `new-session` / `list-sessions` / `delete-session` subcommands (spec
//! §6), implemented directly against the Session Store's `Create`/`List`/
//! `Delete` contract (spec §4.3) — there's no gateway process to route
//! through, so these run synchronously against the on-disk store and exit.

use codeagent_domain::session::SessionRef;
use codeagent_store::SessionStore;

use crate::{APP_NAME, USER_ID};

pub fn new_session(store: &SessionStore, name: &str) -> anyhow::Result<()> {
    store.create(APP_NAME, USER_ID, name).map_err(|e| anyhow::anyhow!("creating session '{name}': {e}"))?;
    println!("created session: {name}");
    Ok(())
}

pub fn list_sessions(store: &SessionStore) -> anyhow::Result<()> {
    let sessions = store.list(APP_NAME, USER_ID).map_err(|e| anyhow::anyhow!("listing sessions: {e}"))?;
    if sessions.is_empty() {
        println!("no sessions");
        return Ok(());
    }
    for session in sessions {
        let session_ref = session.session_ref();
        let event_count = store
            .get(&session_ref)
            .map_err(|e| anyhow::anyhow!("loading session '{}': {e}", session.id))?
            .map(|loaded| loaded.events.len())
            .unwrap_or(0);
        println!("{}  ({event_count} events)", session.id);
    }
    Ok(())
}

pub fn delete_session(store: &SessionStore, name: &str) -> anyhow::Result<()> {
    let session_ref = SessionRef::new(APP_NAME, USER_ID, name);
    store.delete(&session_ref).map_err(|e| anyhow::anyhow!("deleting session '{name}': {e}"))?;
    println!("deleted session: {name}");
    Ok(())
}
