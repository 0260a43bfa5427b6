//! SQLite-backed session store.
//!
//! Schema and contract follow the kernel's event-sourced session model:
//! `sessions`, `events`, `user_states`, `app_states` tables, with
//! `AppendEvent` applying its state-delta atomically alongside the event
//! insert. The API shape (`resolve_or_create`-style lookups, an in-process
//! read-write lock around the backing store) is grounded on the teacher's
//! `SessionStore` in this same crate, but the storage engine itself follows
//! `rusqlite` the way `stencila-stencila`'s Cargo.toml pulls it in, since the
//! teacher's own store was a flat JSON file and the spec requires relational
//! durability with foreign keys and an index.

use std::collections::HashMap;
use std::path::Path;

use codeagent_domain::error::{Error, Result};
use codeagent_domain::event::{Actions, Event, EventPart, UsageMetadata};
use codeagent_domain::session::{Session, SessionRef};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    app_name    TEXT NOT NULL,
    user_id     TEXT NOT NULL,
    id          TEXT NOT NULL,
    state       TEXT NOT NULL DEFAULT '{}',
    create_time INTEGER NOT NULL,
    update_time INTEGER NOT NULL,
    PRIMARY KEY (app_name, user_id, id)
);

CREATE TABLE IF NOT EXISTS events (
    id             TEXT PRIMARY KEY,
    app_name       TEXT NOT NULL,
    user_id        TEXT NOT NULL,
    session_id     TEXT NOT NULL,
    timestamp      INTEGER NOT NULL,
    invocation_id  TEXT NOT NULL,
    author         TEXT NOT NULL,
    branch         TEXT,
    content        TEXT NOT NULL,
    actions        TEXT NOT NULL,
    partial        INTEGER NOT NULL,
    turn_complete  INTEGER NOT NULL,
    error_code     TEXT,
    error_message  TEXT,
    interrupted    INTEGER NOT NULL,
    usage_metadata TEXT,
    FOREIGN KEY (app_name, user_id, session_id) REFERENCES sessions (app_name, user_id, id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_events_session_ts
    ON events (app_name, user_id, session_id, timestamp);

CREATE TABLE IF NOT EXISTS user_states (
    app_name TEXT NOT NULL,
    user_id  TEXT NOT NULL,
    state    TEXT NOT NULL DEFAULT '{}',
    PRIMARY KEY (app_name, user_id)
);

CREATE TABLE IF NOT EXISTS app_states (
    app_name TEXT PRIMARY KEY,
    state    TEXT NOT NULL DEFAULT '{}'
);
"#;

/// A session restored from the store: identity/state plus its full,
/// ascending event log.
pub struct LoadedSession {
    pub session: Session,
    pub events: Vec<Event>,
}

/// Durable, SQLite-backed home for sessions and their event logs.
pub struct SessionStore {
    conn: Mutex<Connection>,
}

impl SessionStore {
    /// Open (creating if absent) the session database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| Error::Store(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| Error::Store(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| Error::Store(e.to_string()))?;
        tracing::info!(path = %path.display(), "session store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, for tests and throwaway sessions.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Store(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| Error::Store(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// `Create(req) → Session`: fresh session, empty state, no events yet.
    pub fn create(&self, app_name: &str, user_id: &str, session_id: &str) -> Result<Session> {
        let session = Session::new(app_name, user_id, session_id);
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (app_name, user_id, id, state, create_time, update_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.app_name,
                session.user_id,
                session.id,
                serde_json::to_string(&session.state).map_err(Error::Json)?,
                session.create_time,
                session.update_time,
            ],
        )
        .map_err(|e| Error::Store(e.to_string()))?;
        Ok(session)
    }

    /// `Get(ref) → Session`: full restoration, events in ascending timestamp
    /// order.
    pub fn get(&self, session_ref: &SessionRef) -> Result<Option<LoadedSession>> {
        let conn = self.conn.lock();
        let session = conn
            .query_row(
                "SELECT state, create_time, update_time FROM sessions
                 WHERE app_name = ?1 AND user_id = ?2 AND id = ?3",
                params![session_ref.app_name, session_ref.user_id, session_ref.session_id],
                |row| {
                    let state_json: String = row.get(0)?;
                    Ok((state_json, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
                },
            )
            .optional()
            .map_err(|e| Error::Store(e.to_string()))?;

        let Some((state_json, create_time, update_time)) = session else {
            return Ok(None);
        };

        let state = serde_json::from_str(&state_json).map_err(Error::Json)?;
        let session = Session {
            app_name: session_ref.app_name.clone(),
            user_id: session_ref.user_id.clone(),
            id: session_ref.session_id.clone(),
            state,
            create_time,
            update_time,
        };

        // `rowid` breaks ties between events stamped in the same millisecond
        // (e.g. a tool_call immediately followed by its tool_result) by
        // insertion order -- `timestamp` alone is not a total order.
        let mut stmt = conn
            .prepare(
                "SELECT id, timestamp, invocation_id, author, branch, content, actions,
                        partial, turn_complete, error_code, error_message, interrupted, usage_metadata
                 FROM events
                 WHERE app_name = ?1 AND user_id = ?2 AND session_id = ?3
                 ORDER BY timestamp ASC, rowid ASC",
            )
            .map_err(|e| Error::Store(e.to_string()))?;

        let events = stmt
            .query_map(
                params![session_ref.app_name, session_ref.user_id, session_ref.session_id],
                row_to_event,
            )
            .map_err(|e| Error::Store(e.to_string()))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Store(e.to_string()))?;

        Ok(Some(LoadedSession { session, events }))
    }

    /// `List(app, user) → []Session`: metadata only, newest first.
    pub fn list(&self, app_name: &str, user_id: &str) -> Result<Vec<Session>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, state, create_time, update_time FROM sessions
                 WHERE app_name = ?1 AND user_id = ?2
                 ORDER BY update_time DESC",
            )
            .map_err(|e| Error::Store(e.to_string()))?;
        let rows = stmt
            .query_map(params![app_name, user_id], |row| {
                let id: String = row.get(0)?;
                let state_json: String = row.get(1)?;
                Ok((id, state_json, row.get::<_, i64>(2)?, row.get::<_, i64>(3)?))
            })
            .map_err(|e| Error::Store(e.to_string()))?;

        let mut sessions = Vec::new();
        for row in rows {
            let (id, state_json, create_time, update_time) =
                row.map_err(|e| Error::Store(e.to_string()))?;
            sessions.push(Session {
                app_name: app_name.to_string(),
                user_id: user_id.to_string(),
                id,
                state: serde_json::from_str(&state_json).map_err(Error::Json)?,
                create_time,
                update_time,
            });
        }
        Ok(sessions)
    }

    /// `Delete(ref)`: removes the session row and all its events in one
    /// transaction (the `events` FK is `ON DELETE CASCADE`, so deleting the
    /// session row is sufficient, but we wrap it explicitly for clarity).
    pub fn delete(&self, session_ref: &SessionRef) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(|e| Error::Store(e.to_string()))?;
        tx.execute(
            "DELETE FROM events WHERE app_name = ?1 AND user_id = ?2 AND session_id = ?3",
            params![session_ref.app_name, session_ref.user_id, session_ref.session_id],
        )
        .map_err(|e| Error::Store(e.to_string()))?;
        let deleted = tx
            .execute(
                "DELETE FROM sessions WHERE app_name = ?1 AND user_id = ?2 AND id = ?3",
                params![session_ref.app_name, session_ref.user_id, session_ref.session_id],
            )
            .map_err(|e| Error::Store(e.to_string()))?;
        tx.commit().map_err(|e| Error::Store(e.to_string()))?;
        if deleted == 0 {
            return Err(Error::Store(format!(
                "no such session: {}/{}/{}",
                session_ref.app_name, session_ref.user_id, session_ref.session_id
            )));
        }
        Ok(())
    }

    /// `AppendEvent(session, event)`: insert the event row and apply its
    /// state-delta to the relevant state row(s), in one transaction. A
    /// partially-applied append is never observable: either both writes land
    /// or neither does.
    pub fn append_event(&self, session_ref: &SessionRef, event: &Event) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(|e| Error::Store(e.to_string()))?;

        let content = serde_json::to_string(&event.content).map_err(Error::Json)?;
        let actions = serde_json::to_string(&event.actions).map_err(Error::Json)?;
        let usage = event
            .usage
            .map(|u| serde_json::to_string(&u))
            .transpose()
            .map_err(Error::Json)?;

        tx.execute(
            "INSERT INTO events (id, app_name, user_id, session_id, timestamp, invocation_id,
                                  author, branch, content, actions, partial, turn_complete,
                                  error_code, error_message, interrupted, usage_metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                event.id,
                session_ref.app_name,
                session_ref.user_id,
                session_ref.session_id,
                event.timestamp,
                event.invocation_id,
                event.author,
                event.branch,
                content,
                actions,
                event.partial,
                event.turn_complete,
                event.error_code,
                event.error_message,
                event.interrupted,
                usage,
            ],
        )
        .map_err(|e| Error::Store(e.to_string()))?;

        if !event.actions.is_empty() {
            apply_state_delta(&tx, session_ref, &event.actions, event.timestamp)?;
        } else {
            tx.execute(
                "UPDATE sessions SET update_time = ?1 WHERE app_name = ?2 AND user_id = ?3 AND id = ?4",
                params![event.timestamp, session_ref.app_name, session_ref.user_id, session_ref.session_id],
            )
            .map_err(|e| Error::Store(e.to_string()))?;
        }

        tx.commit().map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }

    /// `GetState(session) → app_state ⊕ user_state ⊕ session_state`, with
    /// session state winning on key collision.
    pub fn merged_state(&self, session_ref: &SessionRef) -> Result<HashMap<String, serde_json::Value>> {
        let conn = self.conn.lock();

        let app_state: String = conn
            .query_row(
                "SELECT state FROM app_states WHERE app_name = ?1",
                params![session_ref.app_name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::Store(e.to_string()))?
            .unwrap_or_else(|| "{}".to_string());

        let user_state: String = conn
            .query_row(
                "SELECT state FROM user_states WHERE app_name = ?1 AND user_id = ?2",
                params![session_ref.app_name, session_ref.user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::Store(e.to_string()))?
            .unwrap_or_else(|| "{}".to_string());

        let session_state: String = conn
            .query_row(
                "SELECT state FROM sessions WHERE app_name = ?1 AND user_id = ?2 AND id = ?3",
                params![session_ref.app_name, session_ref.user_id, session_ref.session_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::Store(e.to_string()))?
            .unwrap_or_else(|| "{}".to_string());

        let app_state: HashMap<String, serde_json::Value> =
            serde_json::from_str(&app_state).map_err(Error::Json)?;
        let user_state: HashMap<String, serde_json::Value> =
            serde_json::from_str(&user_state).map_err(Error::Json)?;
        let session_state: HashMap<String, serde_json::Value> =
            serde_json::from_str(&session_state).map_err(Error::Json)?;

        let scratch = Session {
            app_name: session_ref.app_name.clone(),
            user_id: session_ref.user_id.clone(),
            id: session_ref.session_id.clone(),
            state: session_state,
            create_time: 0,
            update_time: 0,
        };
        Ok(scratch.merged_state(&app_state, &user_state))
    }

    /// Release the storage handle. A no-op beyond drop today, kept as an
    /// explicit call so callers don't need to know that.
    pub fn close(self) {
        drop(self);
    }
}

/// Applies a state-delta across the three scoped tables it may touch, via
/// [`Session::apply_state_delta`] for the actual routing logic -- this only
/// decides which tables are worth a round trip and writes the result back.
fn apply_state_delta(
    tx: &rusqlite::Transaction<'_>,
    session_ref: &SessionRef,
    actions: &Actions,
    timestamp: i64,
) -> Result<()> {
    use codeagent_domain::event::{classify_key, StateScope};

    let touches = |want: StateScope| actions.state_delta.keys().any(|k| classify_key(k).0 == want);
    let touches_user = touches(StateScope::User);
    let touches_app = touches(StateScope::App);

    let session_state_json: String = tx
        .query_row(
            "SELECT state FROM sessions WHERE app_name = ?1 AND user_id = ?2 AND id = ?3",
            params![session_ref.app_name, session_ref.user_id, session_ref.session_id],
            |row| row.get(0),
        )
        .map_err(|e| Error::Store(e.to_string()))?;
    let mut session = Session {
        app_name: session_ref.app_name.clone(),
        user_id: session_ref.user_id.clone(),
        id: session_ref.session_id.clone(),
        state: serde_json::from_str(&session_state_json).map_err(Error::Json)?,
        create_time: 0,
        update_time: 0,
    };

    let mut app_state: HashMap<String, serde_json::Value> = if touches_app {
        let current: Option<String> = tx
            .query_row(
                "SELECT state FROM app_states WHERE app_name = ?1",
                params![session_ref.app_name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::Store(e.to_string()))?;
        current.map(|s| serde_json::from_str(&s)).transpose().map_err(Error::Json)?.unwrap_or_default()
    } else {
        HashMap::new()
    };

    let mut user_state: HashMap<String, serde_json::Value> = if touches_user {
        let current: Option<String> = tx
            .query_row(
                "SELECT state FROM user_states WHERE app_name = ?1 AND user_id = ?2",
                params![session_ref.app_name, session_ref.user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::Store(e.to_string()))?;
        current.map(|s| serde_json::from_str(&s)).transpose().map_err(Error::Json)?.unwrap_or_default()
    } else {
        HashMap::new()
    };

    session.apply_state_delta(&actions.state_delta, &mut app_state, &mut user_state);

    tx.execute(
        "UPDATE sessions SET state = ?1, update_time = ?2 WHERE app_name = ?3 AND user_id = ?4 AND id = ?5",
        params![
            serde_json::to_string(&session.state).map_err(Error::Json)?,
            timestamp,
            session_ref.app_name,
            session_ref.user_id,
            session_ref.session_id,
        ],
    )
    .map_err(|e| Error::Store(e.to_string()))?;

    if touches_user {
        tx.execute(
            "INSERT INTO user_states (app_name, user_id, state) VALUES (?1, ?2, ?3)
             ON CONFLICT (app_name, user_id) DO UPDATE SET state = excluded.state",
            params![
                session_ref.app_name,
                session_ref.user_id,
                serde_json::to_string(&user_state).map_err(Error::Json)?,
            ],
        )
        .map_err(|e| Error::Store(e.to_string()))?;
    }

    if touches_app {
        tx.execute(
            "INSERT INTO app_states (app_name, state) VALUES (?1, ?2)
             ON CONFLICT (app_name) DO UPDATE SET state = excluded.state",
            params![session_ref.app_name, serde_json::to_string(&app_state).map_err(Error::Json)?],
        )
        .map_err(|e| Error::Store(e.to_string()))?;
    }

    Ok(())
}

fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<Event> {
    let content_json: String = row.get(5)?;
    let actions_json: String = row.get(6)?;
    let usage_json: Option<String> = row.get(12)?;

    let content: Vec<EventPart> = serde_json::from_str(&content_json).unwrap_or_default();
    let actions: Actions = serde_json::from_str(&actions_json).unwrap_or_default();
    let usage: Option<UsageMetadata> = usage_json.and_then(|s| serde_json::from_str(&s).ok());

    Ok(Event {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        invocation_id: row.get(2)?,
        author: row.get(3)?,
        branch: row.get(4)?,
        content,
        actions,
        partial: row.get(7)?,
        turn_complete: row.get(8)?,
        error_code: row.get(9)?,
        error_message: row.get(10)?,
        interrupted: row.get(11)?,
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeagent_domain::event::EventPart;
    use serde_json::json;

    fn store() -> SessionStore {
        SessionStore::open_in_memory().unwrap()
    }

    #[test]
    fn create_then_get_round_trips() {
        let store = store();
        store.create("app", "u1", "s1").unwrap();
        let loaded = store
            .get(&SessionRef::new("app", "u1", "s1"))
            .unwrap()
            .unwrap();
        assert_eq!(loaded.session.id, "s1");
        assert!(loaded.events.is_empty());
    }

    #[test]
    fn get_missing_session_returns_none() {
        let store = store();
        let loaded = store.get(&SessionRef::new("app", "u1", "missing")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn append_event_persists_in_order() {
        let store = store();
        let session_ref = SessionRef::new("app", "u1", "s1");
        store.create("app", "u1", "s1").unwrap();

        let mut e1 = Event::new("inv-1", "user");
        e1.content.push(EventPart::Text { text: "hi".into() });
        e1.timestamp = 100;
        store.append_event(&session_ref, &e1).unwrap();

        let mut e2 = Event::new("inv-1", "model");
        e2.content.push(EventPart::Text { text: "hello".into() });
        e2.timestamp = 200;
        e2.turn_complete = true;
        store.append_event(&session_ref, &e2).unwrap();

        let loaded = store.get(&session_ref).unwrap().unwrap();
        assert_eq!(loaded.events.len(), 2);
        assert_eq!(loaded.events[0].text(), "hi");
        assert_eq!(loaded.events[1].text(), "hello");
        assert!(loaded.events[1].turn_complete);
    }

    #[test]
    fn events_with_equal_timestamps_keep_insertion_order() {
        let store = store();
        let session_ref = SessionRef::new("app", "u1", "s1");
        store.create("app", "u1", "s1").unwrap();

        let mut call = Event::new("inv-1", "model");
        call.content.push(EventPart::Text { text: "tool_call".into() });
        call.timestamp = 500;
        store.append_event(&session_ref, &call).unwrap();

        let mut result = Event::new("inv-1", "tool");
        result.content.push(EventPart::Text { text: "tool_result".into() });
        result.timestamp = 500;
        store.append_event(&session_ref, &result).unwrap();

        let loaded = store.get(&session_ref).unwrap().unwrap();
        assert_eq!(loaded.events.len(), 2);
        assert_eq!(loaded.events[0].text(), "tool_call");
        assert_eq!(loaded.events[1].text(), "tool_result");
    }

    #[test]
    fn append_event_applies_scoped_state_delta() {
        let store = store();
        let session_ref = SessionRef::new("app", "u1", "s1");
        store.create("app", "u1", "s1").unwrap();

        let mut event = Event::new("inv-1", "model");
        event
            .actions
            .state_delta
            .insert("count".to_string(), json!(1));
        event
            .actions
            .state_delta
            .insert("user:name".to_string(), json!("ana"));
        event
            .actions
            .state_delta
            .insert("app:theme".to_string(), json!("dark"));
        store.append_event(&session_ref, &event).unwrap();

        let merged = store.merged_state(&session_ref).unwrap();
        assert_eq!(merged.get("count"), Some(&json!(1)));
        assert_eq!(merged.get("name"), Some(&json!("ana")));
        assert_eq!(merged.get("theme"), Some(&json!("dark")));
    }

    #[test]
    fn session_state_wins_merge_conflict() {
        let store = store();
        let session_ref = SessionRef::new("app", "u1", "s1");
        store.create("app", "u1", "s1").unwrap();

        let mut app_event = Event::new("inv-1", "model");
        app_event
            .actions
            .state_delta
            .insert("app:theme".to_string(), json!("light"));
        store.append_event(&session_ref, &app_event).unwrap();

        let mut session_event = Event::new("inv-1", "model");
        session_event
            .actions
            .state_delta
            .insert("theme".to_string(), json!("dark"));
        store.append_event(&session_ref, &session_event).unwrap();

        let merged = store.merged_state(&session_ref).unwrap();
        assert_eq!(merged.get("theme"), Some(&json!("dark")));
    }

    #[test]
    fn delete_removes_session_and_events() {
        let store = store();
        let session_ref = SessionRef::new("app", "u1", "s1");
        store.create("app", "u1", "s1").unwrap();
        store.append_event(&session_ref, &Event::new("inv-1", "user")).unwrap();

        store.delete(&session_ref).unwrap();
        assert!(store.get(&session_ref).unwrap().is_none());
    }

    #[test]
    fn delete_missing_session_errors() {
        let store = store();
        let err = store.delete(&SessionRef::new("app", "u1", "missing"));
        assert!(err.is_err());
    }

    #[test]
    fn list_orders_by_update_time_descending() {
        let store = store();
        store.create("app", "u1", "s1").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        store.create("app", "u1", "s2").unwrap();

        let sessions = store.list("app", "u1").unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, "s2");
    }
}
