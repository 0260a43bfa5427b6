//! Session identity and state-scope merging (spec §3, §4.3).
//!
//! Grounded on the shape of the teacher's `sessions::store::SessionEntry`
//! (an `{app_name, user_id, id, state, ...}` record addressed by three keys)
//! but restructured around the explicit `app_state`/`user_state`/
//! `session_state` split the spec requires instead of a single flat map.

use crate::event::{classify_key, StateScope};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The three-part key that addresses a session: which app, which user,
/// which conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionRef {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
}

impl SessionRef {
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

/// A session's identity plus its own (session-scoped) state and metadata.
/// `app_state`/`user_state` are not stored here — they live in the store's
/// `app_states`/`user_states` tables and are merged in at read time via
/// [`Session::merged_state`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub app_name: String,
    pub user_id: String,
    pub id: String,
    #[serde(default)]
    pub state: HashMap<String, serde_json::Value>,
    pub create_time: i64,
    pub update_time: i64,
}

impl Session {
    pub fn new(app_name: impl Into<String>, user_id: impl Into<String>, id: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            id: id.into(),
            state: HashMap::new(),
            create_time: now,
            update_time: now,
        }
    }

    pub fn session_ref(&self) -> SessionRef {
        SessionRef::new(self.app_name.clone(), self.user_id.clone(), self.id.clone())
    }

    /// Merge `app_state ⊕ user_state ⊕ session_state` into the single view
    /// a Runner hands to a provider adapter, later scopes winning on
    /// collision (spec §4.3: "Merged view").
    pub fn merged_state(
        &self,
        app_state: &HashMap<String, serde_json::Value>,
        user_state: &HashMap<String, serde_json::Value>,
    ) -> HashMap<String, serde_json::Value> {
        let mut merged = app_state.clone();
        merged.extend(user_state.clone());
        merged.extend(self.state.clone());
        merged
    }

    /// Apply a state-delta's entries to the three scoped maps it touches,
    /// per key prefix. `temp:` keys are intentionally dropped here — they
    /// must never reach a store.
    pub fn apply_state_delta(
        &mut self,
        delta: &HashMap<String, serde_json::Value>,
        app_state: &mut HashMap<String, serde_json::Value>,
        user_state: &mut HashMap<String, serde_json::Value>,
    ) {
        for (key, value) in delta {
            let (scope, bare) = classify_key(key);
            match scope {
                StateScope::Session => {
                    self.state.insert(bare.to_string(), value.clone());
                }
                StateScope::User => {
                    user_state.insert(bare.to_string(), value.clone());
                }
                StateScope::App => {
                    app_state.insert(bare.to_string(), value.clone());
                }
                StateScope::Temp => {}
            }
        }
        self.update_time = chrono::Utc::now().timestamp_millis();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merged_state_later_scopes_win() {
        let mut session = Session::new("app", "u1", "s1");
        session.state.insert("theme".into(), json!("dark"));
        let app_state = HashMap::from([("theme".to_string(), json!("light"))]);
        let user_state = HashMap::new();
        let merged = session.merged_state(&app_state, &user_state);
        assert_eq!(merged.get("theme"), Some(&json!("dark")));
    }

    #[test]
    fn apply_state_delta_routes_by_prefix() {
        let mut session = Session::new("app", "u1", "s1");
        let mut app_state = HashMap::new();
        let mut user_state = HashMap::new();
        let delta = HashMap::from([
            ("count".to_string(), json!(1)),
            ("user:name".to_string(), json!("ana")),
            ("app:theme".to_string(), json!("dark")),
            ("temp:scratch".to_string(), json!("discarded")),
        ]);
        session.apply_state_delta(&delta, &mut app_state, &mut user_state);

        assert_eq!(session.state.get("count"), Some(&json!(1)));
        assert_eq!(user_state.get("name"), Some(&json!("ana")));
        assert_eq!(app_state.get("theme"), Some(&json!("dark")));
        assert!(!session.state.contains_key("scratch"));
        assert!(!user_state.contains_key("scratch"));
        assert!(!app_state.contains_key("scratch"));
    }
}
