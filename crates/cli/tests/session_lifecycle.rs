//! End-to-end session lifecycle scenario (spec §8: "`Delete(name)` followed
//! by `List` omits the session and `Get` fails cleanly").

use codeagent_domain::session::SessionRef;
use codeagent_store::SessionStore;

const APP_NAME: &str = "codeagent";
const USER_ID: &str = "local";

#[test]
fn new_session_appears_in_list_and_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("sessions.db");

    {
        let store = SessionStore::open(&db_path).unwrap();
        store.create(APP_NAME, USER_ID, "foo").unwrap();
    }

    let store = SessionStore::open(&db_path).unwrap();
    let sessions = store.list(APP_NAME, USER_ID).unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, "foo");
}

#[test]
fn delete_session_removes_it_from_list_and_get() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("sessions.db");
    let store = SessionStore::open(&db_path).unwrap();

    store.create(APP_NAME, USER_ID, "foo").unwrap();
    let session_ref = SessionRef::new(APP_NAME, USER_ID, "foo");

    store.delete(&session_ref).unwrap();

    let sessions = store.list(APP_NAME, USER_ID).unwrap();
    assert!(sessions.is_empty());
    assert!(store.get(&session_ref).unwrap().is_none());
}
