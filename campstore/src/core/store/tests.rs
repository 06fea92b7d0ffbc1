use super::*;
use crate::core::ErrorKind;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn fields(value: Value) -> Fields {
    value.as_object().cloned().unwrap()
}

fn applicant(email: &str) -> Fields {
    fields(json!({"first_name": "Awa", "last_name": "Diop", "email": email}))
}

fn memory_store() -> RecordStore<MemoryBackend> {
    RecordStore::open(CollectionSpec::applicants(), MemoryBackend::new()).unwrap()
}

fn file_store(dir: &Path) -> RecordStore<JsonFileBackend> {
    let backend = JsonFileBackend::new(dir, "applicants").unwrap();
    RecordStore::open(CollectionSpec::applicants(), backend).unwrap()
}

#[test]
fn test_create_assigns_sequential_ids_and_default_status() {
    let store = memory_store();

    let first = store.create(applicant("a@b.co")).unwrap();
    let second = store.create(applicant("c@d.co")).unwrap();

    assert_eq!(first.id, "STU0001");
    assert_eq!(second.id, "STU0002");
    assert_eq!(first.status, "pending");
    assert!(first.status_changed_at.is_none());
    assert_eq!(store.name(), "applicants");
    assert_eq!(store.len(), 2);
    assert_eq!(store.backend().committed_records().len(), 2);
    assert_eq!(store.backend().committed_next_seq(), Some(3));
}

#[test]
fn test_create_ignores_system_fields() {
    let store = memory_store();
    let mut input = applicant("a@b.co");
    input.insert("id".into(), json!("STU9999"));
    input.insert("status".into(), json!("confirmed"));

    let record = store.create(input).unwrap();
    assert_eq!(record.id, "STU0001");
    assert_eq!(record.status, "pending");
    assert!(record.field("id").is_none());
}

#[test]
fn test_duplicate_email_is_case_insensitive() {
    let store = memory_store();
    store.create(applicant("Awa@Example.com")).unwrap();

    let err = store.create(applicant("  awa@example.COM ")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateKey);
    assert_eq!(store.len(), 1);
    assert_eq!(store.backend().commit_count(), 1);
}

#[test]
fn test_missing_identity_field_is_invalid_input() {
    let store = memory_store();

    let err = store.create(fields(json!({"first_name": "Awa"}))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = store.create(fields(json!({"email": 42}))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(store.is_empty());
}

#[test]
fn test_collection_without_unique_field_accepts_repeats() {
    let store = RecordStore::open(CollectionSpec::messages(), MemoryBackend::new()).unwrap();
    let message = fields(json!({"email": "a@b.co", "message": "Hello there!"}));

    let first = store.create(message.clone()).unwrap();
    let second = store.create(message).unwrap();
    assert_eq!(first.id, "MSG0001");
    assert_eq!(second.id, "MSG0002");
    assert_eq!(second.status, "new");
}

#[test]
fn test_get_and_list() {
    let store = memory_store();
    let created = store.create(applicant("a@b.co")).unwrap();
    store.create(applicant("c@d.co")).unwrap();

    assert_eq!(store.get("STU0001").unwrap(), created);
    assert_eq!(store.get("STU0404").unwrap_err().kind(), ErrorKind::NotFound);

    let ids: Vec<_> = store
        .list_by(&SortKey::Id, SortOrder::Ascending)
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, ["STU0001", "STU0002"]);
    assert_eq!(store.list().len(), 2);
}

#[test]
fn test_update_status_stamps_change_time() {
    let store = memory_store();
    let record = store.create(applicant("a@b.co")).unwrap();

    // Same status: nothing to stamp
    let same = store.update(&record.id, Patch::status("pending")).unwrap();
    assert!(same.status_changed_at.is_none());

    let confirmed = store.update(&record.id, Patch::status("confirmed")).unwrap();
    assert_eq!(confirmed.status, "confirmed");
    assert!(confirmed.status_changed_at.unwrap() >= confirmed.created_at);
    assert_eq!(confirmed.created_at, record.created_at);
    assert_eq!(store.get(&record.id).unwrap(), confirmed);
}

#[test]
fn test_update_rejects_unknown_status_and_system_fields() {
    let store = memory_store();
    let record = store.create(applicant("a@b.co")).unwrap();

    let err = store.update(&record.id, Patch::status("approved")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);

    let err = store
        .update(&record.id, Patch::default().field("created_at", "2020-01-01T00:00:00Z"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);

    let err = store.update("STU0404", Patch::status("confirmed")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert_eq!(store.get(&record.id).unwrap(), record);
}

#[test]
fn test_update_fields_respects_uniqueness() {
    let store = memory_store();
    let first = store.create(applicant("a@b.co")).unwrap();
    store.create(applicant("c@d.co")).unwrap();

    let err = store
        .update(&first.id, Patch::default().field("email", "C@D.co"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateKey);

    // Changing the case of its own address is fine
    let updated = store
        .update(&first.id, Patch::default().field("email", "A@B.co").field("city", "Dakar"))
        .unwrap();
    assert_eq!(updated.str_field("email"), Some("A@B.co"));
    assert_eq!(updated.str_field("city"), Some("Dakar"));
}

#[test]
fn test_delete_never_reuses_ids() {
    let store = memory_store();
    store.create(applicant("a@b.co")).unwrap();
    let second = store.create(applicant("c@d.co")).unwrap();

    store.delete(&second.id).unwrap();
    assert_eq!(store.get(&second.id).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(store.delete(&second.id).unwrap_err().kind(), ErrorKind::NotFound);

    let third = store.create(applicant("e@f.co")).unwrap();
    assert_eq!(third.id, "STU0003");
}

#[test]
fn test_failed_commit_rolls_back_every_mutation() {
    let store = memory_store();
    let record = store.create(applicant("a@b.co")).unwrap();

    store.backend().fail_next_commits(3);

    let err = store.create(applicant("c@d.co")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);

    let err = store.update(&record.id, Patch::status("rejected")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);

    let err = store.delete(&record.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);

    // Memory still equals what was last committed
    assert_eq!(store.list(), vec![record.clone()]);
    assert_eq!(store.backend().committed_records(), vec![record]);

    // The failed create did not consume an id
    let next = store.create(applicant("c@d.co")).unwrap();
    assert_eq!(next.id, "STU0002");
}

#[test]
fn test_unflushed_commit_keeps_memory_equal_to_backend() {
    let store = memory_store();
    let first = store.create(applicant("a@b.co")).unwrap();

    store.backend().fail_next_syncs(3);

    // Written but not flushed: reported, yet kept on both sides
    let err = store.create(applicant("c@d.co")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert_eq!(store.list_by(&SortKey::Id, SortOrder::Ascending), store.backend().committed_records());
    let second = store.get("STU0002").unwrap();
    assert_eq!(
        store.create(applicant("C@D.co")).unwrap_err().kind(),
        ErrorKind::DuplicateKey
    );

    let err = store.update(&first.id, Patch::status("confirmed")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert_eq!(store.get(&first.id).unwrap().status, "confirmed");
    assert_eq!(store.list_by(&SortKey::Id, SortOrder::Ascending), store.backend().committed_records());

    let err = store.delete(&second.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert_eq!(store.get(&second.id).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(store.list_by(&SortKey::Id, SortOrder::Ascending), store.backend().committed_records());

    // The id of the kept-then-deleted record is not handed out again
    assert_eq!(store.create(applicant("c@d.co")).unwrap().id, "STU0003");
    assert_eq!(store.backend().committed_next_seq(), Some(4));
}

#[test]
fn test_open_drops_duplicate_stored_ids() {
    let now = Utc::now();
    let stored = |email: &str| Record {
        id: "STU0007".into(),
        status: "pending".into(),
        created_at: now,
        status_changed_at: None,
        fields: applicant(email),
    };
    let backend = MemoryBackend::with_records(vec![stored("a@b.co"), stored("c@d.co")]);
    let store = RecordStore::open(CollectionSpec::applicants(), backend).unwrap();

    assert_eq!(store.len(), 1);
    assert_eq!(store.get("STU0007").unwrap().str_field("email"), Some("a@b.co"));
    assert_eq!(store.create(applicant("e@f.co")).unwrap().id, "STU0008");
}

#[test]
fn test_file_store_survives_reopen() {
    let dir = TempDir::new().unwrap();

    let record = {
        let store = file_store(dir.path());
        let record = store.create(applicant("a@b.co")).unwrap();
        store.update(&record.id, Patch::status("confirmed")).unwrap()
    };

    let store = file_store(dir.path());
    assert_eq!(store.get(&record.id).unwrap(), record);

    // Plain JSON array on disk
    let raw = fs::read_to_string(dir.path().join("applicants.json")).unwrap();
    let value: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value[0]["id"], "STU0001");
    assert_eq!(value[0]["status"], "confirmed");
}

#[test]
fn test_file_store_never_reuses_deleted_highest_id() {
    let dir = TempDir::new().unwrap();
    {
        let store = file_store(dir.path());
        store.create(applicant("a@b.co")).unwrap();
        let second = store.create(applicant("c@d.co")).unwrap();
        store.delete(&second.id).unwrap();
    }

    let store = file_store(dir.path());
    assert_eq!(store.create(applicant("e@f.co")).unwrap().id, "STU0003");
}

#[test]
fn test_file_store_recomputes_missing_counter() {
    let dir = TempDir::new().unwrap();
    {
        let store = file_store(dir.path());
        store.create(applicant("a@b.co")).unwrap();
        store.create(applicant("c@d.co")).unwrap();
    }
    fs::remove_file(dir.path().join("applicants.seq")).unwrap();

    let store = file_store(dir.path());
    assert_eq!(store.create(applicant("e@f.co")).unwrap().id, "STU0003");
}

#[test]
fn test_corrupt_file_is_quarantined() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("applicants.json"), b"[{\"id\": \"STU00").unwrap();

    let store = file_store(dir.path());
    assert!(store.is_empty());

    let quarantined: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("applicants.json.corrupt-"))
        .collect();
    assert_eq!(quarantined.len(), 1);

    // The collection is usable again and the bad bytes are kept aside
    store.create(applicant("a@b.co")).unwrap();
    let kept = fs::read(dir.path().join(&quarantined[0])).unwrap();
    assert_eq!(kept, b"[{\"id\": \"STU00");
}

#[test]
fn test_interrupted_write_leaves_previous_state() {
    let dir = TempDir::new().unwrap();
    {
        let store = file_store(dir.path());
        store.create(applicant("a@b.co")).unwrap();
    }

    // A crash between writing the temp file and renaming it
    let stray = dir.path().join("applicants.json.4242-7.tmp");
    fs::write(&stray, b"[garbage").unwrap();

    let store = file_store(dir.path());
    assert_eq!(store.len(), 1);
    assert!(!stray.exists());
}

#[test]
fn test_empty_file_is_an_empty_collection() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("applicants.json"), b"\n").unwrap();

    let store = file_store(dir.path());
    assert!(store.is_empty());
    assert!(dir.path().join("applicants.json").exists());
}

#[test]
fn test_invalid_collection_name_is_rejected() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        JsonFileBackend::new(dir.path(), "../escape"),
        Err(BackendError::InvalidName(_))
    ));
}

#[test]
fn test_unwritable_directory_surfaces_persistence_error() {
    let dir = TempDir::new().unwrap();
    let store = file_store(dir.path());
    store.create(applicant("a@b.co")).unwrap();

    // Replace the data directory with a file so every write fails
    fs::remove_dir_all(dir.path()).unwrap();
    fs::write(dir.path(), b"not a directory").unwrap();

    let err = store.create(applicant("c@d.co")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert_eq!(store.len(), 1);

    fs::remove_file(dir.path()).unwrap();
}
