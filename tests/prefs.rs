use opencode_sync::{ConnectionPrefs, PrefsError};

#[test]
fn missing_file_loads_as_none() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = dir.path().join("connection.json");

    assert_eq!(ConnectionPrefs::load(&path).expect("load"), None);
}

#[test]
fn saved_prefs_load_back() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = dir.path().join("nested").join("connection.json");
    let prefs = ConnectionPrefs::new("http://192.168.1.20:4096", "secret");

    prefs.save(&path).expect("save");
    assert_eq!(ConnectionPrefs::load(&path).expect("load"), Some(prefs));

    let raw = std::fs::read_to_string(&path).expect("read saved file");
    assert!(raw.contains("\"serverUrl\""));
    assert!(raw.contains("\"serverPassword\""));
}

#[test]
fn partial_file_fills_defaults() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = dir.path().join("connection.json");
    std::fs::write(&path, r#"{"serverUrl":"http://box:4096"}"#).expect("seed file");

    let prefs = ConnectionPrefs::load(&path).expect("load").expect("some");
    assert_eq!(prefs.server_url, "http://box:4096");
    assert!(prefs.server_password.is_empty());
}

#[test]
fn corrupt_file_is_a_parse_error() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = dir.path().join("connection.json");
    std::fs::write(&path, "not json").expect("seed file");

    let error = ConnectionPrefs::load(&path).expect_err("corrupt");
    assert!(matches!(error, PrefsError::Parse { .. }));
    assert!(error.to_string().contains("connection.json"));
}

#[test]
fn clear_removes_and_tolerates_missing() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = dir.path().join("connection.json");
    ConnectionPrefs::new("http://a", "b").save(&path).expect("save");

    ConnectionPrefs::clear(&path).expect("clear");
    assert!(!path.exists());
    ConnectionPrefs::clear(&path).expect("second clear");
}
