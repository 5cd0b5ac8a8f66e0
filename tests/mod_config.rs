use docset::config::Config;
use docset::store::MemoryStore;
use docset::Database;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn config_file(body: &str) -> NamedTempFile {
    let mut f = NamedTempFile::new().unwrap();
    f.write_all(body.as_bytes()).unwrap();
    f
}

#[test]
fn explicit_file_is_loaded() {
    let f = config_file("database = \"crm\"\ntimeout_secs = 7\nlog_retention = 3\n");
    let cfg = Config::load(Some(f.path()));
    assert_eq!(cfg.database, "crm");
    assert_eq!(cfg.timeout_secs, 7);
    assert_eq!(cfg.log_retention, Some(3));
}

#[test]
fn malformed_file_is_skipped() {
    let f = config_file("timeout_secs = [");
    let cfg = Config::load(Some(f.path()));
    assert!(!cfg.database.is_empty());
    assert!(Config::from_file(f.path()).is_err());
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, docset::DbError::Io(_)));
}

#[test]
fn database_handle_uses_configured_timeout() {
    let f = config_file("timeout_secs = 2\n");
    let cfg = Config::from_file(f.path()).unwrap();
    let db = Database::with_config(MemoryStore::new(), cfg);
    assert_eq!(db.data().context().timeout, Duration::from_secs(2));
    assert_eq!(db.config().database, "docset");
}
