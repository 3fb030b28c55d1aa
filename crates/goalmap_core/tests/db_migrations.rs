use goalmap_core::db::migrations::latest_version;
use goalmap_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn in_memory_cache_db_is_fully_migrated() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(user_version(&conn), latest_version());
    assert!(object_exists(&conn, "table", "goal_map_cache"));
    assert!(object_exists(&conn, "index", "idx_goal_map_cache_project"));
}

#[test]
fn reopening_cache_file_keeps_rows_and_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("goalmap.sqlite3");

    let conn = open_db(&path).unwrap();
    conn.execute(
        "INSERT INTO goal_map_cache (cache_key, tool, project_id, payload, revision, updated_at)
         VALUES ('goal_mapping:p1', 'goal_mapping', 'p1', '{}', 0, 0);",
        [],
    )
    .unwrap();
    drop(conn);

    let reopened = open_db(&path).unwrap();
    assert_eq!(user_version(&reopened), latest_version());
    let rows: i64 = reopened
        .query_row("SELECT COUNT(*) FROM goal_map_cache;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn negative_revision_is_rejected_by_schema() {
    let conn = open_db_in_memory().unwrap();
    let result = conn.execute(
        "INSERT INTO goal_map_cache (cache_key, tool, project_id, payload, revision, updated_at)
         VALUES ('goal_mapping:p1', 'goal_mapping', 'p1', '{}', -1, 0);",
        [],
    );
    assert!(result.is_err());
}

#[test]
fn newer_schema_version_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 42;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 42);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn user_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn object_exists(conn: &Connection, kind: &str, name: &str) -> bool {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2);",
        [kind, name],
        |row| row.get::<_, i64>(0),
    )
    .unwrap()
        == 1
}
