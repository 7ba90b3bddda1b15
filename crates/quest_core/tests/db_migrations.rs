use quest_core::db::migrations::latest_version;
use quest_core::db::{open_db, open_db_in_memory, DbError};
use quest_core::{Store, StoreOptions};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "groups");
    assert_table_exists(&conn, "stations");
    assert_table_exists(&conn, "participants");
    assert_table_exists(&conn, "rewards");
    assert_table_exists(&conn, "settings");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quest.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "stations");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn file_connections_use_wal_journal() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_db(dir.path().join("wal.db")).unwrap();

    let mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(mode.to_ascii_lowercase(), "wal");
}

#[test]
fn station_occupancy_must_match_group_reference() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO stations (number, name, location) VALUES (1, 'Station 1', '329');",
        [],
    )
    .unwrap();

    let occupied_without_group =
        conn.execute("UPDATE stations SET is_free = 0 WHERE number = 1;", []);
    assert!(occupied_without_group.is_err());

    conn.execute("INSERT INTO groups (group_number) VALUES ('101');", [])
        .unwrap();
    let free_with_group = conn.execute(
        "UPDATE stations SET current_group_id = 1 WHERE number = 1;",
        [],
    );
    assert!(free_with_group.is_err());
}

#[test]
fn second_curator_for_group_violates_unique_index() {
    let conn = open_db_in_memory().unwrap();
    conn.execute("INSERT INTO groups (group_number) VALUES ('101');", [])
        .unwrap();
    conn.execute(
        "INSERT INTO participants (identity, role, group_id) VALUES (1, 'curator', 1);",
        [],
    )
    .unwrap();

    let duplicate = conn.execute(
        "INSERT INTO participants (identity, role, group_id) VALUES (2, 'curator', 1);",
        [],
    );
    assert!(duplicate.is_err());
}

#[test]
fn store_reopens_file_with_existing_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");

    let store = Store::open(&path, StoreOptions::default()).unwrap();
    store
        .write(|tx| -> Result<(), DbError> {
            tx.execute("INSERT INTO groups (group_number) VALUES ('101');", [])?;
            Ok(())
        })
        .unwrap();
    drop(store);

    let reopened = Store::open(&path, StoreOptions::default()).unwrap();
    let count = reopened
        .read(|tx| -> Result<i64, DbError> {
            Ok(tx.query_row("SELECT COUNT(*) FROM groups;", [], |row| row.get(0))?)
        })
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn failed_write_rolls_back() {
    let store = Store::open_in_memory().unwrap();
    let result = store.write(|tx| -> Result<(), DbError> {
        tx.execute("INSERT INTO groups (group_number) VALUES ('101');", [])?;
        tx.execute("INSERT INTO groups (group_number) VALUES ('101');", [])?;
        Ok(())
    });
    assert!(result.is_err());

    let count = store
        .read(|tx| -> Result<i64, DbError> {
            Ok(tx.query_row("SELECT COUNT(*) FROM groups;", [], |row| row.get(0))?)
        })
        .unwrap();
    assert_eq!(count, 0);
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
