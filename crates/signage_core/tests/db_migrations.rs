use rusqlite::{params, Connection};
use signage_core::db::migrations::latest_version;
use signage_core::db::{open_db, open_db_in_memory, open_db_with_config, DbError};
use signage_core::EngineConfig;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in ["items", "sites", "bulletins", "item_sites", "bulletin_sites"] {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn link_tables_carry_unique_pair_indexes() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(
        unique_index_columns(&conn, "item_sites", "idx_item_sites_pair"),
        vec!["item_id", "site_id"]
    );
    assert_eq!(
        unique_index_columns(&conn, "bulletin_sites", "idx_bulletin_sites_pair"),
        vec!["bulletin_id", "site_id"]
    );
    assert_eq!(
        unique_index_columns(&conn, "sites", "idx_sites_name"),
        vec!["name"]
    );
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("signage.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "item_sites");
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
fn open_db_with_config_applies_busy_timeout_and_foreign_keys() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig {
        busy_timeout_ms: 1_234,
        ..EngineConfig::default()
    };
    let conn = open_db_with_config(dir.path().join("tuned.db"), &config).unwrap();

    let timeout: i64 = conn
        .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(timeout, 1_234);
    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(foreign_keys, 1);
}

#[test]
fn schema_rejects_duplicate_pairs_and_orphans_directly() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO items (title, duration_secs) VALUES ('promo', 30);",
        [],
    )
    .unwrap();
    conn.execute("INSERT INTO sites (name) VALUES ('Lobby');", [])
        .unwrap();

    conn.execute(
        "INSERT INTO item_sites (item_id, site_id, play_duration_secs) VALUES (?1, ?2, 30);",
        params![1, 1],
    )
    .unwrap();
    let duplicate = conn.execute(
        "INSERT INTO item_sites (item_id, site_id, play_duration_secs) VALUES (?1, ?2, 30);",
        params![1, 1],
    );
    assert!(duplicate.is_err());

    let orphan = conn.execute(
        "INSERT INTO item_sites (item_id, site_id, play_duration_secs) VALUES (?1, ?2, 30);",
        params![1, 42],
    );
    assert!(orphan.is_err());
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

fn unique_index_columns(conn: &Connection, table: &str, index_name: &str) -> Vec<String> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA index_list({table});"))
        .unwrap();
    let mut rows = stmt.query([]).unwrap();
    let mut is_unique = None;
    while let Some(row) = rows.next().unwrap() {
        let name: String = row.get("name").unwrap();
        if name == index_name {
            is_unique = Some(row.get::<_, i64>("unique").unwrap() == 1);
        }
    }
    assert_eq!(is_unique, Some(true), "index {index_name} is missing or not unique");

    let mut stmt = conn
        .prepare(&format!("PRAGMA index_info({index_name});"))
        .unwrap();
    let mut rows = stmt.query([]).unwrap();
    let mut columns = Vec::new();
    while let Some(row) = rows.next().unwrap() {
        columns.push(row.get::<_, String>("name").unwrap());
    }
    columns
}
