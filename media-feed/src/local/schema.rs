use rusqlite::{Connection, Result};

/// Initialize the local record store schema
pub fn init_record_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS record_schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT version FROM record_schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        create_record_schema_v1(conn)?;
        conn.execute("INSERT INTO record_schema_version (version) VALUES (1)", [])?;
    }

    Ok(())
}

/// Version 1: one table of JSON documents grouped by collection
fn create_record_schema_v1(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS records (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            collection TEXT NOT NULL,
            body TEXT NOT NULL CHECK(json_valid(body))
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_init_is_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        init_record_schema(&conn).unwrap();
        init_record_schema(&conn).unwrap();

        let versions: i32 = conn
            .query_row("SELECT COUNT(*) FROM record_schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        init_record_schema(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO records (collection, body) VALUES ('products', 'not json')",
            [],
        );
        assert!(result.is_err());
    }
}
