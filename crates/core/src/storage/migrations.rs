//! Schema setup for the `entries` table shared by every partition.

use tokio_rusqlite::rusqlite::{self, Transaction};
use tokio_rusqlite::{Connection, params};

use crate::Error;

/// Schema steps, oldest first. A database records the highest step applied
/// in `schema_version`.
const STEPS: &[(i64, &str)] = &[(1, include_str!("../../migrations/001_entries.sql"))];

/// Bring the schema at `conn` up to the newest step. Each step commits
/// together with its version row, so a failed step leaves the previous
/// version in place.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )?;
        let applied: i64 =
            conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| row.get(0))?;

        for &(version, sql) in STEPS.iter().filter(|(version, _)| *version > applied) {
            let tx = conn.transaction()?;
            apply(&tx, version, sql).map_err(|e| Error::MigrationFailed(format!("step {version}: {e}")))?;
            tx.commit()?;
            tracing::debug!(version, "storage schema upgraded");
        }
        Ok(())
    })
    .await
    .map_err(Error::from)
}

fn apply(tx: &Transaction<'_>, version: i64, sql: &str) -> Result<(), rusqlite::Error> {
    tx.execute_batch(sql)?;
    tx.execute(
        "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
        params![version, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rerun_is_a_no_op() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        run(&conn).await.unwrap();

        let versions: i64 = conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(versions, STEPS.len() as i64);
    }

    #[tokio::test]
    async fn test_entries_keyed_by_partition_and_key() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();

        let rows: i64 = conn
            .call(|conn| {
                let insert = "INSERT INTO entries (partition, key, value, updated_at) VALUES (?1, 'k', 'v', 'now')";
                conn.execute(insert, ["local"])?;
                conn.execute(insert, ["session:a"])?;
                assert!(conn.execute(insert, ["local"]).is_err());
                conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(rows, 2);
    }
}
