#![allow(dead_code)]

use sql_mapper::prelude::*;
use tempfile::TempDir;

pub const PEOPLE_ROWS: i64 = 1000;

/// A file-backed database in its own temp dir. Keep the dir alive for the test.
pub async fn open_people_db() -> Result<(TempDir, SqliteConnection), SqlMapperError> {
    let dir = tempfile::tempdir()
        .map_err(|e| SqlMapperError::ConfigError(format!("tempdir: {e}")))?;
    let path = dir.path().join("people.db");
    let conn = SqliteOptionsBuilder::new(path.to_string_lossy().into_owned())
        .build()
        .await?;
    conn.execute_batch(
        "CREATE TABLE people (
             id INTEGER PRIMARY KEY,
             name TEXT NOT NULL,
             email TEXT,
             status TEXT NOT NULL DEFAULT 'active'
         );",
    )
    .await?;
    conn.with_connection(|c| {
        let tx = c.transaction()?;
        {
            let mut stmt = tx.prepare("INSERT INTO people (id, name, email) VALUES (?1, ?2, ?3)")?;
            for i in 1..=PEOPLE_ROWS {
                let email = (i % 3 != 0).then(|| format!("p{i}@example.com"));
                stmt.execute(rusqlite::params![i, format!("person {i:04}"), email])?;
            }
        }
        tx.commit()?;
        Ok(())
    })
    .await?;
    Ok((dir, conn))
}
