//! Key/value persistence operations.

use rusqlite::{params, OptionalExtension};

/// Database operations for the scoped key-value store.
pub struct KvStore<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> KvStore<'a> {
    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    pub fn set(&self, scope: &str, key: &str, value: Option<&str>) -> crate::Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO kv (scope, k, v, updated_at)
            VALUES (?, ?, ?, strftime('%Y-%m-%dT%H:%M:%fZ','now'))
            "#,
            params![scope, key, value],
        )?;
        Ok(())
    }

    pub fn get(&self, scope: &str, key: &str) -> crate::Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT v FROM kv WHERE scope = ? AND k = ?",
                params![scope, key],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(value.flatten())
    }

    pub fn delete(&self, scope: &str, key: &str) -> crate::Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM kv WHERE scope = ? AND k = ?", params![scope, key])?;
        Ok(removed > 0)
    }

    /// Remove every key in `scope`, returning how many were removed.
    pub fn clear_scope(&self, scope: &str) -> crate::Result<usize> {
        Ok(self.conn.execute("DELETE FROM kv WHERE scope = ?", params![scope])?)
    }

    /// All keys and values of `scope`, ordered by key.
    pub fn list_scope(&self, scope: &str) -> crate::Result<Vec<(String, Option<String>)>> {
        let mut stmt = self.conn.prepare("SELECT k, v FROM kv WHERE scope = ? ORDER BY k ASC")?;
        let rows = stmt.query_map(params![scope], |row| Ok((row.get(0)?, row.get(1)?)))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}
