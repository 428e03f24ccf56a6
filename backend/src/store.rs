use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use portal_common::User;

/// SQLite-backed store for mirrored user records.
///
/// One connection, shared behind a mutex, opened at process start and
/// injected into every request context.
pub struct UserStore {
    conn: Mutex<Connection>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("No user with id {0}")]
    NotFound(i64),
}

/// Fields supplied by the identity provider when a row is first created.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub external_id: String,
    pub email: String,
    pub display_name: Option<String>,
}

const USER_COLUMNS: &str = "id, external_id, email, display_name, created_at, updated_at";

impl UserStore {
    pub fn new(database_url: &str) -> Result<Self, StoreError> {
        // Parse sqlite: prefix if present
        let path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);

        // Create parent directories if needed
        if path != ":memory:" {
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
            }
        }

        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                external_id TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                display_name TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::info!("User store initialized with database: {}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Self::select_by_external_id(&conn, external_id)
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![id],
            row_to_user,
        )
        .optional()
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// All rows, in store-native (insertion) order.
    pub fn list(&self) -> Result<Vec<User>, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(&format!("SELECT {} FROM users", USER_COLUMNS))
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], row_to_user)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Insert a row for a first-time sign-in. Losing the UNIQUE race on
    /// `external_id` is folded into success: the existing row is returned.
    pub fn insert(&self, new_user: &NewUser) -> Result<User, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let now = Utc::now();
        let inserted = conn.execute(
            "INSERT INTO users (external_id, email, display_name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                new_user.external_id,
                new_user.email,
                new_user.display_name,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        );

        match inserted {
            Ok(_) => {
                let id = conn.last_insert_rowid();
                tracing::info!("Created user {} for external id {}", id, new_user.external_id);
                Ok(User {
                    id,
                    external_id: new_user.external_id.clone(),
                    email: new_user.email.clone(),
                    display_name: new_user.display_name.clone(),
                    created_at: now,
                    updated_at: now,
                })
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::select_by_external_id(&conn, &new_user.external_id)?.ok_or_else(|| {
                    StoreError::Database(format!(
                        "constraint violation without existing row for {}",
                        new_user.external_id
                    ))
                })
            }
            Err(e) => Err(StoreError::Database(e.to_string())),
        }
    }

    /// Update the display name of one row, refreshing `updated_at`.
    pub fn update_display_name(&self, id: i64, display_name: &str) -> Result<User, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let now = Utc::now();
        let changed = conn
            .execute(
                "UPDATE users SET display_name = ?1, updated_at = ?2 WHERE id = ?3",
                params![display_name, now.to_rfc3339(), id],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }

        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![id],
            row_to_user,
        )
        .optional()
        .map_err(|e| StoreError::Database(e.to_string()))?
        .ok_or(StoreError::NotFound(id))
    }

    fn select_by_external_id(
        conn: &Connection,
        external_id: &str,
    ) -> Result<Option<User>, StoreError> {
        conn.query_row(
            &format!("SELECT {} FROM users WHERE external_id = ?1", USER_COLUMNS),
            params![external_id],
            row_to_user,
        )
        .optional()
        .map_err(|e| StoreError::Database(e.to_string()))
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;
    Ok(User {
        id: row.get(0)?,
        external_id: row.get(1)?,
        email: row.get(2)?,
        display_name: row.get(3)?,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_store() -> UserStore {
        UserStore::new(":memory:").unwrap()
    }

    fn new_user(external_id: &str) -> NewUser {
        NewUser {
            external_id: external_id.to_string(),
            email: format!("{}@x.com", external_id),
            display_name: None,
        }
    }

    #[test]
    fn test_insert_and_find_by_external_id() {
        let store = memory_store();
        let created = store
            .insert(&NewUser {
                external_id: "kc-1".to_string(),
                email: "a@x.com".to_string(),
                display_name: Some("A".to_string()),
            })
            .unwrap();

        let found = store.find_by_external_id("kc-1").unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.email, "a@x.com");
        assert_eq!(found.display_name.as_deref(), Some("A"));
    }

    #[test]
    fn test_find_missing_returns_none() {
        let store = memory_store();
        assert!(store.find_by_external_id("kc-1").unwrap().is_none());
        assert!(store.find_by_id(42).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_insert_returns_existing_row() {
        let store = memory_store();
        let first = store.insert(&new_user("kc-1")).unwrap();
        let second = store.insert(&new_user("kc-1")).unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_list_preserves_insertion_order() {
        let store = memory_store();
        store.insert(&new_user("kc-1")).unwrap();
        store.insert(&new_user("kc-2")).unwrap();
        store.insert(&new_user("kc-3")).unwrap();

        let users = store.list().unwrap();
        let ids: Vec<&str> = users.iter().map(|u| u.external_id.as_str()).collect();
        assert_eq!(ids, vec!["kc-1", "kc-2", "kc-3"]);
    }

    #[test]
    fn test_update_display_name_targets_one_row() {
        let store = memory_store();
        let first = store.insert(&new_user("kc-1")).unwrap();
        let second = store.insert(&new_user("kc-2")).unwrap();

        let updated = store.update_display_name(first.id, "Ada").unwrap();
        assert_eq!(updated.display_name.as_deref(), Some("Ada"));

        let untouched = store.find_by_id(second.id).unwrap().unwrap();
        assert!(untouched.display_name.is_none());
    }

    #[test]
    fn test_update_refreshes_updated_at() {
        let store = memory_store();
        let created = store.insert(&new_user("kc-1")).unwrap();

        let updated = store.update_display_name(created.id, "Ada").unwrap();
        assert!(updated.updated_at > created.updated_at);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[test]
    fn test_update_missing_row_is_not_found() {
        let store = memory_store();
        let err = store.update_display_name(42, "Ada").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(42)));
    }

    #[test]
    fn test_sqlite_url_prefix_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}/portal.db", dir.path().display());

        {
            let store = UserStore::new(&url).unwrap();
            store.insert(&new_user("kc-1")).unwrap();
        }

        let reopened = UserStore::new(&url).unwrap();
        assert_eq!(reopened.list().unwrap().len(), 1);
    }
}
