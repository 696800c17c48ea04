//! sqlite-adapter — SQLite implementation of the postr store ports.
//!
//! Purpose
//! - Provide a lightweight, file-based store to run the system locally
//!   without external database dependencies.
//! - Implements the `UserStore`/`UserLookup`/`PostStore` traits from the
//!   `domain` crate.
//! - Applies pending schema migrations at open, tracked in a
//!   `schema_migrations` table.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - Stores timestamps as seconds since UNIX_EPOCH (i64).

use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use domain::{Post, PostStore, StoreError, User, UserLookup, UserStore};
use rusqlite::{params, Connection};

/// Ordered schema migrations. Append only; version N is the Nth entry.
const MIGRATIONS: &[&str] = &[
    // 1: initial users/posts schema
    r#"
    CREATE TABLE users (
        id TEXT PRIMARY KEY,
        firstname TEXT NOT NULL,
        lastname TEXT NOT NULL,
        email TEXT NOT NULL,
        street TEXT NOT NULL,
        city TEXT NOT NULL,
        state TEXT NOT NULL,
        zipcode TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );
    CREATE TABLE posts (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        title TEXT NOT NULL,
        body TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );
    "#,
    // 2: posts are always fetched by owner
    "CREATE INDEX idx_posts_user_id ON posts(user_id);",
];

/// SQLite-backed store for local and single-node deployments.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path and bring its
    /// schema up to date.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(dir) = path.as_ref().parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(map_sqerr)?;
            }
        }
        let conn = Connection::open(path).map_err(map_sqerr)?;
        apply_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("mutex poisoned".into()))
    }

    /// Bulk-insert users for seeding. Returns the number inserted.
    pub fn seed_users(&self, users: &[User]) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction().map_err(map_sqerr)?;
        for user in users {
            insert_user(&tx, user)?;
        }
        tx.commit().map_err(map_sqerr)?;
        Ok(users.len())
    }

    /// Bulk-insert posts for seeding. Returns the number inserted.
    pub fn seed_posts(&self, posts: &[Post]) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction().map_err(map_sqerr)?;
        for post in posts {
            insert_post(&tx, post)?;
        }
        tx.commit().map_err(map_sqerr)?;
        Ok(posts.len())
    }
}

fn apply_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        );",
    )
    .map_err(map_sqerr)?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(map_sqerr)?;

    for (idx, sql) in MIGRATIONS.iter().enumerate().skip(current as usize) {
        let version = (idx + 1) as i64;
        let tx = conn.unchecked_transaction().map_err(map_sqerr)?;
        tx.execute_batch(sql).map_err(map_sqerr)?;
        tx.execute(
            "INSERT INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
            params![version, system_time_to_secs(SystemTime::now())],
        )
        .map_err(map_sqerr)?;
        tx.commit().map_err(map_sqerr)?;
    }
    Ok(())
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Backend(format!("sqlite error: {e}"))
}

fn system_time_to_secs(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs() as i64
}

fn secs_to_system_time(secs: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64)
}

fn insert_user(conn: &Connection, user: &User) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO users(id, firstname, lastname, email, street, city, state, zipcode, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            user.id,
            user.firstname,
            user.lastname,
            user.email,
            user.street,
            user.city,
            user.state,
            user.zipcode,
            system_time_to_secs(user.created_at),
        ],
    )
    .map_err(map_sqerr)?;
    Ok(())
}

fn insert_post(conn: &Connection, post: &Post) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO posts(id, user_id, title, body, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            post.id,
            post.user_id,
            post.title,
            post.body,
            system_time_to_secs(post.created_at),
        ],
    )
    .map_err(map_sqerr)?;
    Ok(())
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        firstname: row.get(1)?,
        lastname: row.get(2)?,
        email: row.get(3)?,
        street: row.get(4)?,
        city: row.get(5)?,
        state: row.get(6)?,
        zipcode: row.get(7)?,
        created_at: secs_to_system_time(row.get(8)?),
    })
}

fn row_to_post(row: &rusqlite::Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        created_at: secs_to_system_time(row.get(4)?),
    })
}

const USER_COLUMNS: &str = "id, firstname, lastname, email, street, city, state, zipcode, created_at";
const POST_COLUMNS: &str = "id, user_id, title, body, created_at";

impl UserLookup for SqliteStore {
    fn exists(&self, id: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM users WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .map_err(map_sqerr)?;
        Ok(count > 0)
    }
}

impl UserStore for SqliteStore {
    fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let conn = self.lock()?;
        insert_user(&conn, user)
    }

    fn get(&self, id: &str) -> Result<Option<User>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .map_err(map_sqerr)?;
        let mut rows = stmt.query(params![id]).map_err(map_sqerr)?;
        match rows.next().map_err(map_sqerr)? {
            Some(row) => Ok(Some(row_to_user(row).map_err(map_sqerr)?)),
            None => Ok(None),
        }
    }

    fn count(&self) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .map_err(map_sqerr)?;
        Ok(count as u64)
    }

    fn list(&self, offset: u64, limit: u64) -> Result<Vec<User>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users ORDER BY rowid LIMIT ?1 OFFSET ?2"
            ))
            .map_err(map_sqerr)?;
        // Saturate instead of casting: a wrapped-negative OFFSET would read
        // from the start of the table instead of past its end.
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let mut rows = stmt.query(params![limit, offset]).map_err(map_sqerr)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_sqerr)? {
            out.push(row_to_user(row).map_err(map_sqerr)?);
        }
        Ok(out)
    }
}

impl PostStore for SqliteStore {
    fn insert_post(&self, post: &Post) -> Result<(), StoreError> {
        let conn = self.lock()?;
        insert_post(&conn, post)
    }

    fn list_by_user(&self, user_id: &str) -> Result<Vec<Post>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {POST_COLUMNS} FROM posts WHERE user_id = ?1 ORDER BY rowid"
            ))
            .map_err(map_sqerr)?;
        let mut rows = stmt.query(params![user_id]).map_err(map_sqerr)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_sqerr)? {
            out.push(row_to_post(row).map_err(map_sqerr)?);
        }
        Ok(out)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute("DELETE FROM posts WHERE id = ?1", params![id])
            .map_err(map_sqerr)?;
        if changed == 0 {
            Err(StoreError::RowAbsent)
        } else {
            Ok(())
        }
    }
}
