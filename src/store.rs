//! Persistent SQLite store for per-user points and goal targets.

use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

use crate::menu::MenuState;

/// Default pull-up target for users with no stored row.
pub const DEFAULT_PULLUPS: i64 = 5;
/// Default push-up target for users with no stored row.
pub const DEFAULT_PUSHUPS: i64 = 10;

/// Goal store backed by a single SQLite connection.
///
/// Every mutation is one atomic SQL statement (upsert-with-increment), so the
/// scheduler task and the dispatcher can share the connection without losing
/// updates.
pub struct GoalStore {
    conn: Mutex<Connection>,
}

impl GoalStore {
    /// Open (or create) the store at the given path.
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        let users = store.user_count()?;
        info!("Loaded goal store from {:?} ({} user(s))", path, users);
        Ok(store)
    }

    /// Open an in-memory store.
    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS user_goals (
                user_id         INTEGER PRIMARY KEY,
                points          INTEGER NOT NULL DEFAULT 0,
                current_pullups INTEGER NOT NULL DEFAULT 5,
                current_pushups INTEGER NOT NULL DEFAULT 10,
                menu_state      TEXT    NOT NULL DEFAULT 'main_menu'
            );",
        )?;

        // In-place migration for databases created by older schema paths:
        // add any column the current schema has and the table lacks.
        // A legacy `pushups_10` column is left alone if present.
        let existing: Vec<String> = {
            let mut stmt = conn.prepare("PRAGMA table_info(user_goals)")?;
            let cols = stmt.query_map([], |row| row.get::<_, String>(1))?;
            cols.collect::<rusqlite::Result<_>>()?
        };

        for (column, definition) in [
            ("points", "points INTEGER NOT NULL DEFAULT 0"),
            ("current_pullups", "current_pullups INTEGER NOT NULL DEFAULT 5"),
            ("current_pushups", "current_pushups INTEGER NOT NULL DEFAULT 10"),
            ("menu_state", "menu_state TEXT NOT NULL DEFAULT 'main_menu'"),
        ] {
            if !existing.iter().any(|c| c == column) {
                info!("Migrating user_goals: adding column {}", column);
                conn.execute_batch(&format!("ALTER TABLE user_goals ADD COLUMN {}", definition))?;
            }
        }

        Ok(())
    }

    fn user_count(&self) -> rusqlite::Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM user_goals", [], |row| row.get(0))
    }

    /// Stored point total, or 0 if the user has no row.
    pub fn get_points(&self, user_id: i64) -> rusqlite::Result<i64> {
        let conn = self.conn.lock().unwrap();
        let points = conn
            .query_row(
                "SELECT points FROM user_goals WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(points.unwrap_or(0))
    }

    /// Award points, creating the row if absent. Single atomic upsert so two
    /// interleaved awards can never lose an update.
    pub fn add_points(&self, user_id: i64, points: i64) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO user_goals (user_id, points) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET points = points + excluded.points",
            params![user_id, points],
        )?;
        Ok(())
    }

    /// Stored pull-up target, or the default if the user has no row.
    pub fn get_current_pullups(&self, user_id: i64) -> rusqlite::Result<i64> {
        self.get_target(user_id, "current_pullups", DEFAULT_PULLUPS)
    }

    /// Stored push-up target, or the default if the user has no row.
    pub fn get_current_pushups(&self, user_id: i64) -> rusqlite::Result<i64> {
        self.get_target(user_id, "current_pushups", DEFAULT_PUSHUPS)
    }

    /// Raise the pull-up target by `increment`. Upserts, so the first increment
    /// for a fresh user lands on default + increment.
    pub fn increase_pullups_goal(&self, user_id: i64, increment: i64) -> rusqlite::Result<()> {
        self.increase_target(user_id, "current_pullups", DEFAULT_PULLUPS, increment)
    }

    /// Raise the push-up target by `increment`.
    pub fn increase_pushups_goal(&self, user_id: i64, increment: i64) -> rusqlite::Result<()> {
        self.increase_target(user_id, "current_pushups", DEFAULT_PUSHUPS, increment)
    }

    fn get_target(&self, user_id: i64, column: &str, default: i64) -> rusqlite::Result<i64> {
        let conn = self.conn.lock().unwrap();
        let target = conn
            .query_row(
                &format!("SELECT {} FROM user_goals WHERE user_id = ?1", column),
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(target.unwrap_or(default))
    }

    fn increase_target(
        &self,
        user_id: i64,
        column: &str,
        default: i64,
        increment: i64,
    ) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO user_goals (user_id, {col}) VALUES (?1, ?2 + ?3)
                 ON CONFLICT(user_id) DO UPDATE SET {col} = {col} + ?3",
                col = column
            ),
            params![user_id, default, increment],
        )?;
        Ok(())
    }

    /// Persisted menu state, or `MainMenu` if the user has no row.
    pub fn menu_state(&self, user_id: i64) -> rusqlite::Result<MenuState> {
        let conn = self.conn.lock().unwrap();
        let state: Option<String> = conn
            .query_row(
                "SELECT menu_state FROM user_goals WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(state.map(|s| MenuState::from_str(&s)).unwrap_or(MenuState::MainMenu))
    }

    /// Persist the menu state for a user, creating the row if absent.
    pub fn set_menu_state(&self, user_id: i64, state: MenuState) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO user_goals (user_id, menu_state) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET menu_state = excluded.menu_state",
            params![user_id, state.as_str()],
        )?;
        Ok(())
    }
}
