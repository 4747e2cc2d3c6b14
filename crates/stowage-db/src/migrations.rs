use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            active      INTEGER NOT NULL DEFAULT 1,
            plan        TEXT NOT NULL DEFAULT 'Free',
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Keep updated_at current on every mutation.
        CREATE TRIGGER IF NOT EXISTS users_touch_updated_at
            AFTER UPDATE ON users
            FOR EACH ROW
            WHEN NEW.updated_at = OLD.updated_at
        BEGIN
            UPDATE users SET updated_at = datetime('now') WHERE id = NEW.id;
        END;

        CREATE TABLE IF NOT EXISTS tokens (
            id          TEXT PRIMARY KEY,
            user_id     INTEGER REFERENCES users(id) ON DELETE SET NULL,
            name        TEXT NOT NULL,
            secret      TEXT NOT NULL UNIQUE,
            permissions TEXT NOT NULL DEFAULT 'ReadWrite',
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            last_used   TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_tokens_user
            ON tokens(user_id);

        -- hash is indexed, not unique: byte-identical uploads share a blob
        -- but every upload owns its own metadata row.
        CREATE TABLE IF NOT EXISTS files (
            id          TEXT PRIMARY KEY,
            user_id     INTEGER REFERENCES users(id) ON DELETE SET NULL,
            hash        TEXT NOT NULL,
            size        INTEGER NOT NULL CHECK (size > 0),
            pinned_at   TEXT NOT NULL DEFAULT (datetime('now')),
            unpinned_at TEXT,
            metadata    TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_files_user
            ON files(user_id);

        CREATE INDEX IF NOT EXISTS idx_files_hash
            ON files(hash);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
