use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS roles (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL UNIQUE,
            description TEXT,
            active      INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS permissions (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            code        TEXT NOT NULL UNIQUE,
            name        TEXT NOT NULL,
            description TEXT,
            category    TEXT,
            active      INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS roles_permissions (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            role_id         INTEGER NOT NULL REFERENCES roles(id),
            permission_id   INTEGER NOT NULL REFERENCES permissions(id),
            assigned_at     TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(role_id, permission_id)
        );

        CREATE INDEX IF NOT EXISTS idx_roles_permissions_role
            ON roles_permissions(role_id);

        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            username    TEXT NOT NULL UNIQUE,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            first_name  TEXT,
            last_name   TEXT,
            active      INTEGER NOT NULL DEFAULT 1,
            verified    INTEGER NOT NULL DEFAULT 0,
            role_id     INTEGER REFERENCES roles(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS channels (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL UNIQUE,
            description TEXT,
            kind        TEXT NOT NULL DEFAULT 'public',
            min_role    TEXT,
            active      INTEGER NOT NULL DEFAULT 1,
            creator_id  INTEGER REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS messages (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            content         TEXT NOT NULL,
            author_id       INTEGER NOT NULL REFERENCES users(id),
            channel_id      INTEGER NOT NULL REFERENCES channels(id),
            edited          INTEGER NOT NULL DEFAULT 0,
            deleted         INTEGER NOT NULL DEFAULT 0,
            kind            TEXT NOT NULL DEFAULT 'texte',
            attachment_url  TEXT,
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_channel
            ON messages(channel_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
