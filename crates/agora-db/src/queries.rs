use crate::Database;
use crate::models::{ChannelRow, PermissionRow, UserRow};
use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

/// Fields for a new user account.
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub role: Option<&'a str>,
}

impl Database {
    // -- Users --

    /// Insert a user, resolving `role` by name. Returns the new id.
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<i64> {
        self.with_conn(|conn| {
            let role_id = match user.role {
                Some(name) => Some(
                    query_role_id(conn, name)?.ok_or_else(|| anyhow!("Role not found: {}", name))?,
                ),
                None => None,
            };

            conn.execute(
                "INSERT INTO users (username, email, password, first_name, last_name, role_id, verified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)",
                rusqlite::params![
                    user.username,
                    user.email,
                    user.password_hash,
                    user.first_name,
                    user.last_name,
                    role_id
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn set_user_active(&self, username: &str, active: bool) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET active = ?1 WHERE username = ?2",
                rusqlite::params![active, username],
            )?;
            if changed == 0 {
                return Err(anyhow!("User not found: {}", username));
            }
            Ok(())
        })
    }

    /// Replace the stored password hash of user `id`.
    pub fn set_user_password(&self, id: i64, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password = ?1 WHERE id = ?2",
                rusqlite::params![password_hash, id],
            )?;
            if changed == 0 {
                return Err(anyhow!("User not found: {}", id));
            }
            Ok(())
        })
    }

    // -- Roles & permissions --

    pub fn get_role_id(&self, name: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| query_role_id(conn, name))
    }

    /// Permissions associated to a role, including deactivated ones.
    pub fn get_role_permissions(&self, role_id: i64) -> Result<Vec<PermissionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.code, p.active
                 FROM permissions p
                 JOIN roles_permissions rp ON rp.permission_id = p.id
                 WHERE rp.role_id = ?1
                 ORDER BY p.code",
            )?;

            let rows = stmt
                .query_map([role_id], |row| {
                    Ok(PermissionRow {
                        code: row.get(0)?,
                        active: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn set_permission_active(&self, code: &str, active: bool) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE permissions SET active = ?1 WHERE code = ?2",
                rusqlite::params![active, code],
            )?;
            if changed == 0 {
                return Err(anyhow!("Permission not found: {}", code));
            }
            Ok(())
        })
    }

    // -- Channels --

    pub fn get_channel_by_id(&self, id: i64) -> Result<Option<ChannelRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, name, min_role, active FROM channels WHERE id = ?1",
                    [id],
                    channel_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_channel_by_name(&self, name: &str) -> Result<Option<ChannelRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, name, min_role, active FROM channels WHERE name = ?1",
                    [name],
                    channel_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn set_channel_active(&self, id: i64, active: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE channels SET active = ?1 WHERE id = ?2",
                rusqlite::params![active, id],
            )?;
            Ok(())
        })
    }

    // -- Messages --

    /// Insert a message and return its generated id.
    pub fn insert_message(
        &self,
        channel_id: i64,
        author_id: i64,
        content: &str,
        kind: &str,
        attachment_url: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (channel_id, author_id, content, kind, attachment_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    channel_id,
                    author_id,
                    content,
                    kind,
                    attachment_url,
                    created_at.to_rfc3339()
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn count_messages(&self, channel_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE channel_id = ?1 AND deleted = 0",
                [channel_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    // LEFT JOIN roles so a dangling or missing role still yields the user
    let mut stmt = conn.prepare(
        "SELECT u.id, u.username, u.password, u.first_name, u.last_name, u.active, u.role_id, r.name
         FROM users u
         LEFT JOIN roles r ON u.role_id = r.id
         WHERE u.username = ?1",
    )?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                first_name: row.get(3)?,
                last_name: row.get(4)?,
                active: row.get(5)?,
                role_id: row.get(6)?,
                role_name: row.get(7)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_role_id(conn: &Connection, name: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row("SELECT id FROM roles WHERE name = ?1", [name], |row| row.get(0))
        .optional()?;
    Ok(id)
}

fn channel_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChannelRow> {
    Ok(ChannelRow {
        id: row.get(0)?,
        name: row.get(1)?,
        min_role: row.get(2)?,
        active: row.get(3)?,
    })
}
