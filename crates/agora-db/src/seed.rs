//! Idempotent seed: permission vocabulary, base roles and their grants,
//! the `admin` account and the default channels.

use agora_types::PermissionCode;
use agora_types::permissions::VOCABULARY;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::Database;

const ROLES: &[(&str, &str)] = &[
    ("admin", "Administrateur avec tous les droits"),
    ("moderateur", "Modérateur avec droits limités"),
    ("utilisateur", "Utilisateur standard"),
    ("invite", "Invité avec accès en lecture seule"),
];

const MODERATOR_GRANTS: &[&str] = &[
    PermissionCode::READ_USERS,
    PermissionCode::READ_ROLES,
    PermissionCode::READ_PERMISSIONS,
    PermissionCode::READ_CHANNELS,
    PermissionCode::CREATE_CHANNELS,
    PermissionCode::UPDATE_CHANNELS,
    PermissionCode::READ_MESSAGES,
    PermissionCode::SEND_MESSAGES,
    PermissionCode::UPDATE_MESSAGES,
    PermissionCode::DELETE_MESSAGES,
];

const USER_GRANTS: &[&str] = &[
    PermissionCode::READ_CHANNELS,
    PermissionCode::READ_MESSAGES,
    PermissionCode::SEND_MESSAGES,
    PermissionCode::UPDATE_MESSAGES,
];

const GUEST_GRANTS: &[&str] = &[PermissionCode::READ_CHANNELS, PermissionCode::READ_MESSAGES];

/// (name, description, kind, min_role)
const CHANNELS: &[(&str, &str, &str, Option<&str>)] = &[
    ("general", "Canal général pour tous", "public", None),
    ("support", "Canal de support technique", "public", None),
    ("admin", "Canal réservé aux admins", "prive", Some("admin")),
];

/// Grants per role. `None` means every permission in the vocabulary.
fn grants(role: &str) -> Option<&'static [&'static str]> {
    match role {
        "moderateur" => Some(MODERATOR_GRANTS),
        "utilisateur" => Some(USER_GRANTS),
        "invite" => Some(GUEST_GRANTS),
        _ => None,
    }
}

/// Seed the database. Safe to run on every startup.
pub fn run(db: &Database, admin_password_hash: &str) -> Result<()> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;

        for (code, name, category) in VOCABULARY {
            tx.execute(
                "INSERT OR IGNORE INTO permissions (code, name, category) VALUES (?1, ?2, ?3)",
                (code, name, category),
            )?;
        }

        for (name, description) in ROLES {
            tx.execute(
                "INSERT OR IGNORE INTO roles (name, description) VALUES (?1, ?2)",
                (name, description),
            )?;
        }

        for (role, _) in ROLES {
            grant_role(&tx, role, grants(role))?;
        }

        let admin_exists = tx
            .query_row("SELECT id FROM users WHERE username = 'admin'", [], |row| {
                row.get::<_, i64>(0)
            })
            .optional()?
            .is_some();
        if !admin_exists {
            tx.execute(
                "INSERT INTO users (username, email, password, first_name, last_name, role_id, verified)
                 SELECT 'admin', 'admin@example.com', ?1, 'Super', 'Admin', id, 1
                 FROM roles WHERE name = 'admin'",
                [admin_password_hash],
            )?;
            info!("Seeded admin account");
        }

        for (name, description, kind, min_role) in CHANNELS {
            tx.execute(
                "INSERT OR IGNORE INTO channels (name, description, kind, min_role) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![name, description, kind, min_role],
            )?;
        }

        tx.commit()?;
        Ok(())
    })?;

    info!("Database seed complete");
    Ok(())
}

fn grant_role(conn: &Connection, role: &str, codes: Option<&[&str]>) -> Result<()> {
    match codes {
        Some(codes) => {
            for code in codes {
                conn.execute(
                    "INSERT OR IGNORE INTO roles_permissions (role_id, permission_id)
                     SELECT r.id, p.id FROM roles r, permissions p
                     WHERE r.name = ?1 AND p.code = ?2",
                    (role, code),
                )?;
            }
        }
        None => {
            conn.execute(
                "INSERT OR IGNORE INTO roles_permissions (role_id, permission_id)
                 SELECT r.id, p.id FROM roles r, permissions p
                 WHERE r.name = ?1",
                [role],
            )?;
        }
    }
    Ok(())
}
