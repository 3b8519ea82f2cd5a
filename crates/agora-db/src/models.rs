//! Database row types, mapped directly from SQLite rows.
//! Distinct from agora-types models to keep the DB layer independent.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub active: bool,
    pub role_id: Option<i64>,
    pub role_name: Option<String>,
}

pub struct ChannelRow {
    pub id: i64,
    pub name: String,
    pub min_role: Option<String>,
    pub active: bool,
}

pub struct PermissionRow {
    pub code: String,
    pub active: bool,
}
