/// Schema step applied when `PRAGMA user_version` is below `version`.
pub struct Migration {
    pub version: i32,
    pub sql: &'static str,
}

pub const SCHEMA_V1: Migration = Migration {
    version: 1,
    sql: "CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chats (
            id TEXT PRIMARY KEY,
            record TEXT NOT NULL,
            updated_at INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_chats_updated_at
            ON chats(updated_at DESC);",
};

pub const MIGRATIONS: &[Migration] = &[SCHEMA_V1];

pub fn latest_version() -> i32 {
    MIGRATIONS.iter().map(|m| m.version).max().unwrap_or(0)
}
