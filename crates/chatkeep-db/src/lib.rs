pub mod legacy;
pub mod migrations;
pub mod sqlite_store;
pub mod store;

pub use legacy::{JsonLegacySource, LegacySource, MigrationReport, migrate_legacy};
pub use sqlite_store::SqliteStore;
pub use store::{DurableStore, Namespace, SettingKey};
