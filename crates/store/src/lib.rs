pub mod catalog;
pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod scores;

pub use catalog::SqlCatalog;
pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{DemoSeedDataset, SeedResult, VerificationResult};
pub use scores::SqlScoreStore;

use tandem_core::ItemId;

// SQLite stores ids and weights as signed 64-bit integers; the casts
// round-trip bit for bit.
pub(crate) fn to_db_id(id: ItemId) -> i64 {
    id.0 as i64
}

pub(crate) fn from_db_id(raw: i64) -> ItemId {
    ItemId(raw as u64)
}
