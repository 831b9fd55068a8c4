pub mod catalog;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod store;

pub use catalog::{Catalog, MemoryCatalog};
pub use domain::basket::Basket;
pub use domain::item::{Item, ItemId};
pub use engine::{PurchaseLedger, Recommender};
pub use errors::{CatalogError, EngineError, InterfaceError, StoreError};
pub use store::{AssociationRow, MemoryScoreStore, ScoreStore, Weight};
