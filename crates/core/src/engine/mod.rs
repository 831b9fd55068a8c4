pub mod ledger;
pub mod recommender;

pub use ledger::PurchaseLedger;
pub use recommender::Recommender;
