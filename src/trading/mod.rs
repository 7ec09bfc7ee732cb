pub mod ledger;
pub mod registry;
pub mod store;
pub mod trade_record;

pub use ledger::Session;
pub use registry::SessionRegistry;
pub use trade_record::Trade;
