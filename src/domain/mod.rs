pub mod alert;
pub mod ledger;
pub mod order;

pub use alert::*;
pub use ledger::*;
pub use order::*;
