pub mod diagnostics;
pub mod ledger;
pub mod pipeline;
pub mod scheduler;
pub mod subscribers;
