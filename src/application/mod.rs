// Application layer - the enrollment ledger service and its error taxonomy.
// Clients (CLI, import/export) go through LedgerService; nothing else
// mutates the entity tables.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
