#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Provider chain and the providers shipped with the crate.
pub mod provider;
/// The resolution pass every field read goes through.
pub mod resolver;
/// SQLite backed override persistence.
pub mod sqlite;
/// Override records and the store contract.
pub mod store;

pub use provider::{
    ActiveContext, CcxOverrideProvider, IndividualDueDateProvider, OverrideProvider,
    ProviderChain, WriteOutcome,
};
pub use resolver::{ResolutionPass, clear_override, resolve_field, set_override};
pub use sqlite::SqliteOverrideStore;
pub use store::{MemoryOverrideStore, OverrideContext, OverrideRecord, OverrideStore};
