//! Testing support for `EventGuard` Event Log implementations.
//!
//! - [`contract`]: behavioural suite every [`EventStore`](eventguard::EventStore)
//!   backend must pass, runnable through [`event_store_contract_tests!`].
//! - [`chaos`]: a store wrapper injecting failures, conflicts and latency.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

pub mod chaos;
pub mod contract;

pub use chaos::*;
