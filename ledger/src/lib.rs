//! Append-only proof ledger.
//!
//! The ledger is the single source of truth for a proof. Every state change
//! is an [`Event`](af_types::Event) appended with a strictly increasing
//! sequence number and a SHA-256 hash chained to the previous entry, so
//! edits, gaps and reordering are detectable by [`Ledger::verify`].
//!
//! # Example
//!
//! ```rust,no_run
//! use af_ledger::Ledger;
//! use af_types::Event;
//!
//! # fn example() -> Result<(), af_ledger::LedgerError> {
//! let mut ledger = Ledger::open("/path/to/proof/ledger.db")?;
//! let event = Event::ProofInitialized { conjecture: "P -> P".into() };
//! ledger.append(0, "alice", chrono::Utc::now(), &[event])?;
//! ledger.verify()?;
//! # Ok(())
//! # }
//! ```

mod entry;
mod error;
mod sqlite_util;
mod store;

pub use entry::{GENESIS_HASH, LedgerEntry, canonical_timestamp};
pub use error::LedgerError;
pub use store::{Ledger, VerifyReport};
