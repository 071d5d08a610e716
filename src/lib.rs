//! # fork-sim
//!
//! An in-process EVM fork simulator: it pins a live public chain at a
//! chosen block height and lets callers execute transactions and
//! read-only calls against a mutable overlay on top of immutable
//! remote state, without broadcasting to the network.
//!
//! Three subsystems carry the weight of the crate:
//!
//! - [`engine::SimulationEngine`] — the top-level façade: transaction
//!   preparation, block synthesis, checkpoint/commit/revert discipline,
//!   and the fork/simulated block-numbering scheme.
//! - [`overlay::Overlay`] — a lazily populated, copy-on-write cache of
//!   accounts, code and storage that falls back to a remote JSON-RPC
//!   endpoint on a miss.
//! - [`signature::SignatureMatcher`] — lets the simulator execute
//!   transactions "from" addresses it holds no private key for, by
//!   substituting a synthetic key pair and rewriting signature
//!   recovery.
//!
//! ## Example
//!
//! ```no_run
//! use fork_sim::{SimulationEngine, TransactionRequest};
//!
//! # async fn run() -> Result<(), fork_sim::SimError> {
//! let mut engine = SimulationEngine::create("https://eth.llamarpc.com", None).await?;
//!
//! let request = TransactionRequest {
//!     from: "0x0000000000000000000000000000000000dEaD".parse().unwrap(),
//!     to: Some("0x0000000000000000000000000000000000bEEF".parse().unwrap()),
//!     value: alloy::primitives::U256::from(1),
//!     ..Default::default()
//! };
//! let (hash, receipt) = engine.execute(request)?;
//! println!("{hash}: status={}", receipt.status);
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod errors;
pub mod fork;
pub mod overlay;
pub mod preparer;
pub mod revert;
pub mod signature;
pub mod types;
mod wrap_db;

pub mod utils;

pub use engine::SimulationEngine;
pub use errors::{InitError, RuntimeError, SimError, TokenError};
pub use overlay::Overlay;
pub use preparer::TransactionPreparer;
pub use revert::decode_revert_reason;
pub use signature::SignatureMatcher;
pub use types::{
    Account, CallResult, CodeEntry, ForkContext, ImpersonationRecord, Receipt,
    SimulatedBlockCounter, StorageSlot, TransactionIndex, TransactionRequest, TypedTransaction,
};

pub use alloy;
pub use revm;
