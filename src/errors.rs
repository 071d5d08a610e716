//! Error types for the fork simulator
//!
//! This module defines a comprehensive error handling system that covers:
//! - Simulator initialization errors
//! - Runtime execution errors
//! - Token-related errors (ERC20 helper surface)
//! - Error conversion and propagation
//!
//! `SimError` is the type every public operation on `SimulationEngine`
//! returns. EVM-level transaction outcomes (revert, panic, out-of-gas)
//! are never represented here — they live on `Receipt::error` instead,
//! since a reverted transaction is a normal, expected result of
//! `execute`/`executeBundle`, not a failure of the call itself.

use thiserror::Error;

/// Top-level error type for the simulation engine.
///
/// Encompasses all possible errors that can occur while preparing or
/// running a simulation, providing a unified error handling interface
/// for callers.
#[derive(Debug, Error)]
pub enum SimError {
    /// Malformed caller input: a bad address, a `call` without `to`, an
    /// unrecognized block tag.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A precondition the caller was required to satisfy first was not
    /// met — e.g. requesting a synthetic key for a public key that was
    /// never registered with the signature matcher.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A remote call (chain id, block header, account/code/storage
    /// fetch) failed in a way preparation could not recover from.
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// An invariant of the simulator itself was violated — for example
    /// a signature-matcher reverse mapping pointing at a public key
    /// that was never registered. Never expected in normal operation;
    /// propagated to the caller unchanged rather than wrapped.
    #[error("internal invariant violated: {0}")]
    Internal(String),

    /// Errors occurring during simulator initialization
    #[error("failed to initialize simulator: {0}")]
    Init(#[from] InitError),

    /// Errors occurring while preparing or driving transaction execution
    #[error("error during execution: {0}")]
    Runtime(#[from] RuntimeError),

    /// Errors related to token operations
    #[error("token error: {0}")]
    Token(#[from] TokenError),
}

impl SimError {
    /// JSON-RPC error code a front-end should surface for this error,
    /// per the error-handling design: malformed parameters map to
    /// `-32602`, everything else that is allowed to reach the wire maps
    /// to `-32000`. `Internal` errors are meant to escape unchanged and
    /// are not expected to be serialized onto the wire at all.
    pub fn rpc_code(&self) -> i64 {
        match self {
            SimError::InvalidArgument(_) => -32602,
            _ => -32000,
        }
    }
}

/// Sentinel JSON-RPC error code used internally to signal "this block
/// tag names forked history; fall back to the remote chain adapter".
/// Strictly a routing signal between the engine and a JSON-RPC
/// front-end — never sent over the wire.
pub const FALLBACK_TO_REMOTE_SENTINEL: i64 = 32552225;

/// Initialization-specific errors
///
/// These errors occur during the setup phase of the simulator,
/// typically related to network connectivity and chain/block
/// resolution.
#[derive(Debug, Error)]
pub enum InitError {
    /// Invalid or malformed RPC URL
    #[error("invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    /// Database setup or connection errors
    #[error("database initialization failed: {0}")]
    DatabaseError(String),

    /// WebSocket connection establishment errors
    #[error("WebSocket connection failed: {0}")]
    WsConnection(String),

    /// Errors fetching the chain ID from the provider
    #[error("failed to fetch chain ID: {0}")]
    ChainIdFetchError(String),

    /// Errors related to block fetching
    #[error("failed to fetch block: {0}")]
    BlockFetchError(String),

    /// Errors related to block not found
    #[error("block not found: {0}")]
    BlockNotFound(String),
}

/// Runtime execution errors
///
/// These occur while preparing or driving a transaction through the
/// EVM — as distinct from the transaction's own execution outcome
/// (success, revert, halt), which is carried on the receipt rather than
/// raised here.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// General transaction preparation/execution failures
    #[error("transaction execution failed: {0}")]
    ExecutionFailed(String),

    /// Errors accessing account information through the overlay
    #[error("account access error: {0}")]
    AccountAccess(String),

    /// Errors accessing storage slots through the overlay
    #[error("slot access error: {0}")]
    SlotAccess(String),

    /// Errors decoding data returned from the EVM
    #[error("failed to decode data: {0}")]
    DecodeError(String),
}

#[derive(Debug, Error)]
pub enum BalanceError {
    /// Failed to decode balance of a token holder
    ///
    /// # Fields
    /// * `address` - Token contract address
    /// * `holder` - Token holder address
    /// * `reason` - Detailed error message
    #[error("Failed to decode balance for {holder} in token {address}: {reason}")]
    BalanceDecode {
        address: String,
        holder: String,
        reason: String,
    },

    /// Failed to get the native balance of an address
    ///
    /// # Fields
    /// * `holder` - Holder address
    /// * `reason` - Detailed error message
    #[error("Failed to get balance of {holder}: {reason}")]
    BalanceGetError { holder: String, reason: String },
}

/// Token-specific errors
///
/// These errors occur during ERC20 token helper calls (used by tests
/// and demos; see `utils::erc20_utils`).
#[derive(Debug, Error)]
pub enum TokenError {
    /// General token-related errors
    ///
    /// This variant wraps any error that does not fit into the specific
    /// token error categories.
    #[error("Token error: {0}")]
    AnyhowError(#[from] anyhow::Error),

    /// Failed to decode token symbol
    #[error("Failed to decode token symbol for {address}: {reason}")]
    SymbolDecode { address: String, reason: String },

    /// Failed to decode token decimals
    #[error("Failed to decode token decimals for {address}: {reason}")]
    DecimalsDecode { address: String, reason: String },

    /// Failed to decode balance of a token holder
    #[error("Failed to decode balance for {holder} in token {address}: {reason}")]
    BalanceDecode {
        address: String,
        holder: String,
        reason: String,
    },

    /// General token query failures
    #[error("Failed to query token {address}: {reason}")]
    QueryFailed { address: String, reason: String },
}
