//! Core data types for the fork simulator
//!
//! Defines the records shared across the simulation engine, overlay
//! state manager, signature matcher and transaction preparer: account
//! and storage records, fork context and block-numbering state,
//! impersonation records, typed transactions and receipts.

pub use alloy::primitives::{Address, Bytes, TxKind, B256, U256};
use serde::Serialize;
use std::collections::HashMap;

/// keccak256("") — the canonical "no code" sentinel. Some remote RPC
/// endpoints report a zero `codeHash` for empty-code accounts instead;
/// the overlay rewrites that to this value before the EVM ever sees it
/// (see `overlay::Overlay::sanitize_code_hash`).
pub const EMPTY_CODE_HASH: B256 = B256::new([
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03, 0xc0,
    0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
]);

/// An account as observed by the overlay, after codehash sanitization.
///
/// Invariant: `code_hash` is never the all-zero hash — see
/// `EMPTY_CODE_HASH`.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub address: Address,
    pub balance: U256,
    pub nonce: u64,
    pub code_hash: B256,
    pub storage_root: B256,
}

/// Contract code deployed during simulation, recorded in the overlay's
/// deployed-code registry so it can be replayed back in after a revert.
#[derive(Debug, Clone)]
pub struct CodeEntry {
    pub address: Address,
    pub bytes: Bytes,
}

/// A single storage slot read or write.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StorageSlot {
    pub address: Address,
    pub key: B256,
    pub value: B256,
}

/// Immutable fork context, fixed at `SimulationEngine` construction.
#[derive(Debug, Clone, Serialize)]
pub struct ForkContext {
    pub chain_url: String,
    pub fork_block_number: u64,
    pub chain_id: u64,
}

/// Monotonic counter for blocks synthesized inside the simulator.
///
/// `current` is a 0-based delta: the external block number of the
/// `k`-th simulated block is `fork_block_number + k`. `resolve`/
/// `reverse` on `SimulationEngine` must be exact inverses of one
/// another.
#[derive(Debug, Clone)]
pub struct SimulatedBlockCounter {
    pub current: u64,
    pub last_timestamp: u64,
}

impl SimulatedBlockCounter {
    pub fn new(fork_timestamp: u64) -> Self {
        Self {
            current: 0,
            last_timestamp: fork_timestamp,
        }
    }

    /// Advance the counter by one simulated block, bumping the
    /// synthetic timestamp by one second.
    pub fn advance(&mut self) -> (u64, u64) {
        self.current += 1;
        self.last_timestamp += 1;
        (self.current, self.last_timestamp)
    }
}

/// Links an impersonated public key to the synthetic key pair the
/// simulator signs on its behalf with.
///
/// Invariant: a public key must be registered before a synthetic key is
/// issued for it; each impersonated address has at most one synthetic
/// pair; `synthetic_address` uniquely maps back to
/// `impersonated_address`.
#[derive(Debug, Clone)]
pub struct ImpersonationRecord {
    pub impersonated_address: Address,
    pub public_key: Bytes,
    pub synthetic_private_key: B256,
    pub synthetic_address: Address,
}

/// Loose transaction request accepted by the transaction preparer,
/// analogous to an `eth_sendTransaction`/`eth_call` parameter object.
#[derive(Debug, Clone, Default)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub gas: Option<u64>,
    pub gas_price: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
    pub nonce: Option<u64>,
    pub access_list: Vec<(Address, Vec<B256>)>,
}

impl TransactionRequest {
    pub fn kind(&self) -> TxKind {
        match self.to {
            Some(addr) => TxKind::Call(addr),
            None => TxKind::Create,
        }
    }
}

/// Shared fields every typed transaction carries.
#[derive(Debug, Clone)]
pub struct TxCore {
    pub nonce: u64,
    pub gas_limit: u64,
    pub to: TxKind,
    pub value: U256,
    pub data: Bytes,
    pub chain_id: u64,
}

/// How a typed transaction's sender is established for execution.
///
/// `Signed` carries a real ECDSA signature, recovered through the
/// signature matcher's `ecrecover`. `Unsigned` carries the sender
/// directly and executes through the unsigned path, with signature
/// validation disabled.
#[derive(Debug, Clone)]
pub enum SenderAuth {
    Signed { v: u64, r: B256, s: B256 },
    Unsigned { sender: Address },
}

#[derive(Debug, Clone)]
pub struct LegacyFields {
    pub core: TxCore,
    pub gas_price: u128,
    pub sender: SenderAuth,
}

#[derive(Debug, Clone)]
pub struct Eip2930Fields {
    pub core: TxCore,
    pub gas_price: u128,
    pub access_list: Vec<(Address, Vec<B256>)>,
    pub sender: SenderAuth,
}

#[derive(Debug, Clone)]
pub struct Eip1559Fields {
    pub core: TxCore,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub access_list: Vec<(Address, Vec<B256>)>,
    pub sender: SenderAuth,
}

/// One of the three typed transaction shapes the preparer can produce,
/// fully populated and either signed with a synthetic key or tagged
/// with an impersonated sender.
///
/// This is the tagged-variant alternative to overriding a
/// sender-lookup method at runtime: an unsigned transaction simply
/// carries its intended sender alongside it, and the EVM-facing code
/// in `engine` reads `sender_auth()` uniformly regardless of variant.
#[derive(Debug, Clone)]
pub enum TypedTransaction {
    Legacy(LegacyFields),
    Eip2930(Eip2930Fields),
    Eip1559(Eip1559Fields),
}

impl TypedTransaction {
    pub fn core(&self) -> &TxCore {
        match self {
            TypedTransaction::Legacy(t) => &t.core,
            TypedTransaction::Eip2930(t) => &t.core,
            TypedTransaction::Eip1559(t) => &t.core,
        }
    }

    pub fn sender_auth(&self) -> &SenderAuth {
        match self {
            TypedTransaction::Legacy(t) => &t.sender,
            TypedTransaction::Eip2930(t) => &t.sender,
            TypedTransaction::Eip1559(t) => &t.sender,
        }
    }

    /// `true` once every signature field is populated — the
    /// "fully signed" vs. "unsigned" classification a transaction
    /// falls into before execution.
    pub fn is_signed(&self) -> bool {
        matches!(self.sender_auth(), SenderAuth::Signed { .. })
    }
}

/// A decoded event log.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// Outcome of a completed transaction.
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub status: bool,
    pub cumulative_gas_used: u64,
    pub gas_used: u64,
    pub logs: Vec<LogEntry>,
    pub created_address: Option<Address>,
    pub state_root: Option<B256>,
    pub revert_data: Option<Bytes>,
    /// Human-readable decoded revert/panic reason, present whenever
    /// `status` is `false` and the EVM returned decodable data.
    pub error: Option<String>,
}

/// Result of a read-only `call` — no receipt, no index entry, no state
/// mutation.
#[derive(Debug, Clone)]
pub struct CallResult {
    pub success: bool,
    pub return_data: Bytes,
    pub gas_used: u64,
    pub error: Option<String>,
}

/// Entry stored in the simulation engine's transaction index.
#[derive(Debug, Clone)]
pub struct IndexedTransaction {
    pub typed_transaction: TypedTransaction,
    pub result: Receipt,
    pub simulated_block_number: Option<u64>,
}

/// Process-lifetime, insertion-only map from transaction hash to its
/// indexed result. Hashes are lowercase, `0x`-prefixed hex strings.
#[derive(Debug, Default)]
pub struct TransactionIndex {
    entries: HashMap<String, IndexedTransaction>,
}

impl TransactionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, hash: B256, entry: IndexedTransaction) {
        self.entries.insert(hash_key(hash), entry);
    }

    pub fn get(&self, hash: &B256) -> Option<&IndexedTransaction> {
        self.entries.get(&hash_key(*hash))
    }
}

/// Render a transaction hash the way the index keys on it: lowercase,
/// `0x`-prefixed.
pub fn hash_key(hash: B256) -> String {
    format!("0x{:x}", hash)
}
