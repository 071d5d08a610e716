//! Simulation Engine
//!
//! The crate's top-level façade. Owns the overlay state manager, the
//! signature matcher, the transaction preparer, the synthetic block
//! counter and the transaction index; exposes `call`, `execute`,
//! `executeBundle`, `estimateGas`, state-mutation helpers, and
//! hash-keyed lookup of past simulated transactions.

use alloy::{
    network::Ethereum,
    primitives::{Address, Bytes, StorageKey, StorageValue, B256, U256},
    providers::{Provider, ProviderBuilder},
};
use rand::RngCore;
use revm::{context::TxEnv, database::AlloyDB, ExecuteEvm};

use crate::errors::{InitError, RuntimeError, SimError};
use crate::fork::{is_simulated, resolve, reverse};
use crate::overlay::{Overlay, RemoteDb};
use crate::preparer::TransactionPreparer;
use crate::revert::decode_revert_reason;
use crate::signature::SignatureMatcher;
use crate::types::{
    CallResult, ForkContext, IndexedTransaction, LogEntry, Receipt, SenderAuth,
    SimulatedBlockCounter, TransactionIndex, TransactionRequest, TxCore, TypedTransaction,
};

/// Dynamically-dispatched provider handle so `SimulationEngine` does
/// not need to be generic over every concrete `alloy` transport a
/// caller might construct.
pub type DynProvider = alloy::providers::RootProvider<Ethereum>;

/// The top-level fork simulator.
///
/// Ownership: exclusively owns the overlay, the signature matcher, the
/// transaction preparer's inputs, the block counter and the
/// transaction index — none of these are shared outside the engine.
pub struct SimulationEngine {
    fork_context: ForkContext,
    overlay: Overlay<RemoteDb<DynProvider>>,
    signature_matcher: SignatureMatcher,
    block_counter: SimulatedBlockCounter,
    transaction_index: TransactionIndex,
}

impl SimulationEngine {
    /// Resolve chain id and fork block (defaulting to the remote
    /// head), then construct the overlay bound to that block. Issues
    /// exactly the two remote calls that cannot be lazily avoided:
    /// chain id and block header lookup.
    pub async fn create(rpc_url: &str, block_number: Option<u64>) -> Result<Self, SimError> {
        let url = rpc_url
            .parse()
            .map_err(|e| SimError::Init(InitError::InvalidRpcUrl(format!("{rpc_url}: {e}"))))?;
        let provider: DynProvider = ProviderBuilder::new().connect_http(url);

        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(|e| SimError::Init(InitError::ChainIdFetchError(e.to_string())))?;

        let fork_block_number = match block_number {
            Some(n) => n,
            None => provider
                .get_block_number()
                .await
                .map_err(|e| SimError::Init(InitError::BlockFetchError(e.to_string())))?,
        };

        let header = provider
            .get_block_by_number(fork_block_number.into())
            .await
            .map_err(|e| SimError::Init(InitError::BlockFetchError(e.to_string())))?
            .ok_or_else(|| SimError::Init(InitError::BlockNotFound(fork_block_number.to_string())))?;

        let alloy_db: AlloyDB<DynProvider, Ethereum> =
            AlloyDB::new(provider, fork_block_number.into());
        let wrapped = crate::wrap_db::MyWrapDatabaseAsync::new(alloy_db).ok_or_else(|| {
            SimError::Init(InitError::DatabaseError(
                "a multi-thread tokio runtime is required".to_string(),
            ))
        })?;

        Ok(Self {
            fork_context: ForkContext {
                chain_url: rpc_url.to_string(),
                fork_block_number,
                chain_id,
            },
            overlay: Overlay::new(wrapped),
            signature_matcher: SignatureMatcher::new(),
            block_counter: SimulatedBlockCounter::new(header.header.timestamp),
            transaction_index: TransactionIndex::new(),
        })
    }

    pub fn fork_context(&self) -> &ForkContext {
        &self.fork_context
    }

    /// Translate an internal delta into an external block number.
    pub fn resolve_block_number(&self, internal_counter: u64) -> u64 {
        resolve(&self.fork_context, internal_counter)
    }

    /// Inverse of `resolve_block_number`.
    pub fn reverse_block_number(&self, block_number: u64) -> u64 {
        reverse(&self.fork_context, block_number)
    }

    pub fn is_simulated_block(&self, block_number: u64) -> bool {
        is_simulated(&self.fork_context, block_number)
    }

    /// Register a public key for impersonation and return its
    /// synthetic private key.
    pub fn impersonate_account(&mut self, public_key: Bytes) -> Result<B256, SimError> {
        let address = self
            .signature_matcher
            .register_simulation_public_key(public_key)?;
        self.signature_matcher.get_simulation_private_key(address)
    }

    pub fn set_balance(&mut self, address: Address, balance: U256) {
        self.overlay.set_balance(address, balance);
    }

    pub fn set_storage(
        &mut self,
        address: Address,
        key: StorageKey,
        value: StorageValue,
    ) -> Result<(), SimError> {
        self.overlay.set_storage(address, key, value)
    }

    /// Estimate gas for a request via the preparer's populate protocol.
    pub fn estimate_gas(&mut self, request: TransactionRequest) -> Result<u64, SimError> {
        let typed = TransactionPreparer::prepare(
            request,
            &mut self.overlay,
            &mut self.signature_matcher,
            self.fork_context.chain_id,
        )?;
        Ok(typed.core().gas_limit)
    }

    /// Static read-only call. Wraps the EVM's read-only mode between an
    /// overlay checkpoint and an unconditional revert, so no mutation
    /// persists. `to` is required.
    pub fn call(&mut self, mut request: TransactionRequest) -> Result<CallResult, SimError> {
        if request.to.is_none() {
            return Err(SimError::InvalidArgument(
                "call requires `to`".to_string(),
            ));
        }
        if request.value == U256::ZERO {
            request.value = U256::ZERO;
        }

        self.overlay.checkpoint();
        let tx = TxEnv::builder()
            .caller(request.from)
            .kind(request.kind())
            .value(request.value)
            .data(request.data.clone())
            .gas_limit(request.gas.unwrap_or(50_000_000))
            .gas_price(0)
            .chain_id(Some(self.fork_context.chain_id))
            .build_fill();

        let outcome = run_transaction(&mut self.overlay, tx, true, true, false, true);
        self.overlay.revert();

        outcome.map(|(_, result)| CallResult {
            success: result.status,
            return_data: result.revert_data.clone().unwrap_or_default(),
            gas_used: result.gas_used,
            error: result.error,
        })
    }

    /// Single-transaction convenience around `execute_bundle`.
    pub fn execute(&mut self, request: TransactionRequest) -> Result<(B256, Receipt), SimError> {
        let mut results = self.execute_bundle(vec![request])?;
        Ok(results.remove(0))
    }

    /// Execute a bundle of requests atomically: prepare all through the
    /// preparer, classify fully-signed vs. unsigned, run them under a
    /// single checkpoint, and commit only if every receipt succeeded.
    pub fn execute_bundle(
        &mut self,
        requests: Vec<TransactionRequest>,
    ) -> Result<Vec<(B256, Receipt)>, SimError> {
        let mut typed_transactions = Vec::with_capacity(requests.len());
        for request in requests {
            let typed = TransactionPreparer::prepare(
                request,
                &mut self.overlay,
                &mut self.signature_matcher,
                self.fork_context.chain_id,
            )?;
            typed_transactions.push(typed);
        }
        self.execute_typed_bundle(typed_transactions)
    }

    /// Skip the preparer entirely — used by the raw-transaction path,
    /// where every field including the signature is already present.
    pub fn execute_typed_transaction(
        &mut self,
        typed: TypedTransaction,
    ) -> Result<(B256, Receipt), SimError> {
        let mut results = self.execute_typed_bundle(vec![typed])?;
        Ok(results.remove(0))
    }

    fn execute_typed_bundle(
        &mut self,
        typed_transactions: Vec<TypedTransaction>,
    ) -> Result<Vec<(B256, Receipt)>, SimError> {
        let fully_signed = typed_transactions.iter().all(TypedTransaction::is_signed);

        self.overlay.checkpoint();

        if fully_signed {
            self.block_counter.advance();
        }

        let mut results = Vec::with_capacity(typed_transactions.len());
        let mut any_error = false;

        for typed in &typed_transactions {
            let tx = match build_tx_env(typed, self.fork_context.chain_id, &self.signature_matcher) {
                Ok(tx) => tx,
                Err(e) => {
                    self.overlay.revert();
                    return Err(e);
                }
            };
            let (skip_balance, skip_nonce, skip_gas_limit, skip_hardfork) = if fully_signed {
                (true, false, false, false)
            } else {
                (true, true, true, true)
            };
            let outcome = run_transaction(
                &mut self.overlay,
                tx,
                skip_balance,
                skip_nonce,
                skip_gas_limit,
                skip_hardfork,
            );
            let (gas_used, mut receipt) = match outcome {
                Ok((gas, receipt)) => (gas, receipt),
                Err(e) => {
                    self.overlay.revert();
                    return Err(e);
                }
            };
            let _ = gas_used;
            if !receipt.status {
                any_error = true;
            }

            let hash = compute_tx_hash(typed);
            receipt.logs = receipt.logs;
            results.push((hash, receipt));
        }

        if any_error {
            self.overlay.revert();
        } else {
            self.overlay.commit();
        }

        let simulated_block_number = if fully_signed {
            Some(self.resolve_block_number(self.block_counter.current))
        } else {
            None
        };

        for ((hash, receipt), typed) in results.iter().zip(typed_transactions.into_iter()) {
            self.transaction_index.insert(
                *hash,
                IndexedTransaction {
                    typed_transaction: typed,
                    result: receipt.clone(),
                    simulated_block_number,
                },
            );
        }

        Ok(results)
    }

    pub fn get_transaction(&self, hash: &B256) -> Option<&TypedTransaction> {
        self.transaction_index.get(hash).map(|e| &e.typed_transaction)
    }

    pub fn get_transaction_result(&self, hash: &B256) -> Option<&Receipt> {
        self.transaction_index.get(hash).map(|e| &e.result)
    }
}

fn build_tx_env(
    typed: &TypedTransaction,
    chain_id: u64,
    signature_matcher: &SignatureMatcher,
) -> Result<TxEnv, SimError> {
    let core = typed.core();
    let sender = match typed.sender_auth() {
        SenderAuth::Signed { v, r, s } => recover_signed_sender(typed, *v, *r, *s, signature_matcher)?,
        SenderAuth::Unsigned { sender } => *sender,
    };
    let (gas_price, max_fee, max_priority) = match typed {
        TypedTransaction::Legacy(t) => (t.gas_price, t.gas_price, t.gas_price),
        TypedTransaction::Eip2930(t) => (t.gas_price, t.gas_price, t.gas_price),
        TypedTransaction::Eip1559(t) => (
            t.max_fee_per_gas,
            t.max_fee_per_gas,
            t.max_priority_fee_per_gas,
        ),
    };
    let _ = max_priority;
    let _ = max_fee;

    Ok(TxEnv::builder()
        .caller(sender)
        .kind(core.to)
        .value(core.value)
        .data(core.data.clone())
        .nonce(core.nonce)
        .gas_limit(core.gas_limit)
        .gas_price(gas_price)
        .chain_id(Some(chain_id))
        .build_fill())
}

/// Recover the real sender from a signed typed transaction's v/r/s
/// through the signature matcher's `ecrecover` hook — the same
/// substitution the EVM's own crypto configuration would apply, so the
/// bundle executor treats an impersonated, synthetic-key-signed
/// transaction exactly as the EVM itself would.
fn recover_signed_sender(
    typed: &TypedTransaction,
    v: u64,
    r: B256,
    s: B256,
    signature_matcher: &SignatureMatcher,
) -> Result<Address, SimError> {
    let sighash = match typed {
        TypedTransaction::Eip1559(t) => crate::preparer::unsigned_eip1559(
            &t.core,
            t.max_fee_per_gas,
            t.max_priority_fee_per_gas,
            &t.access_list,
        )
        .signature_hash(),
        _ => {
            return Err(SimError::Internal(
                "signed non-1559 transactions are not constructed by this preparer".to_string(),
            ))
        }
    };
    let public_key = signature_matcher.ecrecover(sighash, v, r, s)?;
    Ok(address_from_public_key_bytes(&public_key))
}

fn address_from_public_key_bytes(public_key: &Bytes) -> Address {
    let hash = alloy::primitives::keccak256(public_key.as_ref());
    Address::from_slice(&hash[12..])
}

fn compute_tx_hash(typed: &TypedTransaction) -> B256 {
    match typed.sender_auth() {
        SenderAuth::Signed { v, r, s } => {
            let mut bytes = Vec::new();
            bytes.extend_from_slice(&typed.core().nonce.to_be_bytes());
            bytes.extend_from_slice(r.as_slice());
            bytes.extend_from_slice(s.as_slice());
            bytes.extend_from_slice(&v.to_be_bytes());
            alloy::primitives::keccak256(&bytes)
        }
        SenderAuth::Unsigned { .. } => {
            // Some EVM implementations cannot hash an unsigned
            // transaction; fabricate a 32-byte placeholder whose first
            // 12 bytes are zero and remaining 20 are random, per the
            // execution protocol.
            let mut bytes = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut bytes[12..]);
            B256::from(bytes)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_transaction<DB: revm::database::DatabaseRef + Clone>(
    overlay: &mut Overlay<DB>,
    tx: TxEnv,
    skip_balance: bool,
    skip_nonce: bool,
    skip_block_gas_limit: bool,
    skip_hardfork_validation: bool,
) -> Result<(u64, Receipt), SimError>
where
    DB::Error: std::fmt::Display,
{
    let mut ctx = revm::Context::mainnet().with_db(overlay);
    ctx.cfg.disable_balance_check = skip_balance;
    ctx.cfg.disable_nonce_check = skip_nonce;
    ctx.cfg.disable_block_gas_limit = skip_block_gas_limit;
    ctx.cfg.disable_eip3607 = skip_hardfork_validation;

    let mut evm = ctx.build_mainnet();
    let result = evm
        .transact_commit(tx)
        .map_err(|e| SimError::Runtime(RuntimeError::ExecutionFailed(e.to_string())))?;

    let gas_used = result.gas_used();
    let status = result.is_success();
    let output = result.output().cloned().unwrap_or_default();
    let created_address = result.created_address();

    let (error, revert_data) = if status {
        (None, None)
    } else {
        (Some(decode_revert_reason(&output)), Some(output.clone()))
    };

    let logs: Vec<LogEntry> = result
        .logs()
        .iter()
        .map(|log| LogEntry {
            address: log.address,
            topics: log.topics().to_vec(),
            data: log.data.data.clone(),
        })
        .collect();

    Ok((
        gas_used,
        Receipt {
            status,
            cumulative_gas_used: gas_used,
            gas_used,
            logs,
            created_address,
            state_root: None,
            revert_data,
            error,
        },
    ))
}
