//! Overlay State Manager
//!
//! A lazily populated, copy-on-write cache of accounts, code and
//! storage sitting between the EVM runtime and a remote chain adapter.
//! Reads fall through to the remote adapter on a miss; writes stay
//! local until committed or discarded.
//!
//! Three policies distinguish this from a bare `CacheDB`:
//! - codehash sanitization (a zero `codeHash` is rewritten to the
//!   empty-code hash before the EVM ever sees it),
//! - a best-effort account fallback when the remote adapter cannot
//!   serve a proof-based account fetch,
//! - a deployed-code registry that survives `revert()`.

use std::collections::HashMap;

use alloy::{
    network::Ethereum,
    providers::Provider,
    primitives::keccak256,
};
use revm::{
    database::{AlloyDB, CacheDB},
    database_interface::{async_db::DatabaseAsyncRef, DatabaseRef},
    primitives::{Address, StorageKey, StorageValue, B256},
    state::{Account, AccountInfo, Bytecode},
    Database, DatabaseCommit,
};

use crate::errors::{RuntimeError, SimError};
use crate::types::EMPTY_CODE_HASH;
use crate::wrap_db::MyWrapDatabaseAsync;

/// Remote-backed database used under the overlay, parameterized over
/// any `alloy` provider. Wraps `AlloyDB` (proof-based fetch) with the
/// async-to-sync bridge the teacher crate already provides.
pub type RemoteDb<P> = MyWrapDatabaseAsync<AlloyDB<P, Ethereum>>;

/// Fetch an account the same best-effort way when the remote adapter
/// does not support proof-based retrieval: three independent reads
/// (`eth_getBalance`, `eth_getTransactionCount`, `eth_getCode`) at a
/// fixed block tag.
///
/// `storageRoot` cannot be recovered this way and is set to
/// `keccak256("")`; this is a documented limitation (spec §9) — values
/// read through a proof-dependent path for such an account are
/// unreliable.
pub async fn fallback_account_fetch<P: Provider>(
    provider: &P,
    address: Address,
    block_number: u64,
) -> Result<AccountInfo, SimError> {
    let tag = alloy::eips::BlockId::number(block_number);
    let (balance, nonce, code) = tokio::try_join!(
        provider.get_balance(address).block_id(tag),
        provider.get_transaction_count(address).block_id(tag),
        provider.get_code_at(address).block_id(tag),
    )
    .map_err(|e| SimError::Upstream(format!("account fallback fetch failed: {e}")))?;

    let bytecode = Bytecode::new_raw(code.clone());
    let code_hash = if code.is_empty() {
        EMPTY_CODE_HASH
    } else {
        keccak256(&code)
    };
    log::debug!(
        "overlay: account fallback used for {address} (no proof support); storageRoot set to keccak256(\"\")"
    );
    Ok(AccountInfo {
        balance,
        nonce,
        code_hash,
        code: Some(bytecode),
    })
}

/// A single restore point for the overlay's local cache.
///
/// Snapshots are whole-cache clones rather than diffs: `CacheDB`'s
/// cache is a handful of `HashMap`s keyed by address/hash, cheap
/// relative to a remote round trip, and cloning the whole thing keeps
/// checkpoint/commit/revert trivially correct under nesting.
struct Snapshot<DB: DatabaseRef + Clone> {
    cache: CacheDB<DB>,
}

/// The Overlay State Manager: a `Database` + `DatabaseCommit` in front
/// of a remote-backed `CacheDB`, adding codehash sanitization, a
/// deployed-code registry, and nested checkpoint/commit/revert.
pub struct Overlay<DB: DatabaseRef + Clone> {
    cache: CacheDB<DB>,
    deployed_contracts: HashMap<Address, Vec<u8>>,
    checkpoints: Vec<Snapshot<DB>>,
}

impl<DB: DatabaseRef + Clone> Overlay<DB> {
    pub fn new(db: DB) -> Self {
        Self {
            cache: CacheDB::new(db),
            deployed_contracts: HashMap::new(),
            checkpoints: Vec::new(),
        }
    }

    /// Open a nested checkpoint. Every opened checkpoint must be
    /// closed by exactly one matching `commit` or `revert`.
    pub fn checkpoint(&mut self) {
        self.checkpoints.push(Snapshot {
            cache: self.cache.clone(),
        });
    }

    /// Close the innermost checkpoint, keeping the current state.
    pub fn commit(&mut self) {
        self.checkpoints.pop();
    }

    /// Close the innermost checkpoint, discarding every change made
    /// since it was opened, then replay the deployed-code registry
    /// back in — deployments are logically global to the simulator
    /// session, transaction effects are logically scoped to the
    /// bundle, so a revert must not erase a deployment (spec §4.2).
    pub fn revert(&mut self) {
        if let Some(snapshot) = self.checkpoints.pop() {
            self.cache = snapshot.cache;
        }
        self.replay_deployed_contracts();
    }

    fn replay_deployed_contracts(&mut self) {
        for (address, code) in self.deployed_contracts.clone() {
            let mut info = self
                .cache
                .cache
                .accounts
                .get(&address)
                .map(|a| a.info.clone())
                .unwrap_or_default();
            let bytecode = Bytecode::new_raw(code.into());
            info.code_hash = bytecode.hash_slow();
            info.code = Some(bytecode);
            self.cache.insert_account_info(address, info);
        }
    }

    /// Record a contract deployment in the registry in addition to the
    /// normal `DatabaseCommit` write, so it survives a later `revert`.
    pub fn put_contract_code(&mut self, address: Address, code: Vec<u8>) {
        self.deployed_contracts.insert(address, code.clone());
        let bytecode = Bytecode::new_raw(code.into());
        let mut info = self
            .cache
            .cache
            .accounts
            .get(&address)
            .map(|a| a.info.clone())
            .unwrap_or_default();
        info.code_hash = bytecode.hash_slow();
        info.code = Some(bytecode);
        self.cache.insert_account_info(address, info);
    }

    pub fn set_balance(&mut self, address: Address, balance: alloy::primitives::U256) {
        let mut info = self
            .cache
            .cache
            .accounts
            .get(&address)
            .map(|a| a.info.clone())
            .unwrap_or_default();
        info.balance = balance;
        self.cache.insert_account_info(address, info);
    }

    pub fn set_storage(
        &mut self,
        address: Address,
        key: StorageKey,
        value: StorageValue,
    ) -> Result<(), SimError> {
        self.cache
            .insert_account_storage(address, key, value)
            .map_err(|_| {
                SimError::Runtime(RuntimeError::SlotAccess(format!(
                    "failed to write slot {key} on {address}"
                )))
            })
    }

    /// Sanitize a fetched account's codeHash: the EVM's "no code"
    /// sentinel is `keccak256("")`, not the all-zero hash some remote
    /// endpoints report (spec §3, §4.2).
    fn sanitize(mut info: AccountInfo) -> AccountInfo {
        if info.code_hash.is_zero() {
            log::debug!("overlay: sanitizing zero codeHash to empty-code hash");
            info.code_hash = EMPTY_CODE_HASH;
        }
        info
    }
}

impl<DB: DatabaseRef + Clone> Database for Overlay<DB> {
    type Error = DB::Error;

    fn basic(&mut self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        let info = self.cache.basic(address)?;
        Ok(info.map(Self::sanitize))
    }

    fn code_by_hash(&mut self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        self.cache.code_by_hash(code_hash)
    }

    fn storage(&mut self, address: Address, index: StorageKey) -> Result<StorageValue, Self::Error> {
        self.cache.storage(address, index)
    }

    fn block_hash(&mut self, number: u64) -> Result<B256, Self::Error> {
        self.cache.block_hash(number)
    }
}

impl<DB: DatabaseRef + Clone> DatabaseCommit for Overlay<DB> {
    fn commit(&mut self, changes: HashMap<Address, Account>) {
        for (address, account) in &changes {
            if let Some(code) = &account.info.code {
                if !code.is_empty() {
                    log::debug!("overlay: recording deployed code at {address}");
                    self.deployed_contracts
                        .insert(*address, code.original_bytes().to_vec());
                }
            }
        }
        self.cache.commit(changes);
    }
}

/// A `DatabaseAsyncRef` that serves the proof-based path when the
/// remote provider supports it and falls back to the balance/nonce/code
/// triple otherwise. Exists so `AlloyDB`'s usual proof path can be
/// swapped for the best-effort fallback without a second database
/// stack; `AlloyDB` itself is still the primary implementation used by
/// `engine::SimulationEngine::create`, this type documents the
/// fallback contract for adapters that front a provider lacking
/// `eth_getProof`.
pub struct FallbackOnlyDb<P: Provider> {
    pub provider: P,
    pub block_number: u64,
}

impl<P: Provider + Clone + Send + Sync> DatabaseAsyncRef for FallbackOnlyDb<P> {
    type Error = SimError;

    async fn basic_async_ref(&self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        fallback_account_fetch(&self.provider, address, self.block_number)
            .await
            .map(Some)
    }

    async fn code_by_hash_async_ref(&self, _code_hash: B256) -> Result<Bytecode, Self::Error> {
        Err(SimError::Runtime(RuntimeError::AccountAccess(
            "code_by_hash not supported by the fallback account adapter".into(),
        )))
    }

    async fn storage_async_ref(
        &self,
        address: Address,
        index: StorageKey,
    ) -> Result<StorageValue, Self::Error> {
        let tag = alloy::eips::BlockId::number(self.block_number);
        self.provider
            .get_storage_at(address, index.into())
            .block_id(tag)
            .await
            .map(Into::into)
            .map_err(|e| SimError::Upstream(format!("eth_getStorageAt failed: {e}")))
    }

    async fn block_hash_async_ref(&self, _number: u64) -> Result<B256, Self::Error> {
        Err(SimError::Runtime(RuntimeError::AccountAccess(
            "block_hash not supported by the fallback account adapter".into(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revm::primitives::Bytes as RevmBytes;

    /// An empty, always-miss remote backend — enough to exercise the
    /// overlay's own policies without a network dependency.
    #[derive(Clone)]
    struct EmptyRemote;

    impl DatabaseRef for EmptyRemote {
        type Error = std::convert::Infallible;

        fn basic_ref(&self, _address: Address) -> Result<Option<AccountInfo>, Self::Error> {
            Ok(None)
        }
        fn code_by_hash_ref(&self, _code_hash: B256) -> Result<Bytecode, Self::Error> {
            Ok(Bytecode::default())
        }
        fn storage_ref(&self, _address: Address, _index: StorageKey) -> Result<StorageValue, Self::Error> {
            Ok(StorageValue::ZERO)
        }
        fn block_hash_ref(&self, _number: u64) -> Result<B256, Self::Error> {
            Ok(B256::ZERO)
        }
    }

    #[test]
    fn zero_code_hash_is_sanitized_to_empty_code_hash() {
        let mut overlay = Overlay::new(EmptyRemote);
        let addr = Address::repeat_byte(0xAA);
        overlay.cache.insert_account_info(
            addr,
            AccountInfo {
                code_hash: B256::ZERO,
                ..Default::default()
            },
        );
        let info = overlay.basic(addr).unwrap().unwrap();
        assert_eq!(info.code_hash, EMPTY_CODE_HASH);
        assert_ne!(info.code_hash, B256::ZERO);
    }

    #[test]
    fn deployed_code_survives_revert() {
        let mut overlay = Overlay::new(EmptyRemote);
        let addr = Address::repeat_byte(0xBB);
        overlay.put_contract_code(addr, RevmBytes::from_static(&[0x60, 0x00]).to_vec());

        overlay.checkpoint();
        overlay.set_balance(addr, alloy::primitives::U256::from(123));
        overlay.revert();

        let info = overlay.basic(addr).unwrap().unwrap();
        assert!(info.code.is_some(), "deployed code must survive a revert");
    }
}
