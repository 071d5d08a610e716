//! Transaction Preparer
//!
//! Normalizes a loose `TransactionRequest` into a fully populated typed
//! transaction, then either signs it with a synthetic key from the
//! signature matcher or tags it with the impersonated sender for the
//! unsigned path.

use alloy::{
    consensus::{SignableTransaction, TxEip1559},
    eips::eip2930::AccessList,
    primitives::{Address, B256},
    signers::{local::PrivateKeySigner, SignerSync},
};
use revm::database::DatabaseRef;

use crate::errors::{RuntimeError, SimError};
use crate::overlay::Overlay;
use crate::revert::decode_revert_reason;
use crate::signature::SignatureMatcher;
use crate::types::{Eip1559Fields, SenderAuth, TransactionRequest, TxCore, TypedTransaction};

/// Gas limit used for the disposable gas-estimation transaction and
/// for unsized contract creations, per the populate protocol.
const ESTIMATION_GAS_LIMIT: u64 = 10_000_000;
const ESTIMATION_MAX_FEE_PER_GAS: u128 = 10;

pub struct TransactionPreparer;

impl TransactionPreparer {
    /// Populate and construct a typed transaction from a loose
    /// request:
    /// 1. validate `from`,
    /// 2. sync nonce from the overlay (0 if the account is absent),
    /// 3. estimate gas when absent and a `to` is present,
    /// 4. hard-assign the estimation gas limit for unsized creations,
    /// 5. sign with a synthetic key if `from`'s public key is
    ///    registered, otherwise tag the transaction with `from` for
    ///    the unsigned path.
    pub fn prepare<DB: DatabaseRef + Clone>(
        request: TransactionRequest,
        overlay: &mut Overlay<DB>,
        signature_matcher: &mut SignatureMatcher,
        chain_id: u64,
    ) -> Result<TypedTransaction, SimError>
    where
        DB::Error: std::fmt::Display,
    {
        if request.from == Address::ZERO {
            return Err(SimError::InvalidArgument(
                "transaction `from` must be a non-zero address".to_string(),
            ));
        }

        let nonce = match request.nonce {
            Some(n) => n,
            None => overlay
                .basic(request.from)
                .map_err(|e| SimError::Runtime(RuntimeError::AccountAccess(e.to_string())))?
                .map(|info| info.nonce)
                .unwrap_or(0),
        };

        let has_to = request.to.is_some();
        let gas_limit = match request.gas {
            Some(g) => g,
            None if has_to => Self::estimate_gas(&request, overlay, nonce, chain_id)?,
            None => ESTIMATION_GAS_LIMIT,
        };

        let core = TxCore {
            nonce,
            gas_limit,
            to: request.kind(),
            value: request.value,
            data: request.data.clone(),
            chain_id,
        };

        let max_fee_per_gas = request.max_fee_per_gas.unwrap_or(ESTIMATION_MAX_FEE_PER_GAS);
        let max_priority_fee_per_gas = request.max_priority_fee_per_gas.unwrap_or(0);

        let sender = if signature_matcher.is_public_key_registered(request.from) {
            let private_key = signature_matcher.get_simulation_private_key(request.from)?;
            Self::sign_with_synthetic_key(
                &core,
                max_fee_per_gas,
                max_priority_fee_per_gas,
                &request.access_list,
                private_key,
            )?
        } else {
            SenderAuth::Unsigned { sender: request.from }
        };

        Ok(TypedTransaction::Eip1559(Eip1559Fields {
            core,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            access_list: request.access_list,
            sender,
        }))
    }

    /// Sign the populated core fields with the synthetic private key
    /// the signature matcher issued for the impersonated sender. The
    /// EVM later recovers this signature through the matcher's
    /// `ecrecover` hook, which substitutes back the impersonated
    /// address's public key (spec §4.3, §4.4).
    fn sign_with_synthetic_key(
        core: &TxCore,
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
        access_list: &[(Address, Vec<B256>)],
        private_key: B256,
    ) -> Result<SenderAuth, SimError> {
        let signer = PrivateKeySigner::from_bytes(&private_key)
            .map_err(|e| SimError::Internal(format!("invalid synthetic private key: {e}")))?;

        let mut unsigned = unsigned_eip1559(core, max_fee_per_gas, max_priority_fee_per_gas, access_list);
        let sighash = unsigned.signature_hash();
        let signature = signer
            .sign_hash_sync(&sighash)
            .map_err(|e| SimError::Internal(format!("synthetic signing failed: {e}")))?;

        Ok(SenderAuth::Signed {
            v: signature.v() as u64,
            r: B256::from(signature.r().to_be_bytes()),
            s: B256::from(signature.s().to_be_bytes()),
        })
    }

    /// Run a disposable 1559-typed transaction through the overlay
    /// with balance/nonce/gas-limit/hardfork checks disabled, take its
    /// gas spent, and unconditionally revert the checkpoint it ran
    /// under.
    fn estimate_gas<DB: DatabaseRef + Clone>(
        request: &TransactionRequest,
        overlay: &mut Overlay<DB>,
        nonce: u64,
        chain_id: u64,
    ) -> Result<u64, SimError>
    where
        DB::Error: std::fmt::Display,
    {
        overlay.checkpoint();
        let tx = revm::context::TxEnv::builder()
            .caller(request.from)
            .kind(request.kind())
            .value(request.value)
            .data(request.data.clone())
            .nonce(nonce)
            .gas_limit(ESTIMATION_GAS_LIMIT)
            .gas_price(ESTIMATION_MAX_FEE_PER_GAS)
            .chain_id(Some(chain_id))
            .build_fill();

        let result = run_disposable(overlay, tx);
        overlay.revert();

        match result {
            Ok(gas_used) => Ok(gas_used),
            Err(reason) => Err(SimError::Upstream(format!(
                "gas estimation reverted: {reason}"
            ))),
        }
    }
}

/// Build the `alloy` EIP-1559 transaction shape `TxCore` mirrors, so
/// both the signer (here) and the engine's sender-recovery step build
/// the identical sighash.
pub(crate) fn unsigned_eip1559(
    core: &TxCore,
    max_fee_per_gas: u128,
    max_priority_fee_per_gas: u128,
    access_list: &[(Address, Vec<B256>)],
) -> TxEip1559 {
    TxEip1559 {
        chain_id: core.chain_id,
        nonce: core.nonce,
        gas_limit: core.gas_limit,
        max_fee_per_gas,
        max_priority_fee_per_gas,
        to: core.to,
        value: core.value,
        access_list: AccessList::from(
            access_list
                .iter()
                .map(|(addr, keys)| alloy::eips::eip2930::AccessListItem {
                    address: *addr,
                    storage_keys: keys.clone(),
                })
                .collect::<Vec<_>>(),
        ),
        input: core.data.clone(),
    }
}

/// Run one transaction through a throwaway EVM instance built on top of
/// the overlay and return gas spent on success or the decoded revert
/// reason on failure.
fn run_disposable<DB: DatabaseRef + Clone>(
    overlay: &mut Overlay<DB>,
    tx: revm::context::TxEnv,
) -> Result<u64, String>
where
    DB::Error: std::fmt::Display,
{
    let mut ctx = revm::Context::mainnet().with_db(&mut *overlay);
    ctx.cfg.disable_balance_check = true;
    ctx.cfg.disable_nonce_check = true;
    ctx.cfg.disable_block_gas_limit = true;
    ctx.cfg.disable_eip3607 = true;

    let mut evm = ctx.build_mainnet();
    match evm.transact(tx) {
        Ok(result) => {
            if result.result.is_success() {
                Ok(result.result.gas_used())
            } else {
                let output = result.result.output().cloned().unwrap_or_default();
                Err(decode_revert_reason(&output))
            }
        }
        Err(e) => Err(e.to_string()),
    }
}
