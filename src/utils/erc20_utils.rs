//! ERC20 token interaction helpers
//!
//! Thin read-only call wrappers used by the ERC-20 test scenarios
//! (deploy/transfer, impersonated transfer, revert-carries-reason):
//! `balanceOf`, `decimals`, `symbol`, all run as a throwaway call
//! through the overlay the same way `preparer::TransactionPreparer`
//! estimates gas — open a checkpoint, run, revert unconditionally.

use alloy::{
    primitives::{Address, TxKind, U256},
    sol,
    sol_types::SolCall,
};
use revm::{database::DatabaseRef, ExecuteEvm};

use crate::errors::{SimError, TokenError};
use crate::overlay::Overlay;

sol! {
    function symbol() external returns (string);
    function decimals() external returns (uint8);
    function balanceOf(address account) external returns (uint256);
}

fn call_view<DB: DatabaseRef + Clone>(
    overlay: &mut Overlay<DB>,
    token: Address,
    calldata: Vec<u8>,
) -> Result<Vec<u8>, SimError>
where
    DB::Error: std::fmt::Display,
{
    overlay.checkpoint();

    let tx = revm::context::TxEnv::builder()
        .caller(Address::ZERO)
        .kind(TxKind::Call(token))
        .value(U256::ZERO)
        .data(calldata.into())
        .gas_limit(5_000_000)
        .gas_price(0)
        .build_fill();

    let mut ctx = revm::Context::mainnet().with_db(&mut *overlay);
    ctx.cfg.disable_balance_check = true;
    ctx.cfg.disable_nonce_check = true;
    ctx.cfg.disable_eip3607 = true;
    let mut evm = ctx.build_mainnet();
    let outcome = evm.transact(tx);
    overlay.revert();

    let result = outcome.map_err(|e| {
        SimError::Token(TokenError::QueryFailed {
            address: token.to_string(),
            reason: e.to_string(),
        })
    })?;

    if !result.result.is_success() {
        return Err(SimError::Token(TokenError::QueryFailed {
            address: token.to_string(),
            reason: "call did not succeed".to_string(),
        }));
    }
    Ok(result.result.output().cloned().unwrap_or_default().to_vec())
}

pub fn get_token_balance<DB: DatabaseRef + Clone>(
    overlay: &mut Overlay<DB>,
    token: Address,
    account: Address,
) -> Result<U256, SimError>
where
    DB::Error: std::fmt::Display,
{
    let calldata = balanceOfCall { account }.abi_encode();
    let output = call_view(overlay, token, calldata)?;
    balanceOfCall::abi_decode_returns(&output)
        .map(|r| r.into())
        .map_err(|e| {
            SimError::Token(TokenError::BalanceDecode {
                address: token.to_string(),
                holder: account.to_string(),
                reason: e.to_string(),
            })
        })
}

pub fn get_token_decimals<DB: DatabaseRef + Clone>(
    overlay: &mut Overlay<DB>,
    token: Address,
) -> Result<u8, SimError>
where
    DB::Error: std::fmt::Display,
{
    let calldata = decimalsCall {}.abi_encode();
    let output = call_view(overlay, token, calldata)?;
    decimalsCall::abi_decode_returns(&output)
        .map(|r| r.into())
        .map_err(|e| {
            SimError::Token(TokenError::DecimalsDecode {
                address: token.to_string(),
                reason: e.to_string(),
            })
        })
}

pub fn get_token_symbol<DB: DatabaseRef + Clone>(
    overlay: &mut Overlay<DB>,
    token: Address,
) -> Result<String, SimError>
where
    DB::Error: std::fmt::Display,
{
    let calldata = symbolCall {}.abi_encode();
    let output = call_view(overlay, token, calldata)?;
    symbolCall::abi_decode_returns(&output)
        .map(|r| r.into())
        .map_err(|e| {
            SimError::Token(TokenError::SymbolDecode {
                address: token.to_string(),
                reason: e.to_string(),
            })
        })
}
