use crate::adapters::polymarket::chain::ChainClient;
use crate::adapters::polymarket::contracts::POLYGON_CHAIN_ID;
use crate::domain::redemption::{
    apply_gas_markup, condition_id_to_bytes32, outcome_to_index_sets, ConditionIdError,
    RedemptionCall,
};
use crate::models::Position;
use alloy::network::TransactionBuilder;
use alloy::primitives::{TxHash, U256};
use alloy::rpc::types::eth::TransactionRequest;
use log::{info, warn};
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

pub const REDEEM_GAS_LIMIT: u64 = 200_000;
pub const RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Why a single position could not be redeemed. Never escapes the cycle.
#[derive(Debug, Error)]
pub enum RedemptionError {
    #[error("RPC endpoint unreachable: {0}")]
    Connectivity(String),
    #[error("position has no condition id")]
    MissingConditionId,
    #[error(transparent)]
    InvalidConditionId(#[from] ConditionIdError),
    #[error("RPC query failed: {0}")]
    Rpc(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("submission failed: {0}")]
    Submission(String),
    /// Broadcast went through but no receipt arrived in time; the
    /// transaction may still be mined later.
    #[error("transaction {tx_hash} unconfirmed: {reason}")]
    Confirmation { tx_hash: TxHash, reason: String },
    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: TxHash },
    #[error("redemption task did not complete: {0}")]
    Worker(String),
}

#[derive(Debug)]
pub enum RedemptionOutcome {
    Redeemed { tx_hash: TxHash, value: Decimal },
    Failed { error: RedemptionError },
}

/// Sends one `redeemPositions` transaction for `position` and waits for its
/// receipt. Every failure is folded into the returned outcome.
pub async fn redeem_position<C: ChainClient + ?Sized>(
    chain: &C,
    position: &Position,
) -> RedemptionOutcome {
    match try_redeem(chain, position).await {
        Ok(tx_hash) => {
            info!(
                "redeem_ok condition_id={} tx={} value={} title={:?}",
                position.condition_label(),
                tx_hash,
                position.current_value,
                position.title.as_deref().unwrap_or("")
            );
            RedemptionOutcome::Redeemed {
                tx_hash,
                value: position.current_value,
            }
        }
        Err(error) => {
            warn!(
                "redeem_failed condition_id={} error={}",
                position.condition_label(),
                error
            );
            RedemptionOutcome::Failed { error }
        }
    }
}

async fn try_redeem<C: ChainClient + ?Sized>(
    chain: &C,
    position: &Position,
) -> Result<TxHash, RedemptionError> {
    chain
        .chain_id()
        .await
        .map_err(|e| RedemptionError::Connectivity(format!("{:#}", e)))?;

    let account = chain.signer_address();

    let condition_id = position
        .condition_id
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .ok_or(RedemptionError::MissingConditionId)?;

    let index_sets = outcome_to_index_sets(&position.outcome);
    let condition_bytes = condition_id_to_bytes32(condition_id)?;

    let nonce = chain
        .pending_nonce(account)
        .await
        .map_err(|e| RedemptionError::Rpc(format!("{:#}", e)))?;
    let gas_price = apply_gas_markup(
        chain
            .gas_price()
            .await
            .map_err(|e| RedemptionError::Rpc(format!("{:#}", e)))?,
    );

    let call = RedemptionCall::new(position.neg_risk, condition_bytes, index_sets);
    info!(
        "redeem_submit condition_id={} path={} outcome={:?} nonce={} gas_price={}",
        condition_id,
        call.path(),
        position.outcome,
        nonce,
        gas_price
    );

    let tx = TransactionRequest::default()
        .with_from(account)
        .with_to(call.target())
        .with_input(call.calldata())
        .with_value(U256::ZERO)
        .with_nonce(nonce)
        .with_gas_price(gas_price)
        .with_gas_limit(REDEEM_GAS_LIMIT)
        .with_chain_id(POLYGON_CHAIN_ID);

    let raw_tx = chain
        .sign_transaction(tx)
        .await
        .map_err(|e| RedemptionError::Signing(format!("{:#}", e)))?;

    let tx_hash = chain
        .send_raw_transaction(raw_tx)
        .await
        .map_err(|e| RedemptionError::Submission(format!("{:#}", e)))?;
    info!("redeem_sent condition_id={} tx={}", condition_id, tx_hash);

    let receipt = chain
        .await_receipt(tx_hash, RECEIPT_TIMEOUT)
        .await
        .map_err(|e| RedemptionError::Confirmation {
            tx_hash,
            reason: format!("{:#}", e),
        })?;

    info!(
        "redeem_receipt tx={} success={} block={:?}",
        receipt.tx_hash, receipt.success, receipt.block_number
    );
    if !receipt.success {
        return Err(RedemptionError::Reverted {
            tx_hash: receipt.tx_hash,
        });
    }
    Ok(receipt.tx_hash)
}
