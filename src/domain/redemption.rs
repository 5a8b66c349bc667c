use crate::adapters::polymarket::contracts::{
    IConditionalTokens, INegRiskAdapter, COLLATERAL_TOKEN, CONDITIONAL_TOKENS, NEG_RISK_ADAPTER,
};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use thiserror::Error;

/// Percentage added on top of the node's gas price quote.
pub const GAS_PRICE_MARKUP_PERCENT: u128 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConditionIdError {
    #[error("condition id has {0} hex digits, at most 64 allowed")]
    TooLong(usize),
    #[error("condition id is not valid hex: {0}")]
    InvalidHex(String),
}

/// CTF index sets for an outcome label. Unknown labels redeem both branches.
pub fn outcome_to_index_sets(outcome: &str) -> Vec<U256> {
    if outcome.eq_ignore_ascii_case("YES") {
        vec![U256::from(1)]
    } else if outcome.eq_ignore_ascii_case("NO") {
        vec![U256::from(2)]
    } else {
        vec![U256::from(1), U256::from(2)]
    }
}

/// Canonical bytes32 for a hex condition id, with or without `0x`, left-padded
/// with zeros.
pub fn condition_id_to_bytes32(condition_id: &str) -> Result<B256, ConditionIdError> {
    let hex_str = condition_id.strip_prefix("0x").unwrap_or(condition_id);
    if hex_str.len() > 64 {
        return Err(ConditionIdError::TooLong(hex_str.len()));
    }
    let padded = format!("{:0>64}", hex_str);
    let bytes = hex::decode(&padded).map_err(|e| ConditionIdError::InvalidHex(e.to_string()))?;
    Ok(B256::from_slice(&bytes))
}

pub fn apply_gas_markup(gas_price: u128) -> u128 {
    gas_price.saturating_mul(100 + GAS_PRICE_MARKUP_PERCENT) / 100
}

/// Which `redeemPositions` entry point a position goes through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedemptionCall {
    Standard {
        condition_id: B256,
        index_sets: Vec<U256>,
    },
    NegRisk {
        condition_id: B256,
        index_sets: Vec<U256>,
    },
}

impl RedemptionCall {
    pub fn new(neg_risk: bool, condition_id: B256, index_sets: Vec<U256>) -> Self {
        if neg_risk {
            RedemptionCall::NegRisk {
                condition_id,
                index_sets,
            }
        } else {
            RedemptionCall::Standard {
                condition_id,
                index_sets,
            }
        }
    }

    pub fn target(&self) -> Address {
        match self {
            RedemptionCall::Standard { .. } => CONDITIONAL_TOKENS,
            RedemptionCall::NegRisk { .. } => NEG_RISK_ADAPTER,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            RedemptionCall::Standard { .. } => "standard",
            RedemptionCall::NegRisk { .. } => "neg_risk",
        }
    }

    pub fn calldata(&self) -> Bytes {
        match self {
            RedemptionCall::Standard {
                condition_id,
                index_sets,
            } => IConditionalTokens::redeemPositionsCall {
                collateralToken: COLLATERAL_TOKEN,
                parentCollectionId: B256::ZERO,
                conditionId: *condition_id,
                indexSets: index_sets.clone(),
            }
            .abi_encode()
            .into(),
            RedemptionCall::NegRisk {
                condition_id,
                index_sets,
            } => INegRiskAdapter::redeemPositionsCall {
                conditionId: *condition_id,
                indexSets: index_sets.clone(),
            }
            .abi_encode()
            .into(),
        }
    }
}
