//! Polygon mainnet contracts involved in redemption.

use alloy::primitives::{address, Address};
use alloy::sol;

pub const POLYGON_CHAIN_ID: u64 = 137;

/// Gnosis Conditional Tokens Framework.
pub const CONDITIONAL_TOKENS: Address = address!("0x4D97DCd97eC945f40cF65F87097ACe5EA0476045");
/// Polymarket NegRiskAdapter.
pub const NEG_RISK_ADAPTER: Address = address!("0xd91E80cF2E7be2e162c6513ceD06f1dD0dA35296");
/// USDC.e, the collateral backing every CTF position.
pub const COLLATERAL_TOKEN: Address = address!("0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174");

sol! {
    interface IConditionalTokens {
        function redeemPositions(
            address collateralToken,
            bytes32 parentCollectionId,
            bytes32 conditionId,
            uint256[] indexSets
        ) external;
    }

    interface INegRiskAdapter {
        function redeemPositions(bytes32 conditionId, uint256[] indexSets) external;
    }
}
