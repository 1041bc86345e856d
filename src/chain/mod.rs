//! On-chain access to the conditional-tokens contract.
//!
//! Reads and the claim transaction sit behind two traits so the resolver and
//! the claim gateway can run against in-memory fakes. `rpc` holds the alloy
//! implementation used by the binary.

pub mod rpc;

use alloy::primitives::{Address, TxHash, B256, U256};
use alloy::sol;
use anyhow::Result;
use async_trait::async_trait;

use crate::types::{ClaimBatch, OnChainCondition};

sol! {
    #[sol(rpc)]
    interface IConditionalTokens {
        function conditions(bytes32 conditionId) external view returns (
            address oracle,
            bytes32 questionId,
            uint256 outcomeSlotCount,
            uint256 resolutionTimestamp,
            bool resolved,
            uint256[] payoutNumerators
        );
        function getPositionId(address collateralToken, bytes32 collectionId, bytes32 conditionId, uint256 indexSet) external pure returns (uint256);
        function balanceOf(address account, uint256 id) external view returns (uint256);
        function claimPositions(address collateralToken, bytes32 parentCollectionId, bytes32[] conditionIds, uint256[] indexSets) external;
    }
}

/// Parent collection id meaning "root collection, no further conditioning".
pub const ROOT_COLLECTION: B256 = B256::ZERO;

/// Read side of the conditional-tokens contract.
#[async_trait]
pub trait ConditionalTokens: Send + Sync {
    async fn condition(&self, condition_id: B256) -> Result<OnChainCondition>;

    /// Pure derivation of the positional token id; reads no contract state.
    async fn position_id(
        &self,
        collateral: Address,
        parent_collection: B256,
        condition_id: B256,
        index_set: U256,
    ) -> Result<U256>;

    async fn balance_of(&self, account: Address, position_id: U256) -> Result<U256>;
}

/// Write side: sign and broadcast one batched `claimPositions` call.
#[async_trait]
pub trait ClaimSender: Send + Sync {
    /// Returns as soon as the node accepts the transaction; no receipt wait.
    async fn send_claim(&self, batch: &ClaimBatch) -> Result<TxHash>;
}
