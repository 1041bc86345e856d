use alloy::primitives::TxHash;
use anyhow::Result;
use tracing::info;

use crate::chain::ClaimSender;
use crate::types::{ClaimBatch, ClaimablePosition};

/// Redeem every position in one batched transaction.
///
/// An empty list is a no-op: nothing is sent and no hash is returned.
/// Submission failures (stale nonce, underpriced gas) are not retried.
pub async fn claim_positions<S: ClaimSender + ?Sized>(
    sender: &S,
    positions: &[ClaimablePosition],
) -> Result<Option<TxHash>> {
    let Some(batch) = ClaimBatch::from_positions(positions) else {
        info!("No claimable positions found");
        return Ok(None);
    };

    info!("Claiming {} positions in one transaction", batch.len());
    let tx_hash = sender.send_claim(&batch).await?;
    info!(%tx_hash, "claim transaction sent");
    Ok(Some(tx_hash))
}
