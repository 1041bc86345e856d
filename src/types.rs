use std::str::FromStr;

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Deserializer};

// ─── REST market listing ───

/// A market as reported by the listing API. `resolved_outcome` is the
/// API's own claim about the winner and is only trusted as a hint.
#[derive(Clone, Debug, Deserialize)]
pub struct Market {
    #[serde(deserialize_with = "de_condition_id")]
    pub condition_id: B256,
    /// Raw JSON number; negative, fractional or oversized values are
    /// skipped by the resolver, not rejected with the whole page.
    #[serde(default)]
    pub resolved_outcome: Option<serde_json::Number>,
    #[serde(default)]
    pub title: String,
}

/// One page of the listing. `next` is the opaque cursor for the next page.
#[derive(Debug, Deserialize)]
pub struct MarketPage {
    #[serde(default)]
    pub results: Vec<Market>,
    #[serde(default)]
    pub next: Option<String>,
}

impl MarketPage {
    /// Cursor for the following page, if any. Empty strings end pagination.
    pub fn next_cursor(&self) -> Option<&str> {
        self.next.as_deref().filter(|c| !c.is_empty())
    }
}

fn de_condition_id<'de, D>(deserializer: D) -> Result<B256, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    B256::from_str(s.trim()).map_err(serde::de::Error::custom)
}

// ─── On-chain state ───

/// Condition record as stored by the conditional-tokens contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OnChainCondition {
    pub oracle: Address,
    pub question_id: B256,
    pub outcome_slot_count: U256,
    pub resolution_timestamp: U256,
    pub resolved: bool,
    pub payout_numerators: Vec<U256>,
}

impl OnChainCondition {
    /// Payout numerator for `outcome`, or None if the index is out of range.
    pub fn payout_for(&self, outcome: u32) -> Option<U256> {
        self.payout_numerators.get(outcome as usize).copied()
    }
}

// ─── Claim output ───

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimablePosition {
    pub condition_id: B256,
    pub index_set: U256,
    pub market_title: String,
    pub balance: U256,
}

/// Single-bit index set selecting `outcome`. None if the bit does not fit.
pub fn index_set_for(outcome: u32) -> Option<U256> {
    if outcome >= U256::BITS as u32 {
        return None;
    }
    Some(U256::from(1u8) << (outcome as usize))
}

/// Arguments of one batched `claimPositions` call.
///
/// `condition_ids[i]` pairs with `index_sets[i]`; both keep the order of
/// the positions they were built from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimBatch {
    condition_ids: Vec<B256>,
    index_sets: Vec<U256>,
}

impl ClaimBatch {
    /// None for an empty position list.
    pub fn from_positions(positions: &[ClaimablePosition]) -> Option<Self> {
        if positions.is_empty() {
            return None;
        }
        let (condition_ids, index_sets) = positions
            .iter()
            .map(|p| (p.condition_id, p.index_set))
            .unzip();
        Some(Self {
            condition_ids,
            index_sets,
        })
    }

    pub fn condition_ids(&self) -> &[B256] {
        &self.condition_ids
    }

    pub fn index_sets(&self) -> &[U256] {
        &self.index_sets
    }

    pub fn len(&self) -> usize {
        self.condition_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.condition_ids.is_empty()
    }

    pub fn into_parts(self) -> (Vec<B256>, Vec<U256>) {
        (self.condition_ids, self.index_sets)
    }
}
