use alloy::primitives::{Address, U256};
use anyhow::Result;
use tracing::{debug, info, warn};

use crate::chain::{ConditionalTokens, ROOT_COLLECTION};
use crate::market::fetcher::{fetch_resolved_markets, MarketSource};
use crate::types::{index_set_for, ClaimablePosition, Market};

/// Turns resolved markets into positions the wallet can redeem.
///
/// The listing API's `resolved_outcome` only selects which payout slot to
/// inspect. The on-chain condition decides whether that slot actually paid.
pub struct PositionResolver<'a, C: ?Sized> {
    ctf: &'a C,
    collateral: Address,
    wallet: Address,
}

impl<'a, C: ConditionalTokens + ?Sized> PositionResolver<'a, C> {
    pub fn new(ctf: &'a C, collateral: Address, wallet: Address) -> Self {
        Self {
            ctf,
            collateral,
            wallet,
        }
    }

    /// Fetch every resolved market and resolve them in listing order.
    pub async fn get_claimable_positions<S: MarketSource + ?Sized>(
        &self,
        source: &S,
    ) -> Result<Vec<ClaimablePosition>> {
        let markets = fetch_resolved_markets(source).await?;
        self.resolve_all(&markets).await
    }

    pub async fn resolve_all(&self, markets: &[Market]) -> Result<Vec<ClaimablePosition>> {
        let mut claimable = Vec::new();
        for market in markets {
            if let Some(position) = self.resolve(market).await? {
                claimable.push(position);
            }
        }
        info!(
            "{} of {} resolved markets hold a claimable balance",
            claimable.len(),
            markets.len()
        );
        Ok(claimable)
    }

    /// Ok(None) for any market that is not claimable; Err only when a chain read fails.
    pub async fn resolve(&self, market: &Market) -> Result<Option<ClaimablePosition>> {
        let id = market.condition_id;

        let Some(reported) = &market.resolved_outcome else {
            debug!(condition = %id, "no reported outcome, skipping");
            return Ok(None);
        };
        let Some(outcome) = reported.as_u64().and_then(|v| u32::try_from(v).ok()) else {
            warn!(condition = %id, %reported, "reported outcome is not a slot index, skipping");
            return Ok(None);
        };

        let condition = self.ctf.condition(id).await?;
        if !condition.resolved {
            debug!(condition = %id, "not resolved on-chain, skipping");
            return Ok(None);
        }

        // Untrusted index from the API: skip rather than index out of range.
        let Some(payout) = condition.payout_for(outcome) else {
            warn!(
                condition = %id,
                outcome,
                slots = condition.payout_numerators.len(),
                "reported outcome is outside the payout vector, skipping"
            );
            return Ok(None);
        };
        if payout.is_zero() {
            debug!(condition = %id, outcome, "reported outcome has zero payout, skipping");
            return Ok(None);
        }

        let Some(index_set) = index_set_for(outcome) else {
            warn!(condition = %id, outcome, "outcome index does not fit an index set, skipping");
            return Ok(None);
        };

        let position_id = self
            .ctf
            .position_id(self.collateral, ROOT_COLLECTION, id, index_set)
            .await?;
        let balance = self.ctf.balance_of(self.wallet, position_id).await?;
        if balance == U256::ZERO {
            debug!(condition = %id, %position_id, "zero balance, skipping");
            return Ok(None);
        }

        info!(condition = %id, %balance, "claimable: {}", market.title);
        Ok(Some(ClaimablePosition {
            condition_id: id,
            index_set,
            market_title: market.title.clone(),
            balance,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use alloy::primitives::{address, keccak256, B256};
    use async_trait::async_trait;
    use serde_json::Number;

    use crate::types::{MarketPage, OnChainCondition};

    const COLLATERAL: Address = address!("0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174");
    const WALLET: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

    /// In-memory conditional-tokens contract that records every call.
    #[derive(Default)]
    struct FakeCtf {
        conditions: HashMap<B256, OnChainCondition>,
        balances: HashMap<U256, U256>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeCtf {
        fn with_condition(mut self, id: B256, resolved: bool, payouts: &[u64]) -> Self {
            self.conditions.insert(
                id,
                OnChainCondition {
                    oracle: Address::ZERO,
                    question_id: B256::ZERO,
                    outcome_slot_count: U256::from(payouts.len()),
                    resolution_timestamp: U256::ZERO,
                    resolved,
                    payout_numerators: payouts.iter().copied().map(U256::from).collect(),
                },
            );
            self
        }

        fn with_balance(mut self, id: B256, index_set: u64, balance: u64) -> Self {
            self.balances
                .insert(derive_id(id, U256::from(index_set)), U256::from(balance));
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    /// Stand-in for the contract's pure id derivation.
    fn derive_id(condition_id: B256, index_set: U256) -> U256 {
        let mut buf = Vec::with_capacity(84);
        buf.extend_from_slice(COLLATERAL.as_slice());
        buf.extend_from_slice(condition_id.as_slice());
        buf.extend_from_slice(&index_set.to_be_bytes::<32>());
        U256::from_be_bytes(keccak256(&buf).0)
    }

    #[async_trait]
    impl ConditionalTokens for FakeCtf {
        async fn condition(&self, condition_id: B256) -> Result<OnChainCondition> {
            self.calls.lock().unwrap().push(format!("conditions {condition_id}"));
            self.conditions
                .get(&condition_id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("rpc error"))
        }

        async fn position_id(
            &self,
            collateral: Address,
            parent_collection: B256,
            condition_id: B256,
            index_set: U256,
        ) -> Result<U256> {
            assert_eq!(collateral, COLLATERAL);
            assert_eq!(parent_collection, B256::ZERO);
            self.calls.lock().unwrap().push(format!("getPositionId {condition_id} {index_set}"));
            Ok(derive_id(condition_id, index_set))
        }

        async fn balance_of(&self, account: Address, position_id: U256) -> Result<U256> {
            assert_eq!(account, WALLET);
            self.calls.lock().unwrap().push("balanceOf".into());
            Ok(self.balances.get(&position_id).copied().unwrap_or_default())
        }
    }

    fn market(byte: u8, outcome: Option<i64>) -> Market {
        Market {
            condition_id: B256::repeat_byte(byte),
            resolved_outcome: outcome.map(Number::from),
            title: format!("Market {byte}"),
        }
    }

    /// Scenario: outcome 1 reported, resolved on-chain with payouts [0,5], balance 10
    /// Expected: claimable with index_set 2 and balance 10
    #[tokio::test]
    async fn test_winning_position_claimable() {
        let a = B256::repeat_byte(0xa);
        let ctf = FakeCtf::default()
            .with_condition(a, true, &[0, 5])
            .with_balance(a, 2, 10);
        let resolver = PositionResolver::new(&ctf, COLLATERAL, WALLET);

        let pos = resolver.resolve(&market(0xa, Some(1))).await.unwrap().unwrap();
        assert_eq!(pos.condition_id, a);
        assert_eq!(pos.index_set, U256::from(2u8));
        assert_eq!(pos.balance, U256::from(10u8));
        assert_eq!(pos.market_title, "Market 10");
    }

    /// Scenario: outcome 0 reported, resolved with payouts [0,5]
    /// Expected: excluded and no position id derived
    #[tokio::test]
    async fn test_zero_payout_excluded() {
        let b = B256::repeat_byte(0xb);
        let ctf = FakeCtf::default()
            .with_condition(b, true, &[0, 5])
            .with_balance(b, 1, 10);
        let resolver = PositionResolver::new(&ctf, COLLATERAL, WALLET);

        assert!(resolver.resolve(&market(0xb, Some(0))).await.unwrap().is_none());
        assert_eq!(ctf.calls().len(), 1);
    }

    /// Scenario: no outcome reported by the API
    /// Expected: excluded with no on-chain call at all
    #[tokio::test]
    async fn test_missing_outcome_makes_no_calls() {
        let ctf = FakeCtf::default();
        let resolver = PositionResolver::new(&ctf, COLLATERAL, WALLET);

        assert!(resolver.resolve(&market(0xc, None)).await.unwrap().is_none());
        assert!(ctf.calls().is_empty());
    }

    /// Scenario: API says resolved but the condition is unresolved on-chain, payouts non-zero
    /// Expected: excluded
    #[tokio::test]
    async fn test_unresolved_on_chain_excluded() {
        let d = B256::repeat_byte(0xd);
        let ctf = FakeCtf::default()
            .with_condition(d, false, &[1, 1])
            .with_balance(d, 1, 10);
        let resolver = PositionResolver::new(&ctf, COLLATERAL, WALLET);

        assert!(resolver.resolve(&market(0xd, Some(0))).await.unwrap().is_none());
    }

    /// Scenario: winning outcome paid out but the wallet holds none of it
    /// Expected: excluded after the balance read
    #[tokio::test]
    async fn test_zero_balance_excluded() {
        let e = B256::repeat_byte(0xe);
        let ctf = FakeCtf::default().with_condition(e, true, &[1, 0]);
        let resolver = PositionResolver::new(&ctf, COLLATERAL, WALLET);

        assert!(resolver.resolve(&market(0xe, Some(0))).await.unwrap().is_none());
        assert_eq!(ctf.calls().last().map(String::as_str), Some("balanceOf"));
    }

    /// Scenario: API reports outcome 2 for a two-slot condition
    /// Expected: skipped without panicking and without deriving a position id
    #[tokio::test]
    async fn test_outcome_past_payouts_skipped() {
        let f = B256::repeat_byte(0xf);
        let ctf = FakeCtf::default().with_condition(f, true, &[0, 1]);
        let resolver = PositionResolver::new(&ctf, COLLATERAL, WALLET);

        assert!(resolver.resolve(&market(0xf, Some(2))).await.unwrap().is_none());
        assert_eq!(ctf.calls().len(), 1);
    }

    /// Scenario: API reports outcome -1 and 2^32
    /// Expected: both skipped before any on-chain call
    #[tokio::test]
    async fn test_unusable_outcome_skipped_without_calls() {
        let ctf = FakeCtf::default();
        let resolver = PositionResolver::new(&ctf, COLLATERAL, WALLET);

        assert!(resolver.resolve(&market(0x4, Some(-1))).await.unwrap().is_none());
        assert!(resolver.resolve(&market(0x5, Some(1 << 32))).await.unwrap().is_none());
        assert!(ctf.calls().is_empty());
    }

    /// Scenario: three-outcome market where outcome 2 won
    /// Expected: index_set 4 is used for the id derivation
    #[tokio::test]
    async fn test_index_set_matches_outcome() {
        let g = B256::repeat_byte(0x1);
        let ctf = FakeCtf::default()
            .with_condition(g, true, &[0, 0, 1])
            .with_balance(g, 4, 3);
        let resolver = PositionResolver::new(&ctf, COLLATERAL, WALLET);

        let pos = resolver.resolve(&market(0x1, Some(2))).await.unwrap().unwrap();
        assert_eq!(pos.index_set, U256::from(4u8));
        assert!(ctf.calls().contains(&format!("getPositionId {g} 4")));
    }

    /// Scenario: condition read fails for a market
    /// Expected: the error propagates
    #[tokio::test]
    async fn test_chain_error_propagates() {
        let ctf = FakeCtf::default();
        let resolver = PositionResolver::new(&ctf, COLLATERAL, WALLET);
        assert!(resolver.resolve(&market(0x2, Some(0))).await.is_err());
    }

    struct OnePage(Vec<Market>);

    #[async_trait]
    impl MarketSource for OnePage {
        async fn resolved_page(&self, _cursor: Option<&str>) -> Result<MarketPage> {
            Ok(MarketPage {
                results: self.0.clone(),
                next: None,
            })
        }
    }

    /// Scenario: listing page decoded from JSON where a winning market sits between
    /// markets reporting -1, 4294967296 and 1.5 as their outcome
    /// Expected: the run continues and the winning market is returned
    #[tokio::test]
    async fn test_bad_outcomes_do_not_hide_good_market() {
        let a = B256::repeat_byte(0xa);
        let ctf = FakeCtf::default()
            .with_condition(a, true, &[0, 5])
            .with_balance(a, 2, 10);
        let json = format!(
            r#"{{"results": [
                {{"condition_id": "{}", "resolved_outcome": -1, "title": "neg"}},
                {{"condition_id": "{a}", "resolved_outcome": 1, "title": "good"}},
                {{"condition_id": "{}", "resolved_outcome": 4294967296, "title": "big"}},
                {{"condition_id": "{}", "resolved_outcome": 1.5, "title": "frac"}}
            ]}}"#,
            B256::repeat_byte(0x6),
            B256::repeat_byte(0x7),
            B256::repeat_byte(0x8),
        );
        let page: MarketPage = serde_json::from_str(&json).unwrap();
        let resolver = PositionResolver::new(&ctf, COLLATERAL, WALLET);

        let positions = resolver
            .get_claimable_positions(&OnePage(page.results))
            .await
            .unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].condition_id, a);
        assert_eq!(positions[0].market_title, "good");
        assert_eq!(ctf.calls().iter().filter(|c| c.starts_with("conditions")).count(), 1);
    }

    /// Scenario: listing with scenarios A (claimable), B (zero payout), C (no outcome) and another claimable market
    /// Expected: only the two claimable markets, in listing order
    #[tokio::test]
    async fn test_get_claimable_positions_end_to_end() {
        let a = B256::repeat_byte(0xa);
        let b = B256::repeat_byte(0xb);
        let h = B256::repeat_byte(0x3);
        let ctf = FakeCtf::default()
            .with_condition(a, true, &[0, 5])
            .with_balance(a, 2, 10)
            .with_condition(b, true, &[0, 5])
            .with_condition(h, true, &[7, 0])
            .with_balance(h, 1, 1);
        let source = OnePage(vec![
            market(0xa, Some(1)),
            market(0xb, Some(0)),
            market(0xc, None),
            market(0x3, Some(0)),
        ]);
        let resolver = PositionResolver::new(&ctf, COLLATERAL, WALLET);

        let positions = resolver.get_claimable_positions(&source).await.unwrap();
        let ids: Vec<_> = positions.iter().map(|p| p.condition_id).collect();
        assert_eq!(ids, vec![a, h]);
        assert!(!ctf.calls().iter().any(|c| c.contains(&B256::repeat_byte(0xc).to_string())));
    }
}
