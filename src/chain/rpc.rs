use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, TxHash, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::Signer as _;
use alloy::sol_types::SolCall;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

use super::{ClaimSender, ConditionalTokens, IConditionalTokens, ROOT_COLLECTION};
use crate::config::{Config, CHAIN_ID};
use crate::error::StartupError;
use crate::types::{ClaimBatch, OnChainCondition};

type CtfInstance = IConditionalTokens::IConditionalTokensInstance<DynProvider>;

/// Fixed fields of every claim transaction.
#[derive(Clone, Debug)]
pub struct ClaimParams {
    pub ctf: Address,
    pub wallet: Address,
    pub collateral: Address,
    pub chain_id: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub gas_limit: Option<u64>,
}

impl ClaimParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ctf: config.ctf_address,
            wallet: config.wallet,
            collateral: config.collateral_token,
            chain_id: CHAIN_ID,
            max_fee_per_gas: config.max_fee_per_gas,
            max_priority_fee_per_gas: config.max_priority_fee_per_gas,
            gas_limit: config.gas_limit,
        }
    }
}

/// EIP-1559 request for `claimPositions(collateral, 0x0, ids, sets)`.
/// Gas limit is left to the provider's estimate unless configured.
pub fn claim_request(params: &ClaimParams, batch: &ClaimBatch, nonce: u64) -> TransactionRequest {
    let call = IConditionalTokens::claimPositionsCall {
        collateralToken: params.collateral,
        parentCollectionId: ROOT_COLLECTION,
        conditionIds: batch.condition_ids().to_vec(),
        indexSets: batch.index_sets().to_vec(),
    };

    let mut tx = TransactionRequest::default()
        .with_from(params.wallet)
        .with_to(params.ctf)
        .with_input(call.abi_encode())
        .with_nonce(nonce)
        .with_chain_id(params.chain_id)
        .with_max_fee_per_gas(params.max_fee_per_gas)
        .with_max_priority_fee_per_gas(params.max_priority_fee_per_gas);
    if let Some(gas) = params.gas_limit {
        tx.set_gas_limit(gas);
    }
    tx
}

/// Claims are signed for `CHAIN_ID`; any other network is refused at startup.
pub fn check_chain_id(actual: u64) -> Result<(), StartupError> {
    if actual != CHAIN_ID {
        return Err(StartupError::WrongChain {
            expected: CHAIN_ID,
            actual,
        });
    }
    Ok(())
}

impl From<IConditionalTokens::conditionsReturn> for OnChainCondition {
    fn from(r: IConditionalTokens::conditionsReturn) -> Self {
        Self {
            oracle: r.oracle,
            question_id: r.questionId,
            outcome_slot_count: r.outcomeSlotCount,
            resolution_timestamp: r.resolutionTimestamp,
            resolved: r.resolved,
            payout_numerators: r.payoutNumerators,
        }
    }
}

/// Connected chain client plus the contract binding, built once per run.
/// The provider signs locally with the configured key.
pub struct RpcChain {
    provider: DynProvider,
    ctf: CtfInstance,
    params: ClaimParams,
}

impl RpcChain {
    /// Connect and confirm the node answers for the expected chain.
    pub async fn connect(config: &Config) -> Result<Self, StartupError> {
        let connect_err = |reason: String| StartupError::Connect {
            url: config.rpc_url.clone(),
            reason,
        };

        let signer = config.signer.clone().with_chain_id(Some(CHAIN_ID));
        let provider = ProviderBuilder::new()
            .wallet(signer)
            .connect(&config.rpc_url)
            .await
            .map_err(|e| connect_err(e.to_string()))?
            .erased();

        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(|e| connect_err(e.to_string()))?;
        check_chain_id(chain_id)?;
        info!("Connected to {} (chain {})", config.rpc_url, chain_id);

        let ctf = IConditionalTokens::new(config.ctf_address, provider.clone());
        Ok(Self {
            provider,
            ctf,
            params: ClaimParams::from_config(config),
        })
    }
}

#[async_trait]
impl ConditionalTokens for RpcChain {
    async fn condition(&self, condition_id: B256) -> Result<OnChainCondition> {
        let ret = self
            .ctf
            .conditions(condition_id)
            .call()
            .await
            .with_context(|| format!("conditions({condition_id}) call failed"))?;
        Ok(ret.into())
    }

    async fn position_id(
        &self,
        collateral: Address,
        parent_collection: B256,
        condition_id: B256,
        index_set: U256,
    ) -> Result<U256> {
        self.ctf
            .getPositionId(collateral, parent_collection, condition_id, index_set)
            .call()
            .await
            .with_context(|| format!("getPositionId for {condition_id} failed"))
    }

    async fn balance_of(&self, account: Address, position_id: U256) -> Result<U256> {
        self.ctf
            .balanceOf(account, position_id)
            .call()
            .await
            .with_context(|| format!("balanceOf({account}, {position_id}) failed"))
    }
}

#[async_trait]
impl ClaimSender for RpcChain {
    async fn send_claim(&self, batch: &ClaimBatch) -> Result<TxHash> {
        // Read right before submission; a concurrent sender for the same
        // wallet can still race this.
        let nonce = self
            .provider
            .get_transaction_count(self.params.wallet)
            .await
            .context("failed to read wallet nonce")?;
        debug!(nonce, positions = batch.len(), "submitting claim");

        let tx = claim_request(&self.params, batch, nonce);
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .context("claim transaction was not accepted")?;
        Ok(*pending.tx_hash())
    }
}
