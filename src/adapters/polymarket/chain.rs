//! Polygon RPC access for redemption: account nonce, gas price, local signing
//! and raw transaction submission.

use crate::adapters::polymarket::contracts::POLYGON_CHAIN_ID;
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{Ethereum, EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::eth::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer as _;
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use std::future::IntoFuture;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Upper bound for a single read-only RPC round trip.
const RPC_TIMEOUT_SECS: u64 = 30;
/// Roughly one Polygon block.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceiptSummary {
    pub tx_hash: TxHash,
    pub success: bool,
    pub block_number: Option<u64>,
}

/// Chain operations a redemption needs. Implementations must be usable from a
/// spawned task.
#[async_trait]
pub trait ChainClient: Send + Sync + 'static {
    /// Cheap round trip used as a connectivity probe.
    async fn chain_id(&self) -> Result<u64>;

    fn signer_address(&self) -> Address;

    /// Transaction count including pending transactions.
    async fn pending_nonce(&self, account: Address) -> Result<u64>;

    async fn gas_price(&self) -> Result<u128>;

    /// Signs locally and returns the EIP-2718 encoded transaction.
    async fn sign_transaction(&self, tx: TransactionRequest) -> Result<Bytes>;

    /// Broadcasts a signed transaction and returns its hash.
    async fn send_raw_transaction(&self, raw_tx: Bytes) -> Result<TxHash>;

    /// Waits up to `timeout` for the receipt of an already broadcast transaction.
    async fn await_receipt(&self, tx_hash: TxHash, timeout: Duration) -> Result<TxReceiptSummary>;
}

pub struct AlloyChain {
    provider: DynProvider,
    wallet: EthereumWallet,
    signer_address: Address,
}

impl AlloyChain {
    pub async fn connect(rpc_url: &Url, private_key: &str) -> Result<Self> {
        let signer = PrivateKeySigner::from_str(private_key)
            .context("Failed to create signer from private key. Ensure private_key is a valid hex string.")?
            .with_chain_id(Some(POLYGON_CHAIN_ID));
        let signer_address = signer.address();

        let provider = ProviderBuilder::new()
            .connect(rpc_url.as_str())
            .await
            .context("Failed to connect to Polygon RPC")?
            .erased();

        Ok(Self {
            provider,
            wallet: EthereumWallet::from(signer),
            signer_address,
        })
    }
}

async fn with_rpc_timeout<T, E, F>(what: &str, fut: F) -> Result<T>
where
    F: IntoFuture<Output = std::result::Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    tokio::time::timeout(Duration::from_secs(RPC_TIMEOUT_SECS), fut)
        .await
        .with_context(|| format!("{} timed out after {}s", what, RPC_TIMEOUT_SECS))?
        .with_context(|| format!("{} failed", what))
}

#[async_trait]
impl ChainClient for AlloyChain {
    async fn chain_id(&self) -> Result<u64> {
        with_rpc_timeout("eth_chainId", self.provider.get_chain_id()).await
    }

    fn signer_address(&self) -> Address {
        self.signer_address
    }

    async fn pending_nonce(&self, account: Address) -> Result<u64> {
        with_rpc_timeout(
            "eth_getTransactionCount",
            self.provider.get_transaction_count(account).pending(),
        )
        .await
    }

    async fn gas_price(&self) -> Result<u128> {
        with_rpc_timeout("eth_gasPrice", self.provider.get_gas_price()).await
    }

    async fn sign_transaction(&self, tx: TransactionRequest) -> Result<Bytes> {
        let envelope = <TransactionRequest as TransactionBuilder<Ethereum>>::build(tx, &self.wallet)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to sign redemption transaction: {}", e))?;
        Ok(envelope.encoded_2718().into())
    }

    async fn send_raw_transaction(&self, raw_tx: Bytes) -> Result<TxHash> {
        let pending = with_rpc_timeout(
            "eth_sendRawTransaction",
            self.provider.send_raw_transaction(&raw_tx),
        )
        .await?;
        Ok(*pending.tx_hash())
    }

    async fn await_receipt(&self, tx_hash: TxHash, timeout: Duration) -> Result<TxReceiptSummary> {
        let poll = async {
            loop {
                match self.provider.get_transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) => return receipt,
                    Ok(None) => {}
                    Err(e) => debug!("receipt_poll_error tx={} error={}", tx_hash, e),
                }
                tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
            }
        };
        let receipt = tokio::time::timeout(timeout, poll)
            .await
            .with_context(|| format!("No receipt for {} within {}s", tx_hash, timeout.as_secs()))?;
        Ok(TxReceiptSummary {
            tx_hash,
            success: receipt.status(),
            block_number: receipt.block_number,
        })
    }
}
