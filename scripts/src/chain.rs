//! The chain client consumed by the release scripts
//!
//! Only three operations are needed: submitting a deployment, fetching a
//! receipt, and performing a read-only call.

use std::{str::FromStr, time::Duration};

use alloy::{
    network::{EthereumWallet, TransactionBuilder},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    transports::http::reqwest::Url,
};
use alloy_primitives::{Address, Bytes, TxHash};
use async_trait::async_trait;
use tokio::time::{sleep, timeout, Instant};
use tracing::debug;

use crate::errors::ReleaseError;

/// The outcome of a mined deployment transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeploymentReceipt {
    /// The hash of the transaction
    pub tx_hash: TxHash,
    /// The address of the created contract, if any
    pub contract_address: Option<Address>,
    /// Whether the transaction succeeded
    pub success: bool,
}

/// A client able to deploy contracts and read their state
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Broadcast a contract creation with the given bytecode and encoded
    /// constructor arguments, returning the transaction hash
    async fn submit_deployment(&self, bytecode: Bytes, args: Bytes)
        -> Result<TxHash, ReleaseError>;

    /// Fetch the receipt of a transaction, or `None` if it is not yet mined
    async fn get_transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<DeploymentReceipt>, ReleaseError>;

    /// Perform a read-only call against a contract
    async fn call_view(&self, address: Address, calldata: Bytes) -> Result<Bytes, ReleaseError>;
}

/// A chain client backed by an HTTP JSON-RPC provider with a local signer
#[derive(Clone)]
pub struct RpcChainClient {
    /// The underlying provider, with signing and nonce management attached
    provider: DynProvider,
}

impl RpcChainClient {
    /// Sets up a client signing with the given private key against the given RPC URL
    pub fn new(priv_key: &str, rpc_url: &str) -> Result<Self, ReleaseError> {
        let signer = PrivateKeySigner::from_str(priv_key)
            .map_err(|e| ReleaseError::ClientInitialization(e.to_string()))?;
        let url =
            Url::parse(rpc_url).map_err(|e| ReleaseError::ClientInitialization(e.to_string()))?;

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .on_http(url);

        Ok(Self {
            provider: DynProvider::new(provider),
        })
    }

    /// Sets up a client without a signer, able only to read chain state
    pub fn read_only(rpc_url: &str) -> Result<Self, ReleaseError> {
        let url =
            Url::parse(rpc_url).map_err(|e| ReleaseError::ClientInitialization(e.to_string()))?;
        let provider = ProviderBuilder::new().on_http(url);

        Ok(Self {
            provider: DynProvider::new(provider),
        })
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn submit_deployment(
        &self,
        bytecode: Bytes,
        args: Bytes,
    ) -> Result<TxHash, ReleaseError> {
        let code: Bytes = [&bytecode[..], &args[..]].concat().into();
        let tx = TransactionRequest::default().with_deploy_code(code);

        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| ReleaseError::ContractDeployment(e.to_string()))?;

        Ok(*pending.tx_hash())
    }

    async fn get_transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<DeploymentReceipt>, ReleaseError> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| ReleaseError::ChainInteraction(e.to_string()))?;

        Ok(receipt.map(|receipt| DeploymentReceipt {
            tx_hash,
            contract_address: receipt.contract_address,
            success: receipt.status(),
        }))
    }

    async fn call_view(&self, address: Address, calldata: Bytes) -> Result<Bytes, ReleaseError> {
        let tx = TransactionRequest::default()
            .with_to(address)
            .with_input(calldata);

        self.provider
            .call(&tx)
            .await
            .map_err(|e| ReleaseError::ChainInteraction(e.to_string()))
    }
}

/// Poll for the receipt of a transaction until it is mined or `limit` elapses
pub async fn await_receipt(
    client: &dyn ChainClient,
    tx_hash: TxHash,
    poll_interval: Duration,
    limit: Duration,
) -> Result<DeploymentReceipt, ReleaseError> {
    let start = Instant::now();
    match timeout(limit, poll_receipt(client, tx_hash, poll_interval)).await {
        Ok(res) => res,
        Err(_) => Err(ReleaseError::ConfirmationTimeout {
            tx_hash,
            waited: start.elapsed(),
        }),
    }
}

/// Poll for the receipt of a transaction until it is mined
async fn poll_receipt(
    client: &dyn ChainClient,
    tx_hash: TxHash,
    poll_interval: Duration,
) -> Result<DeploymentReceipt, ReleaseError> {
    loop {
        if let Some(receipt) = client.get_transaction_receipt(tx_hash).await? {
            return Ok(receipt);
        }

        debug!("no receipt yet for {tx_hash:#x}");
        sleep(poll_interval).await;
    }
}
