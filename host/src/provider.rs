//! Network access as the client sees it: a node to read from and broadcast
//! to, and an FHE instance that encrypts inputs and serves user decryption.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use privy_jobs_contract::{
    AbiValue, Address, Chain, ChainError, ContractCall, EncryptedInput, Handle, InputBuilder, Receipt,
    SignedTransaction, TxHash, UserDecryptRequest,
};
use tracing::debug;

use crate::error::ProviderError;

#[async_trait]
pub trait Provider: Send + Sync {
    async fn chain_id(&self) -> Result<u64, ProviderError>;

    async fn transaction_count(&self, account: Address) -> Result<u64, ProviderError>;

    async fn call(&self, to: Address, call: ContractCall) -> Result<AbiValue, ProviderError>;

    async fn send_transaction(&self, tx: SignedTransaction) -> Result<TxHash, ProviderError>;

    /// Suspends until the transaction is mined. There is no cancellation.
    async fn wait_for_receipt(&self, hash: TxHash) -> Result<Receipt, ProviderError>;
}

/// The external encryption/decryption capability.
#[async_trait]
pub trait FhevmInstance: Send + Sync {
    async fn encrypt(&self, input: InputBuilder) -> Result<EncryptedInput, ProviderError>;

    async fn user_decrypt(&self, request: UserDecryptRequest) -> Result<BTreeMap<Handle, u128>, ProviderError>;
}

/// A broadcast transaction that has not been confirmed yet.
pub struct PendingTransaction {
    pub hash: TxHash,
    provider: Arc<dyn Provider>,
}

impl PendingTransaction {
    pub fn new(hash: TxHash, provider: Arc<dyn Provider>) -> Self {
        Self { hash, provider }
    }

    /// Waits for the receipt and turns a revert into an error.
    pub async fn wait(self) -> Result<Receipt, ProviderError> {
        let receipt = self.provider.wait_for_receipt(self.hash).await?;
        Ok(receipt.into_result()?)
    }
}

/// In-process provider over a shared [`Chain`].
#[derive(Clone)]
pub struct LocalProvider {
    chain: Arc<Mutex<Chain>>,
}

impl LocalProvider {
    pub fn new(chain: Chain) -> Self {
        Self { chain: Arc::new(Mutex::new(chain)) }
    }

    pub fn shared(chain: Arc<Mutex<Chain>>) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> Arc<Mutex<Chain>> {
        Arc::clone(&self.chain)
    }
}

#[async_trait]
impl Provider for LocalProvider {
    async fn chain_id(&self) -> Result<u64, ProviderError> {
        Ok(self.chain.lock().chain_id())
    }

    async fn transaction_count(&self, account: Address) -> Result<u64, ProviderError> {
        Ok(self.chain.lock().nonce(account))
    }

    async fn call(&self, to: Address, call: ContractCall) -> Result<AbiValue, ProviderError> {
        Ok(self.chain.lock().call(to, &call)?)
    }

    async fn send_transaction(&self, tx: SignedTransaction) -> Result<TxHash, ProviderError> {
        let receipt = self.chain.lock().execute(tx)?;
        debug!(tx_hash = %receipt.tx_hash, block = receipt.block_number, "transaction mined");
        Ok(receipt.tx_hash)
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<Receipt, ProviderError> {
        self.chain
            .lock()
            .receipt(hash)
            .cloned()
            .ok_or_else(|| ChainError::UnknownTransaction(hash.to_string()).into())
    }
}

#[async_trait]
impl FhevmInstance for LocalProvider {
    async fn encrypt(&self, input: InputBuilder) -> Result<EncryptedInput, ProviderError> {
        Ok(self.chain.lock().coprocessor_mut().encrypt(input)?)
    }

    async fn user_decrypt(&self, request: UserDecryptRequest) -> Result<BTreeMap<Handle, u128>, ProviderError> {
        Ok(self.chain.lock().user_decrypt(&request)?)
    }
}
