//! Read and write handles to the deployed contract.
//!
//! Both handles expose the same [`ContractCapability`]; callers pick one
//! explicitly through [`ContractHandles::read`] or [`ContractHandles::write`].

use std::sync::Arc;

use async_trait::async_trait;
use privy_jobs_contract::{Abi, AbiValue, Address, ContractCall, DeployedContractInfo, Transaction};
use tracing::debug;

use crate::error::ProviderError;
use crate::provider::{PendingTransaction, Provider};
use crate::wallet::Signer;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TxOverrides {
    pub gas_limit: Option<u64>,
}

#[async_trait]
pub trait ContractCapability: Send + Sync {
    fn address(&self) -> Address;

    fn abi(&self) -> &Abi;

    async fn call(&self, function: &str, args: Vec<AbiValue>) -> Result<AbiValue, ProviderError>;

    async fn send(
        &self,
        function: &str,
        args: Vec<AbiValue>,
        overrides: TxOverrides,
    ) -> Result<PendingTransaction, ProviderError>;
}

fn decode_call(abi: &Abi, function: &str, args: &[AbiValue]) -> Result<ContractCall, ProviderError> {
    let entry = abi.function(function).ok_or_else(|| ProviderError::UnknownFunction(function.to_string()))?;
    let types_match = entry.inputs.len() == args.len()
        && entry.inputs.iter().zip(args).all(|(param, arg)| param.ty == arg.type_name());
    if !types_match {
        return Err(ProviderError::InvalidArguments(function.to_string()));
    }
    ContractCall::decode(function, args).map_err(|_| ProviderError::InvalidArguments(function.to_string()))
}

async fn view(
    provider: &dyn Provider,
    address: Address,
    abi: &Abi,
    function: &str,
    args: Vec<AbiValue>,
) -> Result<AbiValue, ProviderError> {
    let call = decode_call(abi, function, &args)?;
    provider.call(address, call).await
}

/// Handle backed by a read-only provider.
pub struct ReadHandle {
    address: Address,
    abi: Abi,
    provider: Arc<dyn Provider>,
}

#[async_trait]
impl ContractCapability for ReadHandle {
    fn address(&self) -> Address {
        self.address
    }

    fn abi(&self) -> &Abi {
        &self.abi
    }

    async fn call(&self, function: &str, args: Vec<AbiValue>) -> Result<AbiValue, ProviderError> {
        view(self.provider.as_ref(), self.address, &self.abi, function, args).await
    }

    async fn send(&self, _: &str, _: Vec<AbiValue>, _: TxOverrides) -> Result<PendingTransaction, ProviderError> {
        Err(ProviderError::ReadOnly)
    }
}

/// Handle that signs and broadcasts with the connected account.
pub struct WriteHandle {
    address: Address,
    abi: Abi,
    provider: Arc<dyn Provider>,
    signer: Signer,
}

#[async_trait]
impl ContractCapability for WriteHandle {
    fn address(&self) -> Address {
        self.address
    }

    fn abi(&self) -> &Abi {
        &self.abi
    }

    async fn call(&self, function: &str, args: Vec<AbiValue>) -> Result<AbiValue, ProviderError> {
        view(self.provider.as_ref(), self.address, &self.abi, function, args).await
    }

    async fn send(
        &self,
        function: &str,
        args: Vec<AbiValue>,
        overrides: TxOverrides,
    ) -> Result<PendingTransaction, ProviderError> {
        let call = decode_call(&self.abi, function, &args)?;
        let from = self.signer.address();
        let nonce = self.provider.transaction_count(from).await?;
        let mut payload = Transaction { from, to: self.address, nonce, gas_limit: 0, call };
        payload.gas_limit = overrides.gas_limit.unwrap_or_else(|| payload.required_gas());
        let tx = self.signer.sign_transaction(payload)?;
        let hash = self.provider.send_transaction(tx).await?;
        debug!(function, %hash, nonce, "transaction sent");
        Ok(PendingTransaction::new(hash, Arc::clone(&self.provider)))
    }
}

/// Factory for the two handle kinds.
#[derive(Clone)]
pub struct ContractHandles {
    contract: Option<DeployedContractInfo>,
    provider: Arc<dyn Provider>,
    signer: Option<Signer>,
}

impl ContractHandles {
    pub fn new(contract: Option<DeployedContractInfo>, provider: Arc<dyn Provider>, signer: Option<Signer>) -> Self {
        Self { contract, provider, signer }
    }

    /// `None` when no deployment metadata is known.
    pub fn read(&self) -> Option<ReadHandle> {
        let info = self.contract.as_ref()?;
        Some(ReadHandle { address: info.address, abi: info.abi.clone(), provider: Arc::clone(&self.provider) })
    }

    /// `None` when metadata or a signer is missing.
    pub fn write(&self) -> Option<WriteHandle> {
        let info = self.contract.as_ref()?;
        let signer = self.signer.clone()?;
        Some(WriteHandle { address: info.address, abi: info.abi.clone(), provider: Arc::clone(&self.provider), signer })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::LocalProvider;
    use privy_jobs_contract::{deploy_fhe_privy_jobs, Chain, Deployments, CONTRACT_NAME, DEFAULT_CHAIN_ID};

    fn setup() -> (ContractHandles, Signer) {
        let signer = Signer::from_seed_material("alice", &[3u8; 32]);
        let mut chain = Chain::new(DEFAULT_CHAIN_ID);
        let mut deployments = Deployments::default();
        deploy_fhe_privy_jobs(&mut chain, signer.address(), &mut deployments);
        let info = deployments.get(DEFAULT_CHAIN_ID, CONTRACT_NAME).cloned();
        let provider: Arc<dyn Provider> = Arc::new(LocalProvider::new(chain));
        (ContractHandles::new(info, provider, Some(signer.clone())), signer)
    }

    #[tokio::test]
    async fn read_handle_cannot_send() {
        let (handles, signer) = setup();
        let reader = handles.read().unwrap();
        let submitted = reader.call("isJobSubmitted", vec![AbiValue::Address(signer.address())]).await.unwrap();
        assert_eq!(submitted, AbiValue::Bool(false));

        let err = reader.send("submitEncryptedJob", vec![], TxOverrides::default()).await.err().unwrap();
        assert!(matches!(err, ProviderError::ReadOnly));
    }

    #[tokio::test]
    async fn arguments_are_checked_against_abi() {
        let (handles, _) = setup();
        let reader = handles.read().unwrap();
        let err = reader.call("isJobSubmitted", vec![AbiValue::Bool(true)]).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidArguments(_)));
        let err = reader.call("owner", vec![]).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownFunction(_)));
    }

    #[test]
    fn factory_needs_metadata_and_signer() {
        let (handles, _) = setup();
        assert!(handles.write().is_some());

        let provider: Arc<dyn Provider> = Arc::new(LocalProvider::new(Chain::new(DEFAULT_CHAIN_ID)));
        let no_signer = ContractHandles::new(handles.contract.clone(), Arc::clone(&provider), None);
        assert!(no_signer.read().is_some());
        assert!(no_signer.write().is_none());

        let no_meta = ContractHandles::new(None, provider, None);
        assert!(no_meta.read().is_none());
    }
}
