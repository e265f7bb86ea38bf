use privy_jobs_contract::jobs::GET_ENCRYPTED_JOB;
use privy_jobs_contract::{AbiValue, Handle, HandleContractPair, UserDecryptRequest};
use tracing::{debug, warn};

use super::{decrypting_flag, FlagGuard, JobsClient};
use crate::contract::ContractCapability;
use crate::error::ProviderError;
use crate::storage::unix_now;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecryptOutcome {
    /// Nothing to decrypt, no signer, or a decryption already running.
    Skipped,
    /// The stored handle changed while the request was in flight.
    Stale,
    Failed(String),
    Decrypted(u32),
}

impl JobsClient {
    /// Re-reads the handle stored for the connected account.
    ///
    /// Returns `None` without touching the network when there is no contract
    /// or account to read for.
    pub async fn refresh(&self) -> Result<Option<Handle>, ProviderError> {
        let (Some(reader), Some(account)) = (self.handles.read(), self.account()) else {
            return Ok(None);
        };
        let value = reader.call(GET_ENCRYPTED_JOB, vec![AbiValue::Address(account)]).await?;
        let AbiValue::Bytes32(handle) = value else {
            return Err(ProviderError::UnexpectedReturn {
                function: GET_ENCRYPTED_JOB.to_string(),
                actual: value.type_name(),
            });
        };

        let mut state = self.state.lock();
        if state.stored_handle != Some(handle) {
            state.decrypted_job_id = None;
        }
        state.stored_handle = Some(handle);
        debug!(%account, %handle, "refreshed stored handle");
        Ok(Some(handle))
    }

    /// Whether [`JobsClient::decrypt`] would issue a request right now.
    pub fn can_decrypt(&self) -> bool {
        let state = self.state.lock();
        self.contract.is_some()
            && self.connection.signer().is_some()
            && state.already_applied()
            && !state.decrypting
    }

    /// Decrypts the stored handle for the connected account.
    pub async fn decrypt(&self) -> DecryptOutcome {
        let Some(_decrypting) = FlagGuard::acquire(&self.state, decrypting_flag) else {
            return DecryptOutcome::Skipped;
        };
        let handle = match self.stored_handle() {
            Some(handle) if !handle.is_zero() => handle,
            _ => return DecryptOutcome::Skipped,
        };
        let (Some(contract), Some(signer)) = (self.contract_address(), self.connection.signer()) else {
            return DecryptOutcome::Skipped;
        };

        self.set_status("Start decrypt");
        let signature = self.signatures.load_or_sign(
            signer,
            &[contract],
            unix_now(),
            self.options.decryption_validity_days,
        );
        let request = UserDecryptRequest { pairs: vec![HandleContractPair { handle, contract }], signature };

        self.set_status("Call FHEVM userDecrypt...");
        let results = match self.instance.user_decrypt(request).await {
            Ok(results) => results,
            Err(e) => {
                let message = format!("FHEVM userDecrypt failed: {e}");
                warn!(%handle, error = %e, "user decryption failed");
                self.set_status(message.clone());
                return DecryptOutcome::Failed(message);
            }
        };

        let mut state = self.state.lock();
        if state.stored_handle != Some(handle) {
            state.set_status("Ignore FHEVM decryption");
            return DecryptOutcome::Stale;
        }
        let job_id = match results.get(&handle).map(|value| u32::try_from(*value)) {
            Some(Ok(job_id)) => job_id,
            Some(Err(_)) => {
                let message = "FHEVM userDecrypt failed: value is not a 32-bit job id".to_string();
                state.set_status(message.clone());
                return DecryptOutcome::Failed(message);
            }
            None => {
                let message = "FHEVM userDecrypt failed: no result for the stored handle".to_string();
                state.set_status(message.clone());
                return DecryptOutcome::Failed(message);
            }
        };
        state.decrypted_job_id = Some(job_id);
        state.set_status("FHEVM userDecrypt completed!");
        DecryptOutcome::Decrypted(job_id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use privy_jobs_contract::{
        deploy_fhe_privy_jobs, Chain, Deployments, EncryptedInput, InputBuilder, CONTRACT_NAME, DEFAULT_CHAIN_ID,
    };

    use super::*;
    use crate::orchestrator::ClientOptions;
    use crate::provider::{FhevmInstance, LocalProvider};
    use crate::wallet::{Signer, WalletConnection};

    /// Yields several times before every decryption so a concurrent task can
    /// run in between.
    struct SlowDecrypt(LocalProvider);

    #[async_trait]
    impl FhevmInstance for SlowDecrypt {
        async fn encrypt(&self, input: InputBuilder) -> Result<EncryptedInput, ProviderError> {
            self.0.encrypt(input).await
        }

        async fn user_decrypt(&self, request: UserDecryptRequest) -> Result<BTreeMap<Handle, u128>, ProviderError> {
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
            self.0.user_decrypt(request).await
        }
    }

    fn mount() -> JobsClient {
        let signer = Signer::from_seed_material("alice", &[8u8; 32]);
        let mut chain = Chain::new(DEFAULT_CHAIN_ID);
        let mut deployments = Deployments::default();
        deploy_fhe_privy_jobs(&mut chain, signer.address(), &mut deployments);
        let info = deployments.get(DEFAULT_CHAIN_ID, CONTRACT_NAME).cloned();
        let provider = LocalProvider::new(chain);
        JobsClient::mount(
            Arc::new(provider.clone()),
            Arc::new(SlowDecrypt(provider)),
            WalletConnection::connected(signer, DEFAULT_CHAIN_ID),
            info,
            ClientOptions::default(),
        )
    }

    #[tokio::test]
    async fn result_for_replaced_handle_is_ignored() {
        let client = mount();
        assert!(client.submit_job(4).await.is_stored());
        assert!(client.can_decrypt());

        let replaced = Handle::from([1u8; 32]);
        let (outcome, ()) = tokio::join!(client.decrypt(), async {
            tokio::task::yield_now().await;
            client.state.lock().stored_handle = Some(replaced);
        });

        assert_eq!(outcome, DecryptOutcome::Stale);
        assert_eq!(client.decrypted_job_id(), None);
        assert_eq!(client.status(), "Ignore FHEVM decryption");
        assert!(!client.is_decrypting());
    }

    #[tokio::test]
    async fn second_decrypt_while_running_is_skipped() {
        let client = mount();
        assert!(client.submit_job(6).await.is_stored());

        let (first, second) = tokio::join!(client.decrypt(), async {
            tokio::task::yield_now().await;
            client.decrypt().await
        });

        assert_eq!(first, DecryptOutcome::Decrypted(6));
        assert_eq!(second, DecryptOutcome::Skipped);
        assert_eq!(client.signatures.len(), 1);
    }

    #[tokio::test]
    async fn nothing_to_decrypt_before_submission() {
        let client = mount();
        assert_eq!(client.refresh().await.unwrap(), Some(Handle::ZERO));
        assert!(!client.can_decrypt());
        assert_eq!(client.decrypt().await, DecryptOutcome::Skipped);
        assert!(client.signatures.is_empty());
    }
}
