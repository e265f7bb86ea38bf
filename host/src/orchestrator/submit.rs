use privy_jobs_contract::jobs::SUBMIT_ENCRYPTED_JOB;
use privy_jobs_contract::{Handle, TxHash};
use tracing::{info, warn};

use super::{busy_flag, FlagGuard, JobsClient, SUBMIT_SUCCESS};
use crate::contract::{ContractCapability, TxOverrides};
use crate::encryption::{build_params_from_abi, detect_encryption_method, EncryptionAdapter};
use crate::error::ClientError;

/// How a submission ended. Every variant except `Skipped` left its message in
/// the status line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Another submission was already in flight.
    Skipped,
    /// Stopped before anything was sent.
    Aborted(String),
    Failed(String),
    Stored { job_id: u32, tx_hash: TxHash, handle: Option<Handle> },
}

impl SubmitOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, SubmitOutcome::Stored { .. })
    }
}

impl JobsClient {
    /// Encrypts `job_id` for the connected account and stores it on-chain.
    pub async fn submit_job(&self, job_id: u32) -> SubmitOutcome {
        let Some(_busy) = FlagGuard::acquire(&self.state, busy_flag) else {
            return SubmitOutcome::Skipped;
        };
        self.state.lock().tracked_job_id = Some(job_id);
        self.set_status(format!("Encrypting job ID {job_id}..."));

        match self.try_submit(job_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let message = format!("❌ {e}");
                warn!(job_id, error = %e, "submission failed");
                self.set_status(message.clone());
                SubmitOutcome::Failed(message)
            }
        }
    }

    async fn try_submit(&self, job_id: u32) -> Result<SubmitOutcome, ClientError> {
        let method = match detect_encryption_method(self.contract.as_ref().map(|info| &info.abi), SUBMIT_ENCRYPTED_JOB)
        {
            Ok(method) => method,
            Err(e) => return Ok(self.abort(e.to_string())),
        };
        let (Some(contract), Some(user)) = (self.contract.as_ref(), self.account()) else {
            return Ok(self.abort("Encryption failed"));
        };

        let adapter = EncryptionAdapter::new(self.instance.clone(), contract.address, user);
        let Some(encrypted) = adapter.encrypt_with(method, u128::from(job_id)).await else {
            return Ok(self.abort("Encryption failed"));
        };

        let Some(writer) = self.handles.write() else {
            return Ok(self.abort("No contract signer available"));
        };

        let params = build_params_from_abi(&encrypted, &contract.abi, SUBMIT_ENCRYPTED_JOB)?;
        let overrides = TxOverrides { gas_limit: Some(self.options.gas_limit) };
        let pending = writer.send(SUBMIT_ENCRYPTED_JOB, params, overrides).await?;
        let receipt = pending.wait().await?;

        let handle = self.refresh().await?;
        info!(job_id, tx_hash = %receipt.tx_hash, block = receipt.block_number, "job id stored");
        self.set_status(SUBMIT_SUCCESS);
        Ok(SubmitOutcome::Stored { job_id, tx_hash: receipt.tx_hash, handle })
    }

    fn abort(&self, message: impl Into<String>) -> SubmitOutcome {
        let message = message.into();
        self.set_status(message.clone());
        SubmitOutcome::Aborted(message)
    }
}
