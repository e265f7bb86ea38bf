//! Client orchestration of the submit and decrypt flows.
//!
//! A [`JobsClient`] is mounted once per view session and owns its
//! [`ClientSessionState`]. Failures are caught at this boundary and turned
//! into the status line; nothing is retried.

mod decrypt;
mod submit;

use std::sync::Arc;

use parking_lot::Mutex;
use privy_jobs_contract::{Address, DeployedContractInfo, Handle};
use tracing::{debug, warn};

use crate::config::HostConfig;
use crate::contract::ContractHandles;
use crate::provider::{FhevmInstance, Provider};
use crate::session::ClientSessionState;
use crate::storage::SignatureStorage;
use crate::wallet::WalletConnection;

pub use decrypt::DecryptOutcome;
pub use submit::SubmitOutcome;

pub const SUBMIT_SUCCESS: &str = "✔ Job ID encrypted & stored successfully";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientOptions {
    /// Gas ceiling attached to every submission.
    pub gas_limit: u64,
    pub decryption_validity_days: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self { gas_limit: 400_000, decryption_validity_days: 365 }
    }
}

impl From<&HostConfig> for ClientOptions {
    fn from(config: &HostConfig) -> Self {
        Self { gas_limit: config.gas_limit, decryption_validity_days: config.decryption_validity_days }
    }
}

pub struct JobsClient {
    instance: Arc<dyn FhevmInstance>,
    connection: WalletConnection,
    contract: Option<DeployedContractInfo>,
    handles: ContractHandles,
    options: ClientOptions,
    state: Mutex<ClientSessionState>,
    signatures: SignatureStorage,
}

impl JobsClient {
    /// Mounts a client with a fresh session.
    ///
    /// Contract metadata recorded for another chain than the connected one is
    /// treated as unavailable.
    pub fn mount(
        provider: Arc<dyn Provider>,
        instance: Arc<dyn FhevmInstance>,
        connection: WalletConnection,
        contract: Option<DeployedContractInfo>,
        options: ClientOptions,
    ) -> Self {
        let contract = match (contract, connection.chain_id) {
            (Some(info), Some(chain_id)) if info.chain_id == chain_id => Some(info),
            (Some(info), _) => {
                warn!(contract = %info.address, deployed_on = info.chain_id, "no deployment for the connected chain");
                None
            }
            (None, _) => None,
        };
        let handles = ContractHandles::new(contract.clone(), provider, connection.signer().cloned());
        debug!(account = ?connection.primary_account(), available = contract.is_some(), "mounted jobs client");
        Self {
            instance,
            connection,
            contract,
            handles,
            options,
            state: Mutex::new(ClientSessionState::default()),
            signatures: SignatureStorage::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn account(&self) -> Option<Address> {
        self.connection.primary_account()
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.connection.chain_id
    }

    pub fn contract_available(&self) -> bool {
        self.contract.is_some()
    }

    pub fn contract_address(&self) -> Option<Address> {
        self.contract.as_ref().map(|info| info.address)
    }

    /// Snapshot of the session state.
    pub fn state(&self) -> ClientSessionState {
        self.state.lock().clone()
    }

    pub fn status(&self) -> String {
        self.state.lock().status.clone()
    }

    pub fn busy(&self) -> bool {
        self.state.lock().busy
    }

    pub fn is_decrypting(&self) -> bool {
        self.state.lock().decrypting
    }

    pub fn stored_handle(&self) -> Option<Handle> {
        self.state.lock().stored_handle
    }

    pub fn decrypted_job_id(&self) -> Option<u32> {
        self.state.lock().decrypted_job_id
    }

    pub fn already_applied(&self) -> bool {
        self.state.lock().already_applied()
    }

    fn set_status(&self, status: impl Into<String>) {
        let status = status.into();
        debug!(%status, "status");
        self.state.lock().set_status(status);
    }
}

fn busy_flag(state: &mut ClientSessionState) -> &mut bool {
    &mut state.busy
}

fn decrypting_flag(state: &mut ClientSessionState) -> &mut bool {
    &mut state.decrypting
}

/// Holds one of the session flags raised for the lifetime of a flow and
/// lowers it on drop, whichever way the flow exits.
struct FlagGuard<'a> {
    state: &'a Mutex<ClientSessionState>,
    flag: fn(&mut ClientSessionState) -> &mut bool,
}

impl<'a> FlagGuard<'a> {
    /// `None` if the flag is already raised.
    fn acquire(state: &'a Mutex<ClientSessionState>, flag: fn(&mut ClientSessionState) -> &mut bool) -> Option<Self> {
        let mut guard = state.lock();
        let raised = flag(&mut guard);
        if *raised {
            return None;
        }
        *raised = true;
        Some(Self { state, flag })
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        *(self.flag)(&mut self.state.lock()) = false;
    }
}
