//! Deployment records and the `FHEPrivyJobs` deployment step.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::abi::Abi;
use crate::chain::Chain;
use crate::jobs::{FhePrivyJobs, CONTRACT_NAME};
use crate::types::Address;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid deployments file: {0}")]
    Json(#[from] serde_json::Error),
}

/// A named, idempotent deployment step.
#[derive(Clone, Copy, Debug)]
pub struct DeployStep {
    pub id: &'static str,
    pub tags: &'static [&'static str],
}

impl DeployStep {
    /// Whether the step runs for a `--tags` selection. No selection runs
    /// every step.
    pub fn selected_by(&self, tags: &[String]) -> bool {
        tags.is_empty() || tags.iter().any(|tag| self.tags.contains(&tag.as_str()))
    }
}

pub const DEPLOY_FHE_PRIVY_JOBS: DeployStep = DeployStep { id: "deploy_FHEPrivyJobs", tags: &["FHEPrivyJobs"] };

/// What a client needs to talk to a deployed contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedContractInfo {
    pub name: String,
    pub address: Address,
    pub abi: Abi,
    pub chain_id: u64,
    pub deployer: Address,
    pub block_number: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployments {
    /// Executed step ids per chain id.
    #[serde(default)]
    executed: BTreeMap<u64, BTreeSet<String>>,
    #[serde(default)]
    contracts: BTreeMap<u64, BTreeMap<String, DeployedContractInfo>>,
}

impl Deployments {
    pub fn load(path: &Path) -> Result<Self, DeployError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let buf = fs::read(path)?;
        Ok(serde_json::from_slice(&buf)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), DeployError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn is_executed(&self, chain_id: u64, step_id: &str) -> bool {
        self.executed.get(&chain_id).is_some_and(|ids| ids.contains(step_id))
    }

    pub fn get(&self, chain_id: u64, name: &str) -> Option<&DeployedContractInfo> {
        self.contracts.get(&chain_id).and_then(|named| named.get(name))
    }

    fn record(&mut self, step: DeployStep, info: DeployedContractInfo) {
        self.executed.entry(info.chain_id).or_default().insert(step.id.to_string());
        self.contracts.entry(info.chain_id).or_default().insert(info.name.clone(), info);
    }

    fn forget(&mut self, chain_id: u64, step: DeployStep, name: &str) {
        if let Some(ids) = self.executed.get_mut(&chain_id) {
            ids.remove(step.id);
        }
        if let Some(named) = self.contracts.get_mut(&chain_id) {
            named.remove(name);
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployResult {
    pub address: Address,
    pub newly_deployed: bool,
}

/// Deploys `FHEPrivyJobs` unless the step already ran on this chain.
pub fn deploy_fhe_privy_jobs(chain: &mut Chain, deployer: Address, deployments: &mut Deployments) -> DeployResult {
    let step = DEPLOY_FHE_PRIVY_JOBS;
    let chain_id = chain.chain_id();

    if deployments.is_executed(chain_id, step.id) {
        match deployments.get(chain_id, CONTRACT_NAME) {
            Some(existing) if chain.contract(existing.address).is_some() => {
                info!(step = step.id, address = %existing.address, "deployment step already executed, skipping");
                return DeployResult { address: existing.address, newly_deployed: false };
            }
            _ => {
                warn!(step = step.id, chain_id, "recorded deployment not found on chain, redeploying");
                deployments.forget(chain_id, step, CONTRACT_NAME);
            }
        }
    }

    let address = chain.deploy(deployer);
    deployments.record(
        step,
        DeployedContractInfo {
            name: CONTRACT_NAME.to_string(),
            address,
            abi: FhePrivyJobs::abi(),
            chain_id,
            deployer,
            block_number: chain.block_number(),
        },
    );
    info!("{CONTRACT_NAME} contract: {address}");
    DeployResult { address, newly_deployed: true }
}
