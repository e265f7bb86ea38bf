//! The `FHEPrivyJobs` contract: one encrypted job identifier per address,
//! written at most once.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::abi::{Abi, AbiEntry, AbiParam, AbiValue};
use crate::error::Revert;
use crate::fhevm::Coprocessor;
use crate::types::{Address, FheType, Handle, InputProof};

pub const CONTRACT_NAME: &str = "FHEPrivyJobs";

pub const SUBMIT_ENCRYPTED_JOB: &str = "submitEncryptedJob";
pub const GET_ENCRYPTED_JOB: &str = "getEncryptedJob";
pub const IS_JOB_SUBMITTED: &str = "isJobSubmitted";

/// Execution context of a contract call.
#[derive(Clone, Copy, Debug)]
pub struct CallContext {
    /// Address of the executing contract.
    pub this: Address,
    pub sender: Address,
}

/// Per-address view of the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub address: Address,
    pub encrypted_value: Handle,
    pub submitted: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobEvent {
    JobSubmitted { user: Address, handle: Handle },
}

/// A typed call into the contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractCall {
    SubmitEncryptedJob { handle: Handle, proof: InputProof },
    GetEncryptedJob { user: Address },
    IsJobSubmitted { user: Address },
}

impl ContractCall {
    /// Decodes positional ABI arguments for `function`.
    pub fn decode(function: &str, args: &[AbiValue]) -> Result<Self, Revert> {
        match (function, args) {
            (SUBMIT_ENCRYPTED_JOB, [AbiValue::Bytes32(handle), AbiValue::Bytes(proof)]) => {
                Ok(ContractCall::SubmitEncryptedJob { handle: *handle, proof: InputProof(proof.clone()) })
            }
            (GET_ENCRYPTED_JOB, [AbiValue::Address(user)]) => Ok(ContractCall::GetEncryptedJob { user: *user }),
            (IS_JOB_SUBMITTED, [AbiValue::Address(user)]) => Ok(ContractCall::IsJobSubmitted { user: *user }),
            _ => Err(Revert::UnknownFunction),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FhePrivyJobs {
    jobs: BTreeMap<Address, Handle>,
}

impl FhePrivyJobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the caller's encrypted job id. Reverts if the caller already
    /// has one.
    pub fn submit_encrypted_job(
        &mut self,
        ctx: CallContext,
        fhevm: &mut Coprocessor,
        encrypted_job_id: Handle,
        input_proof: &InputProof,
    ) -> Result<JobEvent, Revert> {
        if self.is_job_submitted(ctx.sender) {
            return Err(Revert::AlreadySubmitted);
        }
        let handle = fhevm.verify_input(encrypted_job_id, input_proof, ctx.this, ctx.sender, FheType::Uint32)?;
        self.jobs.insert(ctx.sender, handle);
        fhevm.allow(handle, ctx.this);
        fhevm.allow(handle, ctx.sender);
        info!(user = %ctx.sender, %handle, "job submitted");
        Ok(JobEvent::JobSubmitted { user: ctx.sender, handle })
    }

    pub fn get_encrypted_job(&self, user: Address) -> Handle {
        self.jobs.get(&user).copied().unwrap_or(Handle::ZERO)
    }

    pub fn is_job_submitted(&self, user: Address) -> bool {
        !self.get_encrypted_job(user).is_zero()
    }

    pub fn record(&self, user: Address) -> JobRecord {
        let encrypted_value = self.get_encrypted_job(user);
        JobRecord { address: user, encrypted_value, submitted: !encrypted_value.is_zero() }
    }

    /// Runs a view call.
    pub fn view(&self, call: &ContractCall) -> Result<AbiValue, Revert> {
        match call {
            ContractCall::GetEncryptedJob { user } => Ok(AbiValue::Bytes32(self.get_encrypted_job(*user))),
            ContractCall::IsJobSubmitted { user } => Ok(AbiValue::Bool(self.is_job_submitted(*user))),
            ContractCall::SubmitEncryptedJob { .. } => Err(Revert::NotStateChanging),
        }
    }

    pub fn abi() -> Abi {
        Abi(vec![
            AbiEntry::function(
                SUBMIT_ENCRYPTED_JOB,
                vec![
                    AbiParam::new("encryptedJobId", "bytes32", "externalEuint32"),
                    AbiParam::new("inputProof", "bytes", "bytes"),
                ],
                vec![],
                "nonpayable",
            ),
            AbiEntry::function(
                GET_ENCRYPTED_JOB,
                vec![AbiParam::new("user", "address", "address")],
                vec![AbiParam::new("", "bytes32", "euint32")],
                "view",
            ),
            AbiEntry::function(
                IS_JOB_SUBMITTED,
                vec![AbiParam::new("user", "address", "address")],
                vec![AbiParam::new("", "bool", "bool")],
                "view",
            ),
        ])
    }
}
