//! On-chain side of FHEPrivyJobs.
//!
//! The [`jobs::FhePrivyJobs`] contract keeps one encrypted 32-bit job id per
//! address and refuses a second submission. It runs on a local
//! [`chain::Chain`] next to a mock FHE [`fhevm::Coprocessor`] that owns the
//! ciphertexts, input proofs, ACL and user decryption.

pub mod abi;
pub mod chain;
pub mod deploy;
pub mod error;
pub mod export;
pub mod fhevm;
pub mod jobs;
pub mod types;

pub use abi::{Abi, AbiEntry, AbiParam, AbiValue};
pub use chain::{Chain, Receipt, SignedTransaction, Transaction, DEFAULT_CHAIN_ID};
pub use deploy::{deploy_fhe_privy_jobs, DeployError, DeployResult, DeployedContractInfo, Deployments};
pub use error::{ChainError, ChainResult, FhevmError, Revert};
pub use export::{ExportError, ExportedInput};
pub use fhevm::{
    Coprocessor, DecryptionSignature, EncryptedInput, HandleContractPair, InputBuilder, ProofContents, UserDecryptRequest,
};
pub use jobs::{ContractCall, FhePrivyJobs, JobEvent, JobRecord, CONTRACT_NAME};
pub use types::{Address, FheType, Handle, InputProof, TxHash};
