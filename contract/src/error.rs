use std::io;

use thiserror::Error;

use crate::types::{Address, Handle};

/// Reasons a contract call reverts. The display string is the revert reason
/// surfaced to callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Revert {
    #[error("Job ID already submitted")]
    AlreadySubmitted,
    #[error("invalid input proof: {0}")]
    InvalidInput(#[from] FhevmError),
    #[error("no contract at {0}")]
    NoContract(Address),
    #[error("function is not payable or does not exist")]
    UnknownFunction,
    #[error("view function called in a transaction")]
    NotStateChanging,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FhevmError {
    #[error("proof is malformed")]
    MalformedProof,
    #[error("proof signature does not verify")]
    BadSignature,
    #[error("proof is bound to a different contract or account")]
    WrongBinding,
    #[error("handle {0} is not part of the proof")]
    HandleNotInProof(Handle),
    #[error("handle {0} is not a {1}")]
    TypeMismatch(Handle, &'static str),
    #[error("value {value} does not fit in {bits} bits")]
    Overflow { value: u128, bits: u32 },
    #[error("unknown handle {0}")]
    UnknownHandle(Handle),
    #[error("{account} is not allowed to decrypt {handle}")]
    NotAllowed { handle: Handle, account: Address },
    #[error("invalid decryption signature")]
    InvalidDecryptionSignature,
    #[error("decryption signature expired")]
    SignatureExpired,
    #[error("contract {0} is not covered by the decryption signature")]
    ContractNotAuthorized(Address),
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("transaction rejected: {0}")]
    Transaction(String),
    #[error("intrinsic gas too low: limit {limit}, required {required}")]
    InsufficientGas { limit: u64, required: u64 },
    #[error("nonce mismatch for {account}: expected {expected}, got {actual}")]
    Nonce { account: Address, expected: u64, actual: u64 },
    #[error("execution reverted: {0}")]
    Reverted(#[from] Revert),
    #[error("execution reverted: {0}")]
    RevertedWith(String),
    #[error(transparent)]
    Fhevm(#[from] FhevmError),
    #[error("unknown transaction {0}")]
    UnknownTransaction(String),
}

pub type ChainResult<T> = Result<T, ChainError>;
