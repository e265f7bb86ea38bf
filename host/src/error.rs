use std::io;

use privy_jobs_contract::{ChainError, FhevmError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Fhevm(#[from] FhevmError),
    #[error("contract handle is read-only")]
    ReadOnly,
    #[error("no function {0} in contract ABI")]
    UnknownFunction(String),
    #[error("invalid arguments for {0}")]
    InvalidArguments(String),
    #[error("unexpected return value from {function}: {actual}")]
    UnexpectedReturn { function: String, actual: &'static str },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncryptionError {
    #[error("Missing ABI entry")]
    MissingAbiEntry,
    #[error("Encryption method missing")]
    MethodMissing,
    #[error("value {value} does not fit {method}")]
    Overflow { value: u128, method: &'static str },
    #[error("parameter {name} of type {ty} cannot be filled from an encrypted input")]
    UnsupportedParam { name: String, ty: String },
    #[error("encrypted input has too few handles for {0}")]
    MissingHandle(String),
}

/// Anything the orchestrators can fail with once a flow is under way.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Encryption(#[from] EncryptionError),
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid key file {path}: {reason}")]
    InvalidKey { path: String, reason: String },
    #[error("no account named {0}")]
    UnknownAccount(String),
}
