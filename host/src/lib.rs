//! Client side of FHEPrivyJobs: wallet, provider, encryption adapter and the
//! orchestrators behind the `privy-jobs` command.

pub mod catalog;
pub mod config;
pub mod contract;
pub mod encryption;
pub mod error;
pub mod orchestrator;
pub mod provider;
pub mod session;
pub mod storage;
pub mod view;
pub mod wallet;

pub use orchestrator::{ClientOptions, DecryptOutcome, JobsClient, SubmitOutcome};
pub use provider::{FhevmInstance, LocalProvider, PendingTransaction, Provider};
pub use wallet::{Signer, Wallet, WalletConnection};
