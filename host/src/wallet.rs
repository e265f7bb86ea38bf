//! Local wallet: accounts backed by seed files, and the connection the
//! client sees (accounts, chain id, optional signer).

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use ed25519_compact::{KeyPair, Seed};
use privy_jobs_contract::{Address, ChainResult, DecryptionSignature, SignedTransaction, Transaction};
use rand::RngCore;
use sha2::{Digest, Sha512};
use tracing::{debug, info};

use crate::error::WalletError;

/// Signs transactions and decryption authorizations for one account.
#[derive(Clone)]
pub struct Signer {
    name: String,
    key_pair: KeyPair,
    address: Address,
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer").field("name", &self.name).field("address", &self.address).finish()
    }
}

impl Signer {
    /// Derives the key from arbitrary seed material: the first half of its
    /// `Sha512` digest is the ed25519 seed.
    pub fn from_seed_material(name: &str, material: &[u8]) -> Self {
        let hash = Sha512::digest(material);
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&hash[..32]);
        let key_pair = KeyPair::from_seed(Seed::new(seed));
        let address = Address::from_public_key(&key_pair.pk[..]);
        Self { name: name.to_string(), key_pair, address }
    }

    /// Reads a hex-encoded seed from `path`; the account is named after the
    /// file stem.
    pub fn from_key_file(path: &Path) -> Result<Self, WalletError> {
        let private_key_hex = fs::read_to_string(path)?;
        let material = hex::decode(private_key_hex.trim()).map_err(|e| WalletError::InvalidKey {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        if material.len() < 32 {
            return Err(WalletError::InvalidKey {
                path: path.display().to_string(),
                reason: format!("seed must be at least 32 bytes, got {}", material.len()),
            });
        }
        let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("account");
        Ok(Self::from_seed_material(name, &material))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn sign_transaction(&self, payload: Transaction) -> ChainResult<SignedTransaction> {
        SignedTransaction::sign(payload, &self.key_pair)
    }

    pub fn sign_decryption(&self, contracts: Vec<Address>, start_timestamp: u64, duration_days: u64) -> DecryptionSignature {
        DecryptionSignature::sign(&self.key_pair, contracts, start_timestamp, duration_days)
    }
}

/// Accounts found in a keys directory, ordered by name.
#[derive(Clone, Debug, Default)]
pub struct Wallet {
    accounts: Vec<Signer>,
}

impl Wallet {
    pub fn load_dir(dir: &Path) -> Result<Self, WalletError> {
        let mut accounts = Vec::new();
        if dir.exists() {
            for entry in fs::read_dir(dir)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) == Some("key") {
                    accounts.push(Signer::from_key_file(&path)?);
                }
            }
        }
        accounts.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(dir = %dir.display(), count = accounts.len(), "loaded wallet");
        Ok(Self { accounts })
    }

    /// Writes a fresh random seed to `<dir>/<name>.key`.
    pub fn create_account(dir: &Path, name: &str) -> Result<Signer, WalletError> {
        let path = key_path(dir, name);
        if path.exists() {
            return Signer::from_key_file(&path);
        }
        fs::create_dir_all(dir)?;
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        fs::write(&path, hex::encode(seed))?;
        let signer = Signer::from_key_file(&path)?;
        info!(name, address = %signer.address(), "created account");
        Ok(signer)
    }

    pub fn accounts(&self) -> &[Signer] {
        &self.accounts
    }

    pub fn get(&self, name: &str) -> Result<&Signer, WalletError> {
        self.accounts
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| WalletError::UnknownAccount(name.to_string()))
    }

    /// Connects `name` as the active account on `chain_id`.
    pub fn connect(&self, name: &str, chain_id: u64) -> Result<WalletConnection, WalletError> {
        let signer = self.get(name)?.clone();
        Ok(WalletConnection::connected(signer, chain_id))
    }
}

fn key_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.key"))
}

/// What the client knows about the connected wallet.
#[derive(Clone, Debug, Default)]
pub struct WalletConnection {
    pub chain_id: Option<u64>,
    pub accounts: Vec<Address>,
    signer: Option<Signer>,
}

impl WalletConnection {
    pub fn connected(signer: Signer, chain_id: u64) -> Self {
        Self { chain_id: Some(chain_id), accounts: vec![signer.address()], signer: Some(signer) }
    }

    /// A connection that can read but has no signer.
    pub fn read_only(account: Address, chain_id: u64) -> Self {
        Self { chain_id: Some(chain_id), accounts: vec![account], signer: None }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.chain_id.is_some() && !self.accounts.is_empty()
    }

    pub fn primary_account(&self) -> Option<Address> {
        self.accounts.first().copied()
    }

    pub fn signer(&self) -> Option<&Signer> {
        self.signer.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use privy_jobs_contract::ContractCall;
    use tempfile::tempdir;

    #[test]
    fn key_file_derivation_is_stable() {
        let dir = tempdir().unwrap();
        let created = Wallet::create_account(dir.path(), "alice").unwrap();
        let reloaded = Signer::from_key_file(&dir.path().join("alice.key")).unwrap();
        assert_eq!(created.address(), reloaded.address());
        assert_eq!(reloaded.name(), "alice");
    }

    #[test]
    fn wallet_lists_accounts_by_name() {
        let dir = tempdir().unwrap();
        Wallet::create_account(dir.path(), "bob").unwrap();
        Wallet::create_account(dir.path(), "alice").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let wallet = Wallet::load_dir(dir.path()).unwrap();
        let names: Vec<_> = wallet.accounts().iter().map(|s| s.name()).collect();
        assert_eq!(names, ["alice", "bob"]);
        assert!(matches!(wallet.get("carol"), Err(WalletError::UnknownAccount(_))));
    }

    #[test]
    fn short_seed_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("weak.key");
        fs::write(&path, "abcd").unwrap();
        assert!(matches!(Signer::from_key_file(&path), Err(WalletError::InvalidKey { .. })));
    }

    #[test]
    fn derived_key_signs_verifiable_transactions() {
        let signer = Signer::from_seed_material("alice", &[3u8; 32]);
        let payload = Transaction {
            from: signer.address(),
            to: Address::from([1u8; 20]),
            nonce: 0,
            gas_limit: 400_000,
            call: ContractCall::IsJobSubmitted { user: signer.address() },
        };
        let tx = signer.sign_transaction(payload).unwrap();
        assert!(tx.verify().is_ok());
    }

    #[test]
    fn connection_state() {
        let signer = Signer::from_seed_material("alice", &[1u8; 32]);
        let connected = WalletConnection::connected(signer.clone(), 31337);
        assert!(connected.is_connected());
        assert_eq!(connected.primary_account(), Some(signer.address()));
        assert!(!WalletConnection::disconnected().is_connected());
        assert!(WalletConnection::read_only(signer.address(), 1).signer().is_none());
    }
}
