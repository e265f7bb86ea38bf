//! Local mock network hosting `FHEPrivyJobs` instances.
//!
//! Transactions are mined immediately, one per block. A transaction that
//! reverts still consumes its nonce but leaves contract and coprocessor state
//! exactly as it was.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use ed25519_compact::{KeyPair, PublicKey, Signature};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::abi::AbiValue;
use crate::error::{ChainError, ChainResult, Revert};
use crate::fhevm::{Coprocessor, UserDecryptRequest};
use crate::jobs::{CallContext, ContractCall, FhePrivyJobs, JobEvent};
use crate::types::{Address, Handle, TxHash};

pub const DEFAULT_CHAIN_ID: u64 = 31337;

pub const TX_BASE_GAS: u64 = 21_000;
/// Input proof verification plus ACL updates.
pub const FHE_INPUT_GAS: u64 = 180_000;
pub const STORAGE_WRITE_GAS: u64 = 22_100;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: Address,
    pub to: Address,
    pub nonce: u64,
    pub gas_limit: u64,
    pub call: ContractCall,
}

impl Transaction {
    pub fn canonical_bytes(&self) -> ChainResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Gas charged for this transaction regardless of outcome.
    pub fn required_gas(&self) -> u64 {
        match self.call {
            ContractCall::SubmitEncryptedJob { .. } => TX_BASE_GAS + FHE_INPUT_GAS + STORAGE_WRITE_GAS,
            _ => TX_BASE_GAS,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub payload: Transaction,
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
}

impl SignedTransaction {
    pub fn sign(payload: Transaction, key_pair: &KeyPair) -> ChainResult<Self> {
        let signature = key_pair.sk.sign(payload.canonical_bytes()?, None).to_vec();
        Ok(Self { payload, public_key: key_pair.pk.to_vec(), signature })
    }

    pub fn hash(&self) -> ChainResult<TxHash> {
        let mut hasher = Sha256::new();
        hasher.update(self.payload.canonical_bytes()?);
        hasher.update(&self.signature);
        let digest: [u8; 32] = hasher.finalize().into();
        Ok(TxHash::from(digest))
    }

    pub fn verify(&self) -> ChainResult<()> {
        if Address::from_public_key(&self.public_key) != self.payload.from {
            return Err(ChainError::Transaction("sender does not match public key".to_string()));
        }
        let public_key = PublicKey::from_slice(&self.public_key)
            .map_err(|err| ChainError::Transaction(format!("invalid public key: {err}")))?;
        let signature = Signature::from_slice(&self.signature)
            .map_err(|err| ChainError::Transaction(format!("invalid signature encoding: {err}")))?;
        public_key
            .verify(self.payload.canonical_bytes()?, &signature)
            .map_err(|_| ChainError::Transaction("invalid signature".to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub from: Address,
    pub to: Address,
    pub success: bool,
    pub gas_used: u64,
    pub revert_reason: Option<String>,
    pub events: Vec<JobEvent>,
}

impl Receipt {
    /// Turns a failed receipt into the revert error callers see.
    pub fn into_result(self) -> ChainResult<Receipt> {
        if self.success {
            return Ok(self);
        }
        Err(ChainError::RevertedWith(self.revert_reason.unwrap_or_default()))
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Chain {
    chain_id: u64,
    block_number: u64,
    timestamp: u64,
    nonces: BTreeMap<Address, u64>,
    contracts: BTreeMap<Address, FhePrivyJobs>,
    coprocessor: Coprocessor,
    receipts: HashMap<TxHash, Receipt>,
}

fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

impl Chain {
    pub fn new(chain_id: u64) -> Self {
        Self::with_coprocessor(Coprocessor::new(chain_id))
    }

    pub fn with_coprocessor(coprocessor: Coprocessor) -> Self {
        Self {
            chain_id: coprocessor.chain_id(),
            block_number: 0,
            timestamp: unix_now(),
            nonces: BTreeMap::new(),
            contracts: BTreeMap::new(),
            coprocessor,
            receipts: HashMap::new(),
        }
    }

    pub fn load(path: &Path) -> ChainResult<Self> {
        let bytes = fs::read(path)?;
        Ok(bincode::deserialize(&bytes)?)
    }

    /// Loads the snapshot at `path`, or starts a fresh chain if there is none.
    pub fn load_or_new(path: &Path, chain_id: u64) -> ChainResult<Self> {
        if path.exists() {
            let chain = Self::load(path)?;
            debug!(path = %path.display(), block = chain.block_number, "loaded chain snapshot");
            Ok(chain)
        } else {
            info!(path = %path.display(), chain_id, "starting new local chain");
            Ok(Self::new(chain_id))
        }
    }

    /// Writes the snapshot to `path`, dropping ciphertexts of inputs that
    /// never made it into contract state.
    pub fn save(&mut self, path: &Path) -> ChainResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let pruned = self.coprocessor.prune_unreferenced();
        if pruned > 0 {
            debug!(pruned, "dropped unused ciphertexts");
        }
        fs::write(path, bincode::serialize(self)?)?;
        Ok(())
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn nonce(&self, account: Address) -> u64 {
        self.nonces.get(&account).copied().unwrap_or(0)
    }

    pub fn coprocessor(&self) -> &Coprocessor {
        &self.coprocessor
    }

    pub fn coprocessor_mut(&mut self) -> &mut Coprocessor {
        &mut self.coprocessor
    }

    pub fn contract(&self, address: Address) -> Option<&FhePrivyJobs> {
        self.contracts.get(&address)
    }

    pub fn receipt(&self, hash: TxHash) -> Option<&Receipt> {
        self.receipts.get(&hash)
    }

    fn mine(&mut self) -> u64 {
        self.block_number += 1;
        self.timestamp = unix_now().max(self.timestamp + 1);
        self.block_number
    }

    fn bump_nonce(&mut self, account: Address) -> u64 {
        let nonce = self.nonces.entry(account).or_insert(0);
        let used = *nonce;
        *nonce += 1;
        used
    }

    /// Deploys a fresh `FHEPrivyJobs` instance. No constructor arguments.
    pub fn deploy(&mut self, deployer: Address) -> Address {
        let nonce = self.bump_nonce(deployer);
        let mut hasher = Sha256::new();
        hasher.update(deployer.as_bytes());
        hasher.update(nonce.to_be_bytes());
        let digest = hasher.finalize();
        let mut raw = [0u8; 20];
        raw.copy_from_slice(&digest[12..]);
        let address = Address::from(raw);
        self.contracts.insert(address, FhePrivyJobs::new());
        let block = self.mine();
        info!(%address, %deployer, block, "contract deployed");
        address
    }

    /// Read-only call; never changes state.
    pub fn call(&self, to: Address, call: &ContractCall) -> ChainResult<AbiValue> {
        let contract = self.contracts.get(&to).ok_or(Revert::NoContract(to))?;
        Ok(contract.view(call)?)
    }

    /// Validates, executes and mines a signed transaction.
    ///
    /// Signature, nonce and intrinsic-gas failures reject the transaction
    /// outright. Reverts are mined and reported through the receipt.
    pub fn execute(&mut self, tx: SignedTransaction) -> ChainResult<Receipt> {
        tx.verify()?;
        let payload = &tx.payload;
        let expected = self.nonce(payload.from);
        if payload.nonce != expected {
            return Err(ChainError::Nonce { account: payload.from, expected, actual: payload.nonce });
        }
        let required = payload.required_gas();
        if payload.gas_limit < required {
            return Err(ChainError::InsufficientGas { limit: payload.gas_limit, required });
        }

        let tx_hash = tx.hash()?;
        let outcome = self.run(payload.from, payload.to, &payload.call);
        self.bump_nonce(payload.from);
        let block_number = self.mine();

        let receipt = match outcome {
            Ok(events) => Receipt {
                tx_hash,
                block_number,
                from: payload.from,
                to: payload.to,
                success: true,
                gas_used: required,
                revert_reason: None,
                events,
            },
            Err(revert) => {
                warn!(%tx_hash, reason = %revert, "transaction reverted");
                Receipt {
                    tx_hash,
                    block_number,
                    from: payload.from,
                    to: payload.to,
                    success: false,
                    gas_used: required,
                    revert_reason: Some(revert.to_string()),
                    events: Vec::new(),
                }
            }
        };
        self.receipts.insert(tx_hash, receipt.clone());
        Ok(receipt)
    }

    /// Runs a call against staged copies and commits them only on success.
    fn run(&mut self, sender: Address, to: Address, call: &ContractCall) -> Result<Vec<JobEvent>, Revert> {
        let mut contract = self.contracts.get(&to).cloned().ok_or(Revert::NoContract(to))?;
        let ctx = CallContext { this: to, sender };
        match call {
            ContractCall::SubmitEncryptedJob { handle, proof } => {
                let mut coprocessor = self.coprocessor.clone();
                let event = contract.submit_encrypted_job(ctx, &mut coprocessor, *handle, proof)?;
                self.contracts.insert(to, contract);
                self.coprocessor = coprocessor;
                Ok(vec![event])
            }
            view => contract.view(view).map(|_| Vec::new()),
        }
    }

    /// Forwards a user decryption request to the coprocessor at the current
    /// wall-clock time.
    pub fn user_decrypt(&self, request: &UserDecryptRequest) -> ChainResult<BTreeMap<Handle, u128>> {
        Ok(self.coprocessor.user_decrypt(request, unix_now())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_compact::Seed;

    fn key(tag: u8) -> (KeyPair, Address) {
        let kp = KeyPair::from_seed(Seed::new([tag; 32]));
        let addr = Address::from_public_key(&kp.pk[..]);
        (kp, addr)
    }

    fn submit_tx(chain: &mut Chain, kp: &KeyPair, from: Address, to: Address, value: u32, gas_limit: u64) -> SignedTransaction {
        let input = chain.coprocessor().create_encrypted_input(to, from).add32(value);
        let enc = chain.coprocessor_mut().encrypt(input).unwrap();
        let payload = Transaction {
            from,
            to,
            nonce: chain.nonce(from),
            gas_limit,
            call: ContractCall::SubmitEncryptedJob { handle: enc.handles[0], proof: enc.input_proof },
        };
        SignedTransaction::sign(payload, kp).unwrap()
    }

    #[test]
    fn revert_consumes_nonce_but_keeps_state() {
        let mut chain = Chain::new(DEFAULT_CHAIN_ID);
        let (alice_kp, alice) = key(1);
        let contract = chain.deploy(alice);

        let first = submit_tx(&mut chain, &alice_kp, alice, contract, 101, 400_000);
        assert!(chain.execute(first).unwrap().success);
        let stored = chain.contract(contract).unwrap().get_encrypted_job(alice);

        let second = submit_tx(&mut chain, &alice_kp, alice, contract, 102, 400_000);
        let receipt = chain.execute(second).unwrap();
        assert!(!receipt.success);
        assert_eq!(receipt.revert_reason.as_deref(), Some("Job ID already submitted"));
        assert_eq!(chain.contract(contract).unwrap().get_encrypted_job(alice), stored);
        assert_eq!(chain.nonce(alice), 3);

        let err = receipt.into_result().unwrap_err();
        assert_eq!(err.to_string(), "execution reverted: Job ID already submitted");
    }

    #[test]
    fn rejects_forged_sender_and_low_gas() {
        let mut chain = Chain::new(DEFAULT_CHAIN_ID);
        let (alice_kp, alice) = key(1);
        let (_, bob) = key(2);
        let contract = chain.deploy(alice);

        let mut forged = submit_tx(&mut chain, &alice_kp, alice, contract, 1, 400_000);
        forged.payload.from = bob;
        assert!(matches!(chain.execute(forged), Err(ChainError::Transaction(_))));

        let starved = submit_tx(&mut chain, &alice_kp, alice, contract, 1, 50_000);
        assert!(matches!(chain.execute(starved), Err(ChainError::InsufficientGas { .. })));
        assert!(!chain.contract(contract).unwrap().is_job_submitted(alice));
    }

    #[test]
    fn snapshot_roundtrip_keeps_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.bin");
        let mut chain = Chain::new(DEFAULT_CHAIN_ID);
        let (alice_kp, alice) = key(1);
        let contract = chain.deploy(alice);
        let tx = submit_tx(&mut chain, &alice_kp, alice, contract, 9, 400_000);
        chain.execute(tx).unwrap();
        chain.save(&path).unwrap();

        let loaded = Chain::load(&path).unwrap();
        assert_eq!(
            loaded.contract(contract).unwrap().get_encrypted_job(alice),
            chain.contract(contract).unwrap().get_encrypted_job(alice)
        );
        assert_eq!(loaded.nonce(alice), chain.nonce(alice));
        assert_eq!(loaded.coprocessor().signer_public_key().to_vec(), chain.coprocessor().signer_public_key().to_vec());
    }

    #[test]
    fn loaded_snapshot_keeps_its_own_chain_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.bin");
        Chain::new(1337).save(&path).unwrap();

        let loaded = Chain::load_or_new(&path, DEFAULT_CHAIN_ID).unwrap();
        assert_eq!(loaded.chain_id(), 1337);
    }

    #[test]
    fn snapshot_drops_ciphertexts_of_rejected_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.bin");
        let mut chain = Chain::new(DEFAULT_CHAIN_ID);
        let (alice_kp, alice) = key(1);
        let contract = chain.deploy(alice);
        let first = submit_tx(&mut chain, &alice_kp, alice, contract, 9, 400_000);
        chain.execute(first).unwrap();
        let second = submit_tx(&mut chain, &alice_kp, alice, contract, 10, 400_000);
        assert!(!chain.execute(second).unwrap().success);
        assert_eq!(chain.coprocessor().ciphertext_count(), 2);

        chain.save(&path).unwrap();
        let loaded = Chain::load(&path).unwrap();
        assert_eq!(loaded.coprocessor().ciphertext_count(), 1);
        let stored = loaded.contract(contract).unwrap().get_encrypted_job(alice);
        assert!(loaded.coprocessor().is_allowed(stored, alice));
    }

    #[test]
    fn call_to_missing_contract_reverts() {
        let chain = Chain::new(DEFAULT_CHAIN_ID);
        let nowhere = Address::from([9; 20]);
        let err = chain.call(nowhere, &ContractCall::IsJobSubmitted { user: nowhere }).unwrap_err();
        assert!(matches!(err, ChainError::Reverted(Revert::NoContract(_))));
    }
}
