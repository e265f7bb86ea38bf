//! Mock FHE coprocessor.
//!
//! Ciphertexts are opaque handles whose plaintext stays inside the
//! coprocessor, as on a mock-mode fhEVM test network. The coprocessor also
//! signs input proofs, keeps the access-control list and answers
//! user-authorized decryption requests.

use std::collections::{BTreeMap, HashMap, HashSet};

use ed25519_compact::{KeyPair, PublicKey, Seed, Signature};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::FhevmError;
use crate::types::{Address, FheType, Handle, InputProof};

const INPUT_DOMAIN: &[u8] = b"privy-jobs/input-proof/v1";
const DECRYPT_DOMAIN: &[u8] = b"privy-jobs/user-decrypt/v1";
const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Ciphertext {
    fhe_type: FheType,
    value: u128,
}

/// Plaintext values waiting to be encrypted for one contract/account pair.
#[derive(Clone, Debug)]
pub struct InputBuilder {
    contract: Address,
    user: Address,
    values: Vec<(FheType, u128)>,
}

impl InputBuilder {
    pub fn new(contract: Address, user: Address) -> Self {
        Self { contract, user, values: Vec::new() }
    }

    pub fn add(mut self, fhe_type: FheType, value: u128) -> Self {
        self.values.push((fhe_type, value));
        self
    }

    pub fn add_bool(self, value: bool) -> Self {
        self.add(FheType::Bool, value as u128)
    }

    pub fn add8(self, value: u8) -> Self {
        self.add(FheType::Uint8, value as u128)
    }

    pub fn add16(self, value: u16) -> Self {
        self.add(FheType::Uint16, value as u128)
    }

    pub fn add32(self, value: u32) -> Self {
        self.add(FheType::Uint32, value as u128)
    }

    pub fn add64(self, value: u64) -> Self {
        self.add(FheType::Uint64, value as u128)
    }

    pub fn add128(self, value: u128) -> Self {
        self.add(FheType::Uint128, value)
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn user(&self) -> Address {
        self.user
    }
}

/// Output of an encryption: one handle per added value plus the proof that
/// binds them to the contract and account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedInput {
    pub handles: Vec<Handle>,
    pub input_proof: InputProof,
}

/// Decoded form of an [`InputProof`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofContents {
    pub contract: Address,
    pub user: Address,
    pub handles: Vec<Handle>,
    signature: [u8; Signature::BYTES],
}

impl ProofContents {
    pub fn decode(proof: &InputProof) -> Result<Self, FhevmError> {
        let bytes = proof.0.as_slice();
        if bytes.len() < 41 {
            return Err(FhevmError::MalformedProof);
        }
        let contract = Address::from(<[u8; 20]>::try_from(&bytes[0..20]).map_err(|_| FhevmError::MalformedProof)?);
        let user = Address::from(<[u8; 20]>::try_from(&bytes[20..40]).map_err(|_| FhevmError::MalformedProof)?);
        let count = bytes[40] as usize;
        let handles_end = 41 + count * 32;
        if bytes.len() != handles_end + Signature::BYTES {
            return Err(FhevmError::MalformedProof);
        }
        let handles = bytes[41..handles_end]
            .chunks_exact(32)
            .map(|chunk| {
                let mut h = [0u8; 32];
                h.copy_from_slice(chunk);
                Handle::from(h)
            })
            .collect();
        let mut signature = [0u8; Signature::BYTES];
        signature.copy_from_slice(&bytes[handles_end..]);
        Ok(Self { contract, user, handles, signature })
    }

    fn encode(&self) -> InputProof {
        let mut out = Vec::with_capacity(41 + self.handles.len() * 32 + Signature::BYTES);
        out.extend_from_slice(self.contract.as_bytes());
        out.extend_from_slice(self.user.as_bytes());
        out.push(self.handles.len() as u8);
        for handle in &self.handles {
            out.extend_from_slice(handle.as_bytes());
        }
        out.extend_from_slice(&self.signature);
        InputProof(out)
    }

    /// Checks the coprocessor signature over the proof contents.
    pub fn verify_signature(&self, signer: &PublicKey, chain_id: u64) -> Result<(), FhevmError> {
        let message = input_message(self.contract, self.user, chain_id, &self.handles);
        let signature = Signature::new(self.signature);
        signer.verify(message, &signature).map_err(|_| FhevmError::BadSignature)
    }
}

fn input_message(contract: Address, user: Address, chain_id: u64, handles: &[Handle]) -> Vec<u8> {
    let mut message = Vec::with_capacity(INPUT_DOMAIN.len() + 48 + handles.len() * 32);
    message.extend_from_slice(INPUT_DOMAIN);
    message.extend_from_slice(contract.as_bytes());
    message.extend_from_slice(user.as_bytes());
    message.extend_from_slice(&chain_id.to_be_bytes());
    for handle in handles {
        message.extend_from_slice(handle.as_bytes());
    }
    message
}

/// A user's signed authorization to decrypt handles of the listed contracts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionSignature {
    pub user: Address,
    pub public_key: Vec<u8>,
    pub contract_addresses: Vec<Address>,
    pub start_timestamp: u64,
    pub duration_days: u64,
    pub signature: Vec<u8>,
}

impl DecryptionSignature {
    pub fn sign(key_pair: &KeyPair, contract_addresses: Vec<Address>, start_timestamp: u64, duration_days: u64) -> Self {
        let public_key = key_pair.pk.to_vec();
        let mut contract_addresses = contract_addresses;
        contract_addresses.sort();
        contract_addresses.dedup();
        let message = decrypt_message(&public_key, &contract_addresses, start_timestamp, duration_days);
        let signature = key_pair.sk.sign(message, None).to_vec();
        Self {
            user: Address::from_public_key(&public_key),
            public_key,
            contract_addresses,
            start_timestamp,
            duration_days,
            signature,
        }
    }

    pub fn expires_at(&self) -> u64 {
        self.start_timestamp.saturating_add(self.duration_days.saturating_mul(SECONDS_PER_DAY))
    }

    pub fn is_valid_at(&self, now: u64) -> bool {
        now >= self.start_timestamp && now < self.expires_at()
    }

    pub fn covers(&self, contract: Address) -> bool {
        self.contract_addresses.binary_search(&contract).is_ok()
    }

    fn verify(&self) -> Result<(), FhevmError> {
        if Address::from_public_key(&self.public_key) != self.user {
            return Err(FhevmError::InvalidDecryptionSignature);
        }
        let public_key = PublicKey::from_slice(&self.public_key).map_err(|_| FhevmError::InvalidDecryptionSignature)?;
        let signature = Signature::from_slice(&self.signature).map_err(|_| FhevmError::InvalidDecryptionSignature)?;
        let message = decrypt_message(&self.public_key, &self.contract_addresses, self.start_timestamp, self.duration_days);
        public_key.verify(message, &signature).map_err(|_| FhevmError::InvalidDecryptionSignature)
    }
}

fn decrypt_message(public_key: &[u8], contracts: &[Address], start_timestamp: u64, duration_days: u64) -> Vec<u8> {
    let mut message = Vec::new();
    message.extend_from_slice(DECRYPT_DOMAIN);
    message.extend_from_slice(public_key);
    for contract in contracts {
        message.extend_from_slice(contract.as_bytes());
    }
    message.extend_from_slice(&start_timestamp.to_be_bytes());
    message.extend_from_slice(&duration_days.to_be_bytes());
    message
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleContractPair {
    pub handle: Handle,
    pub contract: Address,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserDecryptRequest {
    pub pairs: Vec<HandleContractPair>,
    pub signature: DecryptionSignature,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Coprocessor {
    chain_id: u64,
    signer_seed: [u8; 32],
    ciphertexts: HashMap<Handle, Ciphertext>,
    acl: HashSet<(Handle, Address)>,
}

impl Coprocessor {
    pub fn new(chain_id: u64) -> Self {
        let mut signer_seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut signer_seed);
        Self::with_seed(chain_id, signer_seed)
    }

    pub fn with_seed(chain_id: u64, signer_seed: [u8; 32]) -> Self {
        Self { chain_id, signer_seed, ciphertexts: HashMap::new(), acl: HashSet::new() }
    }

    fn key_pair(&self) -> KeyPair {
        KeyPair::from_seed(Seed::new(self.signer_seed))
    }

    /// Public key that signs input proofs.
    pub fn signer_public_key(&self) -> PublicKey {
        self.key_pair().pk
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn create_encrypted_input(&self, contract: Address, user: Address) -> InputBuilder {
        InputBuilder::new(contract, user)
    }

    /// Registers the builder's values as ciphertexts and signs the proof.
    pub fn encrypt(&mut self, input: InputBuilder) -> Result<EncryptedInput, FhevmError> {
        if input.values.len() > u8::MAX as usize {
            return Err(FhevmError::MalformedProof);
        }
        let mut handles = Vec::with_capacity(input.values.len());
        for (index, (fhe_type, value)) in input.values.iter().enumerate() {
            if !fhe_type.fits(*value) {
                return Err(FhevmError::Overflow { value: *value, bits: fhe_type.bits() });
            }
            let mut nonce = [0u8; 16];
            rand::thread_rng().fill_bytes(&mut nonce);
            let mut hasher = Sha256::new();
            hasher.update(input.contract.as_bytes());
            hasher.update(input.user.as_bytes());
            hasher.update(self.chain_id.to_be_bytes());
            hasher.update([index as u8]);
            hasher.update(nonce);
            let mut bytes: [u8; 32] = hasher.finalize().into();
            bytes[31] = fhe_type.tag();
            let handle = Handle::from(bytes);
            self.ciphertexts.insert(handle, Ciphertext { fhe_type: *fhe_type, value: *value });
            handles.push(handle);
        }

        let message = input_message(input.contract, input.user, self.chain_id, &handles);
        let signature = self.key_pair().sk.sign(message, None);
        let mut raw = [0u8; Signature::BYTES];
        raw.copy_from_slice(&signature[..]);
        let proof = ProofContents { contract: input.contract, user: input.user, handles: handles.clone(), signature: raw };
        debug!(count = handles.len(), contract = %input.contract, user = %input.user, "encrypted input");
        Ok(EncryptedInput { handles, input_proof: proof.encode() })
    }

    /// Validates an external input inside a contract call and returns the
    /// handle it can be used as.
    pub fn verify_input(
        &self,
        handle: Handle,
        proof: &InputProof,
        contract: Address,
        user: Address,
        expected: FheType,
    ) -> Result<Handle, FhevmError> {
        let contents = ProofContents::decode(proof)?;
        if contents.contract != contract || contents.user != user {
            return Err(FhevmError::WrongBinding);
        }
        contents.verify_signature(&self.signer_public_key(), self.chain_id)?;
        if !contents.handles.contains(&handle) {
            return Err(FhevmError::HandleNotInProof(handle));
        }
        let ciphertext = self.ciphertexts.get(&handle).ok_or(FhevmError::UnknownHandle(handle))?;
        if ciphertext.fhe_type != expected || handle.fhe_type() != Some(expected) {
            return Err(FhevmError::TypeMismatch(handle, type_name(expected)));
        }
        Ok(handle)
    }

    pub fn allow(&mut self, handle: Handle, account: Address) {
        self.acl.insert((handle, account));
    }

    pub fn is_allowed(&self, handle: Handle, account: Address) -> bool {
        self.acl.contains(&(handle, account))
    }

    pub fn ciphertext_count(&self) -> usize {
        self.ciphertexts.len()
    }

    /// Drops ciphertexts that no account was ever allowed on: inputs that were
    /// never accepted by a contract. Returns how many were removed.
    pub fn prune_unreferenced(&mut self) -> usize {
        let referenced: HashSet<Handle> = self.acl.iter().map(|(handle, _)| *handle).collect();
        let before = self.ciphertexts.len();
        self.ciphertexts.retain(|handle, _| referenced.contains(handle));
        before - self.ciphertexts.len()
    }

    /// Decrypts every requested handle for the signing user.
    ///
    /// Both the user and the owning contract must be on the handle's ACL.
    pub fn user_decrypt(&self, request: &UserDecryptRequest, now: u64) -> Result<BTreeMap<Handle, u128>, FhevmError> {
        let signature = &request.signature;
        signature.verify()?;
        if !signature.is_valid_at(now) {
            return Err(FhevmError::SignatureExpired);
        }
        let mut results = BTreeMap::new();
        for pair in &request.pairs {
            if !signature.covers(pair.contract) {
                return Err(FhevmError::ContractNotAuthorized(pair.contract));
            }
            for account in [signature.user, pair.contract] {
                if !self.is_allowed(pair.handle, account) {
                    return Err(FhevmError::NotAllowed { handle: pair.handle, account });
                }
            }
            let ciphertext = self.ciphertexts.get(&pair.handle).ok_or(FhevmError::UnknownHandle(pair.handle))?;
            results.insert(pair.handle, ciphertext.value);
        }
        Ok(results)
    }
}

fn type_name(fhe_type: FheType) -> &'static str {
    match fhe_type {
        FheType::Bool => "ebool",
        FheType::Uint8 => "euint8",
        FheType::Uint16 => "euint16",
        FheType::Uint32 => "euint32",
        FheType::Uint64 => "euint64",
        FheType::Uint128 => "euint128",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(tag: u8) -> Address {
        Address::from([tag; 20])
    }

    #[test]
    fn proof_binds_contract_and_user() {
        let mut fhevm = Coprocessor::with_seed(31337, [7u8; 32]);
        let input = fhevm.create_encrypted_input(addr(1), addr(2)).add32(42);
        let enc = fhevm.encrypt(input).unwrap();
        let handle = enc.handles[0];

        assert_eq!(fhevm.verify_input(handle, &enc.input_proof, addr(1), addr(2), FheType::Uint32), Ok(handle));
        assert_eq!(
            fhevm.verify_input(handle, &enc.input_proof, addr(1), addr(3), FheType::Uint32),
            Err(FhevmError::WrongBinding)
        );
        assert!(matches!(
            fhevm.verify_input(handle, &enc.input_proof, addr(1), addr(2), FheType::Uint64),
            Err(FhevmError::TypeMismatch(..))
        ));
    }

    #[test]
    fn tampered_proof_fails_signature() {
        let mut fhevm = Coprocessor::with_seed(31337, [7u8; 32]);
        let enc = fhevm.encrypt(fhevm.create_encrypted_input(addr(1), addr(2)).add32(5)).unwrap();
        let mut forged = enc.input_proof.clone();
        let last = forged.0.len() - 1;
        forged.0[last] ^= 0xff;
        assert_eq!(
            fhevm.verify_input(enc.handles[0], &forged, addr(1), addr(2), FheType::Uint32),
            Err(FhevmError::BadSignature)
        );
    }

    #[test]
    fn same_value_gives_distinct_handles() {
        let mut fhevm = Coprocessor::new(31337);
        let a = fhevm.encrypt(fhevm.create_encrypted_input(addr(1), addr(2)).add32(55)).unwrap();
        let b = fhevm.encrypt(fhevm.create_encrypted_input(addr(1), addr(3)).add32(55)).unwrap();
        assert_ne!(a.handles[0], b.handles[0]);
        assert_eq!(a.handles[0].fhe_type(), Some(FheType::Uint32));
    }

    #[test]
    fn user_decrypt_requires_acl_and_valid_window() {
        let mut fhevm = Coprocessor::new(31337);
        let user = KeyPair::from_seed(Seed::new([9u8; 32]));
        let user_addr = Address::from_public_key(&user.pk[..]);
        let contract = addr(1);
        let enc = fhevm.encrypt(fhevm.create_encrypted_input(contract, user_addr).add32(77)).unwrap();
        let handle = enc.handles[0];

        let signature = DecryptionSignature::sign(&user, vec![contract], 1_000, 1);
        let request = UserDecryptRequest { pairs: vec![HandleContractPair { handle, contract }], signature };

        assert_eq!(
            fhevm.user_decrypt(&request, 1_000),
            Err(FhevmError::NotAllowed { handle, account: user_addr })
        );

        fhevm.allow(handle, user_addr);
        fhevm.allow(handle, contract);
        assert_eq!(fhevm.user_decrypt(&request, 1_000).unwrap()[&handle], 77);
        assert_eq!(fhevm.user_decrypt(&request, 1_000 + SECONDS_PER_DAY), Err(FhevmError::SignatureExpired));
    }

    #[test]
    fn pruning_keeps_only_allowed_ciphertexts() {
        let mut fhevm = Coprocessor::new(31337);
        let kept = fhevm.encrypt(fhevm.create_encrypted_input(addr(1), addr(2)).add32(1)).unwrap();
        fhevm.encrypt(fhevm.create_encrypted_input(addr(1), addr(2)).add32(2)).unwrap();
        fhevm.allow(kept.handles[0], addr(1));

        assert_eq!(fhevm.prune_unreferenced(), 1);
        assert_eq!(fhevm.ciphertext_count(), 1);
        assert_eq!(fhevm.prune_unreferenced(), 0);
    }

    #[test]
    fn overflowing_value_is_rejected() {
        let mut fhevm = Coprocessor::new(1);
        let input = fhevm.create_encrypted_input(addr(1), addr(2)).add(FheType::Uint8, 256);
        assert_eq!(fhevm.encrypt(input), Err(FhevmError::Overflow { value: 256, bits: 8 }));
    }
}
