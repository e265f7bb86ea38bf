//! In-memory cache of decryption signatures.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use privy_jobs_contract::{Address, DecryptionSignature};
use tracing::debug;

use crate::wallet::Signer;

pub(crate) fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

type StorageKey = (Address, Vec<Address>);

/// Signatures keyed by signing account and the sorted contract list they
/// cover. Dropped together with the session.
#[derive(Clone, Debug, Default)]
pub struct SignatureStorage {
    inner: Arc<Mutex<HashMap<StorageKey, DecryptionSignature>>>,
}

impl SignatureStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(user: Address, contracts: &[Address]) -> StorageKey {
        let mut contracts = contracts.to_vec();
        contracts.sort();
        contracts.dedup();
        (user, contracts)
    }

    /// Returns the cached signature if it is still valid at `now`.
    pub fn get(&self, user: Address, contracts: &[Address], now: u64) -> Option<DecryptionSignature> {
        let inner = self.inner.lock();
        inner.get(&Self::key(user, contracts)).filter(|sig| sig.is_valid_at(now)).cloned()
    }

    pub fn insert(&self, signature: DecryptionSignature) {
        let key = (signature.user, signature.contract_addresses.clone());
        self.inner.lock().insert(key, signature);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reuses a valid cached signature or signs a new one starting at `now`.
    pub fn load_or_sign(
        &self,
        signer: &Signer,
        contracts: &[Address],
        now: u64,
        duration_days: u64,
    ) -> DecryptionSignature {
        if let Some(signature) = self.get(signer.address(), contracts, now) {
            debug!(user = %signer.address(), "reusing decryption signature");
            return signature;
        }
        let signature = signer.sign_decryption(contracts.to_vec(), now, duration_days);
        self.insert(signature.clone());
        debug!(user = %signer.address(), expires_at = signature.expires_at(), "signed decryption request");
        signature
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_reused_until_expiry() {
        let storage = SignatureStorage::new();
        let signer = Signer::from_seed_material("alice", &[5u8; 32]);
        let a = Address::from([1u8; 20]);
        let b = Address::from([2u8; 20]);

        let first = storage.load_or_sign(&signer, &[b, a], 1_000, 1);
        let again = storage.load_or_sign(&signer, &[a, b], 2_000, 1);
        assert_eq!(first, again);
        assert_eq!(storage.len(), 1);

        let later = storage.load_or_sign(&signer, &[a, b], 1_000 + 86_400, 1);
        assert_ne!(first, later);
        assert_eq!(later.start_timestamp, 1_000 + 86_400);
    }

    #[test]
    fn signatures_are_per_contract_set() {
        let storage = SignatureStorage::new();
        let signer = Signer::from_seed_material("alice", &[5u8; 32]);
        storage.load_or_sign(&signer, &[Address::from([1u8; 20])], 10, 1);
        assert!(storage.get(signer.address(), &[Address::from([2u8; 20])], 10).is_none());
    }
}
