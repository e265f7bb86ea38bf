use ed25519_compact::{KeyPair, Seed};
use privy_jobs_contract::{
    deploy_fhe_privy_jobs, Address, Chain, ChainError, ContractCall, DecryptionSignature, Deployments, Handle,
    HandleContractPair, SignedTransaction, Transaction, UserDecryptRequest, DEFAULT_CHAIN_ID,
};

struct Account {
    key: KeyPair,
    address: Address,
}

impl Account {
    fn new(tag: u8) -> Self {
        let key = KeyPair::from_seed(Seed::new([tag; 32]));
        let address = Address::from_public_key(&key.pk[..]);
        Self { key, address }
    }
}

struct Fixture {
    chain: Chain,
    contract: Address,
}

fn deploy_job_fixture() -> Fixture {
    let owner = Account::new(1);
    let mut chain = Chain::new(DEFAULT_CHAIN_ID);
    let mut deployments = Deployments::default();
    let contract = deploy_fhe_privy_jobs(&mut chain, owner.address, &mut deployments).address;
    Fixture { chain, contract }
}

impl Fixture {
    fn submit(&mut self, who: &Account, job_id: u32) -> Result<(), ChainError> {
        let input = self.chain.coprocessor().create_encrypted_input(self.contract, who.address).add32(job_id);
        let encrypted = self.chain.coprocessor_mut().encrypt(input)?;
        let payload = Transaction {
            from: who.address,
            to: self.contract,
            nonce: self.chain.nonce(who.address),
            gas_limit: 400_000,
            call: ContractCall::SubmitEncryptedJob {
                handle: encrypted.handles[0],
                proof: encrypted.input_proof,
            },
        };
        let tx = SignedTransaction::sign(payload, &who.key)?;
        self.chain.execute(tx)?.into_result().map(|_| ())
    }

    fn stored(&self, user: Address) -> Handle {
        self.chain.contract(self.contract).unwrap().get_encrypted_job(user)
    }

    fn is_submitted(&self, user: Address) -> bool {
        self.chain.contract(self.contract).unwrap().is_job_submitted(user)
    }

    fn user_decrypt(&self, handle: Handle, who: &Account) -> Result<u128, ChainError> {
        let now = self.chain.timestamp();
        let signature = DecryptionSignature::sign(&who.key, vec![self.contract], now.saturating_sub(600), 1);
        let request = UserDecryptRequest {
            pairs: vec![HandleContractPair { handle, contract: self.contract }],
            signature,
        };
        Ok(self.chain.user_decrypt(&request)?[&handle])
    }
}

#[test]
fn allows_a_user_to_submit_and_decrypt_a_job_id() {
    let mut f = deploy_job_fixture();
    let alice = Account::new(2);
    f.submit(&alice, 42).unwrap();

    assert!(f.is_submitted(alice.address));
    let stored = f.stored(alice.address);
    assert_eq!(f.user_decrypt(stored, &alice).unwrap(), 42);
}

#[test]
fn rejects_multiple_submissions_from_the_same_wallet() {
    let mut f = deploy_job_fixture();
    let alice = Account::new(2);
    f.submit(&alice, 101).unwrap();
    let first = f.stored(alice.address);

    let err = f.submit(&alice, 102).unwrap_err();
    assert_eq!(err.to_string(), "execution reverted: Job ID already submitted");
    assert_eq!(f.stored(alice.address), first);
    assert_eq!(f.user_decrypt(first, &alice).unwrap(), 101);
}

#[test]
fn permits_multiple_users_to_register_distinct_job_ids_independently() {
    let mut f = deploy_job_fixture();
    let (alice, bob) = (Account::new(2), Account::new(3));
    f.submit(&alice, 7).unwrap();
    f.submit(&bob, 9).unwrap();

    let alice_stored = f.stored(alice.address);
    let bob_stored = f.stored(bob.address);
    assert_eq!(f.user_decrypt(alice_stored, &alice).unwrap(), 7);
    assert_eq!(f.user_decrypt(bob_stored, &bob).unwrap(), 9);
}

#[test]
fn generates_unique_ciphertexts_for_identical_job_ids_from_different_wallets() {
    let mut f = deploy_job_fixture();
    let (alice, bob) = (Account::new(2), Account::new(3));
    f.submit(&alice, 55).unwrap();
    f.submit(&bob, 55).unwrap();

    assert_ne!(f.stored(alice.address), f.stored(bob.address));
}

#[test]
fn returns_false_for_addresses_without_submission() {
    let f = deploy_job_fixture();
    assert!(!f.is_submitted(Account::new(3).address));
    assert!(f.stored(Account::new(2).address).is_zero());
}

#[test]
fn other_wallets_cannot_decrypt_a_stored_job() {
    let mut f = deploy_job_fixture();
    let (alice, bob) = (Account::new(2), Account::new(3));
    f.submit(&alice, 13).unwrap();

    let stored = f.stored(alice.address);
    let err = f.user_decrypt(stored, &bob).unwrap_err();
    assert!(matches!(err, ChainError::Fhevm(_)), "unexpected error: {err}");
}

#[test]
fn submission_status_is_permanent() {
    let mut f = deploy_job_fixture();
    let alice = Account::new(2);
    assert!(!f.is_submitted(alice.address));
    f.submit(&alice, 3).unwrap();
    for value in [4, 5, 6] {
        assert!(f.submit(&alice, value).is_err());
        assert!(f.is_submitted(alice.address));
    }
}
