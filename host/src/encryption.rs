//! Client-side encryption adapter.
//!
//! Picks the encryption width from the ABI of the target function and turns
//! an [`EncryptedInput`] back into call arguments. Ciphertext only ever comes
//! from the [`FhevmInstance`]; a failed encryption yields `None`.

use std::sync::Arc;

use privy_jobs_contract::{Abi, AbiValue, Address, EncryptedInput, FheType, InputBuilder};
use tracing::warn;

use crate::error::EncryptionError;
use crate::provider::FhevmInstance;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncryptionMethod {
    AddBool,
    Add8,
    Add16,
    Add32,
    Add64,
    Add128,
}

impl EncryptionMethod {
    pub fn from_internal_type(internal_type: &str) -> Option<Self> {
        match internal_type {
            "externalEbool" => Some(Self::AddBool),
            "externalEuint8" => Some(Self::Add8),
            "externalEuint16" => Some(Self::Add16),
            "externalEuint32" => Some(Self::Add32),
            "externalEuint64" => Some(Self::Add64),
            "externalEuint128" => Some(Self::Add128),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::AddBool => "addBool",
            Self::Add8 => "add8",
            Self::Add16 => "add16",
            Self::Add32 => "add32",
            Self::Add64 => "add64",
            Self::Add128 => "add128",
        }
    }

    pub fn fhe_type(self) -> FheType {
        match self {
            Self::AddBool => FheType::Bool,
            Self::Add8 => FheType::Uint8,
            Self::Add16 => FheType::Uint16,
            Self::Add32 => FheType::Uint32,
            Self::Add64 => FheType::Uint64,
            Self::Add128 => FheType::Uint128,
        }
    }

    /// Appends `value` to `builder`, refusing values wider than the method.
    pub fn apply(self, builder: InputBuilder, value: u128) -> Result<InputBuilder, EncryptionError> {
        let fhe_type = self.fhe_type();
        if !fhe_type.fits(value) {
            return Err(EncryptionError::Overflow { value, method: self.name() });
        }
        Ok(builder.add(fhe_type, value))
    }
}

/// Resolves the method from the first `bytes32` input of `function`.
pub fn detect_encryption_method(abi: Option<&Abi>, function: &str) -> Result<EncryptionMethod, EncryptionError> {
    let entry = abi.and_then(|abi| abi.function(function)).ok_or(EncryptionError::MissingAbiEntry)?;
    entry
        .inputs
        .iter()
        .find(|param| param.ty == "bytes32")
        .and_then(|param| EncryptionMethod::from_internal_type(&param.internal_type))
        .ok_or(EncryptionError::MethodMissing)
}

/// Orders the handles and proof of `encrypted` as `function` expects them.
pub fn build_params_from_abi(
    encrypted: &EncryptedInput,
    abi: &Abi,
    function: &str,
) -> Result<Vec<AbiValue>, EncryptionError> {
    let entry = abi.function(function).ok_or(EncryptionError::MissingAbiEntry)?;
    let mut handles = encrypted.handles.iter();
    entry
        .inputs
        .iter()
        .map(|param| match param.ty.as_str() {
            "bytes32" => handles
                .next()
                .map(|handle| AbiValue::Bytes32(*handle))
                .ok_or_else(|| EncryptionError::MissingHandle(function.to_string())),
            "bytes" => Ok(AbiValue::Bytes(encrypted.input_proof.0.clone())),
            other => Err(EncryptionError::UnsupportedParam { name: param.name.clone(), ty: other.to_string() }),
        })
        .collect()
}

/// Encrypts single values for one contract/account pair.
#[derive(Clone)]
pub struct EncryptionAdapter {
    instance: Arc<dyn FhevmInstance>,
    contract: Address,
    user: Address,
}

impl EncryptionAdapter {
    pub fn new(instance: Arc<dyn FhevmInstance>, contract: Address, user: Address) -> Self {
        Self { instance, contract, user }
    }

    pub async fn encrypt_with(&self, method: EncryptionMethod, value: u128) -> Option<EncryptedInput> {
        let builder = match method.apply(InputBuilder::new(self.contract, self.user), value) {
            Ok(builder) => builder,
            Err(e) => {
                warn!(error = %e, "refusing to encrypt");
                return None;
            }
        };
        match self.instance.encrypt(builder).await {
            Ok(encrypted) if !encrypted.handles.is_empty() => Some(encrypted),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "encryption failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use privy_jobs_contract::{AbiEntry, AbiParam, FhePrivyJobs, Handle, InputProof};

    #[test]
    fn detects_width_from_internal_type() {
        let abi = FhePrivyJobs::abi();
        assert_eq!(detect_encryption_method(Some(&abi), "submitEncryptedJob"), Ok(EncryptionMethod::Add32));
    }

    #[test]
    fn missing_entry_and_unknown_type() {
        let abi = FhePrivyJobs::abi();
        let err = detect_encryption_method(Some(&abi), "submitEncryptedSalary").unwrap_err();
        assert_eq!(err.to_string(), "Missing ABI entry");
        assert_eq!(detect_encryption_method(None, "submitEncryptedJob"), Err(EncryptionError::MissingAbiEntry));

        let abi = Abi(vec![AbiEntry::function(
            "submitEncryptedJob",
            vec![AbiParam::new("who", "bytes32", "externalEaddress")],
            vec![],
            "nonpayable",
        )]);
        let err = detect_encryption_method(Some(&abi), "submitEncryptedJob").unwrap_err();
        assert_eq!(err.to_string(), "Encryption method missing");
    }

    #[test]
    fn params_follow_abi_order() {
        let handle = Handle::from([7u8; 32]);
        let encrypted = EncryptedInput { handles: vec![handle], input_proof: InputProof(vec![1, 2, 3]) };
        let params = build_params_from_abi(&encrypted, &FhePrivyJobs::abi(), "submitEncryptedJob").unwrap();
        assert_eq!(params, vec![AbiValue::Bytes32(handle), AbiValue::Bytes(vec![1, 2, 3])]);

        let empty = EncryptedInput { handles: vec![], input_proof: InputProof(vec![]) };
        let err = build_params_from_abi(&empty, &FhePrivyJobs::abi(), "submitEncryptedJob").unwrap_err();
        assert!(matches!(err, EncryptionError::MissingHandle(_)));
    }

    #[test]
    fn apply_rejects_oversized_values() {
        let builder = InputBuilder::new(Address::ZERO, Address::ZERO);
        let err = EncryptionMethod::Add8.apply(builder.clone(), 256).unwrap_err();
        assert_eq!(err, EncryptionError::Overflow { value: 256, method: "add8" });
        assert!(EncryptionMethod::Add32.apply(builder, u32::MAX as u128).is_ok());
    }
}
