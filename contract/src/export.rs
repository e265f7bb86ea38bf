//! Encrypted inputs written to disk for offline inspection.
//!
//! An export is the bincode encoding of [`ExportedInput`], stored hex encoded
//! when the file ends in `.hex` and raw otherwise.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fhevm::{EncryptedInput, ProofContents};
use crate::error::FhevmError;
use crate::types::Address;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedInput {
    pub chain_id: u64,
    pub contract: Address,
    pub user: Address,
    pub encrypted: EncryptedInput,
}

impl ExportedInput {
    pub fn to_bytes(&self) -> Result<Vec<u8>, ExportError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ExportError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Writes hex when `path` ends in `.hex`, raw bytes otherwise.
    pub fn write(&self, path: &Path) -> Result<(), ExportError> {
        let bytes = self.to_bytes()?;
        if is_hex_path(path) {
            fs::write(path, hex::encode(bytes))?;
        } else {
            fs::write(path, bytes)?;
        }
        Ok(())
    }

    /// Reads a file written by [`ExportedInput::write`].
    pub fn read(path: &Path) -> Result<Self, ExportError> {
        let bytes = if is_hex_path(path) {
            hex::decode(fs::read_to_string(path)?.trim())?
        } else {
            fs::read(path)?
        };
        Self::from_bytes(&bytes)
    }

    /// Decodes the proof and checks it names the same contract and account
    /// as the export itself.
    pub fn proof_contents(&self) -> Result<ProofContents, FhevmError> {
        let contents = ProofContents::decode(&self.encrypted.input_proof)?;
        if contents.contract != self.contract || contents.user != self.user {
            return Err(FhevmError::WrongBinding);
        }
        if contents.handles != self.encrypted.handles {
            return Err(FhevmError::MalformedProof);
        }
        Ok(contents)
    }
}

fn is_hex_path(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("hex")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fhevm::Coprocessor;
    use tempfile::tempdir;

    fn export(coprocessor: &mut Coprocessor) -> ExportedInput {
        let contract = Address::from([1u8; 20]);
        let user = Address::from([2u8; 20]);
        let encrypted = coprocessor.encrypt(coprocessor.create_encrypted_input(contract, user).add32(3)).unwrap();
        ExportedInput { chain_id: coprocessor.chain_id(), contract, user, encrypted }
    }

    #[test]
    fn bin_and_hex_files_read_back() {
        let dir = tempdir().unwrap();
        let mut coprocessor = Coprocessor::new(31337);
        let exported = export(&mut coprocessor);

        for name in ["input.bin", "input.hex", "input.dat", "input"] {
            let path = dir.path().join(name);
            exported.write(&path).unwrap();
            assert_eq!(ExportedInput::read(&path).unwrap(), exported);
        }
        let hex_text = fs::read_to_string(dir.path().join("input.hex")).unwrap();
        assert!(hex_text.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fs::read(dir.path().join("input.dat")).unwrap(), exported.to_bytes().unwrap());
    }

    #[test]
    fn proof_binding_is_checked() {
        let mut coprocessor = Coprocessor::new(31337);
        let mut exported = export(&mut coprocessor);
        let contents = exported.proof_contents().unwrap();
        assert!(contents.verify_signature(&coprocessor.signer_public_key(), 31337).is_ok());

        exported.user = Address::from([9u8; 20]);
        assert_eq!(exported.proof_contents(), Err(FhevmError::WrongBinding));
    }
}
