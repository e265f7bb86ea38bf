//! JSON ABI description, in the shape Solidity tooling emits it.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiParam {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(rename = "internalType")]
    pub internal_type: String,
}

impl AbiParam {
    pub fn new(name: &str, ty: &str, internal_type: &str) -> Self {
        Self { name: name.to_string(), ty: ty.to_string(), internal_type: internal_type.to_string() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub outputs: Vec<AbiParam>,
    #[serde(rename = "stateMutability", default)]
    pub state_mutability: String,
}

impl AbiEntry {
    pub fn function(name: &str, inputs: Vec<AbiParam>, outputs: Vec<AbiParam>, state_mutability: &str) -> Self {
        Self {
            kind: "function".to_string(),
            name: name.to_string(),
            inputs,
            outputs,
            state_mutability: state_mutability.to_string(),
        }
    }

    pub fn is_function(&self) -> bool {
        self.kind == "function"
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Abi(pub Vec<AbiEntry>);

impl Abi {
    pub fn function(&self, name: &str) -> Option<&AbiEntry> {
        self.0.iter().find(|entry| entry.is_function() && entry.name == name)
    }
}

/// A decoded argument or return value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbiValue {
    Address(crate::types::Address),
    Bytes32(crate::types::Handle),
    Bytes(Vec<u8>),
    Bool(bool),
}

impl AbiValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            AbiValue::Address(_) => "address",
            AbiValue::Bytes32(_) => "bytes32",
            AbiValue::Bytes(_) => "bytes",
            AbiValue::Bool(_) => "bool",
        }
    }
}
