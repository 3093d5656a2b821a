//! Loading of contract compilation artifacts
//!
//! Artifacts are the JSON files emitted by Foundry or Hardhat, holding a
//! contract's ABI and creation bytecode.

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use alloy::json_abi::{Function, JsonAbi};
use alloy_primitives::Bytes;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{
    constants::{ARTIFACT_ABI_KEY, ARTIFACT_BYTECODE_KEY, JSON_EXTENSION},
    errors::ReleaseError,
    utils::read_json_file,
};

/// A parsed compilation artifact
#[derive(Clone, Debug)]
pub struct Artifact {
    /// The artifact name, usually the contract name
    pub name: String,
    /// The parsed ABI
    pub abi: JsonAbi,
    /// The ABI as it appears in the artifact, forwarded to the relay service
    pub raw_abi: Value,
    /// The creation bytecode
    pub bytecode: Bytes,
}

impl Artifact {
    /// Parse an artifact from its JSON contents
    pub fn from_json(name: &str, json: &Value) -> Result<Self, ReleaseError> {
        let raw_abi = json
            .get(ARTIFACT_ABI_KEY)
            .cloned()
            .ok_or_else(|| ReleaseError::ArtifactParsing(format!("{name}: missing abi")))?;
        let abi: JsonAbi = serde_json::from_value(raw_abi.clone())
            .map_err(|e| ReleaseError::ArtifactParsing(format!("{name}: {e}")))?;

        // Hardhat emits the bytecode as a string, Foundry as `{ "object": ... }`
        let bytecode_hex = match json.get(ARTIFACT_BYTECODE_KEY) {
            Some(Value::String(s)) => s.as_str(),
            Some(Value::Object(obj)) => obj
                .get("object")
                .and_then(Value::as_str)
                .ok_or_else(|| ReleaseError::ArtifactParsing(format!("{name}: missing bytecode")))?,
            _ => {
                return Err(ReleaseError::ArtifactParsing(format!(
                    "{name}: missing bytecode"
                )))
            }
        };
        let bytecode = hex::decode(bytecode_hex.trim_start_matches("0x"))
            .map_err(|e| ReleaseError::ArtifactParsing(format!("{name}: bytecode: {e}")))?;

        Ok(Self {
            name: name.to_string(),
            abi,
            raw_abi,
            bytecode: bytecode.into(),
        })
    }

    /// All overloads of the named function
    pub fn functions_named(&self, method: &str) -> &[Function] {
        self.abi
            .function(method)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The unique overload of `method` taking `arity` arguments
    pub fn function_for(&self, method: &str, arity: usize) -> Result<&Function, ReleaseError> {
        let overloads = self.functions_named(method);
        let mut candidates = overloads.iter().filter(|f| f.inputs.len() == arity);

        match (candidates.next(), candidates.next()) {
            (Some(function), None) => Ok(function),
            (None, _) if overloads.is_empty() => Err(ReleaseError::MissingMethod(format!(
                "{} has no method {method}",
                self.name
            ))),
            (None, _) => Err(ReleaseError::MissingMethod(format!(
                "{} has no overload of {method} taking {arity} arguments",
                self.name
            ))),
            (Some(_), Some(_)) => Err(ReleaseError::MissingMethod(format!(
                "{method} is ambiguous in {}: several overloads take {arity} arguments",
                self.name
            ))),
        }
    }
}

/// A lazily populated collection of artifacts
#[derive(Debug)]
pub struct ArtifactStore {
    /// The directory artifacts are read from, if any
    dir: Option<PathBuf>,
    /// Artifacts loaded so far, keyed by name
    loaded: Mutex<HashMap<String, Arc<Artifact>>>,
}

impl ArtifactStore {
    /// A store reading `<dir>/<Name>.json`
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir: Some(dir),
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// A store holding only the given artifacts
    pub fn in_memory(artifacts: impl IntoIterator<Item = Artifact>) -> Self {
        let loaded = artifacts
            .into_iter()
            .map(|artifact| (artifact.name.clone(), Arc::new(artifact)))
            .collect();

        Self {
            dir: None,
            loaded: Mutex::new(loaded),
        }
    }

    /// Load the named artifact
    pub async fn load(&self, name: &str) -> Result<Arc<Artifact>, ReleaseError> {
        let mut loaded = self.loaded.lock().await;
        if let Some(artifact) = loaded.get(name) {
            return Ok(artifact.clone());
        }

        let dir = self
            .dir
            .as_ref()
            .ok_or_else(|| ReleaseError::ArtifactParsing(format!("no artifact named {name}")))?;
        let path = dir.join(format!("{name}.{JSON_EXTENSION}"));
        let json: Value = read_json_file(&path).await?.ok_or_else(|| {
            ReleaseError::ArtifactParsing(format!("no artifact at {}", path.display()))
        })?;

        let artifact = Arc::new(Artifact::from_json(name, &json)?);
        loaded.insert(name.to_string(), artifact.clone());
        Ok(artifact)
    }
}
