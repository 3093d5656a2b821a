//! Shared fixtures: an in-memory chain, test artifacts, and release contexts

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use alloy::dyn_abi::DynSolValue;
use alloy_primitives::{Address, Bytes, TxHash, B256};
use async_trait::async_trait;
use eyre::Result;
use release_scripts::{
    artifacts::{Artifact, ArtifactStore},
    cache::{Cache, Entries, MemoryStore},
    chain::{ChainClient, DeploymentReceipt},
    context::ReleaseContext,
    errors::ReleaseError,
    manifest::{Manifest, ManifestHandle},
    types::ExecutionSettings,
};
use serde_json::{json, Value};

/// The network the tests deploy to
pub const NETWORK: &str = "testnet";
/// The release the tests deploy
pub const RELEASE: &str = "v1";

// --------------
// | Mock Chain |
// --------------

/// The mutable state of the mock chain
#[derive(Default)]
struct ChainState {
    /// Receipts available for lookup
    receipts: HashMap<TxHash, DeploymentReceipt>,
    /// The `(bytecode, args)` of every submission, in order
    submitted: Vec<(Bytes, Bytes)>,
    /// The version reported by each contract
    versions: HashMap<Address, String>,
    /// Receipts of submissions are withheld while set
    withhold_receipts: bool,
    /// Receipts withheld so far
    withheld: HashMap<TxHash, DeploymentReceipt>,
}

/// An in-memory chain assigning deterministic hashes and addresses: the n-th
/// submission has hash `0x..n` and creates the contract at `0x..n`
#[derive(Default)]
pub struct MockChain {
    /// The chain state
    state: Mutex<ChainState>,
    /// The number of deployments submitted
    pub submissions: AtomicUsize,
    /// The number of receipt lookups
    pub receipt_queries: AtomicUsize,
    /// The number of read-only calls
    pub view_calls: AtomicUsize,
}

impl MockChain {
    /// The hash of the n-th submission
    pub fn tx_hash(n: u8) -> TxHash {
        B256::with_last_byte(n)
    }

    /// The address created by the n-th submission
    pub fn address(n: u8) -> Address {
        Address::with_last_byte(n)
    }

    /// Total number of chain calls made
    pub fn calls(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
            + self.receipt_queries.load(Ordering::SeqCst)
            + self.view_calls.load(Ordering::SeqCst)
    }

    /// The `(bytecode, args)` of every submission so far
    pub fn submitted(&self) -> Vec<(Bytes, Bytes)> {
        self.state.lock().unwrap().submitted.clone()
    }

    /// Make `address` report `version`
    pub fn set_version(&self, address: Address, version: &str) {
        self.state
            .lock()
            .unwrap()
            .versions
            .insert(address, version.to_string());
    }

    /// Record a mined deployment that was not submitted through this client
    pub fn mine_external(&self, tx_hash: TxHash, address: Address) {
        let receipt = DeploymentReceipt {
            tx_hash,
            contract_address: Some(address),
            success: true,
        };
        self.state.lock().unwrap().receipts.insert(tx_hash, receipt);
    }

    /// Record a reverted transaction that was not submitted through this client
    pub fn revert_external(&self, tx_hash: TxHash) {
        let receipt = DeploymentReceipt {
            tx_hash,
            contract_address: None,
            success: false,
        };
        self.state.lock().unwrap().receipts.insert(tx_hash, receipt);
    }

    /// Stop mining submissions until `release_receipts` is called
    pub fn withhold_receipts(&self) {
        self.state.lock().unwrap().withhold_receipts = true;
    }

    /// Mine every withheld submission
    pub fn release_receipts(&self) {
        let mut state = self.state.lock().unwrap();
        state.withhold_receipts = false;
        let withheld: Vec<_> = state.withheld.drain().collect();
        state.receipts.extend(withheld);
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn submit_deployment(&self, bytecode: Bytes, args: Bytes) -> Result<TxHash, ReleaseError> {
        let n = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        let n = u8::try_from(n).map_err(|e| ReleaseError::ChainInteraction(e.to_string()))?;
        let tx_hash = Self::tx_hash(n);
        let receipt = DeploymentReceipt {
            tx_hash,
            contract_address: Some(Self::address(n)),
            success: true,
        };

        let mut state = self.state.lock().unwrap();
        state.submitted.push((bytecode, args));
        if state.withhold_receipts {
            state.withheld.insert(tx_hash, receipt);
        } else {
            state.receipts.insert(tx_hash, receipt);
        }

        Ok(tx_hash)
    }

    async fn get_transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<DeploymentReceipt>, ReleaseError> {
        self.receipt_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().receipts.get(&tx_hash).copied())
    }

    async fn call_view(&self, address: Address, _calldata: Bytes) -> Result<Bytes, ReleaseError> {
        self.view_calls.fetch_add(1, Ordering::SeqCst);
        match self.state.lock().unwrap().versions.get(&address) {
            Some(version) => Ok(DynSolValue::Tuple(vec![DynSolValue::String(version.clone())])
                .abi_encode_params()
                .into()),
            None => Err(ReleaseError::ChainInteraction("execution reverted".to_string())),
        }
    }
}

// -------------
// | Artifacts |
// -------------

/// An ABI parameter
fn param(name: &str, ty: &str) -> Value {
    json!({ "name": name, "type": ty, "internalType": ty })
}

/// An ABI function entry
fn function(name: &str, inputs: Vec<Value>) -> Value {
    json!({
        "type": "function",
        "name": name,
        "inputs": inputs,
        "outputs": [],
        "stateMutability": "nonpayable"
    })
}

/// An ABI constructor entry
fn constructor(inputs: Vec<Value>) -> Value {
    json!({ "type": "constructor", "inputs": inputs, "stateMutability": "nonpayable" })
}

/// The `(address target, uint256 value)` struct parameter of `setConfig`
fn config_param() -> Value {
    json!({
        "name": "config",
        "type": "tuple",
        "internalType": "struct Governed.Config",
        "components": [param("target", "address"), param("value", "uint256")]
    })
}

/// The `multicall(bytes[])` entry
fn multicall() -> Value {
    json!({
        "type": "function",
        "name": "multicall",
        "inputs": [param("data", "bytes[]")],
        "outputs": [param("results", "bytes[]")],
        "stateMutability": "nonpayable"
    })
}

/// Build an artifact from an ABI and bytecode
fn artifact(name: &str, abi: Vec<Value>, bytecode: &str) -> Artifact {
    Artifact::from_json(name, &json!({ "abi": abi, "bytecode": bytecode }))
        .expect("test artifact is well formed")
}

/// The bytecode of the `Token` artifact
pub const TOKEN_BYTECODE: &str = "0x600101";
/// The bytecode of the `Staking` artifact
pub const STAKING_BYTECODE: &str = "0x600202";
/// The bytecode of the proxy artifact
pub const PROXY_BYTECODE: &str = "0x600303";

/// The artifacts available to test releases
///
/// - `Token`: `constructor(address admin)`
/// - `Staking`, `StakingV2`: `initialize(address token)`, `upgradeTo(address)`
/// - `ERC1967Proxy`: `constructor(address implementation, bytes data)`
/// - `Governed`: `setConfig((address,uint256))`, `setFee(uint256)`,
///   `grantRole(bytes32,address)`, `multicall(bytes[])`
/// - `Ungoverned`: `setConfig((address,uint256))` without `multicall`
pub fn test_artifacts() -> ArtifactStore {
    let upgradeable = || {
        vec![
            function("initialize", vec![param("token", "address")]),
            function("upgradeTo", vec![param("newImplementation", "address")]),
        ]
    };

    ArtifactStore::in_memory([
        artifact("Token", vec![constructor(vec![param("admin", "address")])], TOKEN_BYTECODE),
        artifact("Staking", upgradeable(), STAKING_BYTECODE),
        artifact("StakingV2", upgradeable(), "0x600404"),
        artifact(
            "ERC1967Proxy",
            vec![constructor(vec![param("implementation", "address"), param("data", "bytes")])],
            PROXY_BYTECODE,
        ),
        artifact(
            "Governed",
            vec![
                function("setConfig", vec![config_param()]),
                function("setFee", vec![param("fee", "uint256")]),
                function("grantRole", vec![param("role", "bytes32"), param("account", "address")]),
                multicall(),
            ],
            "0x600505",
        ),
        artifact("Ungoverned", vec![function("setConfig", vec![config_param()])], "0x600606"),
    ])
}

// ------------
// | Contexts |
// ------------

/// The multisig of the test manifest
pub fn multisig() -> Address {
    Address::repeat_byte(0xaa)
}

/// The relayer of the test manifest
pub fn relayer() -> Address {
    Address::repeat_byte(0xbb)
}

/// A manifest with identities set and no deployments
pub fn test_manifest() -> Manifest {
    Manifest {
        relayer: Some(relayer()),
        multisig: Some(multisig()),
        ..Default::default()
    }
}

/// A release context over in-memory state, with its collaborators exposed
pub struct Harness {
    /// The mock chain
    pub chain: Arc<MockChain>,
    /// The cache's backing store
    pub store: Arc<MemoryStore>,
    /// The context under test
    pub ctx: Arc<ReleaseContext>,
}

/// Settings that poll quickly
pub fn fast_settings() -> ExecutionSettings {
    ExecutionSettings {
        confirmation_timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(1),
        ..Default::default()
    }
}

/// A harness with an empty cache
pub async fn harness(manifest: ManifestHandle) -> Result<Harness> {
    harness_with(manifest, Entries::new(), fast_settings()).await
}

/// A harness whose cache starts with the given entries
pub async fn harness_with(
    manifest: ManifestHandle,
    entries: Entries,
    settings: ExecutionSettings,
) -> Result<Harness> {
    let chain = Arc::new(MockChain::default());
    let store = Arc::new(MemoryStore::with_entries(entries));
    let cache = Cache::open(store.clone()).await?;

    let ctx = ReleaseContext::new(
        NETWORK,
        RELEASE,
        cache,
        manifest,
        chain.clone(),
        test_artifacts(),
    )
    .with_settings(settings);

    Ok(Harness {
        chain,
        store,
        ctx: Arc::new(ctx),
    })
}

/// A harness with an empty cache admitting at most `max_in_flight` transactions
pub async fn harness_with_gate(manifest: ManifestHandle, max_in_flight: usize) -> Result<Harness> {
    let chain = Arc::new(MockChain::default());
    let store = Arc::new(MemoryStore::default());
    let cache = Cache::open(store.clone()).await?;

    let ctx = ReleaseContext::new(
        NETWORK,
        RELEASE,
        cache,
        manifest,
        chain.clone(),
        test_artifacts(),
    )
    .with_settings(fast_settings())
    .with_max_in_flight(max_in_flight);

    Ok(Harness {
        chain,
        store,
        ctx: Arc::new(ctx),
    })
}

/// Build cache entries from `(key, value)` pairs
pub fn entries(pairs: &[(&str, Value)]) -> Entries {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
