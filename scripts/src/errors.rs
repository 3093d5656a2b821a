//! Definitions of errors that can occur while deploying, upgrading, and
//! proposing governance actions for a release

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    time::Duration,
};

use alloy_primitives::{TxHash, B256};

/// Errors that can occur during the execution of the release scripts
#[derive(Debug)]
pub enum ReleaseError {
    /// Malformed or missing required configuration
    Schema(String),
    /// A `deployment.<name>` reference could not be satisfied
    UnresolvedReference(String),
    /// A contract expected in the manifest is absent
    MissingManifestEntry(String),
    /// A computed role identifier differs from the one recorded in the manifest
    RoleMismatch {
        /// The role name
        role: String,
        /// The identifier recorded in the manifest
        expected: B256,
        /// The identifier computed from the role name
        computed: B256,
    },
    /// The relayer or multisig identity is not set in the manifest
    MissingIdentity(String),
    /// A recomputed value differs from the one previously recorded
    Consistency(String),
    /// A deployment transaction did not confirm in time
    ConfirmationTimeout {
        /// The hash of the unconfirmed transaction
        tx_hash: TxHash,
        /// How long confirmation was awaited
        waited: Duration,
    },
    /// A multicall-wrapped call was required but the target has no `multicall(bytes[])`
    UnsupportedMulticall(String),
    /// A configuration that must name at least one item is empty
    EmptyConfiguration(String),
    /// A previous run may have broadcast a transaction without recording its hash
    UnreconciledBroadcast(String),
    /// An upgrade named in the configuration has not been prepared
    MissingPreparedUpgrade(String),
    /// A method is missing from, or ambiguous in, a contract interface
    MissingMethod(String),
    /// Error ABI-encoding call or constructor data
    Encoding(String),
    /// Error parsing a compilation artifact
    ArtifactParsing(String),
    /// Error initializing the RPC client
    ClientInitialization(String),
    /// A deployment transaction reverted or created no contract
    ContractDeployment(String),
    /// Error interacting with the chain
    ChainInteraction(String),
    /// Error reading or writing a durable store, manifest, or configuration file
    Store(String),
    /// Error submitting a proposal to the relay service
    Relay(String),
    /// The operator declined a confirmation prompt
    Aborted(String),
    /// One or more items of a run failed
    RunFailed {
        /// The number of failed items
        failed: usize,
        /// The total number of items in the run
        total: usize,
    },
}

impl Display for ReleaseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseError::Schema(s) => write!(f, "schema error: {}", s),
            ReleaseError::UnresolvedReference(s) => write!(f, "unresolved reference: {}", s),
            ReleaseError::MissingManifestEntry(s) => write!(f, "missing manifest entry: {}", s),
            ReleaseError::RoleMismatch {
                role,
                expected,
                computed,
            } => write!(
                f,
                "role mismatch for {}: manifest records {}, computed {}",
                role, expected, computed
            ),
            ReleaseError::MissingIdentity(s) => write!(f, "missing identity: {}", s),
            ReleaseError::Consistency(s) => write!(f, "consistency check failed: {}", s),
            ReleaseError::ConfirmationTimeout { tx_hash, waited } => write!(
                f,
                "transaction {} not confirmed after {}s; re-run to resume",
                tx_hash,
                waited.as_secs()
            ),
            ReleaseError::UnsupportedMulticall(s) => write!(f, "unsupported multicall: {}", s),
            ReleaseError::EmptyConfiguration(s) => write!(f, "empty configuration: {}", s),
            ReleaseError::UnreconciledBroadcast(s) => write!(f, "unreconciled broadcast: {}", s),
            ReleaseError::MissingPreparedUpgrade(s) => write!(f, "upgrade not prepared: {}", s),
            ReleaseError::MissingMethod(s) => write!(f, "missing method: {}", s),
            ReleaseError::Encoding(s) => write!(f, "error encoding calldata: {}", s),
            ReleaseError::ArtifactParsing(s) => write!(f, "error parsing artifact: {}", s),
            ReleaseError::ClientInitialization(s) => write!(f, "error initializing client: {}", s),
            ReleaseError::ContractDeployment(s) => write!(f, "error deploying contract: {}", s),
            ReleaseError::ChainInteraction(s) => write!(f, "error interacting with chain: {}", s),
            ReleaseError::Store(s) => write!(f, "store error: {}", s),
            ReleaseError::Relay(s) => write!(f, "error submitting proposal: {}", s),
            ReleaseError::Aborted(s) => write!(f, "aborted: {}", s),
            ReleaseError::RunFailed { failed, total } => {
                write!(f, "{} of {} items failed", failed, total)
            }
        }
    }
}

impl Error for ReleaseError {}
