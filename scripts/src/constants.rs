//! Constants used in the release scripts

/// The extension of files staged before being renamed into place
pub const TMP_FILE_EXTENSION: &str = "tmp";

/// The extension of release configuration, manifest, cache, and artifact files
pub const JSON_EXTENSION: &str = "json";

/// The default directory holding release configurations
pub const DEFAULT_RELEASES_DIR: &str = "releases";

/// The default directory holding the durable release caches
pub const DEFAULT_CACHE_DIR: &str = "cache";

/// The default directory holding the per-network manifests
pub const DEFAULT_MANIFEST_DIR: &str = "deployments";

/// The default directory holding contract compilation artifacts
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

/// The default directory proposals are written to when no relay is configured
pub const DEFAULT_PROPOSALS_DIR: &str = "proposals";

/// The default RPC URL
pub const DEFAULT_RPC_URL: &str = "http://localhost:8545";

/// The kind of account that executes proposals
pub const PROPOSAL_VIA_TYPE: &str = "Safe";

/// The header carrying the relay API key
pub const RELAY_API_KEY_HEADER: &str = "x-api-key";

/// The field of a relay response holding the proposal URL
pub const RELAY_URL_FIELD: &str = "url";

/// The key of the ABI in a compilation artifact
pub const ARTIFACT_ABI_KEY: &str = "abi";

/// The key of the creation bytecode in a compilation artifact
pub const ARTIFACT_BYTECODE_KEY: &str = "bytecode";

/// The name of the batching entry point used by the multicall fallback
pub const MULTICALL_METHOD: &str = "multicall";

/// The Solidity type prefix of structured parameters
pub const TUPLE_TYPE_PREFIX: &str = "tuple";
