//! Constants shared by the release tooling

/// The default number of transactions allowed in flight at once
pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;

/// The default upper bound on waiting for a deployment to confirm, in seconds
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 20 * 60;

/// The default interval between receipt polls, in milliseconds
pub const DEFAULT_RECEIPT_POLL_INTERVAL_MS: u64 = 2_000;

/// The version recorded for contracts that do not expose a `version()` accessor
pub const VERSION_SENTINEL: &str = "0.0.0";

/// The prefix of a parameter referencing a deployed contract by name
pub const DEPLOYMENT_REF_PREFIX: &str = "deployment.";

/// The prefix of a parameter referencing an access-control role by name
pub const ROLE_REF_PREFIX: &str = "roles.";

/// The parameter resolving to the relayer identity
pub const RELAYER_IDENTITY: &str = "relayer";

/// The parameter resolving to the multisig identity
pub const MULTISIG_IDENTITY: &str = "multisig";

/// Role names resolving to the all-zero default admin role identifier
pub const DEFAULT_ADMIN_ROLE_NAMES: [&str; 2] = ["DEFAULT_ADMIN", "DEFAULT_ADMIN_ROLE"];

/// The suffix of canonical access-control role names
pub const ROLE_SUFFIX: &str = "_ROLE";

/// The initializer invoked through the proxy constructor when none is configured
pub const DEFAULT_INITIALIZER: &str = "initialize";

/// The artifact name of the proxy deployed in front of upgradeable contracts
pub const DEFAULT_PROXY_ARTIFACT: &str = "ERC1967Proxy";

/// The key separator between a contract's kebab-case name and a field
pub const FIELD_SEPARATOR: char = '.';

/// The suffix of the key holding a contract's address
pub const ADDRESS_SUFFIX: &str = "address";

/// The suffix of the key holding a contract's pending deployment transaction
pub const DEPLOY_TX_SUFFIX: &str = "deploy-tx";

/// The suffix of the key holding a contract's write-ahead broadcast marker
pub const DEPLOY_INTENT_SUFFIX: &str = "deploy-intent";

/// The key segment for a proxy's live implementation
pub const IMPL_SEGMENT: &str = "impl";

/// The key segment for an implementation prepared for a pending upgrade
pub const UPGRADE_SEGMENT: &str = "upgrade";

/// The suffix of the key holding a contract's reported version
pub const VERSION_SUFFIX: &str = "version";

/// The suffix of the key holding a contract's resolved constructor arguments
pub const CONSTRUCTOR_ARGS_SUFFIX: &str = "constructor-args";

/// The suffix of the key holding a proxy's resolved initializer arguments
pub const INIT_ARGS_SUFFIX: &str = "init-args";

/// The suffix of the key holding a prepared upgrade record
pub const PREPARED_UPGRADE_SUFFIX: &str = "prepared-upgrade";
