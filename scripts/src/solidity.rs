//! Definitions of Solidity functions called during a release

#![allow(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

use alloy_sol_types::sol;

sol! {
    /// The conventional read-only version accessor
    function version() external view returns (string memory);

    /// The UUPS upgrade entry point on a proxy
    function upgradeTo(address newImplementation) external;

    /// The batching entry point used by the multicall fallback
    function multicall(bytes[] calldata data) external returns (bytes[] memory results);
}
