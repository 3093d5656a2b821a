//! The layout of keys in the durable release cache
//!
//! Other tooling (source verification, name registration) reads these keys
//! directly, so the layout must not change between releases.

use crate::constants::{
    ADDRESS_SUFFIX, CONSTRUCTOR_ARGS_SUFFIX, DEPLOY_INTENT_SUFFIX, DEPLOY_TX_SUFFIX,
    FIELD_SEPARATOR, IMPL_SEGMENT, INIT_ARGS_SUFFIX, PREPARED_UPGRADE_SUFFIX, UPGRADE_SEGMENT,
    VERSION_SUFFIX,
};

/// The cache keys tracking a single deployment transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxSlot {
    /// The key holding the write-ahead marker set before broadcasting
    pub intent_key: String,
    /// The key holding the hash of the submitted transaction
    pub tx_key: String,
    /// The key holding the confirmed contract address
    pub address_key: String,
}

/// The cache keys belonging to one logical contract
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractKeys {
    /// The kebab-case form of the contract's logical name
    kebab: String,
}

impl ContractKeys {
    /// Derive the keys for the contract with the given logical name
    pub fn new(name: &str) -> Self {
        Self { kebab: kebab_case(name) }
    }

    /// The kebab-case prefix shared by all of this contract's keys
    pub fn prefix(&self) -> &str {
        &self.kebab
    }

    /// The slot for the contract itself (the proxy, for upgradeable contracts)
    pub fn main_slot(&self) -> TxSlot {
        TxSlot {
            intent_key: format!("{}-{DEPLOY_INTENT_SUFFIX}", self.kebab),
            tx_key: format!("{}-{DEPLOY_TX_SUFFIX}", self.kebab),
            address_key: self.field(ADDRESS_SUFFIX),
        }
    }

    /// The slot for the implementation behind a freshly deployed proxy
    pub fn impl_slot(&self) -> TxSlot {
        self.nested_slot(IMPL_SEGMENT, &[IMPL_SEGMENT])
    }

    /// The slot for an implementation prepared for a later upgrade
    pub fn upgrade_slot(&self) -> TxSlot {
        self.nested_slot(UPGRADE_SEGMENT, &[UPGRADE_SEGMENT, IMPL_SEGMENT])
    }

    /// The key holding the version reported by the deployed contract
    pub fn version(&self) -> String {
        self.field(VERSION_SUFFIX)
    }

    /// The key holding the resolved constructor arguments
    pub fn constructor_args(&self) -> String {
        self.field(CONSTRUCTOR_ARGS_SUFFIX)
    }

    /// The key holding the resolved initializer arguments
    pub fn init_args(&self) -> String {
        self.field(INIT_ARGS_SUFFIX)
    }

    /// The key holding the resolved constructor arguments of an upgrade implementation
    pub fn upgrade_constructor_args(&self) -> String {
        format!(
            "{}{FIELD_SEPARATOR}{UPGRADE_SEGMENT}{FIELD_SEPARATOR}{CONSTRUCTOR_ARGS_SUFFIX}",
            self.kebab
        )
    }

    /// The key holding the prepared upgrade record
    pub fn prepared_upgrade(&self) -> String {
        self.field(PREPARED_UPGRADE_SUFFIX)
    }

    /// `<kebab>.<suffix>`
    fn field(&self, suffix: &str) -> String {
        format!("{}{FIELD_SEPARATOR}{suffix}", self.kebab)
    }

    /// A slot whose transaction keys are tagged with `tx_tag` and whose address
    /// key is nested under the given segments
    fn nested_slot(&self, tx_tag: &str, address_segments: &[&str]) -> TxSlot {
        let mut address_key = self.kebab.clone();
        for segment in address_segments {
            address_key.push(FIELD_SEPARATOR);
            address_key.push_str(segment);
        }
        address_key.push(FIELD_SEPARATOR);
        address_key.push_str(ADDRESS_SUFFIX);

        TxSlot {
            intent_key: format!("{}-{tx_tag}-{DEPLOY_INTENT_SUFFIX}", self.kebab),
            tx_key: format!("{}-{tx_tag}-{DEPLOY_TX_SUFFIX}", self.kebab),
            address_key,
        }
    }
}

/// Convert a logical contract name into its kebab-case cache prefix,
/// e.g. `StakingRegistry` -> `staking-registry`, `ERC20Token` -> `erc20-token`
pub fn kebab_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == ' ' || c == '-' {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            continue;
        }

        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let boundary = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower);
            if boundary && !out.ends_with('-') {
                out.push('-');
            }
        }

        out.push(c.to_ascii_lowercase());
    }

    out
}
