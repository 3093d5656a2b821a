//! Resolution of symbolic parameters against a manifest
//!
//! Resolution is pure apart from manifest lookups: the same manifest and
//! parameters always resolve to the same values, which is what allows a release
//! to be re-run after a crash.

use alloy_primitives::{keccak256, B256};
use release_common::constants::{DEFAULT_ADMIN_ROLE_NAMES, ROLE_SUFFIX};
use serde_json::Value;

use crate::{
    errors::ReleaseError,
    manifest::Manifest,
    params::{Identity, Param, ResolvedParam},
};

/// Resolve a list of classified parameters
pub fn resolve(params: &[Param], manifest: &Manifest) -> Result<Vec<ResolvedParam>, ReleaseError> {
    params.iter().map(|p| resolve_param(p, manifest)).collect()
}

/// Classify and resolve a list of raw JSON parameters
pub fn resolve_raw(raw: &[Value], manifest: &Manifest) -> Result<Vec<ResolvedParam>, ReleaseError> {
    resolve(&Param::parse_all(raw)?, manifest)
}

/// Resolve a single classified parameter
fn resolve_param(param: &Param, manifest: &Manifest) -> Result<ResolvedParam, ReleaseError> {
    match param {
        Param::Literal(s) => Ok(ResolvedParam::String(s.clone())),
        Param::Bool(b) => Ok(ResolvedParam::Bool(*b)),
        Param::DeploymentRef(name) => manifest
            .address_of(name)
            .map(ResolvedParam::Address)
            .ok_or_else(|| {
                ReleaseError::UnresolvedReference(format!("no deployment named {name}"))
            }),
        Param::RoleRef(role) => resolve_role(role, manifest).map(ResolvedParam::Role),
        Param::IdentityRef(identity) => {
            let address = match identity {
                Identity::Relayer => manifest.relayer,
                Identity::Multisig => manifest.multisig,
            };
            address
                .map(ResolvedParam::Address)
                .ok_or_else(|| ReleaseError::MissingIdentity(identity.as_str().to_string()))
        }
        Param::List(items) => resolve(items, manifest).map(ResolvedParam::List),
    }
}

/// Compute a role identifier and check it against the manifest's expectation
///
/// The manifest may record the role under the name as written or under its
/// canonical `_ROLE`-suffixed name.
fn resolve_role(role: &str, manifest: &Manifest) -> Result<B256, ReleaseError> {
    let computed = role_id(role);
    let canonical = role_name(role);
    let expected = manifest.roles.get(role).or_else(|| manifest.roles.get(&canonical));

    match expected {
        Some(expected) if *expected != computed => Err(ReleaseError::RoleMismatch {
            role: canonical,
            expected: *expected,
            computed,
        }),
        _ => Ok(computed),
    }
}

/// The canonical name of an access-control role: `MINTER` and `MINTER_ROLE`
/// both name `MINTER_ROLE`
pub fn role_name(role: &str) -> String {
    if role.ends_with(ROLE_SUFFIX) {
        role.to_string()
    } else {
        format!("{role}{ROLE_SUFFIX}")
    }
}

/// The identifier of an access-control role
///
/// The default admin role is all zeros; every other role is the keccak256 hash
/// of its canonical name.
pub fn role_id(role: &str) -> B256 {
    if DEFAULT_ADMIN_ROLE_NAMES.contains(&role) {
        B256::ZERO
    } else {
        keccak256(role_name(role).as_bytes())
    }
}
