//! Symbolic and literal parameters of constructors, initializers, and admin actions
//!
//! Raw JSON parameters are classified once, when a release configuration is
//! loaded, so the rest of the pipeline never re-parses string prefixes.

use std::collections::BTreeSet;

use alloy_primitives::{Address, B256};
use release_common::constants::{
    DEPLOYMENT_REF_PREFIX, MULTISIG_IDENTITY, RELAYER_IDENTITY, ROLE_REF_PREFIX,
};
use serde_json::Value;

use crate::errors::ReleaseError;

/// A singleton identity recorded in the manifest
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Identity {
    /// The relayer account
    Relayer,
    /// The governance multisig
    Multisig,
}

impl Identity {
    /// The parameter spelling of the identity
    pub fn as_str(&self) -> &'static str {
        match self {
            Identity::Relayer => RELAYER_IDENTITY,
            Identity::Multisig => MULTISIG_IDENTITY,
        }
    }
}

/// A classified parameter
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Param {
    /// A literal string, passed through unchanged
    Literal(String),
    /// A literal boolean
    Bool(bool),
    /// `deployment.<name>`: the address of a deployed contract
    DeploymentRef(String),
    /// `roles.<ROLE>`: a hash-derived role identifier
    RoleRef(String),
    /// `relayer` or `multisig`
    IdentityRef(Identity),
    /// An array or tuple argument
    List(Vec<Param>),
}

impl Param {
    /// Classify a raw JSON parameter
    ///
    /// Numbers are rejected: a literal integer is indistinguishable from a
    /// mistyped address, so numeric values must be passed pre-stringified.
    pub fn parse(raw: &Value) -> Result<Self, ReleaseError> {
        match raw {
            Value::Null => Err(ReleaseError::Schema(
                "undefined parameter; no implicit defaults".to_string(),
            )),
            Value::Number(n) => Err(ReleaseError::Schema(format!(
                "numeric literal {n} must be passed as a string"
            ))),
            Value::Bool(b) => Ok(Param::Bool(*b)),
            Value::String(s) => Ok(Self::parse_str(s)),
            Value::Array(items) => items
                .iter()
                .map(Param::parse)
                .collect::<Result<Vec<_>, _>>()
                .map(Param::List),
            Value::Object(_) => Err(ReleaseError::Schema(format!(
                "unsupported parameter {raw}; use an array for tuple arguments"
            ))),
        }
    }

    /// Classify a list of raw JSON parameters
    pub fn parse_all(raw: &[Value]) -> Result<Vec<Self>, ReleaseError> {
        raw.iter().map(Param::parse).collect()
    }

    /// Classify a string parameter by its prefix
    fn parse_str(s: &str) -> Self {
        if let Some(name) = s.strip_prefix(DEPLOYMENT_REF_PREFIX) {
            Param::DeploymentRef(name.to_string())
        } else if let Some(role) = s.strip_prefix(ROLE_REF_PREFIX) {
            Param::RoleRef(role.to_string())
        } else if s == RELAYER_IDENTITY {
            Param::IdentityRef(Identity::Relayer)
        } else if s == MULTISIG_IDENTITY {
            Param::IdentityRef(Identity::Multisig)
        } else {
            Param::Literal(s.to_string())
        }
    }

    /// Collect the names of all deployments this parameter references
    pub fn collect_deployment_refs(&self, out: &mut BTreeSet<String>) {
        match self {
            Param::DeploymentRef(name) => {
                out.insert(name.clone());
            }
            Param::List(items) => items.iter().for_each(|p| p.collect_deployment_refs(out)),
            _ => {}
        }
    }
}

/// A parameter with all symbolic references replaced by concrete values
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedParam {
    /// A literal string
    String(String),
    /// A literal boolean
    Bool(bool),
    /// A resolved contract or identity address
    Address(Address),
    /// A resolved role identifier
    Role(B256),
    /// A resolved array or tuple argument
    List(Vec<ResolvedParam>),
}

impl ResolvedParam {
    /// The JSON form recorded in the cache and manifest, and sent to the relay
    pub fn to_json(&self) -> Value {
        match self {
            ResolvedParam::String(s) => Value::String(s.clone()),
            ResolvedParam::Bool(b) => Value::Bool(*b),
            ResolvedParam::Address(a) => Value::String(a.to_string()),
            ResolvedParam::Role(r) => Value::String(r.to_string()),
            ResolvedParam::List(items) => {
                Value::Array(items.iter().map(ResolvedParam::to_json).collect())
            }
        }
    }
}

/// The JSON form of a list of resolved parameters
pub fn to_json_list(params: &[ResolvedParam]) -> Vec<Value> {
    params.iter().map(ResolvedParam::to_json).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Identity, Param};
    use crate::errors::ReleaseError;

    #[test]
    fn test_classification() {
        let params = Param::parse_all(&[
            json!("deployment.Token"),
            json!("roles.MINTER_ROLE"),
            json!("relayer"),
            json!("multisig"),
            json!("1000"),
            json!(true),
            json!(["deployment.Token", "5"]),
        ])
        .unwrap();

        assert_eq!(
            params,
            vec![
                Param::DeploymentRef("Token".to_string()),
                Param::RoleRef("MINTER_ROLE".to_string()),
                Param::IdentityRef(Identity::Relayer),
                Param::IdentityRef(Identity::Multisig),
                Param::Literal("1000".to_string()),
                Param::Bool(true),
                Param::List(vec![
                    Param::DeploymentRef("Token".to_string()),
                    Param::Literal("5".to_string()),
                ]),
            ]
        );
    }

    #[test]
    fn test_numbers_and_nulls_rejected() {
        assert!(matches!(
            Param::parse(&json!(42)),
            Err(ReleaseError::Schema(_))
        ));
        assert!(matches!(
            Param::parse(&json!(null)),
            Err(ReleaseError::Schema(_))
        ));
        assert!(matches!(
            Param::parse(&json!(["0x01", 7])),
            Err(ReleaseError::Schema(_))
        ));
    }
}
