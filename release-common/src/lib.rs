//! Common modules used throughout the release tooling: the deployment data
//! model, the persisted cache-key layout, and shared constants

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod constants;
pub mod keys;
pub mod types;
