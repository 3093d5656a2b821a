//! Scripts for deploying releases of contracts, preparing their upgrades, and
//! proposing governance actions, resumably and across networks.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod artifacts;
pub mod cache;
pub mod chain;
pub mod cli;
mod commands;
pub mod concurrency;
pub mod config;
pub mod constants;
pub mod context;
pub mod encoding;
pub mod errors;
pub mod executor;
pub mod manifest;
pub mod params;
pub mod proposal;
pub mod relay;
pub mod resolver;
pub mod solidity;
pub mod types;
pub mod upgrade;
pub mod utils;
