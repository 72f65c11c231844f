//! Bridge Mint Relayer - Library interface
//!
//! Watches a source-chain bridge for `TokensDeposited` events and mints the
//! bridged amount on the destination chain, at most once per source
//! transaction. Modules are public for the binary and integration tests.

pub mod api;
pub mod broadcaster;
pub mod chain;
pub mod config;
pub mod contracts;
pub mod error;
pub mod gas;
pub mod gate;
pub mod metrics;
pub mod relay_loop;
pub mod retry;
pub mod store;
pub mod types;
pub mod validator;

#[cfg(test)]
mod testing;
