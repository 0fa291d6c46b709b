// Cogwork EVM substrate
//
// This crate provides the execution layer the deployment harness runs on:
// - Transaction execution using revm
// - RocksDB storage adapter for EVM state
// - Native contract dispatch for protocol mocks
// - Account, receipt, and log types

pub mod executor;
pub mod natives;
pub mod storage;
pub mod types;

// Re-exports for convenience
pub use executor::EvmExecutor;
pub use natives::{CallContext, Host, NativeContract, NativeOutcome};
pub use storage::EvmStorage;
pub use types::{Account, Log, Receipt, Transaction};
