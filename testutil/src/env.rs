/// Executor scaffolding for tests

use alloy_primitives::{Address, Bytes};
use anyhow::{bail, Result};
use evm::{EvmExecutor, EvmStorage, Host, NativeContract};
use rocksdb::DB;
use std::sync::Arc;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Fresh executor over a scratch RocksDB; keep the TempDir alive for the
/// duration of the test
pub fn test_executor() -> (EvmExecutor, TempDir) {
    let temp_dir = tempfile::tempdir().expect("failed to create tempdir");
    let db = DB::open_default(temp_dir.path()).expect("failed to open rocksdb");
    let storage = EvmStorage::new(Arc::new(db));
    (EvmExecutor::new(storage), temp_dir)
}

/// Host stub for unit-testing native contracts that never touch the chain
pub struct NoopHost;

impl Host for NoopHost {
    fn code_at(&mut self, address: Address) -> Result<Bytes> {
        bail!("noop host holds no code (queried {address})");
    }

    fn create(&mut self, _deployer: Address, _initcode: Bytes) -> Result<Address> {
        bail!("noop host cannot create contracts");
    }

    fn bind_native(&mut self, _address: Address, _contract: Box<dyn NativeContract>) {}
}

/// Initialize tracing for a test binary, honoring RUST_LOG. Safe to call
/// from every test; only the first call installs the subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
