// Native contract dispatch
//
// Protocol mocks execute natively instead of as interpreted bytecode. The
// executor keeps a registry of bound instances and routes calls addressed
// to them the way a full node routes precompiled contracts. Unlike
// precompiles, native contracts live at dynamically assigned CREATE
// addresses and may emit event logs.

use alloy_primitives::{Address, Bytes};
use anyhow::Result;

use crate::types::Log;

/// Execution context passed to a native contract call
#[derive(Debug, Clone, Copy)]
pub struct CallContext {
    /// Transaction sender
    pub caller: Address,
    /// Address the call is bound to
    pub address: Address,
    /// Gas available to the call
    pub gas_limit: u64,
}

/// Result of a native contract call
#[derive(Debug, Clone)]
pub struct NativeOutcome {
    /// ABI-encoded return data
    pub output: Bytes,
    /// Gas consumed
    pub gas_used: u64,
    /// Event logs emitted by the call
    pub logs: Vec<Log>,
}

impl NativeOutcome {
    /// Outcome with no logs
    pub fn new(output: Bytes, gas_used: u64) -> Self {
        Self {
            output,
            gas_used,
            logs: Vec::new(),
        }
    }

    /// Outcome carrying event logs
    pub fn with_logs(output: Bytes, gas_used: u64, logs: Vec<Log>) -> Self {
        Self {
            output,
            gas_used,
            logs,
        }
    }
}

/// Executor surface a native contract may drive during a call
///
/// Kept narrow: reading deployed code, running initcode through the
/// interpreter, and binding further native instances to created addresses.
pub trait Host {
    /// Code stored at an address; errors if the account holds none
    fn code_at(&mut self, address: Address) -> Result<Bytes>;

    /// Execute `initcode` as a CREATE originating from `deployer` and
    /// return the created address
    fn create(&mut self, deployer: Address, initcode: Bytes) -> Result<Address>;

    /// Bind a native contract instance to an address
    fn bind_native(&mut self, address: Address, contract: Box<dyn NativeContract>);
}

/// A contract whose behavior is implemented in Rust
pub trait NativeContract: Send {
    /// Execute a call. `input` is standard ABI calldata (4-byte selector
    /// plus encoded arguments).
    fn call(
        &mut self,
        host: &mut dyn Host,
        ctx: &CallContext,
        input: &Bytes,
    ) -> Result<NativeOutcome>;
}
