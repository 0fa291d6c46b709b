// Mock price oracle
//
// Feeds a settable price to pairs. `get` reports whether the price has
// been updated since deployment alongside the price itself.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall, SolValue};
use anyhow::{anyhow, bail, Result};
use evm::{CallContext, EvmExecutor, Host, NativeContract, NativeOutcome};
use tracing::info;

use crate::native_log;

sol! {
    /// Mock oracle interface
    interface IMockOracle {
        event PriceUpdated(uint256 price);

        function set_price(uint256 price) external;
        function set_updated(bool flag) external;
        function get() external returns (bool updated, uint256 price);
    }
}

/// Gas costs for operations
const SET_GAS: u64 = 10_000;
const GET_GAS: u64 = 3_000;

/// Mock oracle state
pub struct MockOracle {
    price: U256,
    updated: bool,
}

impl MockOracle {
    pub fn new() -> Self {
        Self {
            price: U256::ZERO,
            updated: false,
        }
    }
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeContract for MockOracle {
    fn call(
        &mut self,
        _host: &mut dyn Host,
        ctx: &CallContext,
        input: &Bytes,
    ) -> Result<NativeOutcome> {
        if input.len() < 4 {
            bail!("input too short");
        }
        let selector = &input[..4];

        match selector {
            sel if sel == IMockOracle::set_priceCall::SELECTOR => {
                let call = IMockOracle::set_priceCall::abi_decode(input, false)?;
                self.price = call.price;
                self.updated = true;
                let log = native_log(
                    ctx.address,
                    &IMockOracle::PriceUpdated { price: call.price },
                );
                Ok(NativeOutcome::with_logs(Bytes::new(), SET_GAS, vec![log]))
            }

            sel if sel == IMockOracle::set_updatedCall::SELECTOR => {
                let call = IMockOracle::set_updatedCall::abi_decode(input, false)?;
                self.updated = call.flag;
                Ok(NativeOutcome::new(Bytes::new(), SET_GAS))
            }

            sel if sel == IMockOracle::getCall::SELECTOR => Ok(NativeOutcome::new(
                Bytes::from((self.updated, self.price).abi_encode()),
                GET_GAS,
            )),

            _ => Err(anyhow!("unknown function selector: {:?}", selector)),
        }
    }
}

/// Handle to a deployed mock oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Oracle {
    address: Address,
}

impl Oracle {
    /// Deploy a mock oracle
    pub fn deploy(executor: &mut EvmExecutor, deployer: Address) -> Result<Self> {
        let address = executor.deploy_native(deployer, Box::new(MockOracle::new()))?;
        info!(%address, "deployed mock oracle");
        Ok(Self { address })
    }

    /// Bind a handle to a deployed oracle address
    pub fn at(address: Address) -> Self {
        Self { address }
    }

    /// The oracle's address
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn set_price(
        &self,
        executor: &mut EvmExecutor,
        caller: Address,
        price: U256,
    ) -> Result<()> {
        let data = IMockOracle::set_priceCall { price }.abi_encode();
        executor.call_contract(caller, self.address, data.into())?;
        Ok(())
    }

    pub fn set_updated(
        &self,
        executor: &mut EvmExecutor,
        caller: Address,
        flag: bool,
    ) -> Result<()> {
        let data = IMockOracle::set_updatedCall { flag }.abi_encode();
        executor.call_contract(caller, self.address, data.into())?;
        Ok(())
    }

    /// Current (updated, price) reading
    pub fn get(&self, executor: &mut EvmExecutor) -> Result<(bool, U256)> {
        let output = executor.view_call(self.address, IMockOracle::getCall {}.abi_encode().into())?;
        Ok(<(bool, U256)>::abi_decode(&output, true)?)
    }
}
