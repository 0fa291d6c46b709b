// Lending pair
//
// A pair binds a borrowable asset, a collateral token, and a price oracle
// under one risk tier. Instances are created only by the factory, from the
// tier's blueprint; the on-chain code is a two-byte non-executable runtime
// marker while behavior is served natively.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, sol_data, SolCall, SolType, SolValue};
use anyhow::{anyhow, bail, Result};
use evm::{CallContext, EvmExecutor, Host, NativeContract, NativeOutcome};

use crate::blueprint::{initcode_for_runtime, BlueprintError};
use crate::tier::{RiskTier, TierParameters};

sol! {
    /// Pair identity and tier parameter surface
    interface ICogPair {
        function asset() external view returns (address);
        function collateral() external view returns (address);
        function oracle() external view returns (address);
        function risk_tier() external view returns (uint8);
        function collateralization_rate() external view returns (uint256);
        function liquidation_multiplier() external view returns (uint256);
        function minimum_interest_per_second() external view returns (uint256);
        function maximum_interest_per_second() external view returns (uint256);
    }
}

/// Gas cost for the view surface
const VIEW_GAS: u64 = 3_000;

/// Runtime marker a pair blueprint deploys: the invalid opcode followed by
/// the tier tag, so direct execution always halts
pub fn pair_runtime(tier: RiskTier) -> [u8; 2] {
    [0xfe, tier.tag()]
}

/// Initcode stored in a tier's blueprint
pub fn pair_initcode(tier: RiskTier) -> Result<Bytes, BlueprintError> {
    initcode_for_runtime(&pair_runtime(tier))
}

/// Pair state
pub struct CogPair {
    asset: Address,
    collateral: Address,
    oracle: Address,
    tier: RiskTier,
    params: TierParameters,
}

impl CogPair {
    pub fn new(asset: Address, collateral: Address, oracle: Address, tier: RiskTier) -> Self {
        Self {
            asset,
            collateral,
            oracle,
            tier,
            params: tier.parameters(),
        }
    }
}

impl NativeContract for CogPair {
    fn call(
        &mut self,
        _host: &mut dyn Host,
        _ctx: &CallContext,
        input: &Bytes,
    ) -> Result<NativeOutcome> {
        if input.len() < 4 {
            bail!("input too short");
        }
        let selector = &input[..4];

        let output = match selector {
            sel if sel == ICogPair::assetCall::SELECTOR => self.asset.abi_encode(),
            sel if sel == ICogPair::collateralCall::SELECTOR => self.collateral.abi_encode(),
            sel if sel == ICogPair::oracleCall::SELECTOR => self.oracle.abi_encode(),
            sel if sel == ICogPair::risk_tierCall::SELECTOR => {
                sol_data::Uint::<8>::abi_encode(&self.tier.tag())
            }
            sel if sel == ICogPair::collateralization_rateCall::SELECTOR => {
                U256::from(self.params.collateralization_rate).abi_encode()
            }
            sel if sel == ICogPair::liquidation_multiplierCall::SELECTOR => {
                U256::from(self.params.liquidation_multiplier).abi_encode()
            }
            sel if sel == ICogPair::minimum_interest_per_secondCall::SELECTOR => {
                U256::from(self.params.minimum_interest_per_second).abi_encode()
            }
            sel if sel == ICogPair::maximum_interest_per_secondCall::SELECTOR => {
                U256::from(self.params.maximum_interest_per_second).abi_encode()
            }
            _ => return Err(anyhow!("unknown function selector: {:?}", selector)),
        };

        Ok(NativeOutcome::new(Bytes::from(output), VIEW_GAS))
    }
}

/// Handle to a deployed pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pair {
    address: Address,
}

impl Pair {
    /// Bind a handle to a deployed pair address
    pub fn at(address: Address) -> Self {
        Self { address }
    }

    /// The pair's address
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn asset(&self, executor: &mut EvmExecutor) -> Result<Address> {
        let output = executor.view_call(self.address, ICogPair::assetCall {}.abi_encode().into())?;
        Ok(Address::abi_decode(&output, true)?)
    }

    pub fn collateral(&self, executor: &mut EvmExecutor) -> Result<Address> {
        let output =
            executor.view_call(self.address, ICogPair::collateralCall {}.abi_encode().into())?;
        Ok(Address::abi_decode(&output, true)?)
    }

    pub fn oracle(&self, executor: &mut EvmExecutor) -> Result<Address> {
        let output = executor.view_call(self.address, ICogPair::oracleCall {}.abi_encode().into())?;
        Ok(Address::abi_decode(&output, true)?)
    }

    pub fn risk_tier(&self, executor: &mut EvmExecutor) -> Result<RiskTier> {
        let output =
            executor.view_call(self.address, ICogPair::risk_tierCall {}.abi_encode().into())?;
        let tag = sol_data::Uint::<8>::abi_decode(&output, true)?;
        RiskTier::from_tag(tag).ok_or_else(|| anyhow!("pair reported unknown tier tag {tag}"))
    }

    pub fn collateralization_rate(&self, executor: &mut EvmExecutor) -> Result<U256> {
        let output = executor.view_call(
            self.address,
            ICogPair::collateralization_rateCall {}.abi_encode().into(),
        )?;
        Ok(U256::abi_decode(&output, true)?)
    }

    pub fn liquidation_multiplier(&self, executor: &mut EvmExecutor) -> Result<U256> {
        let output = executor.view_call(
            self.address,
            ICogPair::liquidation_multiplierCall {}.abi_encode().into(),
        )?;
        Ok(U256::abi_decode(&output, true)?)
    }

    pub fn minimum_interest_per_second(&self, executor: &mut EvmExecutor) -> Result<U256> {
        let output = executor.view_call(
            self.address,
            ICogPair::minimum_interest_per_secondCall {}.abi_encode().into(),
        )?;
        Ok(U256::abi_decode(&output, true)?)
    }

    pub fn maximum_interest_per_second(&self, executor: &mut EvmExecutor) -> Result<U256> {
        let output = executor.view_call(
            self.address,
            ICogPair::maximum_interest_per_secondCall {}.abi_encode().into(),
        )?;
        Ok(U256::abi_decode(&output, true)?)
    }
}
