// Pair factory
//
// Holds one blueprint address per risk tier and instantiates pairs from
// them. Every deployment re-reads and re-verifies the blueprint container,
// executes the embedded initcode through the host, binds the pair at the
// created address, and emits a single PairCreated event.

use alloy_primitives::{Address, Bytes, LogData, U256};
use alloy_sol_types::{sol, SolCall, SolEvent, SolValue};
use anyhow::{anyhow, bail, Result};
use evm::{CallContext, EvmExecutor, Host, Log, NativeContract, NativeOutcome};
use tracing::info;

use crate::blueprint::verify_eip5202_blueprint;
use crate::native_log;
use crate::pair::{CogPair, Pair};
use crate::tier::RiskTier;

sol! {
    /// Factory interface
    interface ICogFactory {
        event PairCreated(address indexed asset, address indexed collateral, address pair, uint8 tier);

        function deploy_stable_risk_pair(address asset, address collateral, address oracle) external returns (address pair);
        function deploy_low_risk_pair(address asset, address collateral, address oracle) external returns (address pair);
        function deploy_medium_risk_pair(address asset, address collateral, address oracle) external returns (address pair);
        function deploy_high_risk_pair(address asset, address collateral, address oracle) external returns (address pair);

        function stable_pair_blueprint() external view returns (address);
        function low_pair_blueprint() external view returns (address);
        function medium_pair_blueprint() external view returns (address);
        function high_pair_blueprint() external view returns (address);
        function fee_to() external view returns (address);
        function pair_count() external view returns (uint256);
        function pair_at(uint256 index) external view returns (address);
    }
}

/// Gas costs for operations
const DEPLOY_PAIR_GAS: u64 = 250_000;
const VIEW_GAS: u64 = 3_000;

/// Blueprint addresses, one per tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierBlueprints {
    pub stable: Address,
    pub low: Address,
    pub medium: Address,
    pub high: Address,
}

impl TierBlueprints {
    /// Blueprint address for a tier
    pub fn for_tier(&self, tier: RiskTier) -> Address {
        match tier {
            RiskTier::Stable => self.stable,
            RiskTier::Low => self.low,
            RiskTier::Medium => self.medium,
            RiskTier::High => self.high,
        }
    }
}

/// Factory state
pub struct CogFactory {
    blueprints: TierBlueprints,
    fee_to: Address,
    pairs: Vec<Address>,
}

impl CogFactory {
    pub fn new(blueprints: TierBlueprints, fee_to: Address) -> Self {
        Self {
            blueprints,
            fee_to,
            pairs: Vec::new(),
        }
    }

    fn deploy_pair(
        &mut self,
        host: &mut dyn Host,
        ctx: &CallContext,
        tier: RiskTier,
        asset: Address,
        collateral: Address,
        oracle: Address,
    ) -> Result<NativeOutcome> {
        let blueprint = self.blueprints.for_tier(tier);
        let code = host.code_at(blueprint)?;
        let contents = verify_eip5202_blueprint(&code)
            .map_err(|e| anyhow!("blueprint at {blueprint} rejected: {e}"))?;

        let pair = host.create(ctx.address, contents.initcode)?;
        host.bind_native(pair, Box::new(CogPair::new(asset, collateral, oracle, tier)));
        self.pairs.push(pair);
        info!(%pair, ?tier, %asset, %collateral, "factory deployed pair");

        let log = native_log(
            ctx.address,
            &ICogFactory::PairCreated {
                asset,
                collateral,
                pair,
                tier: tier.tag(),
            },
        );
        Ok(NativeOutcome::with_logs(
            Bytes::from(pair.abi_encode()),
            DEPLOY_PAIR_GAS,
            vec![log],
        ))
    }

    fn view(&self, value: Vec<u8>) -> NativeOutcome {
        NativeOutcome::new(Bytes::from(value), VIEW_GAS)
    }
}

impl NativeContract for CogFactory {
    fn call(
        &mut self,
        host: &mut dyn Host,
        ctx: &CallContext,
        input: &Bytes,
    ) -> Result<NativeOutcome> {
        if input.len() < 4 {
            bail!("input too short");
        }
        let selector = &input[..4];

        match selector {
            sel if sel == ICogFactory::deploy_stable_risk_pairCall::SELECTOR => {
                let call = ICogFactory::deploy_stable_risk_pairCall::abi_decode(input, false)?;
                self.deploy_pair(host, ctx, RiskTier::Stable, call.asset, call.collateral, call.oracle)
            }

            sel if sel == ICogFactory::deploy_low_risk_pairCall::SELECTOR => {
                let call = ICogFactory::deploy_low_risk_pairCall::abi_decode(input, false)?;
                self.deploy_pair(host, ctx, RiskTier::Low, call.asset, call.collateral, call.oracle)
            }

            sel if sel == ICogFactory::deploy_medium_risk_pairCall::SELECTOR => {
                let call = ICogFactory::deploy_medium_risk_pairCall::abi_decode(input, false)?;
                self.deploy_pair(host, ctx, RiskTier::Medium, call.asset, call.collateral, call.oracle)
            }

            sel if sel == ICogFactory::deploy_high_risk_pairCall::SELECTOR => {
                let call = ICogFactory::deploy_high_risk_pairCall::abi_decode(input, false)?;
                self.deploy_pair(host, ctx, RiskTier::High, call.asset, call.collateral, call.oracle)
            }

            sel if sel == ICogFactory::stable_pair_blueprintCall::SELECTOR => {
                Ok(self.view(self.blueprints.stable.abi_encode()))
            }
            sel if sel == ICogFactory::low_pair_blueprintCall::SELECTOR => {
                Ok(self.view(self.blueprints.low.abi_encode()))
            }
            sel if sel == ICogFactory::medium_pair_blueprintCall::SELECTOR => {
                Ok(self.view(self.blueprints.medium.abi_encode()))
            }
            sel if sel == ICogFactory::high_pair_blueprintCall::SELECTOR => {
                Ok(self.view(self.blueprints.high.abi_encode()))
            }
            sel if sel == ICogFactory::fee_toCall::SELECTOR => {
                Ok(self.view(self.fee_to.abi_encode()))
            }
            sel if sel == ICogFactory::pair_countCall::SELECTOR => {
                Ok(self.view(U256::from(self.pairs.len()).abi_encode()))
            }
            sel if sel == ICogFactory::pair_atCall::SELECTOR => {
                let call = ICogFactory::pair_atCall::abi_decode(input, false)?;
                let index = call.index.to::<usize>();
                let pair = self
                    .pairs
                    .get(index)
                    .ok_or_else(|| anyhow!("pair index {index} out of range"))?;
                Ok(self.view(pair.abi_encode()))
            }

            _ => Err(anyhow!("unknown function selector: {:?}", selector)),
        }
    }
}

/// Handle to a deployed factory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Factory {
    address: Address,
}

impl Factory {
    /// Deploy a factory after verifying every tier blueprint parses as an
    /// ERC-5202 container
    pub fn deploy(
        executor: &mut EvmExecutor,
        deployer: Address,
        blueprints: TierBlueprints,
        fee_to: Address,
    ) -> Result<Self> {
        for tier in RiskTier::ALL {
            let address = blueprints.for_tier(tier);
            let code = executor
                .get_code(&address)?
                .ok_or_else(|| anyhow!("no code at {tier:?} blueprint {address}"))?;
            verify_eip5202_blueprint(&code)
                .map_err(|e| anyhow!("{tier:?} blueprint at {address} rejected: {e}"))?;
        }

        let address =
            executor.deploy_native(deployer, Box::new(CogFactory::new(blueprints, fee_to)))?;
        info!(%address, "deployed pair factory");
        Ok(Self { address })
    }

    /// Bind a handle to a deployed factory address
    pub fn at(address: Address) -> Self {
        Self { address }
    }

    /// The factory's address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Deploy a pair for a tier and recover its handle from the single
    /// PairCreated event in the receipt
    pub fn deploy_pair(
        &self,
        executor: &mut EvmExecutor,
        caller: Address,
        tier: RiskTier,
        asset: Address,
        collateral: Address,
        oracle: Address,
    ) -> Result<Pair> {
        let data = match tier {
            RiskTier::Stable => ICogFactory::deploy_stable_risk_pairCall {
                asset,
                collateral,
                oracle,
            }
            .abi_encode(),
            RiskTier::Low => ICogFactory::deploy_low_risk_pairCall {
                asset,
                collateral,
                oracle,
            }
            .abi_encode(),
            RiskTier::Medium => ICogFactory::deploy_medium_risk_pairCall {
                asset,
                collateral,
                oracle,
            }
            .abi_encode(),
            RiskTier::High => ICogFactory::deploy_high_risk_pairCall {
                asset,
                collateral,
                oracle,
            }
            .abi_encode(),
        };
        let receipt = executor.call_contract(caller, self.address, data.into())?;

        let created: Vec<ICogFactory::PairCreated> = receipt
            .logs_from(self.address)
            .filter_map(decode_pair_created)
            .collect();
        if created.len() != 1 {
            bail!(
                "expected exactly one PairCreated event, found {}",
                created.len()
            );
        }

        Ok(Pair::at(created[0].pair))
    }

    pub fn deploy_stable_risk_pair(
        &self,
        executor: &mut EvmExecutor,
        caller: Address,
        asset: Address,
        collateral: Address,
        oracle: Address,
    ) -> Result<Pair> {
        self.deploy_pair(executor, caller, RiskTier::Stable, asset, collateral, oracle)
    }

    pub fn deploy_low_risk_pair(
        &self,
        executor: &mut EvmExecutor,
        caller: Address,
        asset: Address,
        collateral: Address,
        oracle: Address,
    ) -> Result<Pair> {
        self.deploy_pair(executor, caller, RiskTier::Low, asset, collateral, oracle)
    }

    pub fn deploy_medium_risk_pair(
        &self,
        executor: &mut EvmExecutor,
        caller: Address,
        asset: Address,
        collateral: Address,
        oracle: Address,
    ) -> Result<Pair> {
        self.deploy_pair(executor, caller, RiskTier::Medium, asset, collateral, oracle)
    }

    pub fn deploy_high_risk_pair(
        &self,
        executor: &mut EvmExecutor,
        caller: Address,
        asset: Address,
        collateral: Address,
        oracle: Address,
    ) -> Result<Pair> {
        self.deploy_pair(executor, caller, RiskTier::High, asset, collateral, oracle)
    }

    /// Blueprint address registered for a tier
    pub fn blueprint(&self, executor: &mut EvmExecutor, tier: RiskTier) -> Result<Address> {
        let data = match tier {
            RiskTier::Stable => ICogFactory::stable_pair_blueprintCall {}.abi_encode(),
            RiskTier::Low => ICogFactory::low_pair_blueprintCall {}.abi_encode(),
            RiskTier::Medium => ICogFactory::medium_pair_blueprintCall {}.abi_encode(),
            RiskTier::High => ICogFactory::high_pair_blueprintCall {}.abi_encode(),
        };
        let output = executor.view_call(self.address, data.into())?;
        Ok(Address::abi_decode(&output, true)?)
    }

    pub fn fee_to(&self, executor: &mut EvmExecutor) -> Result<Address> {
        let output =
            executor.view_call(self.address, ICogFactory::fee_toCall {}.abi_encode().into())?;
        Ok(Address::abi_decode(&output, true)?)
    }

    pub fn pair_count(&self, executor: &mut EvmExecutor) -> Result<U256> {
        let output = executor.view_call(
            self.address,
            ICogFactory::pair_countCall {}.abi_encode().into(),
        )?;
        Ok(U256::abi_decode(&output, true)?)
    }

    pub fn pair_at(&self, executor: &mut EvmExecutor, index: U256) -> Result<Address> {
        let output = executor.view_call(
            self.address,
            ICogFactory::pair_atCall { index }.abi_encode().into(),
        )?;
        Ok(Address::abi_decode(&output, true)?)
    }
}

fn decode_pair_created(log: &Log) -> Option<ICogFactory::PairCreated> {
    let data = LogData::new_unchecked(log.topics.clone(), log.data.clone());
    ICogFactory::PairCreated::decode_log_data(&data, true).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::{construct_blueprint_deploy_bytecode, deploy_blueprint, Blueprint};
    use crate::pair::{pair_initcode, pair_runtime};
    use testutil::test_executor;

    fn deploy_tier_blueprints(executor: &mut EvmExecutor, account: Address) -> TierBlueprints {
        let mut addresses = [Address::ZERO; 4];
        for tier in RiskTier::ALL {
            let initcode = pair_initcode(tier).unwrap();
            let deploy_bytecode = construct_blueprint_deploy_bytecode(&initcode).unwrap();
            let blueprint: Blueprint =
                deploy_blueprint(executor, account, &deploy_bytecode).unwrap();
            addresses[tier.tag() as usize] = blueprint.address();
        }
        TierBlueprints {
            stable: addresses[0],
            low: addresses[1],
            medium: addresses[2],
            high: addresses[3],
        }
    }

    fn setup() -> (EvmExecutor, tempfile::TempDir, Address, Factory) {
        let (mut executor, temp) = test_executor();
        let account = Address::repeat_byte(0x01);
        executor
            .create_account(account, U256::from(10u128.pow(20)))
            .unwrap();
        let blueprints = deploy_tier_blueprints(&mut executor, account);
        let factory = Factory::deploy(&mut executor, account, blueprints, account).unwrap();
        (executor, temp, account, factory)
    }

    #[test]
    fn test_factory_rejects_non_blueprint_address() {
        let (mut executor, _temp) = test_executor();
        let account = Address::repeat_byte(0x01);
        executor
            .create_account(account, U256::from(10u128.pow(20)))
            .unwrap();

        // An account with no code cannot serve as a blueprint
        let bogus = TierBlueprints {
            stable: Address::repeat_byte(0x11),
            low: Address::repeat_byte(0x12),
            medium: Address::repeat_byte(0x13),
            high: Address::repeat_byte(0x14),
        };
        assert!(Factory::deploy(&mut executor, account, bogus, account).is_err());
    }

    #[test]
    fn test_views_report_construction_arguments() {
        let (mut executor, _temp, account, factory) = setup();

        // A rebound handle answers the same views
        let factory = Factory::at(factory.address());
        assert_eq!(factory.fee_to(&mut executor).unwrap(), account);
        assert_eq!(factory.pair_count(&mut executor).unwrap(), U256::ZERO);
        for tier in RiskTier::ALL {
            let blueprint = factory.blueprint(&mut executor, tier).unwrap();
            assert!(executor.get_code(&blueprint).unwrap().is_some());
        }
    }

    #[test]
    fn test_deploy_pair_creates_native_pair_with_blueprint_code() {
        let (mut executor, _temp, account, factory) = setup();
        let asset = Address::repeat_byte(0x0a);
        let collateral = Address::repeat_byte(0x0b);
        let oracle = Address::repeat_byte(0x0c);

        let pair = factory
            .deploy_medium_risk_pair(&mut executor, account, asset, collateral, oracle)
            .unwrap();

        assert_ne!(pair.address(), Address::ZERO);
        assert!(executor.is_native(&pair.address()));
        // On-chain code is the tier's runtime marker from the blueprint
        let code = executor.get_code(&pair.address()).unwrap().unwrap();
        assert_eq!(code.as_ref(), &pair_runtime(RiskTier::Medium));

        assert_eq!(pair.asset(&mut executor).unwrap(), asset);
        assert_eq!(pair.collateral(&mut executor).unwrap(), collateral);
        assert_eq!(pair.oracle(&mut executor).unwrap(), oracle);
        assert_eq!(pair.risk_tier(&mut executor).unwrap(), RiskTier::Medium);
    }

    #[test]
    fn test_each_tier_deploys_distinct_pairs() {
        let (mut executor, _temp, account, factory) = setup();
        let asset = Address::repeat_byte(0x0a);
        let collateral = Address::repeat_byte(0x0b);
        let oracle = Address::repeat_byte(0x0c);

        let mut addresses = Vec::new();
        for tier in RiskTier::ALL {
            let pair = factory
                .deploy_pair(&mut executor, account, tier, asset, collateral, oracle)
                .unwrap();
            assert_eq!(pair.risk_tier(&mut executor).unwrap(), tier);
            addresses.push(pair.address());
        }

        addresses.sort();
        addresses.dedup();
        assert_eq!(addresses.len(), 4);
        assert_eq!(factory.pair_count(&mut executor).unwrap(), U256::from(4));
    }

    #[test]
    fn test_pair_registry_preserves_order() {
        let (mut executor, _temp, account, factory) = setup();
        let oracle = Address::repeat_byte(0x0c);

        let first = factory
            .deploy_low_risk_pair(
                &mut executor,
                account,
                Address::repeat_byte(0x0a),
                Address::repeat_byte(0x0b),
                oracle,
            )
            .unwrap();
        let second = factory
            .deploy_high_risk_pair(
                &mut executor,
                account,
                Address::repeat_byte(0x1a),
                Address::repeat_byte(0x1b),
                oracle,
            )
            .unwrap();

        assert_eq!(
            factory.pair_at(&mut executor, U256::ZERO).unwrap(),
            first.address()
        );
        assert_eq!(
            factory.pair_at(&mut executor, U256::from(1)).unwrap(),
            second.address()
        );
        assert!(factory.pair_at(&mut executor, U256::from(2)).is_err());
    }

    #[test]
    fn test_deploy_emits_single_pair_created_event() {
        let (mut executor, _temp, account, factory) = setup();

        let data = ICogFactory::deploy_medium_risk_pairCall {
            asset: Address::repeat_byte(0x0a),
            collateral: Address::repeat_byte(0x0b),
            oracle: Address::repeat_byte(0x0c),
        }
        .abi_encode();
        let receipt = executor
            .call_contract(account, factory.address(), data.into())
            .unwrap();

        let created: Vec<_> = receipt
            .logs_from(factory.address())
            .filter_map(decode_pair_created)
            .collect();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].tier, RiskTier::Medium.tag());
        assert_eq!(created[0].asset, Address::repeat_byte(0x0a));
        // The returned address matches the event payload
        let returned = Address::abi_decode(&receipt.output, true).unwrap();
        assert_eq!(returned, created[0].pair);
    }
}
