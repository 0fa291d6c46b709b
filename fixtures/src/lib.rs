// Deployment fixtures
//
// Session-scoped deployment wiring for the protocol under test: mock
// tokens and the oracle, the four tier blueprints, the factory over them,
// and a medium-risk pair deployed through the factory. Each fixture
// deploys on first access and returns the cached handle afterwards, so
// dependency order follows from construction and repeated access is
// idempotent within a session.

use alloy_primitives::{Address, U256};
use anyhow::{anyhow, Result};
use rocksdb::DB;
use std::sync::Arc;
use tempfile::TempDir;
use tracing::info;

use contracts::{
    construct_blueprint_deploy_bytecode, deploy_blueprint, pair_initcode, Blueprint, Erc20,
    Factory, Oracle, Pair, RiskTier, TierBlueprints,
};
use evm::{EvmExecutor, EvmStorage};

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Number of prefunded dev accounts
    pub funded_accounts: usize,
    /// Balance granted to each dev account, in wei
    pub initial_balance: U256,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            funded_accounts: 10,
            initial_balance: U256::from(10u128.pow(24)),
        }
    }
}

/// A deployment session over a scratch chain
///
/// Owns the executor and the temporary database backing it; dropping the
/// session tears both down.
pub struct Session {
    executor: EvmExecutor,
    accounts: Vec<Address>,
    _state_dir: TempDir,
    collateral: Option<Erc20>,
    asset: Option<Erc20>,
    oracle: Option<Oracle>,
    blueprints: [Option<Blueprint>; 4],
    factory: Option<Factory>,
    pair: Option<Pair>,
}

impl Session {
    /// Start a session with the default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(SessionConfig::default())
    }

    /// Start a session with explicit configuration
    pub fn with_config(config: SessionConfig) -> Result<Self> {
        let state_dir = tempfile::tempdir()?;
        let db = DB::open_default(state_dir.path())?;
        let mut executor = EvmExecutor::new(EvmStorage::new(Arc::new(db)));

        let mut accounts = Vec::with_capacity(config.funded_accounts);
        for index in 0..config.funded_accounts {
            let tag = u8::try_from(index + 1)
                .map_err(|_| anyhow!("at most 255 dev accounts are supported"))?;
            let account = Address::repeat_byte(tag);
            executor.create_account(account, config.initial_balance)?;
            accounts.push(account);
        }
        info!(accounts = accounts.len(), "session started");

        Ok(Self {
            executor,
            accounts,
            _state_dir: state_dir,
            collateral: None,
            asset: None,
            oracle: None,
            blueprints: [None; 4],
            factory: None,
            pair: None,
        })
    }

    /// The session account every fixture deploys from
    pub fn account(&self) -> Address {
        self.accounts[0]
    }

    /// All prefunded dev accounts
    pub fn accounts(&self) -> &[Address] {
        &self.accounts
    }

    /// The underlying executor, for direct calls in tests
    pub fn executor(&mut self) -> &mut EvmExecutor {
        &mut self.executor
    }

    /// Mock collateral token
    pub fn collateral(&mut self) -> Result<Erc20> {
        if let Some(token) = self.collateral {
            return Ok(token);
        }
        let account = self.account();
        let token = Erc20::deploy(&mut self.executor, account, "Collateral", "CA", 18, U256::ZERO)?;
        self.collateral = Some(token);
        Ok(token)
    }

    /// Mock borrowable asset token
    pub fn asset(&mut self) -> Result<Erc20> {
        if let Some(token) = self.asset {
            return Ok(token);
        }
        let account = self.account();
        let token = Erc20::deploy(&mut self.executor, account, "Asset", "AB", 18, U256::ZERO)?;
        self.asset = Some(token);
        Ok(token)
    }

    /// Mock price oracle
    pub fn oracle(&mut self) -> Result<Oracle> {
        if let Some(oracle) = self.oracle {
            return Ok(oracle);
        }
        let account = self.account();
        let oracle = Oracle::deploy(&mut self.executor, account)?;
        self.oracle = Some(oracle);
        Ok(oracle)
    }

    /// Deployed blueprint for a tier's pair initcode
    pub fn pair_blueprint(&mut self, tier: RiskTier) -> Result<Blueprint> {
        let slot = usize::from(tier.tag());
        if let Some(blueprint) = self.blueprints[slot] {
            return Ok(blueprint);
        }
        let account = self.account();
        let initcode = pair_initcode(tier)?;
        let deploy_bytecode = construct_blueprint_deploy_bytecode(&initcode)?;
        let blueprint = deploy_blueprint(&mut self.executor, account, &deploy_bytecode)?;
        self.blueprints[slot] = Some(blueprint);
        Ok(blueprint)
    }

    pub fn stable_pair_blueprint(&mut self) -> Result<Blueprint> {
        self.pair_blueprint(RiskTier::Stable)
    }

    pub fn low_pair_blueprint(&mut self) -> Result<Blueprint> {
        self.pair_blueprint(RiskTier::Low)
    }

    pub fn medium_pair_blueprint(&mut self) -> Result<Blueprint> {
        self.pair_blueprint(RiskTier::Medium)
    }

    pub fn high_pair_blueprint(&mut self) -> Result<Blueprint> {
        self.pair_blueprint(RiskTier::High)
    }

    /// Pair factory over the four tier blueprints, fee recipient set to
    /// the session account
    pub fn factory(&mut self) -> Result<Factory> {
        if let Some(factory) = self.factory {
            return Ok(factory);
        }
        let blueprints = TierBlueprints {
            stable: self.stable_pair_blueprint()?.address(),
            low: self.low_pair_blueprint()?.address(),
            medium: self.medium_pair_blueprint()?.address(),
            high: self.high_pair_blueprint()?.address(),
        };
        let account = self.account();
        let factory = Factory::deploy(&mut self.executor, account, blueprints, account)?;
        self.factory = Some(factory);
        Ok(factory)
    }

    /// Medium-risk pair over (asset, collateral, oracle), deployed through
    /// the factory
    pub fn pair(&mut self) -> Result<Pair> {
        if let Some(pair) = self.pair {
            return Ok(pair);
        }
        let factory = self.factory()?;
        let asset = self.asset()?.address();
        let collateral = self.collateral()?.address();
        let oracle = self.oracle()?.address();
        let account = self.account();
        let pair =
            factory.deploy_medium_risk_pair(&mut self.executor, account, asset, collateral, oracle)?;
        self.pair = Some(pair);
        Ok(pair)
    }
}
