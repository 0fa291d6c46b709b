// Cogwork protocol contracts
//
// Native mock contracts for the deployment harness, plus the ERC-5202
// blueprint machinery the factory deploys pairs through:
// - Mock fungible token and price oracle
// - Blueprint construction, deployment, and verification
// - Risk-tiered pair factory and pair instances

pub mod blueprint;
pub mod erc20;
pub mod factory;
pub mod oracle;
pub mod pair;
pub mod tier;

// Re-exports for convenience
pub use blueprint::{
    construct_blueprint_deploy_bytecode, deploy_blueprint, initcode_for_runtime,
    verify_blueprint_deploy_preamble, verify_eip5202_blueprint, Blueprint, BlueprintContents,
    BlueprintError,
};
pub use erc20::{Erc20, MockErc20};
pub use factory::{CogFactory, Factory, TierBlueprints};
pub use oracle::{MockOracle, Oracle};
pub use pair::{pair_initcode, CogPair, Pair};
pub use tier::{RiskTier, TierParameters};

use alloy_primitives::Address;
use alloy_sol_types::SolEvent;
use evm::Log;

/// Build an executor log record from a sol! event
pub(crate) fn native_log<E: SolEvent>(address: Address, event: &E) -> Log {
    let data = event.encode_log_data();
    Log {
        address,
        topics: data.topics().to_vec(),
        data: data.data,
    }
}
