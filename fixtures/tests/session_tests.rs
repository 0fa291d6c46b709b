// Fixture sanity checks
//
// Exercises the full deployment graph: tokens and oracle, tier blueprints,
// factory, and a pair deployed through the factory.

use alloy_primitives::{Address, Bytes, U256};
use contracts::{pair_initcode, Erc20, Oracle, RiskTier};
use fixtures::Session;
use testutil::init_tracing;

#[test]
fn test_token_fixtures_match_literals() {
    init_tracing();
    let mut session = Session::new().unwrap();

    let collateral = session.collateral().unwrap();
    let asset = session.asset().unwrap();

    assert_eq!(collateral.name(session.executor()).unwrap(), "Collateral");
    assert_eq!(collateral.symbol(session.executor()).unwrap(), "CA");
    assert_eq!(collateral.decimals(session.executor()).unwrap(), 18);
    assert_eq!(
        collateral.total_supply(session.executor()).unwrap(),
        U256::ZERO
    );

    assert_eq!(asset.name(session.executor()).unwrap(), "Asset");
    assert_eq!(asset.symbol(session.executor()).unwrap(), "AB");
    assert_eq!(asset.decimals(session.executor()).unwrap(), 18);
    assert_eq!(asset.total_supply(session.executor()).unwrap(), U256::ZERO);

    assert_ne!(collateral.address(), asset.address());

    // A handle rebound from the bare address answers the same metadata
    let rebound = Erc20::at(collateral.address());
    assert_eq!(rebound.symbol(session.executor()).unwrap(), "CA");
}

#[test]
fn test_oracle_starts_unset_and_updates() {
    init_tracing();
    let mut session = Session::new().unwrap();
    let account = session.account();

    let oracle = session.oracle().unwrap();
    assert_eq!(
        oracle.get(session.executor()).unwrap(),
        (false, U256::ZERO)
    );

    oracle
        .set_price(session.executor(), account, U256::from(2_000_000))
        .unwrap();
    assert_eq!(
        oracle.get(session.executor()).unwrap(),
        (true, U256::from(2_000_000))
    );

    // A stale reading can be simulated without touching the price
    let rebound = Oracle::at(oracle.address());
    rebound
        .set_updated(session.executor(), account, false)
        .unwrap();
    assert_eq!(
        rebound.get(session.executor()).unwrap(),
        (false, U256::from(2_000_000))
    );
}

#[test]
fn test_blueprints_verify_and_round_trip() {
    init_tracing();
    let mut session = Session::new().unwrap();

    for tier in RiskTier::ALL {
        let blueprint = session.pair_blueprint(tier).unwrap();
        let contents = blueprint.contents(session.executor()).unwrap();

        assert_eq!(contents.erc_version, 0);
        assert!(contents.preamble_data.is_empty());
        assert_eq!(contents.initcode, pair_initcode(tier).unwrap());
    }
}

#[test]
fn test_blueprint_is_not_callable() {
    init_tracing();
    let mut session = Session::new().unwrap();
    let account = session.account();

    let blueprint = session.medium_pair_blueprint().unwrap();
    let receipt = session
        .executor()
        .call_contract(account, blueprint.address(), Bytes::new())
        .unwrap();

    // The container's leading invalid opcode halts direct execution
    assert!(!receipt.success);
}

#[test]
fn test_factory_references_session_blueprints() {
    init_tracing();
    let mut session = Session::new().unwrap();

    let factory = session.factory().unwrap();
    let account = session.account();

    for tier in RiskTier::ALL {
        let expected = session.pair_blueprint(tier).unwrap().address();
        let registered = factory.blueprint(session.executor(), tier).unwrap();
        assert_eq!(registered, expected);
    }
    assert_eq!(factory.fee_to(session.executor()).unwrap(), account);
}

#[test]
fn test_pair_deployment_resolves_handle_from_event() {
    init_tracing();
    let mut session = Session::new().unwrap();

    let pair = session.pair().unwrap();
    let asset = session.asset().unwrap();
    let collateral = session.collateral().unwrap();
    let oracle = session.oracle().unwrap();

    assert_ne!(pair.address(), Address::ZERO);
    assert!(session.executor().get_code(&pair.address()).unwrap().is_some());

    assert_eq!(pair.asset(session.executor()).unwrap(), asset.address());
    assert_eq!(
        pair.collateral(session.executor()).unwrap(),
        collateral.address()
    );
    assert_eq!(pair.oracle(session.executor()).unwrap(), oracle.address());
    assert_eq!(
        pair.risk_tier(session.executor()).unwrap(),
        RiskTier::Medium
    );
}

#[test]
fn test_pair_exposes_medium_tier_parameters() {
    init_tracing();
    let mut session = Session::new().unwrap();

    let pair = session.pair().unwrap();
    let params = RiskTier::Medium.parameters();

    assert_eq!(
        pair.collateralization_rate(session.executor()).unwrap(),
        U256::from(params.collateralization_rate)
    );
    assert_eq!(
        pair.liquidation_multiplier(session.executor()).unwrap(),
        U256::from(params.liquidation_multiplier)
    );
    assert_eq!(
        pair.minimum_interest_per_second(session.executor())
            .unwrap(),
        U256::from(params.minimum_interest_per_second)
    );
    assert_eq!(
        pair.maximum_interest_per_second(session.executor())
            .unwrap(),
        U256::from(params.maximum_interest_per_second)
    );
}

#[test]
fn test_fixture_access_is_idempotent() {
    init_tracing();
    let mut session = Session::new().unwrap();

    let first_pair = session.pair().unwrap();
    let second_pair = session.pair().unwrap();
    assert_eq!(first_pair.address(), second_pair.address());

    assert_eq!(
        session.collateral().unwrap().address(),
        session.collateral().unwrap().address()
    );
    assert_eq!(
        session.medium_pair_blueprint().unwrap().address(),
        session.medium_pair_blueprint().unwrap().address()
    );
    assert_eq!(
        session.factory().unwrap().address(),
        session.factory().unwrap().address()
    );

    // The cached pair is the factory's only deployment
    let factory = session.factory().unwrap();
    assert_eq!(
        factory.pair_count(session.executor()).unwrap(),
        U256::from(1)
    );
}

#[test]
fn test_pair_fixture_forces_full_dependency_graph() {
    init_tracing();
    let mut session = Session::new().unwrap();

    // A fresh session reaches the pair without any prior fixture access
    let pair = session.pair().unwrap();

    let factory = session.factory().unwrap();
    assert_eq!(
        factory.pair_at(session.executor(), U256::ZERO).unwrap(),
        pair.address()
    );
    for tier in RiskTier::ALL {
        assert!(session.pair_blueprint(tier).is_ok());
    }
}

#[test]
fn test_other_tiers_deploy_through_factory() {
    init_tracing();
    let mut session = Session::new().unwrap();

    let factory = session.factory().unwrap();
    let asset = session.asset().unwrap().address();
    let collateral = session.collateral().unwrap().address();
    let oracle = session.oracle().unwrap().address();
    let account = session.account();

    let stable = factory
        .deploy_stable_risk_pair(session.executor(), account, asset, collateral, oracle)
        .unwrap();
    let high = factory
        .deploy_high_risk_pair(session.executor(), account, asset, collateral, oracle)
        .unwrap();

    assert_eq!(
        stable.risk_tier(session.executor()).unwrap(),
        RiskTier::Stable
    );
    assert_eq!(high.risk_tier(session.executor()).unwrap(), RiskTier::High);
    assert_ne!(stable.address(), high.address());
    assert!(
        stable.collateralization_rate(session.executor()).unwrap()
            > high.collateralization_rate(session.executor()).unwrap()
    );
}

#[test]
fn test_minted_tokens_move_between_dev_accounts() {
    init_tracing();
    let mut session = Session::new().unwrap();

    let asset = session.asset().unwrap();
    let account = session.account();
    let other = session.accounts()[1];

    asset
        .mint(session.executor(), account, account, U256::from(1_000))
        .unwrap();
    asset
        .transfer(session.executor(), account, other, U256::from(400))
        .unwrap();

    assert_eq!(
        asset.balance_of(session.executor(), account).unwrap(),
        U256::from(600)
    );
    assert_eq!(
        asset.balance_of(session.executor(), other).unwrap(),
        U256::from(400)
    );
    assert_eq!(
        asset.total_supply(session.executor()).unwrap(),
        U256::from(1_000)
    );

    // Delegated spending through approve + transferFrom
    let spender = session.accounts()[2];
    asset
        .approve(session.executor(), account, spender, U256::from(250))
        .unwrap();
    asset
        .transfer_from(session.executor(), spender, account, spender, U256::from(250))
        .unwrap();
    assert_eq!(
        asset.balance_of(session.executor(), spender).unwrap(),
        U256::from(250)
    );
    assert_eq!(
        asset.balance_of(session.executor(), account).unwrap(),
        U256::from(350)
    );
}
