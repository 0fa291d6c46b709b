// Mock fungible token
//
// Standard ERC-20 surface plus an open mint, enough for deployment
// fixtures and balance accounting in tests.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, sol_data, SolCall, SolType, SolValue};
use anyhow::{anyhow, bail, Result};
use evm::{CallContext, EvmExecutor, Host, NativeContract, NativeOutcome};
use std::collections::HashMap;
use tracing::info;

use crate::native_log;

sol! {
    /// Mock ERC-20 interface
    interface IMockErc20 {
        event Transfer(address indexed sender, address indexed recipient, uint256 amount);
        event Approval(address indexed owner, address indexed spender, uint256 amount);

        function name() external view returns (string memory);
        function symbol() external view returns (string memory);
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);
        function balanceOf(address owner) external view returns (uint256);
        function transfer(address recipient, uint256 amount) external returns (bool);
        function approve(address spender, uint256 amount) external returns (bool);
        function transferFrom(address sender, address recipient, uint256 amount) external returns (bool);
        function mint(address recipient, uint256 amount) external returns (bool);
    }
}

/// Gas costs for operations
const METADATA_GAS: u64 = 3_000;
const BALANCE_GAS: u64 = 3_000;
const TRANSFER_GAS: u64 = 30_000;
const APPROVE_GAS: u64 = 20_000;
const TRANSFER_FROM_GAS: u64 = 35_000;
const MINT_GAS: u64 = 25_000;

/// Mock token state
pub struct MockErc20 {
    name: String,
    symbol: String,
    decimals: u8,
    total_supply: U256,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
}

impl MockErc20 {
    /// Create a token, minting `initial_supply` to `recipient`
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        decimals: u8,
        initial_supply: U256,
        recipient: Address,
    ) -> Self {
        let mut balances = HashMap::new();
        if initial_supply > U256::ZERO {
            balances.insert(recipient, initial_supply);
        }
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals,
            total_supply: initial_supply,
            balances,
            allowances: HashMap::new(),
        }
    }

    fn balance_of(&self, owner: Address) -> U256 {
        self.balances.get(&owner).copied().unwrap_or(U256::ZERO)
    }

    fn move_balance(&mut self, sender: Address, recipient: Address, amount: U256) -> Result<()> {
        let from_balance = self.balance_of(sender);
        if from_balance < amount {
            bail!("insufficient balance: {from_balance} < {amount}");
        }
        self.balances.insert(sender, from_balance - amount);
        let to_balance = self.balance_of(recipient);
        self.balances.insert(recipient, to_balance + amount);
        Ok(())
    }

    fn mint_to(&mut self, recipient: Address, amount: U256) -> Result<()> {
        self.total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or_else(|| anyhow!("total supply overflow"))?;
        let balance = self.balance_of(recipient);
        self.balances.insert(recipient, balance + amount);
        Ok(())
    }

    fn spend_allowance(&mut self, owner: Address, spender: Address, amount: U256) -> Result<()> {
        let key = (owner, spender);
        let allowance = self.allowances.get(&key).copied().unwrap_or(U256::ZERO);
        if allowance < amount {
            bail!("insufficient allowance: {allowance} < {amount}");
        }
        self.allowances.insert(key, allowance - amount);
        Ok(())
    }
}

impl NativeContract for MockErc20 {
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
            sel if sel == IMockErc20::nameCall::SELECTOR => Ok(NativeOutcome::new(
                Bytes::from(self.name.clone().abi_encode()),
                METADATA_GAS,
            )),

            sel if sel == IMockErc20::symbolCall::SELECTOR => Ok(NativeOutcome::new(
                Bytes::from(self.symbol.clone().abi_encode()),
                METADATA_GAS,
            )),

            sel if sel == IMockErc20::decimalsCall::SELECTOR => Ok(NativeOutcome::new(
                Bytes::from(sol_data::Uint::<8>::abi_encode(&self.decimals)),
                METADATA_GAS,
            )),

            sel if sel == IMockErc20::totalSupplyCall::SELECTOR => Ok(NativeOutcome::new(
                Bytes::from(self.total_supply.abi_encode()),
                METADATA_GAS,
            )),

            sel if sel == IMockErc20::balanceOfCall::SELECTOR => {
                let call = IMockErc20::balanceOfCall::abi_decode(input, false)?;
                Ok(NativeOutcome::new(
                    Bytes::from(self.balance_of(call.owner).abi_encode()),
                    BALANCE_GAS,
                ))
            }

            sel if sel == IMockErc20::transferCall::SELECTOR => {
                let call = IMockErc20::transferCall::abi_decode(input, false)?;
                self.move_balance(ctx.caller, call.recipient, call.amount)?;
                let log = native_log(
                    ctx.address,
                    &IMockErc20::Transfer {
                        sender: ctx.caller,
                        recipient: call.recipient,
                        amount: call.amount,
                    },
                );
                Ok(NativeOutcome::with_logs(
                    Bytes::from(true.abi_encode()),
                    TRANSFER_GAS,
                    vec![log],
                ))
            }

            sel if sel == IMockErc20::approveCall::SELECTOR => {
                let call = IMockErc20::approveCall::abi_decode(input, false)?;
                self.allowances
                    .insert((ctx.caller, call.spender), call.amount);
                let log = native_log(
                    ctx.address,
                    &IMockErc20::Approval {
                        owner: ctx.caller,
                        spender: call.spender,
                        amount: call.amount,
                    },
                );
                Ok(NativeOutcome::with_logs(
                    Bytes::from(true.abi_encode()),
                    APPROVE_GAS,
                    vec![log],
                ))
            }

            sel if sel == IMockErc20::transferFromCall::SELECTOR => {
                let call = IMockErc20::transferFromCall::abi_decode(input, false)?;
                self.spend_allowance(call.sender, ctx.caller, call.amount)?;
                self.move_balance(call.sender, call.recipient, call.amount)?;
                let log = native_log(
                    ctx.address,
                    &IMockErc20::Transfer {
                        sender: call.sender,
                        recipient: call.recipient,
                        amount: call.amount,
                    },
                );
                Ok(NativeOutcome::with_logs(
                    Bytes::from(true.abi_encode()),
                    TRANSFER_FROM_GAS,
                    vec![log],
                ))
            }

            sel if sel == IMockErc20::mintCall::SELECTOR => {
                let call = IMockErc20::mintCall::abi_decode(input, false)?;
                self.mint_to(call.recipient, call.amount)?;
                let log = native_log(
                    ctx.address,
                    &IMockErc20::Transfer {
                        sender: Address::ZERO,
                        recipient: call.recipient,
                        amount: call.amount,
                    },
                );
                Ok(NativeOutcome::with_logs(
                    Bytes::from(true.abi_encode()),
                    MINT_GAS,
                    vec![log],
                ))
            }

            _ => Err(anyhow!("unknown function selector: {:?}", selector)),
        }
    }
}

/// Handle to a deployed mock token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Erc20 {
    address: Address,
}

impl Erc20 {
    /// Deploy a mock token
    pub fn deploy(
        executor: &mut EvmExecutor,
        deployer: Address,
        name: &str,
        symbol: &str,
        decimals: u8,
        initial_supply: U256,
    ) -> Result<Self> {
        let token = MockErc20::new(name, symbol, decimals, initial_supply, deployer);
        let address = executor.deploy_native(deployer, Box::new(token))?;
        info!(%address, name, symbol, "deployed mock erc20");
        Ok(Self { address })
    }

    /// Bind a handle to a deployed token address
    pub fn at(address: Address) -> Self {
        Self { address }
    }

    /// The token's address
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn name(&self, executor: &mut EvmExecutor) -> Result<String> {
        let output = executor.view_call(self.address, IMockErc20::nameCall {}.abi_encode().into())?;
        Ok(String::abi_decode(&output, true)?)
    }

    pub fn symbol(&self, executor: &mut EvmExecutor) -> Result<String> {
        let output =
            executor.view_call(self.address, IMockErc20::symbolCall {}.abi_encode().into())?;
        Ok(String::abi_decode(&output, true)?)
    }

    pub fn decimals(&self, executor: &mut EvmExecutor) -> Result<u8> {
        let output =
            executor.view_call(self.address, IMockErc20::decimalsCall {}.abi_encode().into())?;
        Ok(sol_data::Uint::<8>::abi_decode(&output, true)?)
    }

    pub fn total_supply(&self, executor: &mut EvmExecutor) -> Result<U256> {
        let output = executor.view_call(
            self.address,
            IMockErc20::totalSupplyCall {}.abi_encode().into(),
        )?;
        Ok(U256::abi_decode(&output, true)?)
    }

    pub fn balance_of(&self, executor: &mut EvmExecutor, owner: Address) -> Result<U256> {
        let output = executor.view_call(
            self.address,
            IMockErc20::balanceOfCall { owner }.abi_encode().into(),
        )?;
        Ok(U256::abi_decode(&output, true)?)
    }

    pub fn transfer(
        &self,
        executor: &mut EvmExecutor,
        caller: Address,
        recipient: Address,
        amount: U256,
    ) -> Result<bool> {
        let data = IMockErc20::transferCall { recipient, amount }.abi_encode();
        let receipt = executor.call_contract(caller, self.address, data.into())?;
        Ok(bool::abi_decode(&receipt.output, true)?)
    }

    pub fn approve(
        &self,
        executor: &mut EvmExecutor,
        caller: Address,
        spender: Address,
        amount: U256,
    ) -> Result<bool> {
        let data = IMockErc20::approveCall { spender, amount }.abi_encode();
        let receipt = executor.call_contract(caller, self.address, data.into())?;
        Ok(bool::abi_decode(&receipt.output, true)?)
    }

    pub fn transfer_from(
        &self,
        executor: &mut EvmExecutor,
        caller: Address,
        sender: Address,
        recipient: Address,
        amount: U256,
    ) -> Result<bool> {
        let data = IMockErc20::transferFromCall {
            sender,
            recipient,
            amount,
        }
        .abi_encode();
        let receipt = executor.call_contract(caller, self.address, data.into())?;
        Ok(bool::abi_decode(&receipt.output, true)?)
    }

    pub fn mint(
        &self,
        executor: &mut EvmExecutor,
        caller: Address,
        recipient: Address,
        amount: U256,
    ) -> Result<bool> {
        let data = IMockErc20::mintCall { recipient, amount }.abi_encode();
        let receipt = executor.call_contract(caller, self.address, data.into())?;
        Ok(bool::abi_decode(&receipt.output, true)?)
    }
}
