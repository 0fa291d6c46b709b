// Core types for transaction execution
//
// Transactions, receipts, and persisted account records

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// EVM transaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    /// Sender address
    pub from: Address,
    /// Recipient address (None for contract creation)
    pub to: Option<Address>,
    /// Transaction value in wei
    pub value: U256,
    /// Calldata, or initcode for creations
    pub data: Bytes,
    /// Gas limit
    pub gas_limit: u64,
    /// Gas price
    pub gas_price: U256,
    /// Transaction nonce
    pub nonce: u64,
    /// Chain ID for replay protection
    pub chain_id: u64,
}

impl Transaction {
    /// Create a simple ETH transfer
    pub fn transfer(from: Address, to: Address, value: U256, nonce: u64) -> Self {
        Self {
            from,
            to: Some(to),
            value,
            data: Bytes::new(),
            gas_limit: 21_000,
            gas_price: U256::from(1u64),
            nonce,
            chain_id: 1,
        }
    }

    /// Create a contract deployment transaction
    pub fn deploy(from: Address, initcode: Bytes, nonce: u64) -> Self {
        Self {
            from,
            to: None,
            value: U256::ZERO,
            data: initcode,
            gas_limit: 5_000_000,
            gas_price: U256::from(1u64),
            nonce,
            chain_id: 1,
        }
    }

    /// Create a contract call transaction
    pub fn call(from: Address, to: Address, data: Bytes, nonce: u64) -> Self {
        Self {
            from,
            to: Some(to),
            value: U256::ZERO,
            data,
            gas_limit: 1_000_000,
            gas_price: U256::from(1u64),
            nonce,
            chain_id: 1,
        }
    }
}

/// Persisted account record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    /// Account nonce
    pub nonce: u64,
    /// Account balance in wei
    pub balance: U256,
    /// Code hash (KECCAK_EMPTY for EOAs)
    pub code_hash: B256,
    /// Storage root (KECCAK_EMPTY for empty storage)
    pub storage_root: B256,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            nonce: 0,
            balance: U256::ZERO,
            code_hash: KECCAK_EMPTY,
            storage_root: KECCAK_EMPTY,
        }
    }
}

impl Account {
    /// Create a new account with balance
    pub fn with_balance(balance: U256) -> Self {
        Self {
            balance,
            ..Default::default()
        }
    }

    /// Create a contract account
    pub fn with_code(balance: U256, code_hash: B256) -> Self {
        Self {
            balance,
            code_hash,
            ..Default::default()
        }
    }
}

/// Transaction receipt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    /// Transaction hash
    pub transaction_hash: B256,
    /// Sender address
    pub from: Address,
    /// Recipient address (None for contract creation)
    pub to: Option<Address>,
    /// Created contract address (for deployments)
    pub contract_address: Option<Address>,
    /// Gas used
    pub gas_used: u64,
    /// Success status
    pub success: bool,
    /// Output data (return value, or revert payload on failure)
    pub output: Bytes,
    /// Event logs emitted during execution
    pub logs: Vec<Log>,
}

impl Receipt {
    /// Logs emitted by the given contract
    pub fn logs_from(&self, address: Address) -> impl Iterator<Item = &Log> {
        self.logs.iter().filter(move |log| log.address == address)
    }
}

/// EVM event log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Log {
    /// Contract address that emitted the log
    pub address: Address,
    /// Log topics
    pub topics: Vec<B256>,
    /// Log data
    pub data: Bytes,
}

// keccak256 of the empty byte string
pub const KECCAK_EMPTY: B256 = B256::new([
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03, 0xc0,
    0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
]);
