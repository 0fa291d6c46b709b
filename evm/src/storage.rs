// Storage adapter
//
// Bridges RocksDB to revm's Database traits. Contract code is indexed both
// by account address and by code hash so code_by_hash lookups resolve.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use anyhow::Result;
use revm::{
    primitives::{AccountInfo, Bytecode},
    Database, DatabaseRef,
};
use rocksdb::DB;
use std::sync::Arc;

use crate::types::{Account, KECCAK_EMPTY};

const ACCOUNT_PREFIX: &[u8] = b"acct/";
const STORAGE_PREFIX: &[u8] = b"slot/";
const CODE_PREFIX: &[u8] = b"code/";
const CODE_HASH_PREFIX: &[u8] = b"codehash/";
const BLOCK_HASH_PREFIX: &[u8] = b"blockhash/";

fn account_key(address: &Address) -> Vec<u8> {
    [ACCOUNT_PREFIX, address.as_slice()].concat()
}

fn storage_key(address: &Address, slot: &U256) -> Vec<u8> {
    [STORAGE_PREFIX, address.as_slice(), &slot.to_be_bytes::<32>()].concat()
}

fn code_key(address: &Address) -> Vec<u8> {
    [CODE_PREFIX, address.as_slice()].concat()
}

fn code_hash_key(hash: &B256) -> Vec<u8> {
    [CODE_HASH_PREFIX, hash.as_slice()].concat()
}

fn block_hash_key(number: u64) -> Vec<u8> {
    [BLOCK_HASH_PREFIX, &number.to_be_bytes()[..]].concat()
}

/// EVM state backed by RocksDB
#[derive(Clone)]
pub struct EvmStorage {
    db: Arc<DB>,
}

impl EvmStorage {
    /// Create a new storage instance over an open database
    pub fn new(db: Arc<DB>) -> Self {
        Self { db }
    }

    /// Get account information
    pub fn get_account(&self, address: &Address) -> Result<Option<Account>> {
        match self.db.get(account_key(address))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Store account information
    pub fn set_account(&self, address: &Address, account: &Account) -> Result<()> {
        self.db
            .put(account_key(address), bincode::serialize(account)?)?;
        Ok(())
    }

    /// Get storage slot value (zero when unset)
    pub fn get_storage(&self, address: &Address, slot: &U256) -> Result<U256> {
        match self.db.get(storage_key(address, slot))? {
            Some(bytes) if bytes.len() == 32 => {
                let mut word = [0u8; 32];
                word.copy_from_slice(&bytes);
                Ok(U256::from_be_bytes(word))
            }
            _ => Ok(U256::ZERO),
        }
    }

    /// Set storage slot value
    pub fn set_storage(&self, address: &Address, slot: &U256, value: &U256) -> Result<()> {
        self.db
            .put(storage_key(address, slot), value.to_be_bytes::<32>())?;
        Ok(())
    }

    /// Get contract code by account address
    pub fn get_code(&self, address: &Address) -> Result<Option<Bytes>> {
        match self.db.get(code_key(address))? {
            Some(bytes) => Ok(Some(Bytes::from(bytes))),
            None => Ok(None),
        }
    }

    /// Get contract code by code hash
    pub fn get_code_by_hash(&self, hash: &B256) -> Result<Option<Bytes>> {
        match self.db.get(code_hash_key(hash))? {
            Some(bytes) => Ok(Some(Bytes::from(bytes))),
            None => Ok(None),
        }
    }

    /// Store contract code under both the address and the code hash
    pub fn set_code(&self, address: &Address, code: &Bytes) -> Result<()> {
        let hash = keccak256(code);
        self.db.put(code_key(address), code.as_ref())?;
        self.db.put(code_hash_key(&hash), code.as_ref())?;
        Ok(())
    }

    /// Get block hash by number
    pub fn get_block_hash(&self, number: u64) -> Result<Option<B256>> {
        match self.db.get(block_hash_key(number))? {
            Some(bytes) if bytes.len() == 32 => Ok(Some(B256::from_slice(&bytes))),
            _ => Ok(None),
        }
    }

    /// Store block hash
    pub fn set_block_hash(&self, number: u64, hash: &B256) -> Result<()> {
        self.db.put(block_hash_key(number), hash.as_slice())?;
        Ok(())
    }

    fn account_info(&self, address: &Address) -> Result<Option<AccountInfo>> {
        match self.get_account(address)? {
            Some(account) => {
                let code = if account.code_hash == KECCAK_EMPTY {
                    None
                } else {
                    self.get_code(address)?
                        .map(|bytes| Bytecode::new_raw(bytes))
                };
                Ok(Some(AccountInfo {
                    balance: account.balance,
                    nonce: account.nonce,
                    code_hash: account.code_hash,
                    code,
                }))
            }
            None => Ok(None),
        }
    }
}

impl Database for EvmStorage {
    type Error = anyhow::Error;

    fn basic(&mut self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        self.account_info(&address)
    }

    fn code_by_hash(&mut self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        match self.get_code_by_hash(&code_hash)? {
            Some(bytes) => Ok(Bytecode::new_raw(bytes)),
            None => Ok(Bytecode::default()),
        }
    }

    fn storage(&mut self, address: Address, index: U256) -> Result<U256, Self::Error> {
        self.get_storage(&address, &index)
    }

    fn block_hash(&mut self, number: u64) -> Result<B256, Self::Error> {
        Ok(self.get_block_hash(number)?.unwrap_or(B256::ZERO))
    }
}

impl DatabaseRef for EvmStorage {
    type Error = anyhow::Error;

    fn basic_ref(&self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        self.account_info(&address)
    }

    fn code_by_hash_ref(&self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        match self.get_code_by_hash(&code_hash)? {
            Some(bytes) => Ok(Bytecode::new_raw(bytes)),
            None => Ok(Bytecode::default()),
        }
    }

    fn storage_ref(&self, address: Address, index: U256) -> Result<U256, Self::Error> {
        self.get_storage(&address, &index)
    }

    fn block_hash_ref(&self, number: u64) -> Result<B256, Self::Error> {
        Ok(self.get_block_hash(number)?.unwrap_or(B256::ZERO))
    }
}
