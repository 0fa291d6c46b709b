// Transaction executor
//
// Runs deployment and call transactions through revm and commits the
// resulting state to the cache. Calls addressed to registered native
// contracts bypass the interpreter and are dispatched in Rust.

use alloy_primitives::{Address, Bytes, B256, U256};
use anyhow::{anyhow, bail, Result};
use revm::{
    db::CacheDB,
    primitives::{AccountInfo, Env, ExecutionResult, Output, ResultAndState, TxKind, KECCAK_EMPTY},
    Database, DatabaseCommit, Evm,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::natives::{CallContext, Host, NativeContract, NativeOutcome};
use crate::storage::EvmStorage;
use crate::types::{Log, Receipt, Transaction};

/// Gas ceiling for read-only calls
const VIEW_GAS_LIMIT: u64 = 1_000_000;

/// EVM executor over cached RocksDB-backed state
pub struct EvmExecutor {
    /// Cached database for efficient state access
    cache: Arc<RwLock<CacheDB<EvmStorage>>>,
    /// Native contract instances bound to deployed addresses
    natives: HashMap<Address, Box<dyn NativeContract>>,
    /// Current block number
    block_number: u64,
    /// Current block timestamp
    block_timestamp: u64,
}

impl EvmExecutor {
    /// Create a new executor
    pub fn new(storage: EvmStorage) -> Self {
        Self {
            cache: Arc::new(RwLock::new(CacheDB::new(storage))),
            natives: HashMap::new(),
            block_number: 0,
            block_timestamp: 0,
        }
    }

    /// Set the current block context
    pub fn set_block_context(&mut self, number: u64, timestamp: u64) {
        self.block_number = number;
        self.block_timestamp = timestamp;
    }

    /// Get the current block number
    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    /// Execute a transaction and commit its state changes
    pub fn execute_and_commit(&mut self, tx: &Transaction) -> Result<Receipt> {
        debug!(from = %tx.from, to = ?tx.to, data_len = tx.data.len(), "executing transaction");

        if let Some(to) = tx.to {
            if self.natives.contains_key(&to) {
                return self.execute_native(tx, to);
            }
        }

        self.execute_evm(tx)
    }

    /// Deploy a contract, reading the deployer nonce from state
    pub fn deploy_contract(&mut self, deployer: Address, initcode: Bytes) -> Result<(Address, Receipt)> {
        let nonce = self.get_nonce(&deployer)?;
        let tx = Transaction::deploy(deployer, initcode, nonce);
        let receipt = self.execute_and_commit(&tx)?;

        if !receipt.success {
            bail!("contract deployment reverted: {:?}", receipt.output);
        }
        let contract_address = receipt
            .contract_address
            .ok_or_else(|| anyhow!("contract deployment returned no address"))?;

        Ok((contract_address, receipt))
    }

    /// Call a contract, reading the caller nonce from state
    pub fn call_contract(&mut self, caller: Address, contract: Address, data: Bytes) -> Result<Receipt> {
        let nonce = self.get_nonce(&caller)?;
        let tx = Transaction::call(caller, contract, data, nonce);
        self.execute_and_commit(&tx)
    }

    /// Read-only call: no nonce consumption, no commit for interpreted code
    pub fn view_call(&mut self, contract: Address, data: Bytes) -> Result<Bytes> {
        if let Some(mut native) = self.natives.remove(&contract) {
            let ctx = CallContext {
                caller: Address::ZERO,
                address: contract,
                gas_limit: VIEW_GAS_LIMIT,
            };
            let result = native.call(self, &ctx, &data);
            self.natives.insert(contract, native);
            return Ok(result?.output);
        }

        let mut env = Env::default();
        env.block.number = U256::from(self.block_number);
        env.block.timestamp = U256::from(self.block_timestamp);
        env.block.gas_limit = U256::from(30_000_000u64);
        env.tx.caller = Address::ZERO;
        env.tx.transact_to = TxKind::Call(contract);
        env.tx.data = data;
        env.tx.gas_limit = VIEW_GAS_LIMIT;
        env.tx.gas_price = U256::ZERO;
        env.tx.nonce = None;
        env.tx.chain_id = Some(1);

        let ResultAndState { result, .. } = {
            let mut cache = self.cache.write().unwrap();
            let mut evm = Evm::builder()
                .with_db(&mut *cache)
                .with_env(Box::new(env))
                .build();
            evm.transact()
                .map_err(|e| anyhow!("EVM execution failed: {:?}", e))?
        };

        match result {
            ExecutionResult::Success {
                output: Output::Call(bytes),
                ..
            } => Ok(bytes),
            other => Err(anyhow!("view call did not succeed: {:?}", other)),
        }
    }

    /// Deploy a native contract at the CREATE address of (deployer, nonce)
    pub fn deploy_native(
        &mut self,
        deployer: Address,
        contract: Box<dyn NativeContract>,
    ) -> Result<Address> {
        let nonce = self.get_nonce(&deployer)?;
        let address = deployer.create(nonce);

        {
            let mut cache = self.cache.write().unwrap();
            // Contract accounts start at nonce 1 per EIP-161
            cache.insert_account_info(
                address,
                AccountInfo {
                    balance: U256::ZERO,
                    nonce: 1,
                    code_hash: KECCAK_EMPTY,
                    code: None,
                },
            );
        }
        self.bump_nonce(deployer)?;
        self.natives.insert(address, contract);
        debug!(%address, %deployer, "bound native contract");

        Ok(address)
    }

    /// Whether an address dispatches natively
    pub fn is_native(&self, address: &Address) -> bool {
        self.natives.contains_key(address)
    }

    /// Get account balance
    pub fn get_balance(&self, address: &Address) -> Result<U256> {
        let mut cache = self.cache.write().unwrap();
        match cache.basic(*address)? {
            Some(info) => Ok(info.balance),
            None => Ok(U256::ZERO),
        }
    }

    /// Get account nonce
    pub fn get_nonce(&self, address: &Address) -> Result<u64> {
        let mut cache = self.cache.write().unwrap();
        match cache.basic(*address)? {
            Some(info) => Ok(info.nonce),
            None => Ok(0),
        }
    }

    /// Get storage slot value
    pub fn get_storage(&self, address: &Address, slot: &U256) -> Result<U256> {
        let mut cache = self.cache.write().unwrap();
        Ok(cache.storage(*address, *slot)?)
    }

    /// Get contract code
    pub fn get_code(&self, address: &Address) -> Result<Option<Bytes>> {
        let mut cache = self.cache.write().unwrap();
        match cache.basic(*address)? {
            Some(info) => {
                if info.code_hash == KECCAK_EMPTY {
                    Ok(None)
                } else if let Some(bytecode) = info.code {
                    Ok(Some(bytecode.original_bytes()))
                } else {
                    Ok(Some(cache.code_by_hash(info.code_hash)?.original_bytes()))
                }
            }
            None => Ok(None),
        }
    }

    /// Create an account with initial balance (genesis-style funding)
    pub fn create_account(&mut self, address: Address, balance: U256) -> Result<()> {
        let mut cache = self.cache.write().unwrap();
        cache.insert_account_info(
            address,
            AccountInfo {
                balance,
                nonce: 0,
                code_hash: KECCAK_EMPTY,
                code: None,
            },
        );
        Ok(())
    }

    fn execute_native(&mut self, tx: &Transaction, to: Address) -> Result<Receipt> {
        if tx.value != U256::ZERO {
            bail!("value transfers to native contracts are unsupported");
        }

        let mut contract = self
            .natives
            .remove(&to)
            .ok_or_else(|| anyhow!("native contract not bound at {to}"))?;
        let ctx = CallContext {
            caller: tx.from,
            address: to,
            gas_limit: tx.gas_limit,
        };
        let result = contract.call(self, &ctx, &tx.data);
        self.natives.insert(to, contract);

        let NativeOutcome {
            output,
            gas_used,
            logs,
        } = result?;
        if gas_used > tx.gas_limit {
            bail!("out of gas: used {gas_used}, limit {}", tx.gas_limit);
        }
        self.bump_nonce(tx.from)?;

        Ok(Receipt {
            transaction_hash: self.compute_tx_hash(tx),
            from: tx.from,
            to: tx.to,
            contract_address: None,
            gas_used,
            success: true,
            output,
            logs,
        })
    }

    fn execute_evm(&mut self, tx: &Transaction) -> Result<Receipt> {
        let env = self.build_env(tx);

        let ResultAndState { result, state } = {
            let mut cache = self.cache.write().unwrap();
            let mut evm = Evm::builder()
                .with_db(&mut *cache)
                .with_env(Box::new(env))
                .build();
            evm.transact()
                .map_err(|e| anyhow!("EVM execution failed: {:?}", e))?
        };

        // Reverted transactions still pay gas and consume the nonce
        {
            let mut cache = self.cache.write().unwrap();
            cache.commit(state);
        }

        Ok(self.build_receipt(tx, result))
    }

    fn build_env(&self, tx: &Transaction) -> Env {
        let mut env = Env::default();

        env.block.number = U256::from(self.block_number);
        env.block.timestamp = U256::from(self.block_timestamp);
        env.block.gas_limit = U256::from(30_000_000u64);
        env.block.basefee = tx.gas_price;

        env.tx.caller = tx.from;
        env.tx.transact_to = match tx.to {
            Some(addr) => TxKind::Call(addr),
            None => TxKind::Create,
        };
        env.tx.value = tx.value;
        env.tx.data = tx.data.clone();
        env.tx.gas_limit = tx.gas_limit;
        env.tx.gas_price = tx.gas_price;
        env.tx.nonce = Some(tx.nonce);
        env.tx.chain_id = Some(tx.chain_id);

        env
    }

    fn build_receipt(&self, tx: &Transaction, result: ExecutionResult) -> Receipt {
        let transaction_hash = self.compute_tx_hash(tx);

        match result {
            ExecutionResult::Success {
                output,
                gas_used,
                logs,
                ..
            } => {
                let logs = logs
                    .into_iter()
                    .map(|log| Log {
                        address: log.address,
                        topics: log.data.topics().to_vec(),
                        data: Bytes::from(log.data.data.to_vec()),
                    })
                    .collect();
                let (output, contract_address) = match output {
                    Output::Create(bytes, addr) => (bytes, addr),
                    Output::Call(bytes) => (bytes, None),
                };
                Receipt {
                    transaction_hash,
                    from: tx.from,
                    to: tx.to,
                    contract_address,
                    gas_used,
                    success: true,
                    output,
                    logs,
                }
            }
            ExecutionResult::Revert { output, gas_used } => Receipt {
                transaction_hash,
                from: tx.from,
                to: tx.to,
                contract_address: None,
                gas_used,
                success: false,
                output,
                logs: Vec::new(),
            },
            ExecutionResult::Halt { reason, gas_used } => Receipt {
                transaction_hash,
                from: tx.from,
                to: tx.to,
                contract_address: None,
                gas_used,
                success: false,
                output: Bytes::from(format!("halt: {reason:?}")),
                logs: Vec::new(),
            },
        }
    }

    fn bump_nonce(&mut self, address: Address) -> Result<()> {
        let mut cache = self.cache.write().unwrap();
        let mut info = cache.basic(address)?.unwrap_or_default();
        info.nonce += 1;
        cache.insert_account_info(address, info);
        Ok(())
    }

    fn compute_tx_hash(&self, tx: &Transaction) -> B256 {
        use alloy_primitives::keccak256;

        let mut data = Vec::new();
        data.extend_from_slice(tx.from.as_slice());
        if let Some(to) = tx.to {
            data.extend_from_slice(to.as_slice());
        }
        data.extend_from_slice(&tx.nonce.to_le_bytes());
        data.extend_from_slice(&tx.value.to_be_bytes::<32>());
        data.extend_from_slice(&tx.data);

        keccak256(&data)
    }
}

impl Host for EvmExecutor {
    fn code_at(&mut self, address: Address) -> Result<Bytes> {
        self.get_code(&address)?
            .ok_or_else(|| anyhow!("no code at {address}"))
    }

    fn create(&mut self, deployer: Address, initcode: Bytes) -> Result<Address> {
        // Zero gas price: contract-originated creations are not billed
        let tx = Transaction {
            from: deployer,
            to: None,
            value: U256::ZERO,
            data: initcode,
            gas_limit: 5_000_000,
            gas_price: U256::ZERO,
            nonce: self.get_nonce(&deployer)?,
            chain_id: 1,
        };
        let receipt = self.execute_evm(&tx)?;

        if !receipt.success {
            bail!("initcode execution reverted: {:?}", receipt.output);
        }
        receipt
            .contract_address
            .ok_or_else(|| anyhow!("initcode execution returned no address"))
    }

    fn bind_native(&mut self, address: Address, contract: Box<dyn NativeContract>) {
        self.natives.insert(address, contract);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::SolValue;
    use rocksdb::DB;
    use tempfile::tempdir;

    fn create_test_executor() -> (EvmExecutor, tempfile::TempDir) {
        let temp_dir = tempdir().unwrap();
        let db = DB::open_default(temp_dir.path()).unwrap();
        let storage = EvmStorage::new(Arc::new(db));
        (EvmExecutor::new(storage), temp_dir)
    }

    /// Native contract that echoes its calldata and logs each call
    struct Echo;

    impl NativeContract for Echo {
        fn call(
            &mut self,
            _host: &mut dyn Host,
            ctx: &CallContext,
            input: &Bytes,
        ) -> Result<NativeOutcome> {
            let log = Log {
                address: ctx.address,
                topics: vec![B256::repeat_byte(0xec)],
                data: input.clone(),
            };
            Ok(NativeOutcome::with_logs(input.clone(), 1_000, vec![log]))
        }
    }

    // Initcode returning a two-byte runtime: PUSH2 0x2, then the standard
    // codecopy-return preamble over the trailing payload.
    fn tiny_initcode(runtime: [u8; 2]) -> Bytes {
        let mut code = vec![0x61, 0x00, 0x02, 0x3d, 0x81, 0x60, 0x0a, 0x3d, 0x39, 0xf3];
        code.extend_from_slice(&runtime);
        Bytes::from(code)
    }

    #[test]
    fn test_executor_creation() {
        let (executor, _temp) = create_test_executor();
        assert_eq!(executor.block_number(), 0);
    }

    #[test]
    fn test_set_block_context() {
        let (mut executor, _temp) = create_test_executor();
        executor.set_block_context(42, 1234567890);
        assert_eq!(executor.block_number(), 42);
    }

    #[test]
    fn test_transfer_moves_balance() {
        let (mut executor, _temp) = create_test_executor();

        let sender = Address::repeat_byte(0x01);
        let receiver = Address::repeat_byte(0x02);
        executor
            .create_account(sender, U256::from(10_000_000))
            .unwrap();

        let tx = Transaction::transfer(sender, receiver, U256::from(1000), 0);
        let receipt = executor.execute_and_commit(&tx).unwrap();

        assert!(receipt.success);
        assert_eq!(executor.get_balance(&receiver).unwrap(), U256::from(1000));
        assert_eq!(executor.get_nonce(&sender).unwrap(), 1);
    }

    #[test]
    fn test_insufficient_balance_rejected() {
        let (mut executor, _temp) = create_test_executor();

        let sender = Address::repeat_byte(0x01);
        let receiver = Address::repeat_byte(0x02);
        executor.create_account(sender, U256::from(100)).unwrap();

        let tx = Transaction::transfer(sender, receiver, U256::from(1_000_000_000), 0);
        assert!(executor.execute_and_commit(&tx).is_err());
    }

    #[test]
    fn test_deploy_contract_stores_runtime() {
        let (mut executor, _temp) = create_test_executor();

        let deployer = Address::repeat_byte(0x01);
        executor
            .create_account(deployer, U256::from(10_000_000))
            .unwrap();

        let (address, receipt) = executor
            .deploy_contract(deployer, tiny_initcode([0xfe, 0x07]))
            .unwrap();

        assert!(receipt.success);
        assert_eq!(receipt.contract_address, Some(address));
        let code = executor.get_code(&address).unwrap().unwrap();
        assert_eq!(code.as_ref(), &[0xfe, 0x07]);
    }

    #[test]
    fn test_sequential_deploys_get_distinct_addresses() {
        let (mut executor, _temp) = create_test_executor();

        let deployer = Address::repeat_byte(0x01);
        executor
            .create_account(deployer, U256::from(100_000_000))
            .unwrap();

        let (first, _) = executor
            .deploy_contract(deployer, tiny_initcode([0xfe, 0x01]))
            .unwrap();
        let (second, _) = executor
            .deploy_contract(deployer, tiny_initcode([0xfe, 0x02]))
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(executor.get_nonce(&deployer).unwrap(), 2);
    }

    #[test]
    fn test_calling_invalid_opcode_contract_halts() {
        let (mut executor, _temp) = create_test_executor();

        let deployer = Address::repeat_byte(0x01);
        executor
            .create_account(deployer, U256::from(100_000_000))
            .unwrap();
        let (address, _) = executor
            .deploy_contract(deployer, tiny_initcode([0xfe, 0x00]))
            .unwrap();

        let receipt = executor
            .call_contract(deployer, address, Bytes::new())
            .unwrap();
        assert!(!receipt.success);
    }

    #[test]
    fn test_native_dispatch_round_trip() {
        let (mut executor, _temp) = create_test_executor();

        let deployer = Address::repeat_byte(0x01);
        executor
            .create_account(deployer, U256::from(10_000_000))
            .unwrap();

        let address = executor.deploy_native(deployer, Box::new(Echo)).unwrap();
        assert!(executor.is_native(&address));
        assert_eq!(executor.get_nonce(&deployer).unwrap(), 1);

        let payload = Bytes::from(vec![0x12, 0x34, 0x56, 0x78]);
        let receipt = executor
            .call_contract(deployer, address, payload.clone())
            .unwrap();

        assert!(receipt.success);
        assert_eq!(receipt.output, payload);
        assert_eq!(receipt.logs.len(), 1);
        assert_eq!(receipt.logs[0].address, address);
        // Native calls consume the caller nonce like interpreted ones
        assert_eq!(executor.get_nonce(&deployer).unwrap(), 2);
    }

    #[test]
    fn test_view_call_does_not_consume_nonce() {
        let (mut executor, _temp) = create_test_executor();

        let deployer = Address::repeat_byte(0x01);
        executor
            .create_account(deployer, U256::from(10_000_000))
            .unwrap();
        let address = executor.deploy_native(deployer, Box::new(Echo)).unwrap();

        let before = executor.get_nonce(&deployer).unwrap();
        let output = executor
            .view_call(address, Bytes::from(vec![0xab; 8]))
            .unwrap();
        assert_eq!(output.as_ref(), &[0xab; 8]);
        assert_eq!(executor.get_nonce(&deployer).unwrap(), before);
    }

    #[test]
    fn test_native_rejects_value_transfer() {
        let (mut executor, _temp) = create_test_executor();

        let deployer = Address::repeat_byte(0x01);
        executor
            .create_account(deployer, U256::from(10_000_000))
            .unwrap();
        let address = executor.deploy_native(deployer, Box::new(Echo)).unwrap();

        let mut tx = Transaction::call(deployer, address, Bytes::new(), 1);
        tx.value = U256::from(1);
        assert!(executor.execute_and_commit(&tx).is_err());
    }

    #[test]
    fn test_host_create_from_codeless_account() {
        let (mut executor, _temp) = create_test_executor();

        let deployer = Address::repeat_byte(0x01);
        executor
            .create_account(deployer, U256::from(10_000_000))
            .unwrap();
        let native = executor.deploy_native(deployer, Box::new(Echo)).unwrap();

        // The native account holds no balance; creation is not billed
        let created = Host::create(&mut executor, native, tiny_initcode([0xfe, 0x42])).unwrap();
        let code = executor.get_code(&created).unwrap().unwrap();
        assert_eq!(code.as_ref(), &[0xfe, 0x42]);
    }

    #[test]
    fn test_storage_slot_defaults_to_zero() {
        let (executor, _temp) = create_test_executor();

        let value = executor
            .get_storage(&Address::repeat_byte(0x01), &U256::from(7))
            .unwrap();
        assert_eq!(value, U256::ZERO);
    }

    #[test]
    fn test_tx_hash_is_deterministic() {
        let (executor, _temp) = create_test_executor();

        let tx = Transaction::transfer(
            Address::repeat_byte(0x01),
            Address::repeat_byte(0x02),
            U256::from(1000),
            0,
        );

        assert_eq!(executor.compute_tx_hash(&tx), executor.compute_tx_hash(&tx));
    }

    #[test]
    fn test_abi_value_round_trip_through_echo() {
        let (mut executor, _temp) = create_test_executor();

        let deployer = Address::repeat_byte(0x01);
        executor
            .create_account(deployer, U256::from(10_000_000))
            .unwrap();
        let address = executor.deploy_native(deployer, Box::new(Echo)).unwrap();

        let encoded = Bytes::from(U256::from(424242).abi_encode());
        let output = executor.view_call(address, encoded).unwrap();
        let decoded = U256::abi_decode(&output, true).unwrap();
        assert_eq!(decoded, U256::from(424242));
    }
}
