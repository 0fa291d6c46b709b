// ERC-5202 blueprints
//
// A blueprint is a deployed, non-executable container holding another
// contract's initcode behind a preamble, so a factory can instantiate
// that contract repeatedly by reading one address instead of embedding
// the bytecode. Construction and verification follow the ERC-5202 wire
// format; deployment executes the real deploy bytecode through revm.

use alloy_primitives::{Address, Bytes};
use anyhow::{anyhow, bail, Result};
use evm::EvmExecutor;
use thiserror::Error;
use tracing::info;

/// ERC-5202 magic bytes. The leading 0xFE keeps the container
/// non-executable: calling a blueprint halts on the invalid opcode.
pub const BLUEPRINT_MAGIC: [u8; 2] = [0xfe, 0x71];

/// Version-0 container preamble with an empty data section
const CONTAINER_PREAMBLE: [u8; 3] = [0xfe, 0x71, 0x00];

/// Deploy preamble: PUSH2 <len>, RETURNDATASIZE, DUP2, PUSH1 0x0a,
/// RETURNDATASIZE, CODECOPY, RETURN — copies the trailing payload to
/// memory and returns it as the account's code.
pub const DEPLOY_PREAMBLE_LEN: usize = 10;
const DEPLOY_PREAMBLE_TAIL: [u8; 7] = [0x3d, 0x81, 0x60, 0x0a, 0x3d, 0x39, 0xf3];

/// Malformed blueprint bytes
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlueprintError {
    #[error("payload of {len} bytes exceeds the u16 deploy length field")]
    PayloadTooLarge { len: usize },
    #[error("deploy bytecode of {len} bytes is shorter than the preamble")]
    TruncatedDeployBytecode { len: usize },
    #[error("deploy preamble opcodes are malformed: 0x{0}")]
    MalformedDeployPreamble(String),
    #[error("deploy preamble declares {declared} payload bytes but {actual} follow")]
    PayloadLengthMismatch { declared: usize, actual: usize },
    #[error("expected magic 0xfe71, found 0x{0}")]
    BadMagic(String),
    #[error("blueprint code ends before the version byte")]
    MissingVersionByte,
    #[error("length-encoding bits 0b11 are reserved")]
    ReservedLengthEncoding,
    #[error("data section declares {expected} more bytes but only {available} remain")]
    TruncatedDataSection { expected: usize, available: usize },
    #[error("blueprint contains no initcode")]
    EmptyInitcode,
}

/// Parsed ERC-5202 container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlueprintContents {
    /// ERC version from the high six bits of the version byte
    pub erc_version: u8,
    /// Optional preamble data section
    pub preamble_data: Bytes,
    /// The embedded initcode
    pub initcode: Bytes,
}

/// Wrap arbitrary runtime code in the minimal deploy preamble, producing
/// initcode that stores `runtime` unmodified as account code
pub fn initcode_for_runtime(runtime: &[u8]) -> Result<Bytes, BlueprintError> {
    let len = u16::try_from(runtime.len())
        .map_err(|_| BlueprintError::PayloadTooLarge { len: runtime.len() })?;

    let mut out = Vec::with_capacity(DEPLOY_PREAMBLE_LEN + runtime.len());
    out.push(0x61);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&DEPLOY_PREAMBLE_TAIL);
    out.extend_from_slice(runtime);
    Ok(Bytes::from(out))
}

/// Build deploy bytecode that stores `initcode` as a version-0 ERC-5202
/// blueprint container
pub fn construct_blueprint_deploy_bytecode(initcode: &[u8]) -> Result<Bytes, BlueprintError> {
    let mut container = Vec::with_capacity(CONTAINER_PREAMBLE.len() + initcode.len());
    container.extend_from_slice(&CONTAINER_PREAMBLE);
    container.extend_from_slice(initcode);
    initcode_for_runtime(&container)
}

/// Structural check of blueprint deploy bytecode; returns the payload the
/// preamble will store on-chain
pub fn verify_blueprint_deploy_preamble(deploy_bytecode: &[u8]) -> Result<&[u8], BlueprintError> {
    if deploy_bytecode.len() < DEPLOY_PREAMBLE_LEN {
        return Err(BlueprintError::TruncatedDeployBytecode {
            len: deploy_bytecode.len(),
        });
    }
    if deploy_bytecode[0] != 0x61 || deploy_bytecode[3..DEPLOY_PREAMBLE_LEN] != DEPLOY_PREAMBLE_TAIL
    {
        return Err(BlueprintError::MalformedDeployPreamble(hex::encode(
            &deploy_bytecode[..DEPLOY_PREAMBLE_LEN],
        )));
    }

    let declared = usize::from(u16::from_be_bytes([deploy_bytecode[1], deploy_bytecode[2]]));
    let actual = deploy_bytecode.len() - DEPLOY_PREAMBLE_LEN;
    if declared != actual {
        return Err(BlueprintError::PayloadLengthMismatch { declared, actual });
    }

    Ok(&deploy_bytecode[DEPLOY_PREAMBLE_LEN..])
}

/// Parse deployed account code as an ERC-5202 blueprint container
pub fn verify_eip5202_blueprint(code: &[u8]) -> Result<BlueprintContents, BlueprintError> {
    if code.len() < BLUEPRINT_MAGIC.len() || code[..2] != BLUEPRINT_MAGIC {
        return Err(BlueprintError::BadMagic(hex::encode(
            &code[..code.len().min(2)],
        )));
    }
    let version_byte = *code.get(2).ok_or(BlueprintError::MissingVersionByte)?;
    let erc_version = (version_byte & 0b1111_1100) >> 2;
    let n_length_bytes = usize::from(version_byte & 0b11);
    if n_length_bytes == 0b11 {
        return Err(BlueprintError::ReservedLengthEncoding);
    }

    let mut offset = 3;
    let data_length = match code.get(offset..offset + n_length_bytes) {
        Some(bytes) => {
            offset += n_length_bytes;
            bytes
                .iter()
                .fold(0usize, |acc, &byte| (acc << 8) | usize::from(byte))
        }
        None => {
            return Err(BlueprintError::TruncatedDataSection {
                expected: n_length_bytes,
                available: code.len() - offset,
            })
        }
    };
    let preamble_data = code
        .get(offset..offset + data_length)
        .ok_or(BlueprintError::TruncatedDataSection {
            expected: data_length,
            available: code.len() - offset,
        })?;
    offset += data_length;

    let initcode = &code[offset..];
    if initcode.is_empty() {
        return Err(BlueprintError::EmptyInitcode);
    }

    Ok(BlueprintContents {
        erc_version,
        preamble_data: Bytes::copy_from_slice(preamble_data),
        initcode: Bytes::copy_from_slice(initcode),
    })
}

/// Handle to a deployed blueprint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blueprint {
    address: Address,
}

impl Blueprint {
    /// Bind a handle to a deployed blueprint address
    pub fn at(address: Address) -> Self {
        Self { address }
    }

    /// The blueprint's address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Read and verify the stored container
    pub fn contents(&self, executor: &mut EvmExecutor) -> Result<BlueprintContents> {
        let code = executor
            .get_code(&self.address)?
            .ok_or_else(|| anyhow!("no code at blueprint {}", self.address))?;
        Ok(verify_eip5202_blueprint(&code)?)
    }
}

/// Execute blueprint deploy bytecode and check the stored code matches the
/// payload the preamble declared
pub fn deploy_blueprint(
    executor: &mut EvmExecutor,
    account: Address,
    deploy_bytecode: &[u8],
) -> Result<Blueprint> {
    let expected = verify_blueprint_deploy_preamble(deploy_bytecode)?.to_vec();

    let (address, _receipt) =
        executor.deploy_contract(account, Bytes::copy_from_slice(deploy_bytecode))?;
    let code = executor
        .get_code(&address)?
        .ok_or_else(|| anyhow!("blueprint at {address} stored no code"))?;
    if code.as_ref() != expected.as_slice() {
        bail!("blueprint at {address} stored code differing from its deploy payload");
    }

    info!(%address, bytes = code.len(), "deployed blueprint");
    Ok(Blueprint::at(address))
}
