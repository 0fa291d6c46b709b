/// Test data generators

use alloy_primitives::Address;
use rand::Rng;

/// Generate random bytes
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen()).collect()
}

/// Generate a random account address
pub fn random_address() -> Address {
    Address::from_slice(&random_bytes(20))
}

/// Generate non-empty random initcode up to `max_len` bytes
pub fn random_initcode(max_len: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let len = rng.gen_range(1..=max_len.max(1));
    random_bytes(len)
}
