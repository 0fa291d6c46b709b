/// Testing utilities for Cogwork
///
/// Provides:
/// - Test data generators
/// - Executor scaffolding over a scratch database
/// - Tracing initialization for test runs

pub mod env;
pub mod generators;

pub use env::*;
pub use generators::*;
