//! State module for per-record limits and per-host failure tracking
//!
//! # Components
//!
//! - `Budget`: per-record fetch ceiling and wall-clock deadline
//! - `HostCircuitBreaker`: process-wide per-host failure state machine

mod breaker;
mod budget;

// Re-export main types
pub use breaker::{CircuitState, HostCircuitBreaker, HostFailureState};
pub use budget::{throttle, Budget};
