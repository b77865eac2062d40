//! Services coordinating sessions with the shared chat backends.

pub mod relay;

pub use relay::ChatRelay;
