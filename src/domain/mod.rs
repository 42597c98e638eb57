// Engine configuration value objects
pub mod config;

// Domain-specific error types
pub mod errors;

// Candles, symbols and the snapshot aggregate
pub mod market;

// Port interfaces
pub mod ports;

// Table consistency checks
pub mod validation;
