//! # System Interaction Layer
//!
//! The boundary between the resolver and the machine it runs on.
//!
//! ## Modules
//!
//! - **`host`**: Captures the platform name and the environment variables that
//!   override conditions are evaluated against, so resolution itself stays pure.

pub mod host;
