//! # Communications interface crate.
//!
//! Provides the network plumbing and the message protocol spoken between the
//! steering executable and the driving simulator.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Network module
pub mod net;

/// Simulator event protocol
pub mod sim;
