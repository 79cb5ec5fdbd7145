//! # Steering library.
//!
//! This library allows the steering executable, its benchmarks and other crates in the workspace
//! to access the controller and tuning modules.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// PID controller - converts the cross track error into a steering correction
pub mod pid_ctrl;

/// Twiddle - coordinate descent search over the controller gains
pub mod twiddle;

/// Steering control module - drives the vehicle and runs the tuning trials
pub mod steer_ctrl;

/// Simulation server - exchanges telemetry and commands with the driving simulator
pub mod sim_server;

/// Executable parameters
pub mod params;
