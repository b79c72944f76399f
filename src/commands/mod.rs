//! Command implementations that manage their own device connections
//!
//! Every other command runs on a device opened by the lifecycle gate and is
//! dispatched by the orchestrator.

pub mod flash;
