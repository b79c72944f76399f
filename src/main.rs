//! mxt-app - operator tool for maXTouch touch controllers
//!
//! One invocation runs one command against one device: register reads and
//! writes, self test, golden references, calibration, backup and reset,
//! configuration load/save, T37 diagnostic dumps, T68 serial data upload,
//! the TCP bridge, or a firmware update through the bootloader. Without a
//! command an interactive menu runs.
//!
//! # Architecture
//!
//! The binary only parses the command line and talks to the terminal. The
//! command model, addressing and every device protocol live in `mxt-core`;
//! opening and releasing the device is `mxt-device`'s job, which also picks
//! the bus backend (`MXT_APP_BACKEND`).

mod app;
mod cli;
mod commands;
mod menu;
mod progress;
mod session;

use std::process::ExitCode;

fn main() -> ExitCode {
    // Let every record through; -v raises the max level after parsing
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("trace")).init();
    if std::env::var_os("RUST_LOG").is_none() {
        log::set_max_level(log::LevelFilter::Info);
    }

    ExitCode::from(app::run(std::env::args_os(), mxt_device::connector_from_env))
}
