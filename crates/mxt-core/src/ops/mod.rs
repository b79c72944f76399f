//! Object level operations
//!
//! Every operation takes the device transport and the info block read when
//! the device was opened. They are building blocks for the commands; none of
//! them prints anything, progress is reported through [`Progress`].

pub mod command_processor;
pub mod debug_dump;
pub mod golden;
pub mod messages;
pub mod serial_data;

pub use command_processor::{backup, calibrate, reset};
pub use debug_dump::debug_dump;
pub use golden::store_golden_references;
pub use messages::{read_message, Message};
pub use self_test::run_self_tests;
pub use serial_data::upload_serial_data;

/// Delay between two polls of a device register or the message queue
pub const POLL_INTERVAL_MS: u32 = 10;

/// Progress callbacks for long running operations
///
/// The CLI implements this with progress bars; the default methods do
/// nothing.
pub trait Progress {
    /// Work of `total` units called `what` is starting
    fn start(&mut self, _total: usize, _what: &'static str) {}

    /// `done` units are complete
    fn advance(&mut self, _done: usize) {}

    /// The operation finished
    fn finish(&mut self) {}
}

/// Progress reporter that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {}
