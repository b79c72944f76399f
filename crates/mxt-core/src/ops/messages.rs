//! Message processor (T5)
//!
//! Reading T5 pops one message off the device queue. The first byte is the
//! report id, which the info block maps back to the object instance that
//! generated the message.

use super::POLL_INTERVAL_MS;
use crate::device::RegisterAccess;
use crate::error::{Error, Result};
use crate::info::{InfoBlock, REPORT_ID_INVALID};
use crate::objects::types;

/// One message from the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Report id
    pub report_id: u8,
    /// Type of the object that sent the message
    pub object_type: u16,
    /// Instance of that object
    pub instance: u8,
    /// Message payload without the report id
    pub payload: Vec<u8>,
}

impl Message {
    /// First payload byte, usually the status
    pub fn status(&self) -> u8 {
        self.payload.first().copied().unwrap_or(0)
    }

    /// Raw message bytes including the report id
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.payload.len() + 1);
        bytes.push(self.report_id);
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}

/// Read one message, `None` when the queue is empty
pub fn read_message<D: RegisterAccess + ?Sized>(
    device: &mut D,
    info: &InfoBlock,
) -> Result<Option<Message>> {
    let t5 = info.require(types::GEN_MESSAGEPROCESSOR_T5, 0)?;
    let mut buf = vec![0u8; usize::from(t5.size)];
    device.read_register(t5.base, &mut buf)?;

    let report_id = buf[0];
    if report_id == REPORT_ID_INVALID || report_id == 0 {
        return Ok(None);
    }

    let Some((object_type, instance)) = info.report_id_owner(report_id) else {
        log::warn!("Message with unknown report id {}", report_id);
        return Ok(None);
    };

    let message = Message {
        report_id,
        object_type,
        instance,
        payload: buf[1..].to_vec(),
    };
    log::trace!(
        "T{} instance {} message: {:02X?}",
        message.object_type,
        message.instance,
        message.payload
    );
    Ok(Some(message))
}

/// Poll the message queue until a message from `object_type` arrives
///
/// Messages from other objects are logged and dropped. Gives up after
/// `timeout_ms`.
pub fn wait_for_message<D: RegisterAccess + ?Sized>(
    device: &mut D,
    info: &InfoBlock,
    object_type: u16,
    timeout_ms: u32,
    what: &'static str,
) -> Result<Message> {
    let mut waited = 0;
    loop {
        while let Some(message) = read_message(device, info)? {
            if message.object_type == object_type {
                return Ok(message);
            }
            log::debug!(
                "Ignoring message from T{} while waiting for T{}",
                message.object_type,
                object_type
            );
        }

        if waited >= timeout_ms {
            return Err(Error::Timeout(what));
        }
        device.delay_ms(POLL_INTERVAL_MS);
        waited += POLL_INTERVAL_MS;
    }
}
