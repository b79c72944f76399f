//! Diagnostic debug (T37) capture
//!
//! A capture is started by writing the diagnostic mode to the T6 diagnostic
//! register. T37 then exposes one page of the frame at a time; page-up moves
//! to the next page. Each node is a signed 16 bit little endian value,
//! ordered by X then Y.

use super::command_processor::write_command;
use super::{Progress, POLL_INTERVAL_MS};
use crate::device::RegisterAccess;
use crate::error::{Error, Result};
use crate::info::InfoBlock;
use crate::objects::{t37, t6, types};
use crate::params::DiagMode;
use std::io::Write;

/// Time the device may take to fill a page
const PAGE_TIMEOUT_MS: u32 = 1000;

fn mode_command(mode: DiagMode) -> u8 {
    match mode {
        DiagMode::Deltas => t6::DIAG_DELTAS,
        DiagMode::References => t6::DIAG_REFS,
    }
}

/// Wait until T37 shows `page` of `mode` and return the page
fn read_page<D: RegisterAccess + ?Sized>(
    device: &mut D,
    base: u16,
    size: u16,
    mode: u8,
    page: u8,
) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; usize::from(size)];
    let mut waited = 0;
    loop {
        device.read_register(base, &mut buf)?;
        if buf[t37::MODE as usize] == mode && buf[t37::PAGE as usize] == page {
            buf.drain(..t37::DATA as usize);
            return Ok(buf);
        }
        if waited >= PAGE_TIMEOUT_MS {
            return Err(Error::Timeout("T37 page"));
        }
        device.delay_ms(POLL_INTERVAL_MS);
        waited += POLL_INTERVAL_MS;
    }
}

/// Capture one frame of `nodes` values
pub fn capture_frame<D: RegisterAccess + ?Sized>(
    device: &mut D,
    info: &InfoBlock,
    mode: DiagMode,
    nodes: usize,
) -> Result<Vec<i16>> {
    let t37 = info.require(types::DEBUG_DIAGNOSTIC_T37, 0)?;
    let per_page = usize::from(t37.size).saturating_sub(t37::DATA as usize) / 2;
    if per_page == 0 {
        return Err(Error::InfoBlock(format!(
            "T37 too small ({} bytes)",
            t37.size
        )));
    }

    let command = mode_command(mode);
    write_command(device, info, t6::DIAGNOSTIC, command)?;

    let mut values = Vec::with_capacity(nodes);
    let mut page = 0u8;
    loop {
        let data = read_page(device, t37.base, t37.size, command, page)?;
        let remaining = nodes - values.len();
        values.extend(
            data.chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]]))
                .take(remaining),
        );
        if values.len() >= nodes {
            break;
        }
        write_command(device, info, t6::DIAGNOSTIC, t6::DIAG_PAGE_UP)?;
        page = page
            .checked_add(1)
            .ok_or_else(|| Error::InfoBlock("T37 frame spans too many pages".into()))?;
    }
    Ok(values)
}

/// Capture `frames` frames and write them as CSV
///
/// The first line names the nodes (`X0Y0,X0Y1,...`), then one line per
/// frame starting with the frame number.
pub fn debug_dump<D: RegisterAccess + ?Sized, W: Write>(
    device: &mut D,
    info: &InfoBlock,
    mode: DiagMode,
    frames: u16,
    out: &mut W,
    progress: &mut dyn Progress,
) -> Result<()> {
    let x_size = usize::from(info.id.matrix_x_size);
    let y_size = usize::from(info.id.matrix_y_size);
    let nodes = info.id.node_count();
    log::info!(
        "Capturing {} {} frame(s) of {}x{} nodes",
        frames,
        mode.name(),
        x_size,
        y_size
    );

    let header: Vec<String> = (0..x_size)
        .flat_map(|x| (0..y_size).map(move |y| format!("X{}Y{}", x, y)))
        .collect();
    writeln!(out, "frame,{}", header.join(","))?;

    progress.start(usize::from(frames), "frames");
    for frame in 0..frames {
        let values = capture_frame(device, info, mode, nodes)?;
        let line: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        writeln!(out, "{},{}", frame, line.join(","))?;
        progress.advance(usize::from(frame) + 1);
    }
    progress.finish();

    out.flush()?;
    log::info!("Captured {} frame(s)", frames);
    Ok(())
}
