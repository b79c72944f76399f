//! TCP bridge
//!
//! Exposes register access and the message queue to a remote host over a
//! line based protocol:
//!
//! | request | reply |
//! |---|---|
//! | `RD <addr hex> <count>` | `RRP <hex>` or `RRP ERR` |
//! | `WR <addr hex> <hex>` | `WRP OK` or `WRP ERR` |
//! | `MSG` | `MRP <hex>`, `MRP NONE` or `MRP ERR` |
//! | `QUIT` | `BYE`, then the session ends |
//!
//! The server accepts one client at a time until a client sends `QUIT`. A
//! client whose connection fails is dropped and the server keeps listening.
//! The client role connects out to a host and serves the same protocol on
//! that connection.

use crate::address::MAX_TRANSFER;
use crate::device::RegisterAccess;
use crate::error::{Error, Result};
use crate::hex::{decode_hex_into, encode_hex};
use crate::info::InfoBlock;
use crate::ops::read_message;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer sent `QUIT`
    Quit,
    /// The peer closed the connection
    Disconnected,
}

fn handle_read<D: RegisterAccess + ?Sized>(device: &mut D, args: &[&str]) -> String {
    let request = match args {
        [addr, count] => u16::from_str_radix(addr, 16)
            .ok()
            .zip(count.parse::<usize>().ok())
            .filter(|&(_, count)| count > 0 && count <= MAX_TRANSFER),
        _ => None,
    };
    let Some((addr, count)) = request else {
        log::warn!("Malformed read request {:?}", args);
        return "RRP ERR".into();
    };

    let mut buf = vec![0u8; count];
    match device.read_register(addr, &mut buf) {
        Ok(()) => format!("RRP {}", encode_hex(&buf, "")),
        Err(e) => {
            log::warn!("Bridge read of {} bytes at 0x{:04X} failed: {}", count, addr, e);
            "RRP ERR".into()
        }
    }
}

fn handle_write<D: RegisterAccess + ?Sized>(device: &mut D, args: &[&str]) -> String {
    let request = match args {
        [addr, hex] => u16::from_str_radix(addr, 16)
            .ok()
            .zip(decode_hex_into(hex, MAX_TRANSFER).ok()),
        _ => None,
    };
    let Some((addr, data)) = request else {
        log::warn!("Malformed write request {:?}", args);
        return "WRP ERR".into();
    };

    match device.write_register(addr, &data) {
        Ok(()) => "WRP OK".into(),
        Err(e) => {
            log::warn!("Bridge write at 0x{:04X} failed: {}", addr, e);
            "WRP ERR".into()
        }
    }
}

fn handle_message<D: RegisterAccess + ?Sized>(device: &mut D, info: &InfoBlock) -> String {
    match read_message(device, info) {
        Ok(Some(message)) => format!("MRP {}", encode_hex(&message.to_bytes(), "")),
        Ok(None) => "MRP NONE".into(),
        Err(e) => {
            log::warn!("Bridge message read failed: {}", e);
            "MRP ERR".into()
        }
    }
}

/// Serve requests from `reader` until `QUIT` or end of input
pub fn serve_session<D, R, W>(
    device: &mut D,
    info: &InfoBlock,
    mut reader: R,
    mut writer: W,
) -> Result<SessionEnd>
where
    D: RegisterAccess + ?Sized,
    R: BufRead,
    W: Write,
{
    let mut raw = Vec::new();
    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw)? == 0 {
            return Ok(SessionEnd::Disconnected);
        }
        let line = String::from_utf8_lossy(&raw);
        let mut words = line.split_whitespace();
        let Some(request) = words.next() else {
            continue;
        };
        let args: Vec<&str> = words.collect();
        log::trace!("Bridge request: {}", line.trim_end());

        let reply = match request.to_ascii_uppercase().as_str() {
            "RD" => handle_read(device, &args),
            "WR" => handle_write(device, &args),
            "MSG" => handle_message(device, info),
            "QUIT" => {
                writeln!(writer, "BYE")?;
                writer.flush()?;
                return Ok(SessionEnd::Quit);
            }
            other => {
                log::warn!("Unknown bridge request '{}'", other);
                format!("ERR unknown request {}", other)
            }
        };
        writeln!(writer, "{}", reply)?;
        writer.flush()?;
    }
}

fn serve_stream<D: RegisterAccess + ?Sized>(
    device: &mut D,
    info: &InfoBlock,
    stream: TcpStream,
) -> Result<SessionEnd> {
    let reader = BufReader::new(stream.try_clone()?);
    serve_session(device, info, reader, stream)
}

/// Accept clients on `listener` one after another until one sends `QUIT`
pub fn serve_listener<D: RegisterAccess + ?Sized>(
    device: &mut D,
    info: &InfoBlock,
    listener: &TcpListener,
) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept()?;
        log::info!("Bridge client connected from {}", peer);
        match serve_stream(device, info, stream) {
            Ok(SessionEnd::Quit) => {
                log::info!("Bridge client {} ended the server", peer);
                return Ok(());
            }
            Ok(SessionEnd::Disconnected) => log::info!("Bridge client {} disconnected", peer),
            Err(e) => log::warn!("Bridge client {} dropped: {}", peer, e),
        }
    }
}

/// Listen on `port` and serve bridge clients
pub fn run_server<D: RegisterAccess + ?Sized>(
    device: &mut D,
    info: &InfoBlock,
    port: u16,
) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))
        .map_err(|e| Error::Bridge(format!("cannot listen on port {}: {}", port, e)))?;
    log::info!("Bridge server listening on port {}", port);
    serve_listener(device, info, &listener)
}

/// Connect to `host:port` and serve requests from it
pub fn run_client<D: RegisterAccess + ?Sized>(
    device: &mut D,
    info: &InfoBlock,
    host: &str,
    port: u16,
) -> Result<()> {
    let stream = TcpStream::connect((host, port))
        .map_err(|e| Error::Bridge(format!("cannot connect to {}:{}: {}", host, port, e)))?;
    log::info!("Bridge connected to {}:{}", host, port);
    let end = serve_stream(device, info, stream)?;
    log::info!("Bridge session ended ({:?})", end);
    Ok(())
}
