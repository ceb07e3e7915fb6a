#![forbid(unsafe_code)]

//! prism-control-osc
//!
//! OSC parameter plane: performance controllers drive shader uniforms over
//! UDP while a frame is running. This crate only knows how to receive OSC
//! packets and extract `(uniform name, f32)` updates; buffering them to the
//! next frame boundary is the driver's job.
//!
//! Convention:
//! - Address: "/param/<name>" or "/<name>"
//! - Value: first argument, coercible to f32 (Float, Double, Int, Long)
//!
//! rosc 0.10.x API note:
//! - `rosc::decoder::decode_udp` returns `Result<(&[u8], OscPacket), _>`
//!   (nom-style); the first tuple element is the unconsumed remainder.
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

use std::io;
use std::net::UdpSocket;

use rosc::{OscPacket, OscType};

/// A uniform update extracted from an OSC message.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamUpdate {
    pub name: String,
    pub value: f32,
}

/// Non-blocking UDP OSC receiver for uniform updates.
#[derive(Debug)]
pub struct ParamReceiver {
    sock: UdpSocket,
    buf: [u8; 2048],
}

impl ParamReceiver {
    /// Bind to an address like "127.0.0.1:9000" and put the socket in
    /// non-blocking mode.
    pub fn bind(addr: &str) -> io::Result<Self> {
        let sock = UdpSocket::bind(addr)?;
        sock.set_nonblocking(true)?;
        Ok(Self {
            sock,
            buf: [0u8; 2048],
        })
    }

    /// Drain the socket and return every update available right now, in
    /// arrival order. Never blocks.
    pub fn poll(&mut self) -> Vec<ParamUpdate> {
        let mut out: Vec<ParamUpdate> = Vec::new();

        loop {
            match self.sock.recv_from(&mut self.buf) {
                Ok((n, _from)) => {
                    if let Ok((_rest, pkt)) = rosc::decoder::decode_udp(&self.buf[..n]) {
                        extract_from_packet(pkt, &mut out);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(_e) => break, // transient socket errors are not worth a frame hitch
            }
        }

        out
    }
}

/// Walk a packet/bundle tree and push parsed updates into `out`.
fn extract_from_packet(pkt: OscPacket, out: &mut Vec<ParamUpdate>) {
    match pkt {
        OscPacket::Message(m) => {
            if let Some(update) = parse_param_message(&m.addr, &m.args) {
                out.push(update);
            }
        }
        OscPacket::Bundle(b) => {
            for p in b.content {
                extract_from_packet(p, out);
            }
        }
    }
}

/// Parse a message into a [`ParamUpdate`] if it matches our convention.
fn parse_param_message(addr: &str, args: &[OscType]) -> Option<ParamUpdate> {
    let name = addr
        .strip_prefix("/param/")
        .or_else(|| addr.strip_prefix('/'))?;
    if name.is_empty() {
        return None;
    }
    let v0 = args.first()?;
    let value = match *v0 {
        OscType::Float(x) => x,
        OscType::Double(x) => x as f32,
        OscType::Int(x) => x as f32,
        OscType::Long(x) => x as f32,
        _ => return None,
    };
    Some(ParamUpdate {
        name: name.to_string(),
        value,
    })
}
