#![forbid(unsafe_code)]

//! prism-control
//!
//! Mode control plane: the browser-side panel speaks a line-oriented JSON
//! protocol over TCP. Each line is one message; unrecognized messages are
//! logged and ignored, never fatal to the frame loop.
//!
//! Transport and frame loop are decoupled by a single-consumer queue: the
//! listener thread parses and enqueues, the render thread drains with
//! `try_iter()` at a frame boundary.
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

pub mod msg;

pub use msg::{parse_msg, Msg};

use std::io::{self, BufRead, BufReader};
use std::net::{SocketAddr, TcpListener};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;

/// A transport feeding [`Msg`] values into the queue.
pub trait ModeServer {
    /// Start serving in the background, sending every parsed message to `tx`.
    fn spawn(self, tx: Sender<Msg>) -> io::Result<()>;
}

/// Start a server and hand back the queue the frame loop drains.
pub fn start_server<S: ModeServer>(server: S) -> io::Result<Receiver<Msg>> {
    let (tx, rx) = channel();
    server.spawn(tx)?;
    Ok(rx)
}

/// TCP transport: one JSON message per line.
#[derive(Debug)]
pub struct TcpModeServer {
    listener: TcpListener,
}

impl TcpModeServer {
    /// Bind the listening socket up front so the caller learns about a busy
    /// port before the frame loop starts.
    pub fn bind(addr: &str) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(TcpModeServer { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl ModeServer for TcpModeServer {
    fn spawn(self, tx: Sender<Msg>) -> io::Result<()> {
        thread::spawn(move || {
            for stream in self.listener.incoming() {
                let Ok(stream) = stream else { continue };
                log::debug!("control stream connected: {:?}", stream.peer_addr());

                for line in BufReader::new(stream).lines() {
                    let Ok(line) = line else { break };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match parse_msg(&line) {
                        Ok(msg) => {
                            log::debug!("received command: {msg:?}");
                            if tx.send(msg).is_err() {
                                // Frame loop is gone; stop serving.
                                return;
                            }
                        }
                        Err(e) => log::warn!("ignoring unrecognized control message: {e}"),
                    }
                }

                log::debug!("control stream disconnected");
            }
        });
        Ok(())
    }
}
