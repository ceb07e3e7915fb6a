#![forbid(unsafe_code)]

//! Cross-crate behavioural contracts.
//!
//! Everything here runs without a GPU: the `trace` backend records the
//! command stream a frame produces, and the tests assert on that stream
//! (which pass ran, with which uniform values, into which target) instead
//! of reading pixels back.

#[cfg(test)]
mod trace;


#[cfg(test)]
mod frame;

#[cfg(test)]
mod config;
