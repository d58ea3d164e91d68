//! grade crossing monitor
//!
//! polls a search index for train positions and crossing-signal predictions,
//! keeps the newest record per feed, and animates the countdown locally
//! between polls. `Monitor::mount` wires everything; `server` exposes the
//! published snapshot over http.

pub mod animator;
pub mod config;
pub mod domain;
pub mod error;
pub mod feed;
pub mod monitor;
pub mod poller;
pub mod presenter;
pub mod reconciler;
pub mod server;
pub mod source;

#[cfg(test)]
mod testing;
