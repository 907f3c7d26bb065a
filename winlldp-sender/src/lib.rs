//! Periodic LLDP advertisement sender
//!
//! One frame per eligible interface per tick, driven by a monotonic timer
//! with drift compensation, plus a best-effort TTL=0 withdraw pass for
//! shutdown.

pub mod sender;

pub use sender::Sender;
