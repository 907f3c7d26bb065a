//! LLDP capture worker and lifecycle controller
//!
//! The worker is an independent OS process that listens for LLDP frames and
//! writes neighbors into the shared store; the controller starts, stops and
//! inspects it through the PID sidecar file.

pub mod controller;
pub mod filters;
pub mod worker;

pub use controller::{ReceiverController, WorkerStatus};
pub use worker::{CaptureWorker, WorkerExit};
