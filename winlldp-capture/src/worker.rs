//! Capture worker
//!
//! Long-running process that listens for LLDP frames on the selected
//! interfaces and merges decoded neighbors into the store. One blocking
//! pcap loop per interface, each on its own OS thread with a bounded read
//! timeout so the termination flag is honored promptly. All durable state
//! lives in the neighbor store; the worker is stateless across restarts.

use crate::filters;
use chrono::Utc;
use pcap::{Active, Capture, Device};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use winlldp_core::{paths, Config, Error, InterfaceSelection, Result, SystemSnapshot};
use winlldp_protocol::LldpFrame;
use winlldp_store::{NeighborRecord, NeighborStore};

/// Maximum bytes captured per packet
const SNAPLEN: i32 = 65535;

/// pcap read timeout; bounds how long a thread can miss the stop flag
const READ_TIMEOUT_MS: i32 = 1000;

/// How often the main loop reaps expired records
const AGE_OUT_PERIOD: Duration = Duration::from_secs(30);

/// Exit status of a worker run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// At least one interface ran until termination
    Clean,
    /// Every interface failed
    AllInterfacesFailed,
}

impl WorkerExit {
    pub fn code(self) -> i32 {
        match self {
            WorkerExit::Clean => 0,
            WorkerExit::AllInterfacesFailed => 2,
        }
    }
}

/// The capture worker
pub struct CaptureWorker {
    config: Config,
    store: Arc<NeighborStore>,
    shutdown: Arc<AtomicBool>,
}

impl CaptureWorker {
    pub fn new(config: Config) -> Self {
        let store = Arc::new(NeighborStore::open(&config));
        CaptureWorker {
            config,
            store,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The cooperative stop flag, for embedding the worker in another
    /// process.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Run until termination. Registers SIGTERM/SIGINT to trip the stop
    /// flag, writes the PID sidecar, and removes it again on a graceful
    /// exit.
    pub fn run(&self) -> Result<WorkerExit> {
        for signal in [signal_hook::consts::SIGTERM, signal_hook::consts::SIGINT] {
            signal_hook::flag::register(signal, Arc::clone(&self.shutdown))
                .map_err(|e| Error::Capture(format!("failed to register signal: {}", e)))?;
        }

        let pid_file = paths::pid_file();
        fs::write(&pid_file, std::process::id().to_string())?;
        info!(pid = std::process::id(), "capture worker started");

        let result = self.capture_loop();

        if let Err(e) = fs::remove_file(&pid_file) {
            warn!(error = %e, "failed to remove PID file");
        }
        info!("capture worker exiting");
        result
    }

    fn capture_loop(&self) -> Result<WorkerExit> {
        let snapshot = SystemSnapshot::take();
        let targets: Vec<String> = match &self.config.interface {
            InterfaceSelection::All => snapshot
                .operational_interfaces()
                .map(|i| i.name.clone())
                .collect(),
            InterfaceSelection::Named(name) => {
                snapshot.interface_or_err(name)?;
                vec![name.clone()]
            }
        };

        if targets.is_empty() {
            error!("no operational interfaces to capture on");
            return Ok(WorkerExit::AllInterfacesFailed);
        }
        info!(interfaces = ?targets, "capturing LLDP frames");

        let mut handles = Vec::with_capacity(targets.len());
        let mut privilege_errors = 0usize;

        for name in &targets {
            match open_capture(name) {
                Ok(capture) => {
                    let store = Arc::clone(&self.store);
                    let shutdown = Arc::clone(&self.shutdown);
                    let interface = name.clone();
                    handles.push(std::thread::spawn(move || {
                        interface_loop(capture, &interface, &store, &shutdown)
                    }));
                }
                Err(Error::PrivilegeDenied(msg)) => {
                    error!(interface = %name, "capture open denied: {}", msg);
                    privilege_errors += 1;
                }
                Err(e) => {
                    // One bad interface must not take down the others.
                    error!(interface = %name, error = %e, "failed to open capture");
                }
            }
        }

        if handles.is_empty() {
            if privilege_errors == targets.len() {
                return Err(Error::PrivilegeDenied(
                    "raw capture requires elevated privileges on every selected interface"
                        .to_string(),
                ));
            }
            return Ok(WorkerExit::AllInterfacesFailed);
        }

        // Reap expired records while the capture threads run.
        let mut last_age_out = std::time::Instant::now();
        while !self.shutdown.load(Ordering::Relaxed) {
            std::thread::sleep(Duration::from_millis(200));
            if last_age_out.elapsed() >= AGE_OUT_PERIOD {
                last_age_out = std::time::Instant::now();
                match self.store.age_out(Utc::now()) {
                    Ok(0) => {}
                    Ok(dropped) => debug!(dropped, "expired neighbors removed"),
                    Err(e) => warn!(error = %e, "age-out failed"),
                }
            }
            if handles.iter().all(|h| h.is_finished()) {
                break;
            }
        }

        let mut any_ran_to_termination = false;
        for handle in handles {
            match handle.join() {
                Ok(ran_to_termination) => any_ran_to_termination |= ran_to_termination,
                Err(_) => error!("capture thread panicked"),
            }
        }

        if any_ran_to_termination {
            Ok(WorkerExit::Clean)
        } else {
            Ok(WorkerExit::AllInterfacesFailed)
        }
    }
}

/// Open a pcap handle on `name` with the LLDP filter applied.
fn open_capture(name: &str) -> Result<Capture<Active>> {
    let device = Device::from(name);
    let mut capture = Capture::from_device(device)
        .map_err(|e| Error::Capture(format!("{}: {}", name, e)))?
        .promisc(true)
        .snaplen(SNAPLEN)
        .timeout(READ_TIMEOUT_MS)
        .immediate_mode(true)
        .open()
        .map_err(|e| classify_open_error(name, e))?;

    capture
        .filter(&filters::lldp_filter(), true)
        .map_err(|e| Error::Capture(format!("{}: invalid filter: {}", name, e)))?;
    Ok(capture)
}

fn classify_open_error(name: &str, e: pcap::Error) -> Error {
    let text = e.to_string();
    if text.contains("permission") || text.contains("Permission") || text.contains("not permitted")
    {
        Error::PrivilegeDenied(format!("{}: {}", name, text))
    } else {
        Error::Capture(format!("{}: {}", name, text))
    }
}

/// Blocking receive loop for one interface.
///
/// Returns true when the loop ended because of the stop flag, false on a
/// fatal capture error.
fn interface_loop(
    mut capture: Capture<Active>,
    interface: &str,
    store: &NeighborStore,
    shutdown: &AtomicBool,
) -> bool {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!(interface, "capture loop stopping");
            return true;
        }

        match capture.next_packet() {
            Ok(packet) => process_frame(interface, packet.data, store),
            Err(pcap::Error::TimeoutExpired) => continue,
            Err(e) => {
                error!(interface, error = %e, "capture failed, dropping interface");
                return false;
            }
        }
    }
}

/// Decode one captured frame and merge it into the store.
///
/// Decode failures drop the frame and leave the session running; the next
/// well-formed frame is processed normally.
fn process_frame(interface: &str, data: &[u8], store: &NeighborStore) {
    let frame = match LldpFrame::decode(data) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(interface, error = %e, "dropping undecodable frame");
            return;
        }
    };

    let record = NeighborRecord::from_frame(interface, &frame, LldpFrame::lldpdu(data), Utc::now());
    debug!(
        interface,
        chassis = %record.chassis_display(),
        port = %record.port_display(),
        ttl = record.ttl,
        "LLDP frame received"
    );

    if let Err(e) = store.upsert(record) {
        warn!(interface, error = %e, "failed to persist neighbor");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winlldp_core::MacAddr;
    use winlldp_protocol::{ChassisId, PortId, Tlv};

    fn frame_bytes(chassis: [u8; 6], port: &str, ttl: u16) -> Vec<u8> {
        let mut frame = LldpFrame::new(
            MacAddr(chassis),
            ChassisId::mac(MacAddr(chassis)),
            PortId::interface_name(port),
            ttl,
        );
        frame.push(Tlv::SystemName("peer".to_string()));
        frame.encode().unwrap()
    }

    fn store_in(dir: &tempfile::TempDir) -> NeighborStore {
        NeighborStore::new(dir.path().join("neighbors.json"))
    }

    #[test]
    fn test_process_frame_upserts_neighbor() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let mac = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];

        process_frame("eth1", &frame_bytes(mac, "eth0", 120), &store);

        let table = store.load();
        assert_eq!(table.neighbors.len(), 1);
        let record = &table.neighbors[0];
        assert_eq!(record.interface, "eth1");
        assert_eq!(record.chassis_display(), "00:11:22:33:44:55");
        assert_eq!(record.port_display(), "eth0");
        assert_eq!(record.ttl, 120);
        assert_eq!(record.first_seen, record.last_seen);
        assert_eq!(record.system_name.as_deref(), Some("peer"));
        assert!(!record.raw_tlvs.is_empty());
    }

    #[test]
    fn test_malformed_frame_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let mac = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];

        // Port ID TLV declares 200 bytes with 4 remaining.
        let mut bad = frame_bytes(mac, "eth0", 120);
        bad.truncate(14 + 9);
        bad.extend_from_slice(&((2u16 << 9) | 200).to_be_bytes());
        bad.extend_from_slice(&[0x05, b'e', b't', b'h']);
        process_frame("eth1", &bad, &store);
        assert!(store.load().neighbors.is_empty());

        // The next well-formed frame in the same session still lands.
        process_frame("eth1", &frame_bytes(mac, "eth0", 120), &store);
        assert_eq!(store.load().neighbors.len(), 1);
    }

    #[test]
    fn test_same_key_updates_not_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let mac = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];

        process_frame("eth1", &frame_bytes(mac, "eth0", 120), &store);
        process_frame("eth1", &frame_bytes(mac, "eth0", 120), &store);
        let table = store.load();
        assert_eq!(table.neighbors.len(), 1);
        assert!(table.neighbors[0].last_seen >= table.neighbors[0].first_seen);
    }

    #[test]
    fn test_distinct_interfaces_distinct_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let mac = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];

        process_frame("eth1", &frame_bytes(mac, "eth0", 120), &store);
        process_frame("eth2", &frame_bytes(mac, "eth0", 120), &store);
        assert_eq!(store.load().neighbors.len(), 2);
    }

    #[test]
    fn test_worker_exit_codes() {
        assert_eq!(WorkerExit::Clean.code(), 0);
        assert_eq!(WorkerExit::AllInterfacesFailed.code(), 2);
    }
}
