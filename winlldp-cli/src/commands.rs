//! Command dispatch

use crate::args::{CaptureAction, Cli, Commands, ServiceAction};
use chrono::Utc;
use colored::Colorize;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::warn;
use winlldp_capture::{CaptureWorker, ReceiverController};
use winlldp_core::{Config, InterfaceSelection, Result, SystemSnapshot};
use winlldp_sender::Sender;
use winlldp_store::{NeighborRecord, NeighborStore};

/// Watch-mode refresh period
const WATCH_PERIOD: Duration = Duration::from_secs(5);

pub fn run_command(cli: Cli) -> Result<()> {
    let env_file = cli.env_file.clone();

    match cli.command {
        Commands::Send { interface } => {
            let mut config = Config::load(env_file.as_deref())?;
            if let Some(name) = interface {
                config.interface = InterfaceSelection::Named(name);
            }
            cmd_send(config)
        }
        Commands::Capture { action } => {
            let controller = ReceiverController::new();
            match action {
                CaptureAction::Start => {
                    // Validate configuration before spawning anything.
                    Config::load(env_file.as_deref())?;
                    let pid = controller.start(env_file.as_deref())?;
                    println!("LLDP capture started (PID {})", pid);
                    Ok(())
                }
                CaptureAction::Stop => {
                    let pid = controller.stop()?;
                    println!("LLDP capture stopped (PID {})", pid);
                    Ok(())
                }
                CaptureAction::Status => cmd_capture_status(&controller),
                CaptureAction::Log { lines } => {
                    for line in controller.log_lines(lines)? {
                        println!("{}", line);
                    }
                    Ok(())
                }
            }
        }
        Commands::ShowNeighbors { watch } => {
            let config = Config::load(env_file.as_deref())?;
            let store = NeighborStore::open(&config);
            if watch {
                cmd_watch_neighbors(&store)
            } else {
                cmd_show_neighbors(&store);
                Ok(())
            }
        }
        Commands::ClearNeighbors => {
            let config = Config::load(env_file.as_deref())?;
            NeighborStore::open(&config).clear()?;
            println!("Neighbor table cleared");
            Ok(())
        }
        Commands::ShowInterfaces => {
            cmd_show_interfaces();
            Ok(())
        }
        Commands::ShowConfig => {
            let config = Config::load(env_file.as_deref())?;
            println!("Current configuration:");
            println!("{}", config);
            Ok(())
        }
        Commands::Version => {
            println!("winlldp {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Run => cmd_run(env_file.as_deref()),
        Commands::Service { action } => cmd_service(action),
        Commands::CaptureWorker => {
            let config = Config::load(env_file.as_deref())?;
            let exit = CaptureWorker::new(config).run()?;
            std::process::exit(exit.code());
        }
    }
}

fn cmd_send(config: Config) -> Result<()> {
    let sender = Sender::new(config);
    println!("Sending LLDP advertisements...");
    let sent = sender.send_once()?;
    println!("Sent on {} interface(s)", sent);
    Ok(())
}

fn cmd_capture_status(controller: &ReceiverController) -> Result<()> {
    let status = controller.status();
    if status.running {
        println!("{}", "LLDP capture: RUNNING".green().bold());
        if let Some(pid) = status.pid {
            println!("  PID:    {}", pid);
        }
        if let Some(uptime) = status.uptime {
            println!("  Uptime: {}", format_uptime(uptime));
        }
    } else {
        println!("{}", "LLDP capture: STOPPED".red().bold());
    }
    Ok(())
}

#[derive(Tabled)]
struct NeighborRow {
    #[tabled(rename = "Interface")]
    interface: String,
    #[tabled(rename = "Chassis ID")]
    chassis: String,
    #[tabled(rename = "System Name")]
    system_name: String,
    #[tabled(rename = "Port")]
    port: String,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "TTL")]
    ttl: String,
    #[tabled(rename = "Management IP")]
    management_ip: String,
}

impl NeighborRow {
    fn from_record(record: &NeighborRecord, now: chrono::DateTime<Utc>) -> Self {
        NeighborRow {
            interface: record.interface.clone(),
            chassis: record.chassis_display(),
            system_name: record
                .system_name
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            port: record
                .port_description
                .clone()
                .unwrap_or_else(|| record.port_display()),
            age: record.age(now),
            ttl: format!("{}s", record.ttl),
            management_ip: record
                .management_addresses
                .first()
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

fn cmd_show_neighbors(store: &NeighborStore) {
    let now = Utc::now();
    let live = store.list_live(now);
    if live.is_empty() {
        println!("No LLDP neighbors discovered. Is the capture running?");
        return;
    }

    let rows: Vec<NeighborRow> = live
        .iter()
        .map(|record| NeighborRow::from_record(record, now))
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("LLDP Neighbors:");
    println!("{}", table);
    println!("\nTotal neighbors: {}", live.len());
}

fn cmd_watch_neighbors(store: &NeighborStore) -> Result<()> {
    let interrupted = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&interrupted))
        .map_err(winlldp_core::Error::Io)?;

    println!("Watching LLDP neighbors (Ctrl+C to exit)");
    while !interrupted.load(std::sync::atomic::Ordering::Relaxed) {
        // ANSI clear screen + home
        print!("\x1b[2J\x1b[H");
        cmd_show_neighbors(store);
        std::thread::sleep(WATCH_PERIOD);
    }
    println!("\nExiting");
    Ok(())
}

#[derive(Tabled)]
struct InterfaceRow {
    #[tabled(rename = "Interface")]
    name: String,
    #[tabled(rename = "MAC Address")]
    mac: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "IPv4 Addresses")]
    ipv4: String,
}

fn cmd_show_interfaces() {
    let snapshot = SystemSnapshot::take();
    let rows: Vec<InterfaceRow> = snapshot
        .interfaces
        .iter()
        .filter(|iface| iface.mac.is_some())
        .map(|iface| InterfaceRow {
            name: iface.name.clone(),
            mac: iface.mac.map(|m| m.to_string()).unwrap_or_default(),
            status: if iface.is_up { "UP" } else { "DOWN" }.to_string(),
            ipv4: if iface.ipv4.is_empty() {
                "-".to_string()
            } else {
                iface
                    .ipv4
                    .iter()
                    .map(|ip| ip.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            },
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("Network Interfaces:");
    println!("{}", table);
}

/// Foreground agent: sender loop plus the capture worker, the mode a
/// service manager invokes. The capture worker runs as the usual detached
/// process so `capture stop` keeps working after the agent exits.
fn cmd_run(env_file: Option<&std::path::Path>) -> Result<()> {
    let config = Config::load(env_file)?;
    println!("Starting winlldp agent");
    println!("{}", config);

    let controller = ReceiverController::new();
    match controller.start(env_file) {
        Ok(pid) => println!("Capture worker started (PID {})", pid),
        Err(winlldp_core::Error::WorkerAlreadyRunning(pid)) => {
            println!("Capture worker already running (PID {})", pid);
        }
        Err(e) => warn!(error = %e, "capture worker failed to start, sender continues"),
    }

    let stop = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGTERM, signal_hook::consts::SIGINT] {
        signal_hook::flag::register(signal, Arc::clone(&stop))
            .map_err(winlldp_core::Error::Io)?;
    }

    let sender = Sender::new(config);
    println!("Agent running (Ctrl+C to stop)");
    let result = sender.run(&stop);

    // Withdraw our advertisements so neighbors drop us promptly.
    sender.send_withdraw();
    println!("Agent stopped (capture worker keeps running; use 'winlldp capture stop')");
    result
}

fn cmd_service(action: ServiceAction) -> Result<()> {
    match action {
        ServiceAction::Status => {
            let controller = ReceiverController::new();
            cmd_capture_status(&controller)
        }
        other => {
            eprintln!(
                "Service registration is delegated to the platform service manager.\n\
                 Register `winlldp run` with it, e.g. a systemd unit with\n\
                 `ExecStart={} run`.",
                std::env::current_exe()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| "winlldp".to_string())
            );
            Err(winlldp_core::Error::NotSupported(format!(
                "service {:?} is not managed by winlldp",
                other
            )))
        }
    }
}

fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
