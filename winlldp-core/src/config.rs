//! Environment-backed configuration
//!
//! All settings come from `LLDP_*` environment variables, optionally seeded
//! from a `.env` file. Validation is fail-fast: a bad value is rejected
//! before any network I/O happens.

use crate::paths;
use crate::{Error, Result};
use std::fmt;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

/// Sender tick period bounds, seconds
const INTERVAL_MIN: u64 = 5;
const INTERVAL_MAX: u64 = 3600;

/// Management address selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagementAddress {
    /// Use the primary IPv4 of the emitting interface
    Auto,
    /// Fixed override
    Fixed(Ipv4Addr),
}

/// Interface selection for sender and capture worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceSelection {
    /// Every operational interface
    All,
    /// A single named interface
    Named(String),
}

impl InterfaceSelection {
    pub fn from_value(value: &str) -> Self {
        if value.eq_ignore_ascii_case("all") {
            InterfaceSelection::All
        } else {
            InterfaceSelection::Named(value.to_string())
        }
    }
}

impl fmt::Display for InterfaceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterfaceSelection::All => write!(f, "all"),
            InterfaceSelection::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Agent configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Sender tick period, seconds
    pub interval: u64,
    /// Interfaces to send and capture on
    pub interface: InterfaceSelection,
    /// System Name TLV value; `None` means use the hostname
    pub system_name: Option<String>,
    /// System Description TLV override; `None` means use the OS version string
    pub system_description: Option<String>,
    /// Port Description TLV value
    pub port_description: String,
    /// Management Address TLV source
    pub management_address: ManagementAddress,
    /// Advertised TTL, seconds
    pub ttl: u16,
    /// Neighbor table path
    pub neighbors_file: PathBuf,
}

impl Config {
    /// Load configuration from the environment, seeding it from `env_file`
    /// (or a `.env` next to the working directory) first.
    pub fn load(env_file: Option<&Path>) -> Result<Self> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path)
                    .map_err(|e| Error::config("env-file", format!("{}: {}", path.display(), e)))?;
            }
            None => {
                // Missing .env is fine, a malformed one is not.
                if let Err(e) = dotenvy::dotenv() {
                    if !e.not_found() {
                        return Err(Error::config(".env", e.to_string()));
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Build configuration from the current environment only.
    pub fn from_env() -> Result<Self> {
        let interval = match env_var("LLDP_INTERVAL") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| Error::config("LLDP_INTERVAL", "not a number"))?,
            None => 30,
        };

        let ttl = match env_var("LLDP_TTL") {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| Error::config("LLDP_TTL", "not a number"))?,
            None => 120,
        };

        let management_address = match env_var("LLDP_MANAGEMENT_ADDRESS") {
            None => ManagementAddress::Auto,
            Some(raw) if raw.eq_ignore_ascii_case("auto") => ManagementAddress::Auto,
            Some(raw) => ManagementAddress::Fixed(
                raw.parse()
                    .map_err(|_| Error::config("LLDP_MANAGEMENT_ADDRESS", "not an IPv4 address"))?,
            ),
        };

        let system_name = match env_var("LLDP_SYSTEM_NAME") {
            None => None,
            Some(raw) if raw.eq_ignore_ascii_case("auto") => None,
            Some(raw) => Some(raw),
        };

        let neighbors_file = env_var("LLDP_NEIGHBORS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("neighbors.json"));

        let config = Config {
            interval,
            interface: InterfaceSelection::from_value(
                env_var("LLDP_INTERFACE").as_deref().unwrap_or("all"),
            ),
            system_name,
            system_description: env_var("LLDP_SYSTEM_DESCRIPTION"),
            port_description: env_var("LLDP_PORT_DESCRIPTION")
                .unwrap_or_else(|| "Ethernet Port".to_string()),
            management_address,
            ttl: u16::try_from(ttl)
                .map_err(|_| Error::config("LLDP_TTL", "must be less than 65536"))?,
            neighbors_file: paths::resolve_runtime_path(&neighbors_file),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.interval < INTERVAL_MIN {
            return Err(Error::config(
                "LLDP_INTERVAL",
                format!("must be at least {} seconds", INTERVAL_MIN),
            ));
        }
        if self.interval > INTERVAL_MAX {
            return Err(Error::config(
                "LLDP_INTERVAL",
                format!("must be at most {} seconds", INTERVAL_MAX),
            ));
        }
        if u64::from(self.ttl) <= self.interval {
            return Err(Error::config(
                "LLDP_TTL",
                "must be greater than LLDP_INTERVAL",
            ));
        }
        Ok(())
    }

    /// Sidecar lock file for the neighbor table
    pub fn lock_file(&self) -> PathBuf {
        let mut name = self
            .neighbors_file
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.neighbors_file.with_file_name(name)
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  interval            = {}s", self.interval)?;
        writeln!(f, "  interface           = {}", self.interface)?;
        writeln!(
            f,
            "  system_name         = {}",
            self.system_name.as_deref().unwrap_or("auto (hostname)")
        )?;
        writeln!(
            f,
            "  system_description  = {}",
            self.system_description
                .as_deref()
                .unwrap_or("auto (OS version)")
        )?;
        writeln!(f, "  port_description    = {}", self.port_description)?;
        match &self.management_address {
            ManagementAddress::Auto => {
                writeln!(f, "  management_address  = auto (interface IPv4)")?
            }
            ManagementAddress::Fixed(ip) => writeln!(f, "  management_address  = {}", ip)?,
        }
        writeln!(f, "  ttl                 = {}s", self.ttl)?;
        write!(
            f,
            "  neighbors_file      = {}",
            self.neighbors_file.display()
        )
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; serialize them.
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    const ALL_KEYS: [&str; 8] = [
        "LLDP_INTERVAL",
        "LLDP_TTL",
        "LLDP_INTERFACE",
        "LLDP_SYSTEM_NAME",
        "LLDP_SYSTEM_DESCRIPTION",
        "LLDP_PORT_DESCRIPTION",
        "LLDP_MANAGEMENT_ADDRESS",
        "LLDP_NEIGHBORS_FILE",
    ];

    fn reset_env() {
        for key in ALL_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        reset_env();
        let config = Config::from_env().unwrap();
        assert_eq!(config.interval, 30);
        assert_eq!(config.ttl, 120);
        assert_eq!(config.interface, InterfaceSelection::All);
        assert_eq!(config.system_name, None);
        assert_eq!(config.port_description, "Ethernet Port");
        assert_eq!(config.management_address, ManagementAddress::Auto);
        assert!(config.neighbors_file.ends_with("neighbors.json"));
    }

    #[test]
    fn test_ttl_must_exceed_interval() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        reset_env();
        std::env::set_var("LLDP_INTERVAL", "120");
        std::env::set_var("LLDP_TTL", "120");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, Error::Config { ref name, .. } if name == "LLDP_TTL"));
        reset_env();
    }

    #[test]
    fn test_interval_bounds() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        reset_env();
        std::env::set_var("LLDP_INTERVAL", "4");
        assert!(Config::from_env().is_err());
        std::env::set_var("LLDP_INTERVAL", "4000");
        assert!(Config::from_env().is_err());
        reset_env();
    }

    #[test]
    fn test_management_address_parse() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        reset_env();
        std::env::set_var("LLDP_MANAGEMENT_ADDRESS", "192.168.10.4");
        let config = Config::from_env().unwrap();
        assert_eq!(
            config.management_address,
            ManagementAddress::Fixed("192.168.10.4".parse().unwrap())
        );
        std::env::set_var("LLDP_MANAGEMENT_ADDRESS", "not-an-ip");
        assert!(Config::from_env().is_err());
        reset_env();
    }

    #[test]
    fn test_lock_file_is_sibling() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        reset_env();
        let config = Config::from_env().unwrap();
        let lock = config.lock_file();
        assert_eq!(lock.parent(), config.neighbors_file.parent());
        assert!(lock.to_string_lossy().ends_with("neighbors.json.lock"));
    }
}
