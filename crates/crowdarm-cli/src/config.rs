//! Startup configuration – reads `crowdarm.toml`.

use std::fs;
use std::path::Path;

use crowdarm_kinematics::{FrameTransformer, WorkspaceEnvelope};
use crowdarm_types::{ArmError, Coordinates};
use serde::{Deserialize, Serialize};

/// Process configuration, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Address the bridge listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Collection window in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// How long one `accept` waits before logging and retrying, in seconds.
    #[serde(default = "default_accept_timeout_secs")]
    pub accept_timeout_secs: u64,

    /// User-frame lattice cell the arm moves to after homing.
    #[serde(default = "default_start")]
    pub start: [f64; 3],

    /// Workspace geometry; defaults to the uArm Swift Pro setup.
    #[serde(default)]
    pub envelope: WorkspaceEnvelope,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8090".to_string()
}
fn default_window_secs() -> u64 {
    10
}
fn default_accept_timeout_secs() -> u64 {
    30
}
fn default_start() -> [f64; 3] {
    [2.0, 5.0, 20.0]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            window_secs: default_window_secs(),
            accept_timeout_secs: default_accept_timeout_secs(),
            start: default_start(),
            envelope: WorkspaceEnvelope::default(),
        }
    }
}

/// Load the config from `path`, apply `CROWDARM_*` environment overrides,
/// and validate. A missing file yields the validated defaults.
///
/// # Errors
///
/// [`ArmError::Config`] on unreadable or unparsable TOML, or when
/// validation fails.
pub fn load(path: &Path) -> Result<Config, ArmError> {
    let mut cfg = if path.exists() {
        let raw = fs::read_to_string(path).map_err(|e| {
            ArmError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&raw).map_err(|e| {
            ArmError::Config(format!("failed to parse {}: {e}", path.display()))
        })?
    } else {
        Config::default()
    };
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

/// Apply `CROWDARM_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `CROWDARM_BIND_ADDR` | `bind_addr` |
/// | `CROWDARM_WINDOW_SECS` | `window_secs` |
/// | `CROWDARM_ACCEPT_TIMEOUT_SECS` | `accept_timeout_secs` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("CROWDARM_BIND_ADDR") {
        cfg.bind_addr = v;
    }
    if let Ok(v) = std::env::var("CROWDARM_WINDOW_SECS")
        && let Ok(secs) = v.parse::<u64>()
    {
        cfg.window_secs = secs;
    }
    if let Ok(v) = std::env::var("CROWDARM_ACCEPT_TIMEOUT_SECS")
        && let Ok(secs) = v.parse::<u64>()
    {
        cfg.accept_timeout_secs = secs;
    }
}

impl Config {
    /// Sanity checks run once at startup, before any motion.
    ///
    /// # Errors
    ///
    /// [`ArmError::Config`] for an unparsable bind address, a zero window,
    /// invalid workspace geometry, or a start cell the arm cannot reach.
    pub fn validate(&self) -> Result<(), ArmError> {
        self.bind_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|e| ArmError::Config(format!("invalid bind_addr {:?}: {e}", self.bind_addr)))?;
        if self.window_secs == 0 {
            return Err(ArmError::Config("window_secs must be positive".to_string()));
        }
        self.envelope.validate()?;

        // to_device already workspace-checks the mapped target.
        let transformer = FrameTransformer::new(self.envelope);
        let [x, y, z] = self.start;
        transformer
            .to_device(Coordinates::user(x, y, z))
            .map_err(|_| {
                ArmError::Config(format!(
                    "start cell ({x}, {y}, {z}) is outside the workspace envelope"
                ))
            })?;
        Ok(())
    }
}
