use serde::Serialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::replay::PlaceholderPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub recordings_dir: PathBuf,
    pub capture: CaptureConfig,
    pub replay: ReplayConfig,
}

/// Timing knobs for the capture coordinator.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// How often the host-side poller samples the session URL
    pub poll_interval: Duration,
    /// Upper bound on waiting for the poller to finish at stop
    pub poller_join_timeout: Duration,
    pub session_start_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Pause after every acted-upon step so the page can react
    pub settle_delay: Duration,
    /// How long the resolver keeps retrying before reporting not-found
    pub resolve_timeout: Duration,
    pub session_start_timeout: Duration,
    pub placeholder_policy: PlaceholderPolicy,
    /// Placeholder names recognized on top of the built-in vocabulary
    pub extra_placeholders: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let session_start_timeout = Duration::from_secs(env_parse(
            "SESSION_START_TIMEOUT_SECS",
            defaults.capture.session_start_timeout.as_secs(),
        ));

        Self {
            port: env_parse("PORT", defaults.port),
            host: env::var("HOST").unwrap_or(defaults.host),
            recordings_dir: env::var("RECORDINGS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.recordings_dir),
            capture: CaptureConfig {
                poll_interval: Duration::from_millis(env_parse("NAV_POLL_INTERVAL_MS", 500)),
                poller_join_timeout: Duration::from_millis(env_parse(
                    "POLLER_JOIN_TIMEOUT_MS",
                    2000,
                )),
                session_start_timeout,
            },
            replay: ReplayConfig {
                settle_delay: Duration::from_millis(env_parse("SETTLE_DELAY_MS", 1500)),
                resolve_timeout: Duration::from_millis(env_parse("RESOLVE_TIMEOUT_MS", 3000)),
                session_start_timeout,
                placeholder_policy: if env_parse("STRICT_PLACEHOLDERS", false) {
                    PlaceholderPolicy::Strict
                } else {
                    PlaceholderPolicy::PassThrough
                },
                extra_placeholders: env::var("PLACEHOLDERS")
                    .map(|list| {
                        list.split(',')
                            .map(|name| name.trim().to_string())
                            .filter(|name| !name.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8765,
            host: "127.0.0.1".to_string(),
            recordings_dir: default_recordings_dir(),
            capture: CaptureConfig::default(),
            replay: ReplayConfig::default(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            poller_join_timeout: Duration::from_secs(2),
            session_start_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(1500),
            resolve_timeout: Duration::from_secs(3),
            session_start_timeout: Duration::from_secs(30),
            placeholder_policy: PlaceholderPolicy::PassThrough,
            extra_placeholders: Vec::new(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// `<data_dir>/extranet-recorder/recorded_actions`, or `./recorded_actions`
/// when the platform has no data directory.
fn default_recordings_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("extranet-recorder").join("recorded_actions"))
        .unwrap_or_else(|| PathBuf::from("recorded_actions"))
}

/// A partner extranet the operator records against.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformPreset {
    pub id: &'static str,
    pub name: &'static str,
    pub url: &'static str,
}

pub const PLATFORM_PRESETS: &[PlatformPreset] = &[
    PlatformPreset {
        id: "ostrovok",
        name: "Ostrovok",
        url: "https://extranet.ostrovok.ru",
    },
    PlatformPreset {
        id: "bronevik",
        name: "Bronevik",
        url: "https://extranet.bronevik.com",
    },
    PlatformPreset {
        id: "101hotels",
        name: "101 Hotels",
        url: "https://extranet.101hotels.com",
    },
];

pub fn platform_preset(platform: &str) -> Option<&'static PlatformPreset> {
    PLATFORM_PRESETS
        .iter()
        .find(|preset| preset.id.eq_ignore_ascii_case(platform))
}
