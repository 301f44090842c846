use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_DATA_DIR: &str = "database";
const DEFAULT_MAX_READ_CELLS: u64 = 20_000;
const DEFAULT_MAX_SCHEMA_COLS: u32 = 500;
const DEFAULT_MAX_PATCH_EDITS: usize = 1000;
const DEFAULT_REALTIME_TIMEOUT_MS: u64 = 2000;

/// Where to reach the real-time collaboration service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// Base URL without trailing slash
    pub base_url: String,
    /// Sent as `X-Internal-Secret`
    pub secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub max_read_cells: u64,
    pub max_schema_cols: u32,
    pub max_patch_edits: usize,
    /// `None` disables notifications.
    pub realtime: Option<RealtimeConfig>,
    pub realtime_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            max_read_cells: DEFAULT_MAX_READ_CELLS,
            max_schema_cols: DEFAULT_MAX_SCHEMA_COLS,
            max_patch_edits: DEFAULT_MAX_PATCH_EDITS,
            realtime: None,
            realtime_timeout: Duration::from_millis(DEFAULT_REALTIME_TIMEOUT_MS),
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`], with an arbitrary variable source.
    /// Unparseable numbers fall back to their defaults.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let realtime = get("REALTIME_INTERNAL_URL").and_then(|url| {
            let secret = get("REALTIME_INTERNAL_SECRET").or_else(|| get("INTERNAL_API_SECRET"))?;
            Some(RealtimeConfig {
                base_url: url.trim().trim_end_matches('/').to_string(),
                secret,
            })
        });

        Config {
            data_dir: get("SHEETSTORE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            max_read_cells: parse_or(get("MAX_READ_CELLS"), DEFAULT_MAX_READ_CELLS),
            max_schema_cols: parse_or(get("MAX_SCHEMA_COLS"), DEFAULT_MAX_SCHEMA_COLS),
            max_patch_edits: parse_or(get("MAX_PATCH_EDITS"), DEFAULT_MAX_PATCH_EDITS),
            realtime,
            realtime_timeout: Duration::from_millis(parse_or(
                get("REALTIME_TIMEOUT_MS"),
                DEFAULT_REALTIME_TIMEOUT_MS,
            )),
        }
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
