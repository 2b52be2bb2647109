use rollcall_core::MatchPolicy;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_NOTIFY_URL: &str = "https://check-name-server.vercel.app/api/attendance";

/// Daemon configuration, loaded once from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory of enrolled face images (default: Face/).
    pub gallery_dir: PathBuf,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Maximum embedding distance for a match.
    pub tolerance: f32,
    /// Minimum confidence (percent) before attendance is reported.
    pub min_confidence: f64,
    pub match_policy: MatchPolicy,
    /// Attendance endpoint receiving `{name, confidence}`.
    pub notify_url: String,
    pub notify_max_attempts: u32,
    pub notify_retry_delay: Duration,
    /// Per-attempt timeout for the attendance call.
    pub notify_timeout: Duration,
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gallery_dir: PathBuf::from("Face/"),
            model_dir: rollcall_core::default_model_dir(),
            tolerance: 0.5,
            min_confidence: 65.0,
            match_policy: MatchPolicy::First,
            notify_url: DEFAULT_NOTIFY_URL.to_string(),
            notify_max_attempts: 3,
            notify_retry_delay: Duration::from_secs(1),
            notify_timeout: Duration::from_secs(5),
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            gallery_dir: std::env::var("ROLLCALL_GALLERY_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.gallery_dir),
            model_dir: std::env::var("ROLLCALL_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            tolerance: env_parse("ROLLCALL_TOLERANCE", defaults.tolerance),
            min_confidence: env_parse("ROLLCALL_MIN_CONFIDENCE", defaults.min_confidence),
            match_policy: env_parse("ROLLCALL_MATCH_POLICY", defaults.match_policy),
            notify_url: std::env::var("ROLLCALL_NOTIFY_URL").unwrap_or(defaults.notify_url),
            notify_max_attempts: env_parse(
                "ROLLCALL_NOTIFY_MAX_ATTEMPTS",
                defaults.notify_max_attempts,
            )
            .max(1),
            notify_retry_delay: env_duration(
                "ROLLCALL_NOTIFY_RETRY_DELAY_MS",
                Duration::from_millis,
                defaults.notify_retry_delay,
            ),
            notify_timeout: env_duration(
                "ROLLCALL_NOTIFY_TIMEOUT_SECS",
                Duration::from_secs,
                defaults.notify_timeout,
            ),
            host: std::env::var("ROLLCALL_HOST").unwrap_or(defaults.host),
            port: env_parse("ROLLCALL_PORT", defaults.port),
            max_upload_bytes: env_parse("ROLLCALL_MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
        }
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> String {
        self.model_dir
            .join(rollcall_core::SCRFD_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the ArcFace recognition model.
    pub fn arcface_model_path(&self) -> String {
        self.model_dir
            .join(rollcall_core::ARCFACE_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_opt<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_opt(key).unwrap_or(default)
}

/// Integer duration in the unit of `unit`, e.g. `Duration::from_millis`.
fn env_duration(key: &str, unit: fn(u64) -> Duration, default: Duration) -> Duration {
    env_opt(key).map(unit).unwrap_or(default)
}
