use std::env;
use std::path::PathBuf;

/// Byte tolerance when comparing the declared content-length against what was
/// actually received and written.
pub const SIZE_TOLERANCE_BYTES: u64 = 1024;

/// Minimum plausible size for a transcoded WAV (100 KiB). Anything smaller is
/// treated as a transcode failure, not a format check.
pub const MIN_OUTPUT_BYTES: u64 = 100 * 1024;

/// Runtime configuration for the relay service
#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory for temp inputs and transcoded outputs
    pub upload_dir: PathBuf,

    /// Port to listen on (default: 8000)
    pub port: u16,

    /// Maximum request body size in bytes (default: 1 GiB)
    pub max_body_size: usize,

    /// Transcoder binary (default: "ffmpeg")
    pub ffmpeg_bin: String,

    /// Upper bound on a single transcode run, in seconds (default: 300)
    pub transcode_timeout_secs: u64,

    /// Upstream question-answering endpoint
    pub ask_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads/tmp"),
            port: 8000,
            max_body_size: 1024 * 1024 * 1024, // 1 GiB
            ffmpeg_bin: "ffmpeg".to_string(),
            transcode_timeout_secs: 300,
            ask_url: "http://127.0.0.1:18000/upload_and_ask/".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.upload_dir),

            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),

            max_body_size: env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_body_size),

            ffmpeg_bin: env::var("FFMPEG_BIN").unwrap_or(default.ffmpeg_bin),

            transcode_timeout_secs: env::var("TRANSCODE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.transcode_timeout_secs),

            ask_url: env::var("ASK_URL").unwrap_or(default.ask_url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.upload_dir, PathBuf::from("uploads/tmp"));
        assert_eq!(config.port, 8000);
        assert_eq!(config.ffmpeg_bin, "ffmpeg");
        assert_eq!(config.transcode_timeout_secs, 300);
    }

    #[test]
    fn test_tolerances() {
        assert_eq!(SIZE_TOLERANCE_BYTES, 1024);
        assert_eq!(MIN_OUTPUT_BYTES, 102_400);
    }
}
