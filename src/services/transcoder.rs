use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("failed to launch transcoder: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("transcoder exited with code {code}: {stderr}")]
    Failed { code: i32, stderr: String },

    #[error("transcoder timed out after {0:?}")]
    TimedOut(Duration),
}

/// Seam for the external conversion tool, so tests can substitute a stub.
#[async_trait::async_trait]
pub trait Transcoder: Send + Sync {
    /// Convert `input` into a mono/16kHz WAV at `output`.
    ///
    /// Returns the tool's captured stderr on success (ffmpeg warns on stderr
    /// even for clean runs); a nonzero exit or timeout is an error carrying
    /// whatever diagnostics were captured.
    async fn transcode(&self, input: &Path, output: &Path) -> Result<String, TranscodeError>;
}

/// Invokes the `ffmpeg` binary synchronously, bounded by a timeout.
pub struct FfmpegTranscoder {
    bin: String,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(bin: String, timeout: Duration) -> Self {
        Self { bin, timeout }
    }
}

#[async_trait::async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<String, TranscodeError> {
        info!("starting {} for {}", self.bin, input.display());

        let run = Command::new(&self.bin)
            .arg("-loglevel")
            .arg("error")
            .arg("-analyzeduration")
            .arg("100M")
            .arg("-probesize")
            .arg("100M")
            .arg("-i")
            .arg(input)
            .args(["-vn", "-ar", "16000", "-ac", "1", "-f", "wav"])
            .arg(output)
            .output();

        let result = match tokio::time::timeout(self.timeout, run).await {
            Ok(result) => result?,
            Err(_) => {
                error!("{} timed out after {:?}", self.bin, self.timeout);
                return Err(TranscodeError::TimedOut(self.timeout));
            }
        };

        let stderr = String::from_utf8_lossy(&result.stderr).into_owned();

        if !result.status.success() {
            let code = result.status.code().unwrap_or(-1);
            error!("{} exited with {}: {}", self.bin, code, stderr.trim());
            return Err(TranscodeError::Failed {
                code,
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(stderr)
    }
}
