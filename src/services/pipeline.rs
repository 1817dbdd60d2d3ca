use crate::api::error::AppError;
use crate::config::{Config, MIN_OUTPUT_BYTES, SIZE_TOLERANCE_BYTES};
use crate::services::ingest;
use crate::services::registry::DedupRegistry;
use crate::services::transcoder::Transcoder;
use std::path::{Path, PathBuf};
use tokio::io::AsyncRead;
use tracing::{info, warn};
use uuid::Uuid;

/// Result summary of a successful run, consumed by the upload handler.
#[derive(Debug)]
pub struct UploadOutcome {
    pub received: u64,
    pub declared: u64,
    pub hash: String,
    pub output_filename: String,
}

/// Run the full ingest pipeline for one request:
/// receive → dedup check → size validation → transcode → output validation.
///
/// Cleanup always runs afterwards: the temp input is removed on every path,
/// and a failed run additionally removes the output file and rolls back the
/// dedup reservation so the same content can be retried.
pub async fn process_upload<R>(
    config: &Config,
    registry: &DedupRegistry,
    transcoder: &dyn Transcoder,
    original_filename: &str,
    declared: u64,
    reader: R,
) -> Result<UploadOutcome, AppError>
where
    R: AsyncRead + Unpin,
{
    let input_path = config
        .upload_dir
        .join(format!("{}_{}", Uuid::new_v4(), original_filename));
    let output_filename = format!("{}.wav", Uuid::new_v4());
    let output_path = config.upload_dir.join(&output_filename);

    // Set once the hash has been registered; a failure after this point must
    // undo the reservation.
    let mut reserved: Option<String> = None;

    let outcome = run_stages(
        registry,
        transcoder,
        original_filename,
        declared,
        reader,
        &input_path,
        &output_path,
        &output_filename,
        &mut reserved,
    )
    .await;

    // Cleanup: the explicit terminal state decides how much to undo.
    remove_if_present(&input_path, "temp input").await;
    if outcome.is_err() {
        remove_if_present(&output_path, "output").await;
        if let Some(hash) = reserved {
            registry.remove(&hash);
            info!("rolled back dedup reservation for {}", hash);
        }
    }

    outcome
}

#[allow(clippy::too_many_arguments)]
async fn run_stages<R>(
    registry: &DedupRegistry,
    transcoder: &dyn Transcoder,
    original_filename: &str,
    declared: u64,
    reader: R,
    input_path: &Path,
    output_path: &Path,
    output_filename: &str,
    reserved: &mut Option<String>,
) -> Result<UploadOutcome, AppError>
where
    R: AsyncRead + Unpin,
{
    // Receiving (hashing runs alongside, per chunk)
    let summary = ingest::write_to_file(reader, input_path, declared).await?;

    // DedupCheck. contains/add is not atomic; see DedupRegistry.
    if registry.contains(&summary.hash) {
        info!(
            "duplicate upload rejected: {} (hash: {})",
            original_filename, summary.hash
        );
        return Err(AppError::Duplicate {
            filename: original_filename.to_string(),
            hash: summary.hash,
        });
    }
    registry.add(summary.hash.clone());
    *reserved = Some(summary.hash.clone());
    info!("hash registered, {} known", registry.len());

    // SizeValidate: both the received count and the on-disk size must sit
    // within the tolerance of the declared length, when one was declared.
    if declared > 0 {
        if summary.received.abs_diff(declared) > SIZE_TOLERANCE_BYTES {
            return Err(AppError::SizeMismatch(format!(
                "expected {} bytes, received {}",
                declared, summary.received
            )));
        }
        let written = tokio::fs::metadata(input_path).await?.len();
        if written.abs_diff(declared) > SIZE_TOLERANCE_BYTES {
            return Err(AppError::SizeMismatch(format!(
                "expected {} bytes, wrote {} to disk",
                declared, written
            )));
        }
    }

    // Transcoding
    let diagnostics = transcoder
        .transcode(input_path, output_path)
        .await
        .map_err(|e| AppError::Transcode(e.to_string()))?;

    // OutputValidate: exists and is at least plausibly audio-sized.
    match tokio::fs::metadata(output_path).await {
        Ok(meta) if meta.len() >= MIN_OUTPUT_BYTES => {}
        Ok(meta) => {
            return Err(AppError::Transcode(format!(
                "output file too small ({} bytes): {}",
                meta.len(),
                diagnostics.trim()
            )));
        }
        Err(_) => {
            return Err(AppError::Transcode(format!(
                "output file was not produced: {}",
                diagnostics.trim()
            )));
        }
    }

    info!("upload processed successfully: {}", output_filename);

    Ok(UploadOutcome {
        received: summary.received,
        declared,
        hash: summary.hash,
        output_filename: output_filename.to_string(),
    })
}

async fn remove_if_present(path: &PathBuf, what: &str) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => info!("cleanup: removed {} {}", what, path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("cleanup: could not remove {} {}: {}", what, path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::transcoder::TranscodeError;
    use std::io::Cursor;
    use std::path::Path;

    struct StubTranscoder {
        output_len: usize,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Transcoder for StubTranscoder {
        async fn transcode(&self, _input: &Path, output: &Path) -> Result<String, TranscodeError> {
            if self.fail {
                return Err(TranscodeError::Failed {
                    code: 1,
                    stderr: "stub: unsupported codec".to_string(),
                });
            }
            tokio::fs::write(output, vec![0u8; self.output_len]).await?;
            Ok(String::new())
        }
    }

    fn test_config(dir: &tempfile::TempDir) -> Config {
        Config {
            upload_dir: dir.path().to_path_buf(),
            ..Config::default()
        }
    }

    fn dir_entries(dir: &tempfile::TempDir) -> Vec<String> {
        std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn test_success_leaves_only_the_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let registry = DedupRegistry::new();
        let stub = StubTranscoder {
            output_len: 200 * 1024,
            fail: false,
        };
        let body = vec![1u8; 4096];

        let outcome = process_upload(
            &config,
            &registry,
            &stub,
            "clip.mp4",
            body.len() as u64,
            Cursor::new(body.clone()),
        )
        .await
        .unwrap();

        assert_eq!(outcome.received, 4096);
        assert!(registry.contains(&outcome.hash));

        let entries = dir_entries(&dir);
        assert_eq!(entries, vec![outcome.output_filename]);
    }

    #[tokio::test]
    async fn test_duplicate_does_not_unregister_prior_hash() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let registry = DedupRegistry::new();
        let stub = StubTranscoder {
            output_len: 200 * 1024,
            fail: false,
        };
        let body = vec![2u8; 1000];

        let first = process_upload(
            &config,
            &registry,
            &stub,
            "clip.mp4",
            0,
            Cursor::new(body.clone()),
        )
        .await
        .unwrap();

        let second = process_upload(&config, &registry, &stub, "clip.mp4", 0, Cursor::new(body))
            .await
            .unwrap_err();

        match second {
            AppError::Duplicate { hash, .. } => assert_eq!(hash, first.hash),
            other => panic!("expected duplicate, got {other:?}"),
        }
        // Rejecting the duplicate must not roll back the original registration.
        assert!(registry.contains(&first.hash));
    }

    #[tokio::test]
    async fn test_size_mismatch_rolls_back_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let registry = DedupRegistry::new();
        let stub = StubTranscoder {
            output_len: 200 * 1024,
            fail: false,
        };
        let body = vec![3u8; 10_000];

        // Declares 5000 bytes but sends 10000: off by more than the tolerance.
        let err = process_upload(
            &config,
            &registry,
            &stub,
            "clip.mp4",
            5000,
            Cursor::new(body.clone()),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::SizeMismatch(_)));
        assert!(registry.is_empty());
        assert!(dir_entries(&dir).is_empty());

        // Same content is accepted afterwards.
        process_upload(
            &config,
            &registry,
            &stub,
            "clip.mp4",
            body.len() as u64,
            Cursor::new(body),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_transcode_failure_carries_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let registry = DedupRegistry::new();
        let stub = StubTranscoder {
            output_len: 0,
            fail: true,
        };

        let err = process_upload(
            &config,
            &registry,
            &stub,
            "clip.mp4",
            0,
            Cursor::new(vec![4u8; 100]),
        )
        .await
        .unwrap_err();

        match err {
            AppError::Transcode(msg) => assert!(msg.contains("unsupported codec")),
            other => panic!("expected transcode failure, got {other:?}"),
        }
        assert!(registry.is_empty());
        assert!(dir_entries(&dir).is_empty());
    }

    #[tokio::test]
    async fn test_undersized_output_is_a_transcode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let registry = DedupRegistry::new();
        let stub = StubTranscoder {
            output_len: 10,
            fail: false,
        };

        let err = process_upload(
            &config,
            &registry,
            &stub,
            "clip.mp4",
            0,
            Cursor::new(vec![5u8; 100]),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Transcode(_)));
        assert!(dir_entries(&dir).is_empty());
    }
}
