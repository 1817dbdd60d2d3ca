use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::info;

/// Read buffer size for streaming an upload to disk (1 MiB)
const CHUNK_SIZE: usize = 1024 * 1024;

/// What the writer produced once the body is fully on disk.
#[derive(Debug)]
pub struct IngestSummary {
    /// Bytes actually read from the client
    pub received: u64,
    /// Hex-encoded SHA-256 of the full byte sequence
    pub hash: String,
}

/// Stream the request body to `path`, hashing each chunk as it lands.
///
/// `declared` is the content-length the client announced (0 when unknown);
/// it only drives the progress log, never the write itself.
pub async fn write_to_file<R>(
    mut reader: R,
    path: &Path,
    declared: u64,
) -> std::io::Result<IngestSummary>
where
    R: AsyncRead + Unpin,
{
    let mut file = File::create(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut received: u64 = 0;

    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        file.write_all(&buffer[..n]).await?;
        hasher.update(&buffer[..n]);
        received += n as u64;

        let percent = if declared > 0 {
            received as f64 / declared as f64 * 100.0
        } else {
            0.0
        };
        info!(
            "receiving: {:.2} MB / {:.2} MB ({:.2}%)",
            received as f64 / 1024.0 / 1024.0,
            declared as f64 / 1024.0 / 1024.0,
            percent
        );
    }

    file.flush().await?;
    info!("body fully written to {}", path.display());

    Ok(IngestSummary {
        received,
        hash: hex::encode(hasher.finalize()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::hash::calculate_hash;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_write_counts_and_hashes_exact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.bin");
        let data = vec![7u8; 3 * 1024 * 1024 + 123];

        let summary = write_to_file(Cursor::new(data.clone()), &path, data.len() as u64)
            .await
            .unwrap();

        assert_eq!(summary.received, data.len() as u64);
        assert_eq!(summary.hash, calculate_hash(&data));
        assert_eq!(
            tokio::fs::metadata(&path).await.unwrap().len(),
            data.len() as u64
        );
    }

    #[tokio::test]
    async fn test_write_empty_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.bin");

        let summary = write_to_file(Cursor::new(Vec::new()), &path, 0).await.unwrap();

        assert_eq!(summary.received, 0);
        assert_eq!(summary.hash, calculate_hash(b""));
    }
}
