use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

/// Stub bytes written when ffmpeg is unavailable, so degraded-mode runs
/// still produce an artifact to move through the pipeline.
const PLACEHOLDER_BYTES: &[u8] = b"placeholder media content";

/// The external media-transform collaborator: an ffmpeg subprocess with a
/// file-in/file-out contract. Covers are scaled to a fixed height; video
/// thumbnails are a single extracted frame.
pub struct MediaTransform {
    ffmpeg_bin: String,
}

impl MediaTransform {
    pub fn new(ffmpeg_bin: &str) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.to_string(),
        }
    }

    /// Downscale an image to a 720px-high cover, width auto.
    pub async fn scale_cover(&self, input: &Path, output: &Path) -> Result<(), TransformError> {
        self.run(&[
            "-i".as_ref(),
            input.as_os_str(),
            "-vf".as_ref(),
            "scale=-1:720".as_ref(),
            "-y".as_ref(),
            output.as_os_str(),
        ])
        .await
    }

    /// Extract a single frame at t=1s as a video thumbnail.
    pub async fn extract_frame(&self, video: &Path, output: &Path) -> Result<(), TransformError> {
        self.run(&[
            "-i".as_ref(),
            video.as_os_str(),
            "-ss".as_ref(),
            "00:00:01.000".as_ref(),
            "-vframes".as_ref(),
            "1".as_ref(),
            "-y".as_ref(),
            output.as_os_str(),
        ])
        .await
    }

    /// Synthesize a short test-pattern video for mock results. Falls back to
    /// a byte stub when ffmpeg is not installed.
    pub async fn placeholder_video(&self, output: &Path) -> Result<(), TransformError> {
        let result = self
            .run(&[
                "-f".as_ref(),
                "lavfi".as_ref(),
                "-i".as_ref(),
                "testsrc=duration=2:size=640x360:rate=30".as_ref(),
                "-c:v".as_ref(),
                "libx264".as_ref(),
                "-y".as_ref(),
                output.as_os_str(),
            ])
            .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, "ffmpeg placeholder synthesis failed, writing byte stub");
            tokio::fs::write(output, PLACEHOLDER_BYTES).await?;
        }
        Ok(())
    }

    /// Write a byte-stub placeholder file for mock image results.
    pub async fn placeholder_file(&self, output: &Path) -> Result<(), TransformError> {
        tokio::fs::write(output, PLACEHOLDER_BYTES).await?;
        Ok(())
    }

    async fn run(&self, args: &[&std::ffi::OsStr]) -> Result<(), TransformError> {
        let status = Command::new(&self.ffmpeg_bin)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            Err(TransformError::Ffmpeg(status))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("failed to spawn media transform: {0}")]
    Io(#[from] std::io::Error),

    #[error("ffmpeg exited with {0}")]
    Ffmpeg(std::process::ExitStatus),
}

#[cfg(test)]
mod tests {
    use super::*;

    const MISSING_BIN: &str = "ffmpeg-binary-that-does-not-exist";

    #[tokio::test]
    async fn placeholder_file_writes_stub_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("stub.png");

        let transform = MediaTransform::new(MISSING_BIN);
        transform.placeholder_file(&out).await.expect("stub write");

        let bytes = tokio::fs::read(&out).await.expect("stub readable");
        assert_eq!(bytes, PLACEHOLDER_BYTES);
    }

    #[tokio::test]
    async fn placeholder_video_falls_back_without_ffmpeg() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("stub.mp4");

        let transform = MediaTransform::new(MISSING_BIN);
        transform.placeholder_video(&out).await.expect("fallback succeeds");

        let bytes = tokio::fs::read(&out).await.expect("stub readable");
        assert_eq!(bytes, PLACEHOLDER_BYTES);
    }

    #[tokio::test]
    async fn scale_cover_surfaces_spawn_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let transform = MediaTransform::new(MISSING_BIN);

        let result = transform
            .scale_cover(&dir.path().join("in.png"), &dir.path().join("out.png"))
            .await;
        assert!(matches!(result, Err(TransformError::Io(_))));
    }
}
