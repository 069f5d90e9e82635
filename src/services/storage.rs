use s3::creds::Credentials;
use s3::{Bucket, Region};

use crate::models::task::MediaKind;

/// Presigned reference URLs stay valid long enough for a provider to fetch
/// the input image over the whole generation window.
const PRESIGN_EXPIRY_SECS: u32 = 2 * 60 * 60;

/// Client for Cloudflare R2 object storage (S3-compatible), spanning the
/// private media bucket and the public covers bucket.
pub struct R2Client {
    private: Box<Bucket>,
    public: Box<Bucket>,
}

impl R2Client {
    pub fn new(
        private_bucket: &str,
        public_bucket: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: "auto".to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials = Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        let private = Bucket::new(private_bucket, region.clone(), credentials.clone())
            .map_err(|e| StorageError::Config(e.to_string()))?;
        let public = Bucket::new(public_bucket, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self { private, public })
    }

    /// Download an object from the private bucket.
    pub async fn download_private(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let response = self.private.get_object(key).await.map_err(StorageError::S3)?;
        Ok(response.to_vec())
    }

    /// Upload a generated artifact to the private bucket.
    pub async fn upload_private(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.private
            .put_object_with_content_type(key, data, content_type_for_key(key))
            .await
            .map_err(StorageError::S3)?;
        Ok(())
    }

    /// Upload a cover or thumbnail to the public bucket.
    pub async fn upload_public(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.public
            .put_object_with_content_type(key, data, content_type_for_key(key))
            .await
            .map_err(StorageError::S3)?;
        Ok(())
    }

    /// Presign a GET URL for a private object so an external provider can
    /// fetch a reference asset without credentials.
    pub async fn presign_reference(&self, key: &str) -> Result<String, StorageError> {
        self.private
            .presign_get(key, PRESIGN_EXPIRY_SECS, None)
            .await
            .map_err(StorageError::S3)
    }

}

/// Key of the primary artifact in the private bucket.
pub fn media_key(namespace: &str, media_id: &str, kind: MediaKind) -> String {
    match kind {
        MediaKind::Image => format!("{namespace}/{media_id}.png"),
        MediaKind::Video => format!("{namespace}/{media_id}.mp4"),
    }
}

/// Key of the derived cover in the public bucket.
pub fn cover_key(namespace: &str, media_id: &str, kind: MediaKind) -> String {
    match kind {
        MediaKind::Image => format!("{namespace}/{media_id}_cover.png"),
        MediaKind::Video => format!("{namespace}/{media_id}_thumb.png"),
    }
}

/// Key of the 720p preview derived from a reference asset.
pub fn reference_cover_key(namespace: &str, task_id: &str) -> String {
    format!("{namespace}/{task_id}_720p.png")
}

/// Content type derived from the key's file extension.
pub fn content_type_for_key(key: &str) -> &'static str {
    match key.rsplit('.').next() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Storage configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_deterministic() {
        let a = media_key("user_7", "task_1", MediaKind::Image);
        let b = media_key("user_7", "task_1", MediaKind::Image);
        assert_eq!(a, b);
        assert_eq!(a, "user_7/task_1.png");
    }

    #[test]
    fn video_keys_use_mp4_and_thumb() {
        assert_eq!(media_key("ns", "vid_1", MediaKind::Video), "ns/vid_1.mp4");
        assert_eq!(cover_key("ns", "vid_1", MediaKind::Video), "ns/vid_1_thumb.png");
    }

    #[test]
    fn image_cover_uses_cover_suffix() {
        assert_eq!(cover_key("ns", "task_1", MediaKind::Image), "ns/task_1_cover.png");
    }

    #[test]
    fn reference_cover_uses_720p_suffix() {
        assert_eq!(reference_cover_key("ns", "task_1"), "ns/task_1_720p.png");
    }

    #[test]
    fn content_type_mapping() {
        assert_eq!(content_type_for_key("a/b.jpg"), "image/jpeg");
        assert_eq!(content_type_for_key("a/b.jpeg"), "image/jpeg");
        assert_eq!(content_type_for_key("a/b.png"), "image/png");
        assert_eq!(content_type_for_key("a/b.gif"), "image/gif");
        assert_eq!(content_type_for_key("a/b.webp"), "image/webp");
        assert_eq!(content_type_for_key("a/b.mp4"), "video/mp4");
        assert_eq!(content_type_for_key("a/b.bin"), "application/octet-stream");
        assert_eq!(content_type_for_key("noext"), "application/octet-stream");
    }
}
