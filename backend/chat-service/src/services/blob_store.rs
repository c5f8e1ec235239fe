//! Attachment storage on S3-compatible object stores.
//!
//! Attachments arrive inline on the socket as base64; the session
//! decodes them and hands the bytes here. Objects are keyed under a
//! random prefix so client-supplied file names can never collide or
//! traverse.

use crate::config::S3Config;
use crate::error::{AppError, AppResult};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use uuid::Uuid;

pub struct BlobStore {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl BlobStore {
    pub async fn connect(config: &S3Config) -> Self {
        let base = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;
        let mut builder = aws_sdk_s3::config::Builder::from(&base);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let public_base_url = config.public_base_url.clone().unwrap_or_else(|| {
            format!(
                "https://{}.s3.{}.amazonaws.com",
                config.bucket, config.region
            )
        });

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            public_base_url,
        }
    }

    /// Upload attachment bytes; returns the public URL to embed in the
    /// message row.
    pub async fn store(&self, file_path: &str, bytes: Vec<u8>, mime_type: &str) -> AppResult<String> {
        let key = object_key(file_path);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(mime_type)
            .send()
            .await
            .map_err(|e| AppError::Blob(e.to_string()))?;

        Ok(format!("{}/{}", self.public_base_url.trim_end_matches('/'), key))
    }
}

/// Random prefix plus the sanitized final path segment.
fn object_key(file_path: &str) -> String {
    let name: String = file_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("attachment")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let name = if name.is_empty() {
        "attachment".to_string()
    } else {
        name
    };
    format!("attachments/{}-{}", Uuid::new_v4(), name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_key_strips_directories() {
        let key = object_key("../../etc/passwd");
        assert!(key.starts_with("attachments/"));
        assert!(key.ends_with("-passwd"));
        assert!(!key.contains(".."));
    }

    #[test]
    fn object_key_handles_empty_name() {
        let key = object_key("///");
        assert!(key.ends_with("-attachment"));
    }
}
