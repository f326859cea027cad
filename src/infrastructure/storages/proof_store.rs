use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::{
    error::{ProvideErrorMetadata, SdkError},
    operation::put_object::PutObjectError,
    primitives::ByteStream,
};
use uuid::Uuid;

use crate::config::config_model::ProofStorageConfig;
use crate::domain::repositories::proof_storage::ProofStorageClient;

use super::s3::{S3Config, build_s3_client};

/// S3-compatible store for uploaded proof-of-transfer evidence. Objects are
/// written once per attempt and never overwritten; the object key is the
/// reference recorded on the attempt row.
pub struct S3ProofStorageClient {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
}

impl S3ProofStorageClient {
    pub async fn new(config: ProofStorageConfig) -> Result<Self> {
        let client = build_s3_client(&S3Config::new(
            config.endpoint,
            config.region,
            config.access_key,
            config.secret_key,
        ))
        .await
        .context("failed to build proof storage s3 client")?;

        Ok(Self {
            client,
            bucket: config.bucket,
            prefix: normalize_prefix(&config.prefix),
        })
    }
}

#[async_trait]
impl ProofStorageClient for S3ProofStorageClient {
    async fn upload_proof(
        &self,
        attempt_id: Uuid,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        let object_key = format!(
            "{}{}{}",
            self.prefix,
            attempt_id,
            extension_for(content_type)
        );
        let body = ByteStream::from(bytes);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|err| map_put_object_error(err, &self.bucket, &object_key))?;

        Ok(object_key)
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "application/pdf" => ".pdf",
        _ => "",
    }
}

fn map_put_object_error(
    err: SdkError<PutObjectError>,
    bucket: &str,
    object_key: &str,
) -> anyhow::Error {
    if let SdkError::ServiceError(service_err) = &err {
        let raw = service_err.raw();
        let status = raw.status().as_u16();
        let code = service_err.err().code().unwrap_or("unknown");
        let message = service_err.err().message().unwrap_or_default();

        let mut detail = format!(
            "failed to upload proof to object storage (status {}, code {})",
            status, code
        );

        if !message.is_empty() {
            detail.push_str(&format!(": {}", message));
        }

        detail.push_str(&format!(" [bucket={}, key={}]", bucket, object_key));

        return anyhow::anyhow!(detail);
    }

    anyhow::Error::new(err).context("failed to upload proof to object storage")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_normalized_to_a_single_trailing_slash() {
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix("proofs"), "proofs/");
        assert_eq!(normalize_prefix("/proofs/"), "proofs/");
    }

    #[test]
    fn object_extension_follows_the_content_type() {
        assert_eq!(extension_for("image/jpeg"), ".jpg");
        assert_eq!(extension_for("image/png"), ".png");
        assert_eq!(extension_for("application/pdf"), ".pdf");
        assert_eq!(extension_for("application/octet-stream"), "");
    }
}
