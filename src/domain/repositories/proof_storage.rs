use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

#[automock]
#[async_trait]
pub trait ProofStorageClient {
    /// Stores uploaded proof-of-transfer bytes and returns the object
    /// reference recorded on the attempt.
    async fn upload_proof(
        &self,
        attempt_id: Uuid,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String>;
}
