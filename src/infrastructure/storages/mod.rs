pub mod proof_store;
pub mod s3;
