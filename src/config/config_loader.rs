use anyhow::{Ok, Result};

use super::config_model::{
    AuthSecret, CryptoRailConfig, Database, DotEnvyConfig, GatewayRailConfig, PlanCatalogSource,
    ProofStorageConfig, Server, SweepConfig,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let server = Server {
        port: std::env::var("SERVER_PORT")
            .expect("SERVER_PORT is invalid")
            .parse()?,
        body_limit: std::env::var("SERVER_BODY_LIMIT")
            .expect("SERVER_BODY_LIMIT is invalid")
            .parse()?,
        timeout: std::env::var("SERVER_TIMEOUT")
            .expect("SERVER_TIMEOUT is invalid")
            .parse()?,
    };

    let database = Database {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL is invalid"),
    };

    let plan_catalog = PlanCatalogSource {
        path: std::env::var("PLAN_CATALOG_PATH").expect("PLAN_CATALOG_PATH is invalid"),
    };

    let gateway = GatewayRailConfig {
        enabled: env_bool("GATEWAY_RAIL_ENABLED", true),
        api_base: std::env::var("GATEWAY_API_BASE").expect("GATEWAY_API_BASE is invalid"),
        secret_key: std::env::var("GATEWAY_SECRET_KEY").expect("GATEWAY_SECRET_KEY is invalid"),
        webhook_secret: std::env::var("GATEWAY_WEBHOOK_SECRET")
            .expect("GATEWAY_WEBHOOK_SECRET is invalid"),
        success_url: std::env::var("GATEWAY_SUCCESS_URL")
            .expect("GATEWAY_SUCCESS_URL is invalid"),
        cancel_url: std::env::var("GATEWAY_CANCEL_URL").expect("GATEWAY_CANCEL_URL is invalid"),
    };

    let crypto = CryptoRailConfig {
        enabled: env_bool("CRYPTO_RAIL_ENABLED", true),
        currency: std::env::var("CRYPTO_CURRENCY").unwrap_or_else(|_| "usdt-trc20".to_string()),
        receiving_address: std::env::var("CRYPTO_RECEIVING_ADDRESS")
            .expect("CRYPTO_RECEIVING_ADDRESS is invalid"),
        stale_after_hours: std::env::var("CRYPTO_STALE_AFTER_HOURS")
            .unwrap_or_else(|_| "48".to_string())
            .parse()?,
        proof_max_bytes: std::env::var("CRYPTO_PROOF_MAX_BYTES")
            .unwrap_or_else(|_| (5 * 1024 * 1024).to_string())
            .parse()?,
    };

    let proof_storage = ProofStorageConfig {
        endpoint: std::env::var("PROOF_S3_ENDPOINT").expect("PROOF_S3_ENDPOINT is invalid"),
        region: std::env::var("PROOF_S3_REGION").expect("PROOF_S3_REGION is invalid"),
        bucket: std::env::var("PROOF_S3_BUCKET").unwrap_or_else(|_| "payment_proofs".to_string()),
        access_key: std::env::var("PROOF_S3_ACCESS_KEY_ID")
            .expect("PROOF_S3_ACCESS_KEY_ID is invalid"),
        secret_key: std::env::var("PROOF_S3_SECRET_ACCESS_KEY")
            .expect("PROOF_S3_SECRET_ACCESS_KEY is invalid"),
        prefix: std::env::var("PROOF_S3_PREFIX").unwrap_or_else(|_| "proofs".to_string()),
    };

    let sweep = SweepConfig {
        interval_secs: std::env::var("SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()?,
        expiry_reminder_days: std::env::var("EXPIRY_REMINDER_DAYS")
            .unwrap_or_else(|_| "3".to_string())
            .parse()?,
    };

    Ok(DotEnvyConfig {
        server,
        database,
        plan_catalog,
        gateway,
        crypto,
        proof_storage,
        sweep,
    })
}

pub fn get_auth_secret() -> Result<AuthSecret> {
    dotenvy::dotenv().ok();

    Ok(AuthSecret {
        secret: std::env::var("JWT_AUTH_SECRET").expect("JWT_AUTH_SECRET is invalid"),
    })
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok() {
        Some(raw) => matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "t" | "yes" | "y" | "on"
        ),
        None => default,
    }
}
