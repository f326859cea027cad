#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub server: Server,
    pub database: Database,
    pub plan_catalog: PlanCatalogSource,
    pub gateway: GatewayRailConfig,
    pub crypto: CryptoRailConfig,
    pub proof_storage: ProofStorageConfig,
    pub sweep: SweepConfig,
}

#[derive(Debug, Clone)]
pub struct Server {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct PlanCatalogSource {
    pub path: String,
}

/// Card-rail settings, injected into the gateway adapter at construction.
#[derive(Debug, Clone)]
pub struct GatewayRailConfig {
    pub enabled: bool,
    pub api_base: String,
    pub secret_key: String,
    pub webhook_secret: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// Crypto-rail settings. The receiving address is system configuration, not
/// generated per attempt.
#[derive(Debug, Clone)]
pub struct CryptoRailConfig {
    pub enabled: bool,
    pub currency: String,
    pub receiving_address: String,
    pub stale_after_hours: i64,
    pub proof_max_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct ProofStorageConfig {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub prefix: String,
}

#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub interval_secs: u64,
    pub expiry_reminder_days: i64,
}

#[derive(Debug, Clone)]
pub struct AuthSecret {
    pub secret: String,
}
