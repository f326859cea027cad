use anyhow::Result;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use sha2::Sha256;
use tracing::error;
use uuid::Uuid;

use crate::config::config_model::GatewayRailConfig;

type HmacSha256 = Hmac<Sha256>;

/// Minimal card-gateway client built on reqwest. The gateway hosts the
/// checkout UI; this side only creates sessions and authenticates callbacks.
pub struct GatewayClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
    webhook_secret: String,
    success_url: String,
    cancel_url: String,
}

#[derive(Debug, Deserialize)]
pub struct GatewayEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub data: GatewayEventData,
}

#[derive(Debug, Deserialize)]
pub struct GatewayEventData {
    pub object: serde_json::Value,
}

/// The payment object carried inside a verified callback. `reference` echoes
/// the attempt id this side stamped onto the session at creation.
#[derive(Debug, Deserialize)]
pub struct GatewayPaymentObject {
    pub session: Option<String>,
    pub reference: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
}

/// Checkout session handed back to the caller at initiation.
#[derive(Debug, Clone)]
pub struct GatewayCheckoutSession {
    pub session_ref: String,
    pub checkout_url: String,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorEnvelope {
    error: GatewayErrorDetails,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

impl GatewayClient {
    pub fn new(config: &GatewayRailConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
            success_url: config.success_url.clone(),
            cancel_url: config.cancel_url.clone(),
        }
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let (error_type, error_code, error_message) =
            match serde_json::from_str::<GatewayErrorEnvelope>(&body) {
                Ok(envelope) => {
                    let details = envelope.error;
                    (details.type_, details.code, details.message)
                }
                Err(_) => (None, None, None),
            };

        error!(
            status = %status,
            gateway_request_id = ?request_id,
            gateway_error_type = ?error_type,
            gateway_error_code = ?error_code,
            gateway_error_message = ?error_message,
            context = %context,
            "gateway api request failed"
        );

        anyhow::bail!(
            "gateway API request failed: {} (status {}, request_id={:?})",
            context,
            status,
            request_id
        );
    }

    /// Creates a hosted checkout session and returns its reference and URL.
    /// The attempt id travels in the session reference so the confirmation
    /// callback can be correlated back to the attempt.
    pub async fn create_checkout_session(
        &self,
        attempt_id: Uuid,
        amount_minor: i32,
        currency: &str,
        description: &str,
    ) -> Result<GatewayCheckoutSession> {
        let body = [
            ("amount", amount_minor.to_string()),
            ("currency", currency.to_string()),
            ("description", description.to_string()),
            ("reference", attempt_id.to_string()),
            ("success_url", self.success_url.clone()),
            ("cancel_url", self.cancel_url.clone()),
        ];

        let resp = self
            .http
            .post(format!("{}/checkout/sessions", self.api_base))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create checkout session").await?;

        #[derive(Deserialize)]
        struct CheckoutResp {
            id: String,
            url: Option<String>,
        }

        let parsed: CheckoutResp = resp.json().await?;
        let checkout_url = parsed
            .url
            .ok_or_else(|| anyhow::anyhow!("gateway checkout session URL is missing"))?;

        Ok(GatewayCheckoutSession {
            session_ref: parsed.id,
            checkout_url,
        })
    }

    /// Verifies the callback signature header (`t=<unix>,v1=<hex hmac>` over
    /// `"{t}.{payload}"` with the shared webhook secret) before parsing.
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<GatewayEvent> {
        let mut timestamp: Option<String> = None;
        let mut signature: Option<String> = None;

        for part in signature_header.split(',') {
            if let Some(rest) = part.strip_prefix("t=") {
                timestamp = Some(rest.to_string());
            } else if let Some(rest) = part.strip_prefix("v1=") {
                signature = Some(rest.to_string());
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| anyhow::anyhow!("missing timestamp in signature header"))?;
        let signature =
            signature.ok_or_else(|| anyhow::anyhow!("missing v1 in signature header"))?;

        let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())?;
        mac.update(signed_payload.as_bytes());
        let expected = mac.finalize().into_bytes();
        let provided = hex::decode(signature)?;

        if expected[..] != provided[..] {
            anyhow::bail!("invalid webhook signature");
        }

        let event: GatewayEvent = serde_json::from_slice(payload)?;
        Ok(event)
    }

    pub fn extract_payment_object(event: &GatewayEvent) -> Option<GatewayPaymentObject> {
        serde_json::from_value(event.data.object.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> GatewayClient {
        GatewayClient::new(&GatewayRailConfig {
            enabled: true,
            api_base: "https://gateway.test/v1".to_string(),
            secret_key: "sk_test_123".to_string(),
            webhook_secret: "whsec_unit_test_secret".to_string(),
            success_url: "https://app.test/billing/success".to_string(),
            cancel_url: "https://app.test/billing/cancel".to_string(),
        })
    }

    fn sign(secret: &str, timestamp: &str, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", timestamp, String::from_utf8_lossy(payload)).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_correctly_signed_payload() {
        let client = test_client();
        let payload = br#"{"id":"evt_1","type":"payment.succeeded","data":{"object":{"session":"cs_1","reference":"7b3c8f1e-13a2-4b5f-9d6e-2f4a8c1b0d9e"}}}"#;
        let signature = sign("whsec_unit_test_secret", "1700000000", payload);
        let header = format!("t=1700000000,v1={}", signature);

        let event = client
            .verify_webhook_signature(payload, &header)
            .expect("valid signature should verify");
        assert_eq!(event.type_, "payment.succeeded");

        let object = GatewayClient::extract_payment_object(&event).expect("object should parse");
        assert_eq!(object.session.as_deref(), Some("cs_1"));
    }

    #[test]
    fn rejects_wrong_secret() {
        let client = test_client();
        let payload = br#"{"type":"payment.succeeded","data":{"object":{}}}"#;
        let signature = sign("some_other_secret", "1700000000", payload);
        let header = format!("t=1700000000,v1={}", signature);

        assert!(client.verify_webhook_signature(payload, &header).is_err());
    }

    #[test]
    fn rejects_tampered_payload() {
        let client = test_client();
        let payload = br#"{"type":"payment.succeeded","data":{"object":{}}}"#;
        let signature = sign("whsec_unit_test_secret", "1700000000", payload);
        let header = format!("t=1700000000,v1={}", signature);

        let tampered = br#"{"type":"payment.failed","data":{"object":{}}}"#;
        assert!(client.verify_webhook_signature(tampered, &header).is_err());
    }

    #[test]
    fn rejects_malformed_signature_header() {
        let client = test_client();
        let payload = br#"{"type":"payment.succeeded","data":{"object":{}}}"#;

        assert!(client.verify_webhook_signature(payload, "v1=deadbeef").is_err());
        assert!(client.verify_webhook_signature(payload, "t=1700000000").is_err());
        assert!(
            client
                .verify_webhook_signature(payload, "t=1700000000,v1=nothex")
                .is_err()
        );
    }
}
