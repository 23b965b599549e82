use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::GatewayConfig,
    error::{AppError, AppResult},
};

/// Result of a charge submission. A declined charge is terminal for that
/// submission; the caller resubmits explicitly, there is no retry here.
#[derive(Debug, Clone)]
pub struct ChargeOutcome {
    pub success: bool,
    pub transaction_id: String,
}

/// Payment processor adapter. Only two operations are consumed: obtaining a
/// client token for the browser widget and submitting a charge. Everything
/// else (card forms, tokenization, 3DS) lives with the processor.
#[derive(Clone)]
pub enum PaymentGateway {
    Braintree(BraintreeClient),
    /// In-process stand-in for local development and tests. Charges succeed
    /// unless constructed with `declining()`.
    Sandbox { decline_charges: bool },
}

impl PaymentGateway {
    pub fn from_config(config: &GatewayConfig) -> AppResult<Self> {
        match config {
            GatewayConfig::Braintree {
                base_url,
                public_key,
                private_key,
            } => Ok(PaymentGateway::Braintree(BraintreeClient::new(
                base_url,
                public_key,
                private_key,
            )?)),
            GatewayConfig::Sandbox => Ok(PaymentGateway::sandbox()),
        }
    }

    pub fn sandbox() -> Self {
        PaymentGateway::Sandbox {
            decline_charges: false,
        }
    }

    pub fn declining() -> Self {
        PaymentGateway::Sandbox {
            decline_charges: true,
        }
    }

    pub async fn client_token(&self) -> AppResult<String> {
        match self {
            PaymentGateway::Braintree(client) => client.client_token().await,
            PaymentGateway::Sandbox { .. } => Ok(format!("sandbox-{}", Uuid::new_v4())),
        }
    }

    /// Submit a charge for `amount` cents against a payment nonce.
    pub async fn charge(&self, nonce: &str, amount: i64) -> AppResult<ChargeOutcome> {
        match self {
            PaymentGateway::Braintree(client) => client.charge(nonce, amount).await,
            PaymentGateway::Sandbox { decline_charges } => {
                if *decline_charges {
                    Err(AppError::Upstream("Transaction declined".into()))
                } else {
                    Ok(ChargeOutcome {
                        success: true,
                        transaction_id: format!("sandbox-txn-{}", Uuid::new_v4()),
                    })
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct BraintreeClient {
    http: reqwest::Client,
    base_url: String,
    public_key: String,
    private_key: String,
}

#[derive(Debug, Deserialize)]
struct ClientTokenResponse {
    client_token: String,
}

#[derive(Debug, Serialize)]
struct TransactionRequest<'a> {
    payment_method_nonce: &'a str,
    /// Decimal string in major units, e.g. "10.99".
    amount: String,
    submit_for_settlement: bool,
}

#[derive(Debug, Deserialize)]
struct TransactionResponse {
    success: bool,
    #[serde(default)]
    transaction_id: String,
    #[serde(default)]
    message: String,
}

/// Checkout submits the charge while holding row locks on the products being
/// purchased, so this timeout also bounds how long those locks can be held.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

impl BraintreeClient {
    pub fn new(base_url: &str, public_key: &str, private_key: &str) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            public_key: public_key.to_string(),
            private_key: private_key.to_string(),
        })
    }

    async fn client_token(&self) -> AppResult<String> {
        let url = format!("{}/client_token", self.base_url);
        let resp = self
            .http
            .post(&url)
            .basic_auth(&self.public_key, Some(&self.private_key))
            .send()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(AppError::Upstream(format!(
                "client token request failed with status {}",
                resp.status()
            )));
        }

        let body: ClientTokenResponse = resp
            .json()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;
        Ok(body.client_token)
    }

    async fn charge(&self, nonce: &str, amount: i64) -> AppResult<ChargeOutcome> {
        let url = format!("{}/transactions", self.base_url);
        let request = TransactionRequest {
            payment_method_nonce: nonce,
            amount: format_major_units(amount),
            submit_for_settlement: true,
        };

        let resp = self
            .http
            .post(&url)
            .basic_auth(&self.public_key, Some(&self.private_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(AppError::Upstream(format!(
                "charge request failed with status {}",
                resp.status()
            )));
        }

        let body: TransactionResponse = resp
            .json()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        if !body.success {
            return Err(AppError::Upstream(if body.message.is_empty() {
                "Transaction declined".to_string()
            } else {
                body.message
            }));
        }

        Ok(ChargeOutcome {
            success: true,
            transaction_id: body.transaction_id,
        })
    }
}

fn format_major_units(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sandbox_issues_client_tokens() {
        let gateway = PaymentGateway::sandbox();
        let token = gateway.client_token().await.unwrap();
        assert!(token.starts_with("sandbox-"));
    }

    #[tokio::test]
    async fn sandbox_charge_succeeds_by_default() {
        let gateway = PaymentGateway::sandbox();
        let outcome = gateway.charge("fake-payment-nonce", 1100).await.unwrap();
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn declining_sandbox_surfaces_upstream_error() {
        let gateway = PaymentGateway::declining();
        let err = gateway.charge("fake-payment-nonce", 1100).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
    }

    #[test]
    fn amounts_render_in_major_units() {
        assert_eq!(format_major_units(1100), "11.00");
        assert_eq!(format_major_units(905), "9.05");
        assert_eq!(format_major_units(50), "0.50");
    }
}
