use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::error::GatewayError;
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::{SimulationResult, TransactionQuery, TransactionRecord};

/// HTTP client bound to one network's REST endpoint
#[derive(Clone)]
pub struct RpcClient {
    client: Client,
    base_url: String,
}

impl RpcClient {
    pub fn new(base_url: String) -> Self {
        Self::new_with_config(base_url, 30)
    }

    pub fn new_with_config(base_url: String, timeout_seconds: u64) -> Self {
        let context = LogContext::new("rpc_client", "initialization")
            .with_endpoint(&base_url)
            .with_metadata("timeout_seconds", serde_json::json!(timeout_seconds));
        context.debug("Initializing RPC client");

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .pool_max_idle_per_host(4)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL extended by `segments`, each percent-encoded as a single path segment
    fn url(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let invalid = |reason: String| GatewayError::Network {
            url: self.base_url.clone(),
            reason,
        };

        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(format!("invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| invalid("base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    /// Transaction history of an account, in the order the server returns it
    pub async fn get_account_transactions(
        &self,
        address: &str,
        query: &TransactionQuery,
    ) -> Result<Vec<TransactionRecord>, GatewayError> {
        let url = self.url(&["accounts", address, "transactions"])?;
        let monitor = PerformanceMonitor::new("rpc_get_account_transactions")
            .with_metadata("address", serde_json::json!(address));

        let result = self
            .execute::<Vec<TransactionRecord>>(self.client.get(url.clone()).query(query), url.as_str())
            .await;

        let duration = monitor.finish_with_result(&result);
        MetricsLogger::log_rpc_call("get_account_transactions", duration, result.is_ok());

        if let Ok(records) = &result {
            LogContext::new("rpc_client", "get_account_transactions")
                .with_address(address)
                .with_metadata("transaction_count", serde_json::json!(records.len()))
                .trace(&format!("Retrieved {} transactions", records.len()));
        }

        result
    }

    /// Dry-run a transaction without committing it
    pub async fn simulate_transaction(&self, txn: &Value) -> Result<SimulationResult, GatewayError> {
        let url = self.url(&["transactions", "simulate"])?;
        let monitor = PerformanceMonitor::new("rpc_simulate_transaction");

        let result = self
            .execute::<Vec<SimulationResult>>(self.client.post(url.clone()).json(txn), url.as_str())
            .await
            .and_then(|results| {
                results
                    .into_iter()
                    .next()
                    .ok_or_else(|| GatewayError::Decode("simulation returned no results".to_string()))
            });

        let duration = monitor.finish_with_result(&result);
        MetricsLogger::log_rpc_call("simulate_transaction", duration, result.is_ok());

        result
    }

    /// Send a request and decode a successful JSON body
    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &str,
    ) -> Result<T, GatewayError> {
        LogContext::new("rpc_client", "execute")
            .with_endpoint(url)
            .trace("Sending request");

        let response = request.send().await.map_err(|e| network_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(rpc_error(response).await);
        }

        let body = response.text().await.map_err(|e| network_error(url, e))?;
        serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

/// Any transport failure means no usable response arrived
fn network_error(url: &str, error: reqwest::Error) -> GatewayError {
    let reason = if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    };

    GatewayError::Network {
        url: url.to_string(),
        reason,
    }
}

/// Build an `Rpc` error from a non-success response, preferring the body's `message`
async fn rpc_error(response: Response) -> GatewayError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    GatewayError::Rpc {
        status: status.as_u16(),
        message: error_message(&body, status.canonical_reason().unwrap_or("Unknown")),
    }
}

fn error_message(body: &str, fallback: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = value.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}
