//! REST implementation of [`BrokerSession`].
//!
//! Authentication is owned by an external collaborator; this client only
//! attaches the bearer token it is given.

use reqwest::{Client, Method, RequestBuilder, Response};
use std::time::Duration;
use tracing::{debug, info, warn};

use stopguard_core::{OrderSpec, Price};

use crate::error::{BrokerError, BrokerResult};
use crate::session::{
    extract_order_id, BoxFuture, BrokerSession, OrderAck, OrderBookSnapshot, PositionSnapshot,
};
use crate::wire::{AccountResponse, OrderRequest, QuotesResponse};

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the brokerage REST API.
pub struct RestBrokerClient {
    /// HTTP client.
    client: Client,
    /// API root, e.g. `https://api.broker.test/v1`.
    base_url: String,
    /// Bearer token.
    access_token: String,
}

impl RestBrokerClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - API root without trailing slash
    /// * `access_token` - Bearer token issued by the auth collaborator
    /// * `timeout` - Per-request timeout
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> BrokerResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BrokerError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.access_token)
    }

    /// Send a read request and decode its body.
    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> BrokerResult<T> {
        let response = self
            .request(Method::GET, path)
            .send()
            .await
            .map_err(|e| BrokerError::Connectivity(format!("GET {path} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrokerError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BrokerError::Connectivity(format!("GET {path} body read failed: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| BrokerError::MalformedResponse(format!("GET {path}: {e}")))
    }

    async fn fetch_account(&self, account_id: &str, fields: &str) -> BrokerResult<AccountResponse> {
        self.get_json(&format!("/accounts/{account_id}?fields={fields}"))
            .await
    }

    /// Map an order endpoint response to an acknowledgement or a submission
    /// error. Anything below 400 counts as accepted.
    async fn order_ack(response: Response) -> BrokerResult<OrderAck> {
        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(BrokerError::Submission {
                status: status.as_u16(),
                body,
            });
        }

        let order_id = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(extract_order_id);

        if order_id.is_none() {
            warn!(status = status.as_u16(), "Order accepted without an order id in Location");
        }

        Ok(OrderAck {
            status: status.as_u16(),
            order_id,
        })
    }

    async fn send_order(
        &self,
        method: Method,
        path: String,
        spec: &OrderSpec,
    ) -> BrokerResult<OrderAck> {
        let body = OrderRequest::from(spec);
        debug!(path = %path, order = %spec, "Sending order");

        let response = self
            .request(method, &path)
            .json(&body)
            .send()
            .await
            .map_err(|e| BrokerError::Connectivity(format!("{path} failed: {e}")))?;

        Self::order_ack(response).await
    }
}

impl BrokerSession for RestBrokerClient {
    fn fetch_positions<'a>(
        &'a self,
        account_id: &'a str,
    ) -> BoxFuture<'a, BrokerResult<PositionSnapshot>> {
        Box::pin(async move {
            let account = self.fetch_account(account_id, "positions").await?;
            let positions = account.securities_account.positions;
            debug!(count = positions.len(), "Fetched positions");
            Ok(positions)
        })
    }

    fn fetch_orders<'a>(
        &'a self,
        account_id: &'a str,
    ) -> BoxFuture<'a, BrokerResult<OrderBookSnapshot>> {
        Box::pin(async move {
            let account = self.fetch_account(account_id, "orders").await?;
            let orders = account.securities_account.order_strategies;
            debug!(count = orders.len(), "Fetched order book");
            Ok(orders)
        })
    }

    fn submit_order<'a>(
        &'a self,
        account_id: &'a str,
        spec: &'a OrderSpec,
    ) -> BoxFuture<'a, BrokerResult<OrderAck>> {
        Box::pin(async move {
            let ack = self
                .send_order(Method::POST, format!("/accounts/{account_id}/orders"), spec)
                .await?;
            info!(order = %spec, order_id = %ack.display_id(), "Order placed");
            Ok(ack)
        })
    }

    fn replace_order<'a>(
        &'a self,
        account_id: &'a str,
        existing_id: &'a str,
        spec: &'a OrderSpec,
    ) -> BoxFuture<'a, BrokerResult<OrderAck>> {
        Box::pin(async move {
            let ack = self
                .send_order(
                    Method::PUT,
                    format!("/accounts/{account_id}/orders/{existing_id}"),
                    spec,
                )
                .await?;
            info!(
                order = %spec,
                replaced = %existing_id,
                order_id = %ack.display_id(),
                "Order replaced"
            );
            Ok(ack)
        })
    }

    fn cancel_order<'a>(
        &'a self,
        account_id: &'a str,
        order_id: &'a str,
    ) -> BoxFuture<'a, BrokerResult<()>> {
        Box::pin(async move {
            let path = format!("/accounts/{account_id}/orders/{order_id}");
            let response = self
                .request(Method::DELETE, &path)
                .send()
                .await
                .map_err(|e| BrokerError::Connectivity(format!("DELETE {path} failed: {e}")))?;

            let status = response.status();
            if status.as_u16() >= 400 {
                let body = response.text().await.unwrap_or_default();
                return Err(BrokerError::Submission {
                    status: status.as_u16(),
                    body,
                });
            }
            info!(order_id = %order_id, "Order cancelled");
            Ok(())
        })
    }

    fn fetch_underlying_quote<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, BrokerResult<Price>> {
        Box::pin(async move {
            let quotes: QuotesResponse = self
                .get_json(&format!("/marketdata/{symbol}/quotes"))
                .await?;
            quotes
                .get(symbol)
                .and_then(|q| q.best_price())
                .ok_or_else(|| {
                    BrokerError::MalformedResponse(format!("No price in quote for {symbol}"))
                })
        })
    }
}

impl std::fmt::Debug for RestBrokerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestBrokerClient")
            .field("base_url", &self.base_url)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client =
            RestBrokerClient::new("https://api.broker.test/v1/", "token", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(client.base_url, "https://api.broker.test/v1");
    }

    #[test]
    fn test_debug_redacts_token() {
        let client =
            RestBrokerClient::new("https://api.broker.test/v1", "secret", DEFAULT_TIMEOUT).unwrap();
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_connectivity_classification() {
        let err = BrokerError::Http {
            status: 503,
            body: String::new(),
        };
        assert!(err.is_connectivity());
        let err = BrokerError::Submission {
            status: 400,
            body: String::new(),
        };
        assert!(!err.is_connectivity());
    }
}
