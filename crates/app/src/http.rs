//! REST client for the canteen backend.

use std::time::Duration;

use async_trait::async_trait;
use canteen::{
    checkout::OrderRequest,
    delivery::{DeliveryProfile, RecipientRecord},
    money::Amount,
    orders::{Order, OrderAction, OrderUuid, TransitionError},
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::debug;

use crate::gateways::{
    EndpointError, GatewayError, OrderEndpoint, ProfileService, RecipientLookup, TransitionOutcome,
    WalletGateway,
};

/// Configuration for connecting to the backend.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// API root, e.g. `"https://canteen.example/api/"`.
    pub base_url: Url,

    /// Bearer token for the signed-in account.
    pub token: Option<String>,

    /// Per-request timeout.
    pub timeout: Duration,
}

/// HTTP implementation of every backend collaborator.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    config: HttpConfig,
    http: Client,
}

impl HttpGateway {
    /// Create a new client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: HttpConfig) -> Result<Self, GatewayError> {
        let http = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { config, http })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.config.base_url.clone();

        url.path_segments_mut()
            .map_err(|()| GatewayError::InvalidUrl(self.config.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);

        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, GatewayError> {
        let url = self.url(segments)?;

        debug!(%url, "GET");

        let response = self.request(Method::GET, url).send().await?;

        read(response).await
    }
}

async fn read<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        return Err(status_error(status, &text));
    }

    Ok(response.json().await?)
}

fn status_error(status: StatusCode, text: &str) -> GatewayError {
    match status {
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            GatewayError::Transport(format!("backend answered {status}").into())
        }
        status if status.is_client_error() => {
            GatewayError::Rejected(format!("status {status}: {text}"))
        }
        status => GatewayError::UnexpectedResponse(format!("status {status}: {text}")),
    }
}

/// Failure bodies that are not guard refusals.
#[derive(Debug, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
enum FailureBody {
    InsufficientBalance { required: Amount, available: Amount },
}

fn transition_failure(order: OrderUuid, status: StatusCode, text: &str) -> EndpointError {
    if status == StatusCode::NOT_FOUND {
        return EndpointError::NotFound(order);
    }

    if status.is_client_error() {
        if let Ok(refused) = serde_json::from_str::<TransitionError>(text) {
            return refused.into();
        }

        if let Ok(FailureBody::InsufficientBalance {
            required,
            available,
        }) = serde_json::from_str(text)
        {
            return EndpointError::InsufficientBalance {
                required,
                available,
            };
        }
    }

    status_error(status, text).into()
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: Amount,
}

#[async_trait]
impl WalletGateway for HttpGateway {
    async fn balance(&self, account: &str) -> Result<Amount, GatewayError> {
        let parsed: BalanceResponse = self.get(&["wallets", account, "balance"]).await?;

        Ok(parsed.balance)
    }
}

#[async_trait]
impl ProfileService for HttpGateway {
    async fn get_profile(&self) -> Result<DeliveryProfile, GatewayError> {
        self.get(&["profile"]).await
    }
}

#[async_trait]
impl RecipientLookup for HttpGateway {
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<RecipientRecord>, GatewayError> {
        let url = self.url(&["users", username, "delivery"])?;

        debug!(%url, "GET");

        let response = self.request(Method::GET, url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        read(response).await.map(Some)
    }
}

#[async_trait]
impl OrderEndpoint for HttpGateway {
    async fn submit(&self, request: OrderRequest) -> Result<Order, GatewayError> {
        let url = self.url(&["orders"])?;

        debug!(%url, restaurant = %request.restaurant_id, "POST");

        let response = self
            .request(Method::POST, url)
            .json(&request)
            .send()
            .await?;

        read(response).await
    }

    async fn fetch(&self, order: OrderUuid) -> Result<Order, EndpointError> {
        let url = self.url(&["orders", &order.to_string()])?;

        debug!(%url, "GET");

        let response = self.request(Method::GET, url).send().await.map_err(GatewayError::from)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(transition_failure(order, status, &text));
        }

        Ok(response.json().await.map_err(GatewayError::from)?)
    }

    async fn list(&self) -> Result<Vec<Order>, GatewayError> {
        self.get(&["orders"]).await
    }

    async fn transition(
        &self,
        order: OrderUuid,
        action: OrderAction,
    ) -> Result<TransitionOutcome, EndpointError> {
        let url = self.url(&["orders", &order.to_string(), "transitions"])?;

        debug!(%url, action = action.name(), "POST");

        let response = self
            .request(Method::POST, url)
            .json(&action)
            .send()
            .await
            .map_err(GatewayError::from)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(transition_failure(order, status, &text));
        }

        Ok(response.json().await.map_err(GatewayError::from)?)
    }
}

#[cfg(test)]
mod tests {
    use canteen::orders::OrderStatus;
    use testresult::TestResult;

    use super::*;

    fn gateway(base_url: &str) -> Result<HttpGateway, Box<dyn std::error::Error>> {
        Ok(HttpGateway::new(HttpConfig {
            base_url: base_url.parse()?,
            token: Some("secret".to_string()),
            timeout: Duration::from_secs(2),
        })?)
    }

    #[test]
    fn url_segments_are_encoded_under_the_base_path() -> TestResult {
        let gateway = gateway("https://canteen.example/api/")?;

        let url = gateway.url(&["users", "ada/lovelace", "delivery"])?;

        assert_eq!(
            url.as_str(),
            "https://canteen.example/api/users/ada%2Flovelace/delivery"
        );

        Ok(())
    }

    #[test]
    fn guard_refusals_map_onto_transition_errors() {
        let order = OrderUuid::now_v7();

        let exceeded = transition_failure(
            order,
            StatusCode::CONFLICT,
            r#"{"reason":"fee_exceeds_limit","proposed":1500,"ceiling":1000}"#,
        );

        assert!(
            matches!(
                exceeded,
                EndpointError::Refused(TransitionError::FeeExceedsLimit { proposed, ceiling })
                    if proposed == Amount::new(1500) && ceiling == Amount::new(1000)
            ),
            "got {exceeded:?}"
        );

        let invalid = transition_failure(
            order,
            StatusCode::CONFLICT,
            r#"{"reason":"invalid_transition","from":"Fee Requested","action":"mark_delivered"}"#,
        );

        assert!(
            matches!(
                invalid,
                EndpointError::Refused(TransitionError::InvalidTransition {
                    from: OrderStatus::FeeRequested,
                    ..
                })
            ),
            "got {invalid:?}"
        );
    }

    #[test]
    fn insufficient_balance_body_is_recognised() {
        let result = transition_failure(
            OrderUuid::now_v7(),
            StatusCode::PAYMENT_REQUIRED,
            r#"{"reason":"insufficient_balance","required":2500,"available":2000}"#,
        );

        assert!(
            matches!(
                result,
                EndpointError::InsufficientBalance { required, available }
                    if required == Amount::new(2500) && available == Amount::new(2000)
            ),
            "got {result:?}"
        );
    }

    #[test]
    fn unknown_bodies_and_outages_are_not_guard_failures() {
        let order = OrderUuid::now_v7();

        let missing = transition_failure(order, StatusCode::NOT_FOUND, "");
        let garbled = transition_failure(order, StatusCode::CONFLICT, "<html>");
        let outage = transition_failure(order, StatusCode::SERVICE_UNAVAILABLE, "");

        assert!(matches!(missing, EndpointError::NotFound(id) if id == order), "got {missing:?}");
        assert!(
            matches!(garbled, EndpointError::Gateway(GatewayError::Rejected(_))),
            "got {garbled:?}"
        );
        assert!(
            matches!(outage, EndpointError::Gateway(GatewayError::Transport(_))),
            "got {outage:?}"
        );
    }

    #[tokio::test]
    async fn connection_failure_is_transport() -> TestResult {
        let gateway = gateway("http://127.0.0.1:9/")?;

        let result = gateway.balance("acct-1").await;

        assert!(matches!(result, Err(GatewayError::Transport(_))), "got {result:?}");

        Ok(())
    }
}
