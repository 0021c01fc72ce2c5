use async_trait::async_trait;
use ibpt_core::config::SourceConfig;
use ibpt_core::models::{RateKey, RateRecord, fields_from_json};
use ibpt_core::provider::{RateError, RateSource};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

/// [`RateSource`] backed by the IBPT web service.
///
/// Every fetch is one `GET` on the products or services endpoint with the
/// configured identity in the query string. No retries.
pub struct HttpRateSource {
    client: Client,
    config: SourceConfig,
}

impl HttpRateSource {
    /// # Errors
    /// [`RateError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: SourceConfig) -> Result<Self, RateError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| RateError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    fn endpoint(
        &self,
        key: &RateKey,
    ) -> &str {
        match key {
            RateKey::Product { .. } => &self.config.endpoints.products,
            RateKey::Service { .. } => &self.config.endpoints.services,
        }
    }
}

/// Query string for `key`: identity first, then the item code and, for
/// products, the exception.
pub fn query_params(
    config: &SourceConfig,
    key: &RateKey,
) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("token", config.token.clone()),
        ("cnpj", config.tax_id.clone()),
        ("uf", config.jurisdiction.clone()),
        ("codigo", key.code().to_string()),
    ];
    if let RateKey::Product { exception, .. } = key {
        params.push(("ex", exception.to_string()));
    }
    params
}

/// Map a finished HTTP exchange onto a lookup outcome.
///
/// | status | outcome                               |
/// |--------|---------------------------------------|
/// | 200    | record decoded from the JSON body     |
/// | 404    | [`RateError::NotFound`]               |
/// | 403    | [`RateError::Identification`]         |
/// | other  | [`RateError::Transport`]              |
///
/// The identification message names the tax id and jurisdiction that were
/// rejected. It never contains the token.
pub fn interpret_response(
    config: &SourceConfig,
    key: &RateKey,
    status: StatusCode,
    body: &str,
) -> Result<RateRecord, RateError> {
    match status {
        StatusCode::OK => {
            let payload: serde_json::Value = serde_json::from_str(body).map_err(|e| {
                RateError::Transport(format!("invalid JSON body for {key}: {e}"))
            })?;
            let fields = fields_from_json(&payload)?;
            RateRecord::from_fields(key.kind(), &fields)
        }
        StatusCode::NOT_FOUND => Err(RateError::NotFound(key.clone())),
        StatusCode::FORBIDDEN => Err(RateError::Identification(format!(
            "cnpj={}, uf={}",
            config.tax_id, config.jurisdiction
        ))),
        other => Err(RateError::Transport(format!("HTTP {other} for {key}"))),
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch(
        &self,
        key: &RateKey,
    ) -> Result<RateRecord, RateError> {
        let url = self.endpoint(key);
        debug!(%key, url, "querying rate service");

        let response = self
            .client
            .get(url)
            .query(&query_params(&self.config, key))
            .send()
            .await
            // the request URL carries the token
            .map_err(|e| {
                RateError::Transport(format!("request for {key} failed: {}", e.without_url()))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| {
                RateError::Transport(format!("reading body for {key}: {}", e.without_url()))
            })?;

        debug!(%key, status = status.as_u16(), "rate service answered");
        let result = interpret_response(&self.config, key, status, &body);
        if let Err(RateError::Identification(_)) = &result {
            warn!(
                tax_id = %self.config.tax_id,
                uf = %self.config.jurisdiction,
                "rate service rejected credentials"
            );
        }
        result
    }
}
