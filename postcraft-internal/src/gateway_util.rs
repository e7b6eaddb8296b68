use std::sync::Arc;

use axum::extract::{rejection::JsonRejection, FromRequest, Json, Request};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::config::Config;
use crate::error::{Error, ErrorDetails};
use crate::generation::GeminiProvider;
use crate::pro_code::ProCodes;
use crate::quota::QuotaGate;

/// State for the API
#[derive(Clone)]
pub struct AppStateData {
    pub config: Arc<Config>,
    pub http_client: Client,
    pub quota_gate: Arc<QuotaGate>,
    pub pro_codes: Arc<ProCodes>,
    pub provider: Arc<GeminiProvider>,
}
pub type AppState = axum::extract::State<AppStateData>;

impl AppStateData {
    pub fn new(config: Arc<Config>) -> Result<Self, Error> {
        let http_client = setup_http_client()?;
        let pro_codes = Arc::new(ProCodes::from_env());
        let provider = Arc::new(GeminiProvider::new(
            config.generation.model.clone(),
            config.generation.api_base.clone(),
        ));

        Ok(Self {
            config,
            http_client,
            quota_gate: Arc::new(QuotaGate::new()),
            pro_codes,
            provider,
        })
    }
}

/// Custom Axum extractor that validates the JSON body and deserializes it into a custom type
///
/// When this extractor is present, we don't check if the `Content-Type` header is `application/json`,
/// and instead simply assume that the request body is a JSON object.
pub struct StructuredJson<T>(pub T);

impl<S, T> FromRequest<S> for StructuredJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
    T: Send + Sync + DeserializeOwned,
{
    type Rejection = Error;

    #[instrument(skip_all, level = "trace", name = "StructuredJson::from_request")]
    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        // Retrieve the request body as Bytes before deserializing it
        let bytes = bytes::Bytes::from_request(req, state).await.map_err(|e| {
            Error::new(ErrorDetails::JsonRequest {
                message: format!("{} ({})", e, e.status()),
            })
        })?;

        // Convert the entire body into `serde_json::Value`
        let value = Json::<serde_json::Value>::from_bytes(&bytes)
            .map_err(|e| {
                Error::new(ErrorDetails::JsonRequest {
                    message: format!("{} ({})", e, e.status()),
                })
            })?
            .0;

        // Now use `serde_path_to_error::deserialize` to attempt deserialization into `T`
        let deserialized: T = serde_path_to_error::deserialize(&value).map_err(|e| {
            Error::new(ErrorDetails::JsonRequest {
                message: e.to_string(),
            })
        })?;

        Ok(StructuredJson(deserialized))
    }
}

/// Overall transport timeout for the upstream HTTP client. Set above the
/// generation deadline so the deadline race, not the transport, decides
/// when a slow call is abandoned.
pub const DEFAULT_HTTP_CLIENT_TIMEOUT: std::time::Duration =
    std::time::Duration::from_secs(5 * 60);

pub fn setup_http_client() -> Result<Client, Error> {
    Client::builder()
        .timeout(DEFAULT_HTTP_CLIENT_TIMEOUT)
        .build()
        .map_err(|e| {
            Error::new(ErrorDetails::AppState {
                message: format!("Failed to build HTTP client: {e}"),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_initialization() {
        let app_state = AppStateData::new(Arc::new(Config::default())).unwrap();
        assert_eq!(app_state.provider.model_name(), "gemini-1.5-flash");
        // A fresh gate imposes the full allowance
        assert!(app_state.quota_gate.check("1.2.3.4", false).allowed);
    }
}
