use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DisplayOrDebugGateway, Error, ErrorDetails};

const PROVIDER_NAME: &str = "Gemini";
const PROVIDER_TYPE: &str = "gemini";

pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Sampling parameters for post generation: high temperature for
/// variety, nucleus and top-k sampling on, a generous output ceiling.
const TEMPERATURE: f32 = 0.9;
const TOP_P: f32 = 0.95;
const TOP_K: u32 = 40;
const MAX_OUTPUT_TOKENS: u32 = 4096;

/// Client for the Gemini `generateContent` REST surface.
#[derive(Debug)]
pub struct GeminiProvider {
    model_name: String,
    api_base: Url,
    credentials: GeminiCredentials,
}

#[derive(Clone, Debug)]
enum GeminiCredentials {
    Static(SecretString),
    None,
}

impl GeminiProvider {
    /// Builds a provider, loading the API key from `GEMINI_API_KEY`.
    ///
    /// A missing key does not prevent startup; every generation request
    /// fails with a configuration error until the key is supplied.
    pub fn new(model_name: String, api_base: Url) -> Self {
        let credentials = match std::env::var(GEMINI_API_KEY_ENV) {
            Ok(key) if !key.is_empty() => GeminiCredentials::Static(SecretString::from(key)),
            _ => {
                tracing::warn!(
                    "{GEMINI_API_KEY_ENV} is not set; generation requests will fail until it is"
                );
                GeminiCredentials::None
            }
        };
        GeminiProvider {
            model_name,
            api_base,
            credentials,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    #[cfg(test)]
    pub(crate) fn with_api_key(model_name: String, api_base: Url, api_key: &str) -> Self {
        GeminiProvider {
            model_name,
            api_base,
            credentials: GeminiCredentials::Static(SecretString::from(api_key.to_string())),
        }
    }

    fn api_key(&self) -> Result<&SecretString, Error> {
        match &self.credentials {
            GeminiCredentials::Static(api_key) => Ok(api_key),
            GeminiCredentials::None => Err(Error::new(ErrorDetails::ApiKeyMissing {
                provider_name: PROVIDER_NAME.to_string(),
            })),
        }
    }

    fn generate_url(&self) -> Result<Url, Error> {
        self.api_base
            .join(&format!("models/{}:generateContent", self.model_name))
            .map_err(|e| {
                Error::new(ErrorDetails::Config {
                    message: format!("Invalid generation API base: {e}"),
                })
            })
    }

    /// Sends one prompt upstream and returns the model's raw text output.
    ///
    /// Single attempt, no retry; the caller owns the deadline race.
    pub async fn generate_text(
        &self,
        http_client: &reqwest::Client,
        prompt: &str,
    ) -> Result<String, Error> {
        let api_key = self.api_key()?;
        let request_body = GeminiRequest::new(prompt);
        let raw_request = serde_json::to_string(&request_body).map_err(|e| {
            Error::new(ErrorDetails::Serialization {
                message: format!(
                    "Error serializing Gemini request: {}",
                    DisplayOrDebugGateway::new(e)
                ),
            })
        })?;
        let request_url = self.generate_url()?;

        let res = http_client
            .post(request_url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", api_key.expose_secret())
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                let status_code = e.status();
                Error::new(ErrorDetails::InferenceClient {
                    message: format!("Error sending request: {}", DisplayOrDebugGateway::new(e)),
                    status_code,
                    provider_type: PROVIDER_TYPE.to_string(),
                    raw_request: Some(raw_request.clone()),
                    raw_response: None,
                })
            })?;

        if res.status().is_success() {
            let raw_response = res.text().await.map_err(|e| {
                Error::new(ErrorDetails::InferenceServer {
                    message: format!("Error reading response: {}", DisplayOrDebugGateway::new(e)),
                    provider_type: PROVIDER_TYPE.to_string(),
                    raw_request: Some(raw_request.clone()),
                    raw_response: None,
                })
            })?;
            let response_body: GeminiResponse =
                serde_json::from_str(&raw_response).map_err(|e| {
                    Error::new(ErrorDetails::InferenceServer {
                        message: format!(
                            "Error parsing response: {}",
                            DisplayOrDebugGateway::new(e)
                        ),
                        provider_type: PROVIDER_TYPE.to_string(),
                        raw_request: Some(raw_request.clone()),
                        raw_response: Some(raw_response.clone()),
                    })
                })?;
            response_body.into_text(raw_request, raw_response)
        } else {
            let status = res.status();
            let raw_response = res.text().await.unwrap_or_default();
            Err(Error::new(ErrorDetails::InferenceClient {
                message: format!("Gemini request failed with status {status}"),
                status_code: Some(status),
                provider_type: PROVIDER_TYPE.to_string(),
                raw_request: Some(raw_request),
                raw_response: Some(raw_response),
            }))
        }
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

impl<'a> GeminiRequest<'a> {
    fn new(prompt: &'a str) -> Self {
        GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: TEMPERATURE,
                top_p: TOP_P,
                top_k: TOP_K,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

impl GeminiResponse {
    /// Concatenates the text parts of the first candidate, the same view
    /// of the response the official client libraries expose.
    fn into_text(self, raw_request: String, raw_response: String) -> Result<String, Error> {
        let text = self
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(Error::new(ErrorDetails::InferenceServer {
                message: "Gemini response contained no candidate text".to_string(),
                provider_type: PROVIDER_TYPE.to_string(),
                raw_request: Some(raw_request),
                raw_response: Some(raw_response),
            }));
        }
        Ok(text)
    }
}
