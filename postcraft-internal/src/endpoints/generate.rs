use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::status::SERVICE_NAME;
use crate::error::{Error, ErrorDetails};
use crate::gateway_util::{AppState, AppStateData, StructuredJson};
use crate::generation::{self, Post, PostStyle};
use crate::quota;

/// Upper bound on the topic length, counted in characters after trimming.
pub const MAX_TOPIC_CHARS: usize = 500;

/// How much of the topic makes it into the request log.
const TOPIC_LOG_CHARS: usize = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateParams {
    pub topic: String,
    pub style: PostStyle,
    #[serde(default)]
    pub pro_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub posts: Vec<Post>,
    /// Generations left today, or `null` for PRO (unbounded).
    pub remaining: Option<u32>,
    pub is_pro: bool,
}

fn validate_topic(topic: &str) -> Result<&str, Error> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(Error::new(ErrorDetails::InvalidRequest {
            message: "Topic is required".to_string(),
        }));
    }
    if topic.chars().count() > MAX_TOPIC_CHARS {
        return Err(Error::new(ErrorDetails::InvalidRequest {
            message: format!("Topic is too long (maximum {MAX_TOPIC_CHARS} characters)"),
        }));
    }
    Ok(topic)
}

fn topic_preview(topic: &str) -> String {
    topic.chars().take(TOPIC_LOG_CHARS).collect()
}

/// POST /generate
///
/// Validates input, consults the quota gate (PRO codes bypass it),
/// invokes the generation orchestrator, and charges quota only for
/// accepted non-PRO generations.
pub async fn generate_handler(
    State(app_state): AppState,
    headers: HeaderMap,
    StructuredJson(params): StructuredJson<GenerateParams>,
) -> Result<Json<GenerateResponse>, Error> {
    let topic = validate_topic(&params.topic)?;

    let client_key = quota::client_key(&headers);
    let pro = params
        .pro_code
        .as_deref()
        .is_some_and(|code| app_state.pro_codes.is_valid(code));

    let decision = app_state.quota_gate.check(&client_key, pro);
    if !decision.allowed {
        tracing::warn!("Daily quota exhausted for client {client_key}");
        return Err(Error::new(ErrorDetails::QuotaExceeded));
    }

    let style = params.style;
    tracing::info!(
        "Generation: topic=\"{}\", style={style}, client={client_key}",
        topic_preview(topic)
    );

    let posts = generation::generate(
        &app_state.provider,
        &app_state.http_client,
        app_state.config.generation.deadline(),
        topic,
        style,
    )
    .await?;

    // PRO-authorized requests never consume finite quota
    if !pro {
        app_state.quota_gate.increment(&client_key);
    }

    Ok(Json(GenerateResponse {
        posts,
        remaining: decision.remaining,
        is_pro: pro,
    }))
}

/// GET /generate: health probe for the generation endpoint.
pub async fn generation_status_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::{HeaderValue, StatusCode};
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::Config;
    use crate::gateway_util::setup_http_client;
    use crate::generation::GeminiProvider;
    use crate::pro_code::ProCodes;
    use crate::quota::{QuotaGate, DAILY_LIMIT, UNKNOWN_CLIENT};

    fn test_app_state(pro_codes: &str) -> AppStateData {
        let config = Arc::new(Config::default());
        AppStateData {
            http_client: setup_http_client().unwrap(),
            quota_gate: Arc::new(QuotaGate::new()),
            pro_codes: Arc::new(ProCodes::from_list(pro_codes)),
            provider: Arc::new(GeminiProvider::new(
                config.generation.model.clone(),
                config.generation.api_base.clone(),
            )),
            config,
        }
    }

    fn test_app_state_with_upstream(pro_codes: &str, upstream_uri: &str) -> AppStateData {
        let config = Arc::new(Config::default());
        AppStateData {
            http_client: setup_http_client().unwrap(),
            quota_gate: Arc::new(QuotaGate::new()),
            pro_codes: Arc::new(ProCodes::from_list(pro_codes)),
            provider: Arc::new(GeminiProvider::with_api_key(
                config.generation.model.clone(),
                Url::parse(upstream_uri).unwrap(),
                "test-key",
            )),
            config,
        }
    }

    fn params(topic: &str) -> GenerateParams {
        GenerateParams {
            topic: topic.to_string(),
            style: PostStyle::Inspirational,
            pro_code: None,
        }
    }

    fn upstream_posts_json() -> String {
        let posts: Vec<String> = (0..5)
            .map(|i| format!(r#"{{"hook": "hook {i}", "body": "body {i}", "cta": "cta {i}?"}}"#))
            .collect();
        format!(r#"{{"posts": [{}]}}"#, posts.join(","))
    }

    async fn mount_generation(server: &MockServer, text: &str) {
        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": text}]}}]
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn test_topic_validation() {
        assert_eq!(validate_topic("  burnout in tech  ").unwrap(), "burnout in tech");
        assert!(validate_topic("").is_err());
        assert!(validate_topic("   ").is_err());
        assert!(validate_topic(&"x".repeat(MAX_TOPIC_CHARS)).is_ok());
        assert!(validate_topic(&"x".repeat(MAX_TOPIC_CHARS + 1)).is_err());
    }

    #[test]
    fn test_params_deserialization() {
        let params: GenerateParams = serde_json::from_value(json!({
            "topic": "delegation",
            "style": "tips",
            "proCode": "PRO2024",
        }))
        .unwrap();
        assert_eq!(params.style, PostStyle::Tips);
        assert_eq!(params.pro_code.as_deref(), Some("PRO2024"));

        // style outside the enumeration is rejected at deserialization
        assert!(serde_json::from_value::<GenerateParams>(json!({
            "topic": "delegation",
            "style": "sarcastic",
        }))
        .is_err());

        // topic is required
        assert!(
            serde_json::from_value::<GenerateParams>(json!({"style": "tips"})).is_err()
        );
    }

    #[tokio::test]
    async fn test_overlong_topic_is_rejected_before_quota() {
        let app_state = test_app_state("");
        let error = generate_handler(
            State(app_state.clone()),
            HeaderMap::new(),
            StructuredJson(params(&"x".repeat(MAX_TOPIC_CHARS + 1))),
        )
        .await
        .unwrap_err();

        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        // Nothing was charged: the next check still sees the full allowance
        assert_eq!(
            app_state.quota_gate.check(UNKNOWN_CLIENT, false).remaining,
            Some(DAILY_LIMIT - 1)
        );
    }

    #[tokio::test]
    async fn test_exhausted_quota_short_circuits_with_429() {
        let app_state = test_app_state("");
        for _ in 0..DAILY_LIMIT {
            app_state.quota_gate.increment(UNKNOWN_CLIENT);
        }

        // No upstream call happens: the deadline is irrelevant on this path
        let error = generate_handler(
            State(app_state),
            HeaderMap::new(),
            StructuredJson(params("leadership")),
        )
        .await
        .unwrap_err();

        assert_eq!(error.status_code(), StatusCode::TOO_MANY_REQUESTS);
        let (_, body) = error.to_response_json();
        assert_eq!(body["remaining"], 0);
        assert_eq!(body["isPro"], false);
    }

    #[tokio::test]
    async fn test_valid_pro_code_bypasses_exhausted_quota_check() {
        let app_state = test_app_state("PRO2024");
        for _ in 0..DAILY_LIMIT {
            app_state.quota_gate.increment(UNKNOWN_CLIENT);
        }

        // The quota decision for a PRO request is unbounded even with an
        // exhausted bucket; the request then proceeds to the upstream call.
        let pro = app_state.pro_codes.is_valid("PRO2024");
        let decision = app_state.quota_gate.check(UNKNOWN_CLIENT, pro);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, None);
    }

    #[tokio::test]
    async fn test_successful_generation_charges_quota_and_returns_envelope() {
        let server = MockServer::start().await;
        mount_generation(&server, &upstream_posts_json()).await;

        let app_state = test_app_state_with_upstream("", &server.uri());
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));

        let Json(response) = generate_handler(
            State(app_state.clone()),
            headers,
            StructuredJson(params("delegation for new managers")),
        )
        .await
        .unwrap();

        assert_eq!(response.posts.len(), 5);
        assert_eq!(response.posts[0].hook, "hook 0");
        assert_eq!(response.remaining, Some(DAILY_LIMIT - 1));
        assert!(!response.is_pro);

        // The accepted generation was charged exactly once
        let next = app_state.quota_gate.check("203.0.113.9", false);
        assert_eq!(next.remaining, Some(DAILY_LIMIT - 2));
    }

    #[tokio::test]
    async fn test_pro_generation_is_never_charged() {
        let server = MockServer::start().await;
        mount_generation(&server, &upstream_posts_json()).await;

        let app_state = test_app_state_with_upstream("PRO2024", &server.uri());
        let mut pro_params = params("delegation for new managers");
        pro_params.pro_code = Some("PRO2024".to_string());

        let Json(response) = generate_handler(
            State(app_state.clone()),
            HeaderMap::new(),
            StructuredJson(pro_params),
        )
        .await
        .unwrap();

        assert_eq!(response.remaining, None);
        assert!(response.is_pro);

        // No usage was recorded for the client
        assert_eq!(
            app_state.quota_gate.check(UNKNOWN_CLIENT, false).remaining,
            Some(DAILY_LIMIT - 1)
        );
    }

    #[tokio::test]
    async fn test_failed_generation_is_not_charged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let app_state = test_app_state_with_upstream("", &server.uri());
        let error = generate_handler(
            State(app_state.clone()),
            HeaderMap::new(),
            StructuredJson(params("leadership")),
        )
        .await
        .unwrap_err();

        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            app_state.quota_gate.check(UNKNOWN_CLIENT, false).remaining,
            Some(DAILY_LIMIT - 1)
        );
    }

    #[test]
    fn test_response_envelope_serialization() {
        let response = GenerateResponse {
            posts: vec![Post {
                hook: "h".to_string(),
                body: "b".to_string(),
                cta: "c".to_string(),
            }],
            remaining: None,
            is_pro: true,
        };
        let value = serde_json::to_value(&response).unwrap();

        // PRO: remaining serializes as the unbounded sentinel, not a number
        assert_eq!(value["remaining"], Value::Null);
        assert_eq!(value["isPro"], true);
        assert_eq!(value["posts"][0]["hook"], "h");
    }

    #[tokio::test]
    async fn test_generation_status_probe() {
        let Json(body) = generation_status_handler().await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], SERVICE_NAME);
        assert!(body["timestamp"].as_str().is_some());
    }

    #[test]
    fn test_topic_preview_truncates() {
        let long = "a".repeat(200);
        assert_eq!(topic_preview(&long).chars().count(), TOPIC_LOG_CHARS);
        assert_eq!(topic_preview("short"), "short");
    }
}
