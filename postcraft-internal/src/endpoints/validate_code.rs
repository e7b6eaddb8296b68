use axum::extract::State;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::gateway_util::{AppState, StructuredJson};

#[derive(Debug, Deserialize)]
pub struct ValidateCodeParams {
    pub code: String,
}

/// Both outcomes are 200s; `valid` tells them apart.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ValidateCodeResponse {
    Accepted { valid: bool, message: String },
    Rejected { valid: bool, error: String },
}

/// POST /validate-code
///
/// Checks an activation code against the allow-list. The code is trimmed
/// and upper-cased before the lookup; the allow-list itself is matched
/// case-sensitively.
pub async fn validate_code_handler(
    State(app_state): AppState,
    StructuredJson(params): StructuredJson<ValidateCodeParams>,
) -> Json<ValidateCodeResponse> {
    let code = params.code.trim().to_uppercase();

    if app_state.pro_codes.is_valid(&code) {
        tracing::info!("Activation code accepted");
        Json(ValidateCodeResponse::Accepted {
            valid: true,
            message: "Code activated! You now have unlimited access.".to_string(),
        })
    } else {
        Json(ValidateCodeResponse::Rejected {
            valid: false,
            error: "Invalid code. Please check it and try again.".to_string(),
        })
    }
}
