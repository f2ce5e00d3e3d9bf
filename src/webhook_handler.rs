use crate::errors::AppError;
use crate::handlers::AppState;
use crate::webhook_models::{LeadPayload, WebhookResponse};
use axum::{
    extract::rejection::JsonRejection,
    extract::State,
    http::HeaderMap,
    Json,
};
use std::sync::Arc;

/// Marketo Webhook Handler
///
/// Receives lead-capture payloads from Marketo, enriches the lead's company
/// via OpenAI, and upserts the enriched lead back into Marketo.
///
/// Expected payload: JSON object with email and company (lower_snake_case or
/// PascalCase keys; first_name/last_name optional)
/// Authentication: X-Webhook-Token header must match WEBHOOK_SECRET env var
/// (validation is skipped when the variable is unset)
pub async fn marketo_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<LeadPayload>, JsonRejection>,
) -> Result<Json<WebhookResponse>, AppError> {
    // 1. Validate webhook secret (if configured)
    validate_webhook_secret(&state, &headers)?;

    // 2. Reject non-JSON bodies before touching the payload
    let Json(payload) = payload.map_err(map_json_rejection)?;

    // 3. Normalize key variants and check required fields
    let lead = payload.normalize()?;
    tracing::info!(
        "Received lead: email={}, company={}",
        lead.email,
        lead.company
    );

    // 4. Enrich the company (fails open to Unknown, so this never errors)
    let enrichment = state
        .enrichment
        .enrich(&lead.company, lead.email_domain())
        .await;

    // 5. Upsert into Marketo and relay its response
    let marketo_response = state.marketo.upsert_lead(&lead, &enrichment).await?;

    Ok(Json(WebhookResponse {
        success: true,
        marketo_response,
    }))
}

/// Maps body-extraction failures onto the wire contract: a missing or wrong
/// Content-Type is 415, anything else wrong with the body is 400.
fn map_json_rejection(rejection: JsonRejection) -> AppError {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => AppError::UnsupportedMediaType(
            "Unsupported Media Type. Expected application/json".to_string(),
        ),
        other => AppError::BadRequest(format!("Invalid JSON: {}", other.body_text())),
    }
}

/// Validate webhook secret from X-Webhook-Token header
fn validate_webhook_secret(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    // If no secret is configured, skip validation (warn was already logged at startup)
    let Some(ref expected_secret) = state.config.webhook_secret else {
        return Ok(());
    };

    // Extract token from header (HeaderMap lookups are case-insensitive)
    let token = headers
        .get("X-Webhook-Token")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing X-Webhook-Token header".to_string()))?;

    // Constant-time comparison to prevent timing attacks
    if !constant_time_compare(token, expected_secret) {
        tracing::warn!("Invalid webhook token received");
        return Err(AppError::Unauthorized("Invalid webhook token".to_string()));
    }

    Ok(())
}

/// Constant-time string comparison (basic implementation)
/// For production, consider using a crypto library like `subtle`
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
