use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::enrichment::EnrichmentResult;
use crate::errors::AppError;
use crate::webhook_models::LeadInput;

/// Tokens are treated as expired this many seconds before Marketo says so,
/// so an upsert never departs with a token about to die in flight.
const TOKEN_SAFETY_MARGIN_SECS: i64 = 60;

/// Marketo error codes that signal a dead access token inside a 2xx body.
const TOKEN_ERROR_CODES: [&str; 2] = ["601", "602"];

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Client for the Marketo REST API: OAuth2 client-credentials token
/// lifecycle plus the lead upsert call.
///
/// The token is process-wide state behind a mutex; holding the lock across
/// the identity call means concurrent requests share one refresh instead of
/// stampeding the endpoint.
#[derive(Clone)]
pub struct MarketoClient {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    token: Arc<Mutex<Option<CachedToken>>>,
}

impl MarketoClient {
    /// Creates a new `MarketoClient` from the application configuration.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApi(format!("Failed to create Marketo client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.marketo_base_url.clone(),
            client_id: config.marketo_client_id.clone(),
            client_secret: config.marketo_client_secret.clone(),
            token: Arc::new(Mutex::new(None)),
        })
    }

    /// Upserts a lead (`lookupField: email`) with the enriched fields.
    ///
    /// Returns Marketo's response body as-is on success so the caller can
    /// relay it. A token rejection (HTTP 401, or error code 601/602 in a
    /// 2xx envelope) gets exactly one refresh-and-retry; every other
    /// failure is returned without a retry.
    pub async fn upsert_lead(
        &self,
        lead: &LeadInput,
        enrichment: &EnrichmentResult,
    ) -> Result<Value, AppError> {
        let payload = serde_json::json!({
            "action": "createOrUpdate",
            "lookupField": "email",
            "input": [{
                "Email": lead.email,
                "FirstName": lead.first_name,
                "LastName": lead.last_name,
                "GPT_Industry__c": enrichment.industry,
                "GPT_Revenue__c": enrichment.revenue,
                "GPT_Company_Size__c": enrichment.company_size,
                "GPT_Fit_Assessment__c": enrichment.fit_assessment,
            }]
        });

        let token = self.get_token().await?;
        let (mut status, mut body) = self.post_upsert(&token, &payload).await?;

        if is_token_rejection(status, &body) {
            tracing::warn!(
                "Marketo rejected the access token ({}), refreshing and retrying once",
                status
            );
            self.invalidate_token(&token).await;
            let token = self.get_token().await?;
            (status, body) = self.post_upsert(&token, &payload).await?;
        }

        if !status.is_success() {
            return Err(AppError::Upsert(format!(
                "Marketo upsert returned {}: {}",
                status, body
            )));
        }
        if is_token_rejection(status, &body) {
            return Err(AppError::Upsert(format!(
                "Marketo rejected the access token after refresh: {}",
                body
            )));
        }

        let response: Value = serde_json::from_str(&body).map_err(|e| {
            AppError::Upsert(format!("Failed to parse Marketo upsert response: {}", e))
        })?;

        tracing::info!("✓ Marketo upsert accepted for {}", lead.email);
        Ok(response)
    }

    /// Returns a token that is valid for at least the safety margin,
    /// fetching a fresh one when the cached token is missing or stale.
    async fn get_token(&self) -> Result<String, AppError> {
        let mut guard = self.token.lock().await;

        if let Some(cached) = guard.as_ref() {
            if !token_needs_refresh(cached.expires_at, Utc::now()) {
                return Ok(cached.value.clone());
            }
            tracing::debug!("Marketo token inside expiry margin, refreshing");
        }

        let fresh = self.fetch_token().await?;
        let value = fresh.value.clone();
        *guard = Some(fresh);
        Ok(value)
    }

    /// Drops the cached token if it is still the one the API rejected. A
    /// concurrent request may already have stored a fresh token; that one
    /// stays, and the next `get_token` returns it instead of refetching.
    async fn invalidate_token(&self, rejected: &str) {
        let mut guard = self.token.lock().await;
        if guard.as_ref().is_some_and(|cached| cached.value == rejected) {
            *guard = None;
        }
    }

    async fn fetch_token(&self) -> Result<CachedToken, AppError> {
        let url = format!("{}/identity/oauth/token", self.base_url);

        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                AppError::TokenAcquisition(format!("Marketo token request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::TokenAcquisition(format!(
                "Marketo identity endpoint returned {}: {}",
                status, error_text
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            AppError::TokenAcquisition(format!("Failed to parse Marketo token response: {}", e))
        })?;

        if token.access_token.trim().is_empty() {
            return Err(AppError::TokenAcquisition(
                "Marketo returned an empty access token".to_string(),
            ));
        }

        let expires_at = Utc::now() + ChronoDuration::seconds(token.expires_in);
        tracing::info!("✓ Marketo token acquired, expires in {}s", token.expires_in);

        Ok(CachedToken {
            value: token.access_token,
            expires_at,
        })
    }

    async fn post_upsert(
        &self,
        token: &str,
        payload: &Value,
    ) -> Result<(StatusCode, String), AppError> {
        let url = format!("{}/rest/v1/leads.json", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", token))
            .json(payload)
            .send()
            .await
            .map_err(|e| AppError::Upsert(format!("Marketo upsert request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Ok((status, body))
    }
}

/// True once `now` is inside the safety margin before `expires_at`.
fn token_needs_refresh(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now >= expires_at - ChronoDuration::seconds(TOKEN_SAFETY_MARGIN_SECS)
}

/// Detects Marketo's two shapes of "your token is no good": an HTTP 401, or
/// a 2xx envelope carrying `success: false` with error code 601 or 602.
/// The code is matched as a string or a number; Marketo has used both.
fn is_token_rejection(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::UNAUTHORIZED {
        return true;
    }
    if !status.is_success() {
        return false;
    }

    let Ok(envelope) = serde_json::from_str::<Value>(body) else {
        return false;
    };
    if envelope.get("success").and_then(Value::as_bool) != Some(false) {
        return false;
    }
    let Some(errors) = envelope.get("errors").and_then(Value::as_array) else {
        return false;
    };

    errors.iter().any(|err| match err.get("code") {
        Some(Value::String(code)) => TOKEN_ERROR_CODES.contains(&code.as_str()),
        Some(Value::Number(code)) => TOKEN_ERROR_CODES.contains(&code.to_string().as_str()),
        _ => false,
    })
}
