use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;

/// Inbound webhook body as Marketo sends it.
///
/// Marketo campaigns are configured inconsistently: some send
/// lower_snake_case keys, some PascalCase, some both. Both spellings are
/// captured here and resolved by [`LeadPayload::normalize`].
#[derive(Debug, Clone, Deserialize)]
pub struct LeadPayload {
    pub email: Option<String>,
    #[serde(rename = "Email")]
    pub email_pascal: Option<String>,

    pub first_name: Option<String>,
    #[serde(rename = "FirstName")]
    pub first_name_pascal: Option<String>,

    pub last_name: Option<String>,
    #[serde(rename = "LastName")]
    pub last_name_pascal: Option<String>,

    pub company: Option<String>,
    #[serde(rename = "Company")]
    pub company_pascal: Option<String>,

    /// Raw data for any additional fields
    #[serde(flatten)]
    pub raw: Value,
}

impl LeadPayload {
    /// Resolves the key-casing variants into a strongly-typed [`LeadInput`].
    ///
    /// lower_snake_case takes precedence; an empty or whitespace-only value
    /// falls through to the PascalCase spelling. Missing or empty `email` or
    /// `company` after resolution is a bad request.
    pub fn normalize(self) -> Result<LeadInput, AppError> {
        if let Some(extra) = self.raw.as_object() {
            if !extra.is_empty() {
                tracing::debug!(
                    "Ignoring unrecognized webhook fields: {:?}",
                    extra.keys().collect::<Vec<_>>()
                );
            }
        }

        let email = pick(self.email, self.email_pascal);
        let company = pick(self.company, self.company_pascal);
        let first_name = pick(self.first_name, self.first_name_pascal).unwrap_or_default();
        let last_name = pick(self.last_name, self.last_name_pascal).unwrap_or_default();

        match (email, company) {
            (Some(email), Some(company)) => Ok(LeadInput {
                email,
                first_name,
                last_name,
                company,
            }),
            _ => Err(AppError::BadRequest(
                "Missing required fields (email, company)".to_string(),
            )),
        }
    }
}

/// First non-empty value wins, trimmed of surrounding whitespace.
fn pick(snake: Option<String>, pascal: Option<String>) -> Option<String> {
    snake
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            pascal
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        })
}

/// Normalized lead, valid for the duration of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadInput {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub company: String,
}

impl LeadInput {
    /// Domain part of the lead's email, passed to enrichment as a fallback
    /// identity signal. `None` when the email carries no usable domain.
    pub fn email_domain(&self) -> Option<&str> {
        self.email.split('@').nth(1).filter(|d| !d.is_empty())
    }
}

/// Response sent back to Marketo after a successful relay.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub marketo_response: Value,
}
