use moka::future::Cache;
use serde::Deserialize;
use std::time::Duration;

use crate::buckets::{self, standardize_company_size, standardize_revenue};
use crate::config::Config;
use crate::errors::{AppError, ResultExt};

/// Enriched company attributes pushed to Marketo alongside the lead.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentResult {
    pub industry: String,
    pub revenue: String,
    pub company_size: String,
    pub fit_assessment: String,
}

impl EnrichmentResult {
    /// The fail-open sentinel: every field `Unknown`.
    pub fn unknown() -> Self {
        Self {
            industry: buckets::UNKNOWN.to_string(),
            revenue: buckets::UNKNOWN.to_string(),
            company_size: buckets::UNKNOWN.to_string(),
            fit_assessment: buckets::UNKNOWN.to_string(),
        }
    }
}

/// Model output decoded strictly from `choices[0].message.content`.
///
/// Fields the model omits default to the sentinel; content that is not a
/// JSON object with string values fails the decode outright (no text
/// surgery on the model output).
#[derive(Debug, Deserialize)]
struct RawEnrichment {
    #[serde(rename = "GPT_Industry__c", default = "unknown_field")]
    industry: String,
    #[serde(rename = "GPT_Revenue__c", default = "unknown_field")]
    revenue: String,
    #[serde(rename = "GPT_Company_Size__c", default = "unknown_field")]
    company_size: String,
    #[serde(rename = "GPT_Fit_Assessment__c", default = "unknown_field")]
    fit_assessment: String,
}

fn unknown_field() -> String {
    buckets::UNKNOWN.to_string()
}

/// Client for the OpenAI chat-completions API, plus the per-company result
/// cache.
///
/// The cache has process-lifetime semantics: once a company is enriched,
/// every later lead from that company reuses the stored result, so the CRM
/// never sees two leads from one company with diverging fields.
#[derive(Clone)]
pub struct EnrichmentClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    json_mode: bool,
    cache: Cache<String, EnrichmentResult>,
}

impl EnrichmentClient {
    /// Creates a new `EnrichmentClient`.
    ///
    /// # Arguments
    ///
    /// * `config` - Application configuration (API key, base URL, model).
    /// * `cache` - The company -> enrichment cache, built by the caller.
    pub fn new(config: &Config, cache: Cache<String, EnrichmentResult>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApi(format!("Failed to create OpenAI client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.openai_base_url.clone(),
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
            json_mode: config.openai_json_mode,
            cache,
        })
    }

    /// Looks up or computes the enrichment for a company.
    ///
    /// A cached company never triggers a second model call, and concurrent
    /// requests for the same uncached company share a single call. Failures
    /// are absorbed: the caller always receives a result, falling back to
    /// the all-`Unknown` sentinel, and failed lookups are not cached.
    pub async fn enrich(&self, company: &str, email_domain: Option<&str>) -> EnrichmentResult {
        if let Some(hit) = self.cache.get(company).await {
            tracing::debug!("Enrichment cache hit for '{}'", company);
            return hit;
        }

        let fetch = {
            let client = self.clone();
            let company = company.to_string();
            let domain = email_domain.map(|d| d.to_string());
            async move {
                match client.fetch_company_info(&company, domain.as_deref()).await {
                    Ok(result) => {
                        tracing::info!(
                            "Enriched '{}': industry={}, revenue={}, size={}",
                            company,
                            result.industry,
                            result.revenue,
                            result.company_size
                        );
                        Some(result)
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Enrichment failed for '{}', falling back to Unknown: {}",
                            company,
                            e
                        );
                        None
                    }
                }
            }
        };

        match self
            .cache
            .optionally_get_with(company.to_string(), fetch)
            .await
        {
            Some(result) => result,
            None => EnrichmentResult::unknown(),
        }
    }

    /// One chat-completion round trip: prompt in, four normalized fields out.
    async fn fetch_company_info(
        &self,
        company: &str,
        email_domain: Option<&str>,
    ) -> Result<EnrichmentResult, AppError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let prompt = build_prompt(company, email_domain);

        let mut body = serde_json::json!({
            "model": &self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ]
        });
        if self.json_mode {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .context("OpenAI request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApi(format!(
                "OpenAI returned {}: {}",
                status, error_text
            )));
        }

        #[derive(Deserialize)]
        struct Message {
            content: String,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            choices: Vec<Choice>,
        }

        let api_response: ApiResponse = response.json().await.map_err(|e| {
            AppError::ExternalApi(format!("Failed to parse OpenAI response: {}", e))
        })?;

        let content = api_response
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| AppError::ExternalApi("OpenAI returned no choices".to_string()))?;

        // One strict decode of the model output; anything else is a failure
        // and the caller falls back to the sentinel.
        let raw: RawEnrichment = serde_json::from_str(content).map_err(|e| {
            AppError::ExternalApi(format!("Model output was not the expected JSON: {}", e))
        })?;

        Ok(EnrichmentResult {
            industry: raw.industry,
            revenue: standardize_revenue(&raw.revenue),
            company_size: standardize_company_size(&raw.company_size),
            fit_assessment: raw.fit_assessment,
        })
    }
}

/// Builds the model prompt. The requested field names match the Marketo
/// custom fields verbatim so the model's JSON decodes without renaming.
fn build_prompt(company: &str, email_domain: Option<&str>) -> String {
    let domain_hint = match email_domain {
        Some(domain) => format!(
            "\nIf the company name alone is ambiguous, use the email domain {} as an additional identifying signal.\n",
            domain
        ),
        None => String::new(),
    };

    format!(
        r#"Find the following details for this company: {company}
{domain_hint}
- GPT_Industry__c: The primary industry sector.
- GPT_Revenue__c: Estimated annual revenue. Provide one range: ["Under $1M", "$1M - $10M", "$10M - $50M", "$50M - $100M", "$100M - $500M", "$500M - $1B", "$1B - $10B", "$10B+"]
- GPT_Company_Size__c: Provide one range: ["1-10", "11-50", "51-200", "201-500", "501-1000", "1001-5000", "5001-10,000", "10,000+"]
- GPT_Fit_Assessment__c: A short blurb (1-2 sentences) about the company's fit.

Respond in JSON format:
{{
  "GPT_Industry__c": "...",
  "GPT_Revenue__c": "...",
  "GPT_Company_Size__c": "...",
  "GPT_Fit_Assessment__c": "..."
}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(base_url: &str) -> Config {
        Config {
            port: 3000,
            openai_api_key: "test-key".to_string(),
            openai_base_url: base_url.to_string(),
            openai_model: "gpt-4".to_string(),
            openai_json_mode: false,
            marketo_client_id: "id".to_string(),
            marketo_client_secret: "secret".to_string(),
            marketo_base_url: "https://example.mktorest.com".to_string(),
            webhook_secret: None,
        }
    }

    #[test]
    fn test_client_creation() {
        let cache = Cache::new(100);
        let client = EnrichmentClient::new(&test_config("https://api.openai.com"), cache);
        assert!(client.is_ok());
    }

    #[test]
    fn test_prompt_contains_company_and_field_names() {
        let prompt = build_prompt("Acme Inc", None);
        assert!(prompt.contains("Acme Inc"));
        assert!(prompt.contains("GPT_Industry__c"));
        assert!(prompt.contains("GPT_Revenue__c"));
        assert!(prompt.contains("GPT_Company_Size__c"));
        assert!(prompt.contains("GPT_Fit_Assessment__c"));
        assert!(prompt.contains("Respond in JSON format"));
    }

    #[test]
    fn test_prompt_domain_hint_only_when_present() {
        let with_hint = build_prompt("Acme Inc", Some("acme.com"));
        assert!(with_hint.contains("email domain acme.com"));

        let without_hint = build_prompt("Acme Inc", None);
        assert!(!without_hint.contains("email domain"));
    }

    #[test]
    fn test_raw_enrichment_partial_object_defaults_to_unknown() {
        let raw: RawEnrichment = serde_json::from_str(r#"{"GPT_Industry__c": "SaaS"}"#).unwrap();
        assert_eq!(raw.industry, "SaaS");
        assert_eq!(raw.revenue, "Unknown");
        assert_eq!(raw.company_size, "Unknown");
        assert_eq!(raw.fit_assessment, "Unknown");
    }

    #[test]
    fn test_raw_enrichment_rejects_non_object_content() {
        assert!(serde_json::from_str::<RawEnrichment>("Sorry, I cannot help with that.").is_err());
        assert!(serde_json::from_str::<RawEnrichment>(r#""just a string""#).is_err());
        assert!(serde_json::from_str::<RawEnrichment>("[1, 2, 3]").is_err());
    }

    #[test]
    fn test_raw_enrichment_rejects_non_string_values() {
        assert!(serde_json::from_str::<RawEnrichment>(r#"{"GPT_Industry__c": 42}"#).is_err());
    }

    #[test]
    fn test_unknown_sentinel() {
        let unknown = EnrichmentResult::unknown();
        assert_eq!(unknown.industry, "Unknown");
        assert_eq!(unknown.revenue, "Unknown");
        assert_eq!(unknown.company_size, "Unknown");
        assert_eq!(unknown.fit_assessment, "Unknown");
    }
}
