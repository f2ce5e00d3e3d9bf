use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub openai_json_mode: bool,
    pub marketo_client_id: String,
    pub marketo_client_secret: String,
    pub marketo_base_url: String,
    pub webhook_secret: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            openai_api_key: std::env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable required"))
                .and_then(|key| {
                    if key.trim().is_empty() {
                        anyhow::bail!("OPENAI_API_KEY cannot be empty");
                    }
                    Ok(key)
                })?,
            openai_base_url: validate_base_url(
                std::env::var("OPENAI_BASE_URL")
                    .unwrap_or_else(|_| "https://api.openai.com".to_string()),
                "OPENAI_BASE_URL",
            )?,
            openai_model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4".to_string()),
            openai_json_mode: match std::env::var("OPENAI_JSON_MODE") {
                Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
                    "1" | "true" => true,
                    "0" | "false" | "" => false,
                    _ => anyhow::bail!("OPENAI_JSON_MODE must be true or false"),
                },
                Err(_) => false,
            },
            marketo_client_id: std::env::var("MARKETO_CLIENT_ID")
                .map_err(|_| anyhow::anyhow!("MARKETO_CLIENT_ID environment variable required"))
                .and_then(|id| {
                    if id.trim().is_empty() {
                        anyhow::bail!("MARKETO_CLIENT_ID cannot be empty");
                    }
                    Ok(id)
                })?,
            marketo_client_secret: std::env::var("MARKETO_CLIENT_SECRET")
                .map_err(|_| {
                    anyhow::anyhow!("MARKETO_CLIENT_SECRET environment variable required")
                })
                .and_then(|secret| {
                    if secret.trim().is_empty() {
                        anyhow::bail!("MARKETO_CLIENT_SECRET cannot be empty");
                    }
                    Ok(secret)
                })?,
            marketo_base_url: std::env::var("MARKETO_BASE_URL")
                .map_err(|_| anyhow::anyhow!("MARKETO_BASE_URL environment variable required"))
                .and_then(|url| validate_base_url(url, "MARKETO_BASE_URL"))?,
            webhook_secret: std::env::var("WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("OpenAI Base URL: {}", config.openai_base_url);
        tracing::debug!(
            "OpenAI model: {} (json_mode: {})",
            config.openai_model,
            config.openai_json_mode
        );
        tracing::debug!("Marketo Base URL: {}", config.marketo_base_url);
        tracing::debug!("Server Port: {}", config.port);
        if config.webhook_secret.is_none() {
            tracing::warn!("WEBHOOK_SECRET not set; inbound webhook authentication is disabled");
        }

        Ok(config)
    }
}

/// Validates that a base URL parses as http(s) and strips any trailing slash
/// so later path joins stay clean.
fn validate_base_url(url: String, var: &str) -> anyhow::Result<String> {
    if url.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", var);
    }
    let parsed =
        url::Url::parse(&url).map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", var, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("{} must start with http:// or https://", var);
    }
    Ok(url.trim_end_matches('/').to_string())
}
