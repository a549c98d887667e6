//! Central configuration: LLM connection settings and the governance
//! standard (required/forbidden phrases, friction threshold).

use serde::{Deserialize, Serialize};

/// Connection settings for the OpenAI-compatible completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub api_key: String,
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            temperature: 0.7,
            max_tokens: 4096,
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

impl LlmConfig {
    /// Build from environment, falling back to defaults. The binary is
    /// expected to have loaded `.env` via dotenvy before calling this.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(key) = std::env::var("AEGIS_OPENAI_API_KEY") {
            config.api_key = key;
        }
        if let Ok(url) = std::env::var("AEGIS_OPENAI_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(model) = std::env::var("AEGIS_OPENAI_MODEL") {
            config.model = model;
        }
        config
    }
}

/// The governance standard: keyword lists the compliance engine scans for,
/// the friction threshold, and firm identity used in agent prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    pub firm_name: String,
    pub tagline: String,

    /// Phrases every compliant output is expected to engage with. Coverage
    /// is reported but does not fail a check on its own.
    pub required_keywords: Vec<String>,

    /// Phrases that fail the standard check outright.
    pub forbidden_keywords: Vec<String>,

    /// Asset classes that trigger the volatile-asset friction penalty.
    pub volatile_assets: Vec<String>,

    /// Reviews with a friction score below this are rejected; the engine's
    /// own `passed` flag is `score >= friction_threshold`. One constant,
    /// both comparisons derive from it.
    pub friction_threshold: f64,

    /// Retry budget for upstream LLM calls.
    pub max_retries: u32,

    /// Operator webhook for pending-action notifications, if configured.
    pub webhook_url: Option<String>,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            firm_name: "Aegis Capital".to_string(),
            tagline: "Autonomous Holdings, Governed Execution".to_string(),
            required_keywords: vec![
                "risk-adjusted".to_string(),
                "capital preservation".to_string(),
                "asymmetric returns".to_string(),
                "downside protection".to_string(),
                "portfolio optimization".to_string(),
            ],
            forbidden_keywords: vec![
                "guaranteed returns".to_string(),
                "no risk".to_string(),
                "100% safe".to_string(),
                "moon".to_string(),
                "to the moon".to_string(),
                "YOLO".to_string(),
            ],
            volatile_assets: vec![
                "crypto".to_string(),
                "options".to_string(),
                "futures".to_string(),
                "derivatives".to_string(),
            ],
            friction_threshold: 0.85,
            max_retries: 3,
            webhook_url: None,
        }
    }
}

impl GovernanceConfig {
    /// Defaults plus environment overrides for deployment-specific values.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.webhook_url = std::env::var("AEGIS_WEBHOOK_URL").ok();
        if let Ok(threshold) = std::env::var("AEGIS_FRICTION_THRESHOLD") {
            if let Ok(parsed) = threshold.parse::<f64>() {
                config.friction_threshold = parsed.clamp(0.0, 1.0);
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_threshold() {
        let config = GovernanceConfig::default();
        assert!((config.friction_threshold - 0.85).abs() < f64::EPSILON);
    }

    #[test]
    fn test_default_keywords_nonempty() {
        let config = GovernanceConfig::default();
        assert!(!config.required_keywords.is_empty());
        assert!(!config.forbidden_keywords.is_empty());
        assert!(config.volatile_assets.contains(&"crypto".to_string()));
    }
}
