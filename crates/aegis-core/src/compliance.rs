//! Compliance engine: keyword-based standard enforcement and friction
//! scoring.
//!
//! Both checks are pure functions over a [`GovernanceConfig`] so verdicts
//! are exactly reproducible for a given input. Friction scoring is a fixed
//! penalty table, not a statistical model: penalties are independent,
//! additive, and auditable.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::GovernanceConfig;

/// Outcome of the standard check on one piece of text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardCheck {
    /// True iff no forbidden phrase was found.
    pub passed: bool,
    /// Forbidden phrases found in the text.
    pub violations: Vec<String>,
    /// Fraction of required phrases present, independent of pass/fail.
    pub keyword_coverage: f64,
    pub present_keywords: Vec<String>,
    pub missing_keywords: Vec<String>,
}

/// Outcome of friction scoring on one action payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrictionReport {
    /// Accumulated score in [0, 1]; lower means riskier.
    pub score: f64,
    /// Names of the penalties that fired.
    pub factors: Vec<String>,
    pub threshold: f64,
    /// `score >= threshold`.
    pub passed: bool,
}

/// Scan `text` case-insensitively for forbidden phrases and report required
/// keyword coverage.
pub fn check_standard(config: &GovernanceConfig, text: &str) -> StandardCheck {
    let text_lower = text.to_lowercase();

    let violations: Vec<String> = config
        .forbidden_keywords
        .iter()
        .filter(|k| text_lower.contains(&k.to_lowercase()))
        .cloned()
        .collect();

    let present_keywords: Vec<String> = config
        .required_keywords
        .iter()
        .filter(|k| text_lower.contains(&k.to_lowercase()))
        .cloned()
        .collect();

    let missing_keywords: Vec<String> = config
        .required_keywords
        .iter()
        .filter(|k| !present_keywords.contains(k))
        .cloned()
        .collect();

    let coverage = present_keywords.len() as f64 / config.required_keywords.len().max(1) as f64;

    StandardCheck {
        passed: violations.is_empty(),
        violations,
        keyword_coverage: coverage,
        present_keywords,
        missing_keywords,
    }
}

/// Score an action payload against the friction penalty table.
///
/// Starts at 1.0 and subtracts a fixed penalty for each risk factor present:
/// amount > 1M (-0.2) or > 100k (-0.1), risk level high (-0.25) or medium
/// (-0.1), volatile asset class (-0.15), leverage > 2.0 (-0.2) or > 1.0
/// (-0.1), diversification < 0.3 (-0.15). Absent fields contribute nothing.
///
/// Fields are read at the payload's top level, falling back to a nested
/// `parameters` object so a combined review payload scores the same as the
/// raw task parameters.
pub fn score_friction(config: &GovernanceConfig, data: &Value) -> FrictionReport {
    let mut score: f64 = 1.0;
    let mut factors = Vec::new();

    if let Some(amount) = numeric_field(data, "amount") {
        if amount > 1_000_000.0 {
            score -= 0.2;
            factors.push("large_transaction".to_string());
        } else if amount > 100_000.0 {
            score -= 0.1;
            factors.push("medium_transaction".to_string());
        }
    }

    if let Some(risk) = string_field(data, "risk_level") {
        match risk.as_str() {
            "high" => {
                score -= 0.25;
                factors.push("high_risk".to_string());
            }
            "medium" => {
                score -= 0.1;
                factors.push("medium_risk".to_string());
            }
            _ => {}
        }
    }

    if let Some(asset) = string_field(data, "asset_type") {
        let asset_lower = asset.to_lowercase();
        if config.volatile_assets.iter().any(|a| *a == asset_lower) {
            score -= 0.15;
            factors.push("volatile_asset".to_string());
        }
    }

    if let Some(leverage) = numeric_field(data, "leverage") {
        if leverage > 2.0 {
            score -= 0.2;
            factors.push("high_leverage".to_string());
        } else if leverage > 1.0 {
            score -= 0.1;
            factors.push("leveraged".to_string());
        }
    }

    if let Some(div) = numeric_field(data, "diversification") {
        if div < 0.3 {
            score -= 0.15;
            factors.push("concentration_risk".to_string());
        }
    }

    let score = round3(score.clamp(0.0, 1.0));

    FrictionReport {
        score,
        factors,
        threshold: config.friction_threshold,
        passed: score >= config.friction_threshold,
    }
}

/// Aggregate compliance over a series of action payloads: each action scores
/// `friction * 1.0` if the standard passed, `friction * 0.5` otherwise.
/// An empty series is fully compliant.
pub fn compliance_score(config: &GovernanceConfig, actions: &[Value]) -> f64 {
    if actions.is_empty() {
        return 1.0;
    }

    let total: f64 = actions
        .iter()
        .map(|action| {
            let text = action.to_string();
            let standard = check_standard(config, &text);
            let friction = score_friction(config, action);
            let base = if standard.passed { 1.0 } else { 0.5 };
            base * friction.score
        })
        .sum();

    total / actions.len() as f64
}

/// Look up `key` at the top level, falling back to a nested `parameters`
/// object. Review payloads wrap the task parameters; both shapes must score
/// identically.
fn lookup<'a>(data: &'a Value, key: &str) -> Option<&'a Value> {
    data.get(key)
        .or_else(|| data.get("parameters").and_then(|p| p.get(key)))
}

/// Numeric field, accepting JSON numbers and numeric strings.
fn numeric_field(data: &Value, key: &str) -> Option<f64> {
    match lookup(data, key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn string_field(data: &Value, key: &str) -> Option<String> {
    lookup(data, key).and_then(|v| v.as_str()).map(String::from)
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
