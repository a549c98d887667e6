//! Analysis agent: quantitative validation and portfolio optimization.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::RwLock;

use super::AgentStatus;
use crate::error::Result;
use crate::llm::LanguageModel;
use crate::telemetry::TelemetryBus;

const ROLE: &str = "Analysis";

const PERSONA: &str = "You are the analysis agent, the validator. When research surfaces \
an opportunity you assess its viability, quantify the risks, and decide whether it \
deserves to proceed. Only positions that survive rigorous analysis move forward.";

struct AnalysisRecord {
    timestamp: DateTime<Utc>,
}

/// Worker agent for quantitative analysis. Reports to the oversight reviewer.
pub struct AnalysisAgent {
    llm: Arc<dyn LanguageModel>,
    telemetry: Arc<TelemetryBus>,
    max_tokens: u32,
    history: RwLock<Vec<AnalysisRecord>>,
}

impl AnalysisAgent {
    pub fn new(llm: Arc<dyn LanguageModel>, telemetry: Arc<TelemetryBus>, max_tokens: u32) -> Self {
        Self {
            llm,
            telemetry,
            max_tokens,
            history: RwLock::new(Vec::new()),
        }
    }

    /// Optimize allocation for the given holdings under constraints.
    pub async fn optimize_portfolio(&self, holdings: &Value, constraints: &Value) -> Result<Value> {
        let holdings_count = holdings.as_array().map_or(0, |h| h.len());
        self.telemetry
            .publish(
                "analysis",
                json!({"type": "optimization_started", "holdings_count": holdings_count}),
            )
            .await;

        let prompt = format!(
            "Optimize this portfolio for risk-adjusted returns:\n\n\
             Holdings: {holdings}\n\
             Constraints: {constraints}\n\n\
             Apply modern portfolio theory principles:\n\
             1. Maximize Sharpe ratio\n\
             2. Minimize downside risk\n\
             3. Ensure proper diversification\n\
             4. Maintain capital preservation focus\n\n\
             Provide recommended allocation adjustments."
        );

        let content = match self.llm.complete(PERSONA, &prompt, 0.2, self.max_tokens).await {
            Ok(content) => content,
            Err(e) => {
                self.telemetry
                    .publish(
                        "analysis",
                        json!({"type": "optimization_error", "error": e.to_string()}),
                    )
                    .await;
                return Err(e);
            }
        };

        let timestamp = Utc::now();
        self.history.write().await.push(AnalysisRecord { timestamp });

        let risk_score = 0.35;
        self.telemetry
            .publish(
                "analysis",
                json!({"type": "optimization_completed", "risk_score": risk_score}),
            )
            .await;

        Ok(json!({
            "agent": ROLE,
            "action": "portfolio_optimization",
            "recommendation": content,
            "risk_score": risk_score,
            "timestamp": timestamp,
        }))
    }

    /// Fixed-form risk metrics for a single asset; no LLM round-trip.
    pub async fn calculate_risk(&self, asset: &str, _metrics: &Value) -> Value {
        self.telemetry
            .publish("analysis", json!({"type": "risk_calculation", "asset": asset}))
            .await;

        json!({
            "agent": ROLE,
            "action": "risk_calculation",
            "asset": asset,
            "var_95": 0.05,
            "sharpe_ratio": 1.8,
            "max_drawdown": 0.12,
            "status": "completed",
        })
    }

    pub async fn status(&self) -> AgentStatus {
        let history = self.history.read().await;
        AgentStatus::operational(ROLE, history.len(), history.last().map(|r| r.timestamp))
    }
}
