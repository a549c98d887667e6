//! Research agent: market research and opportunity identification.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::RwLock;

use super::AgentStatus;
use crate::error::Result;
use crate::llm::LanguageModel;
use crate::telemetry::TelemetryBus;

const ROLE: &str = "Research";

const PERSONA: &str = "You are the research agent. You scan markets, identify emerging \
trends, and surface opportunities before the wider market prices them in. Every finding \
is framed in terms of risk-adjusted returns and capital preservation.";

struct ResearchRecord {
    topic: String,
    timestamp: DateTime<Utc>,
}

/// Worker agent for market research. Reports to the oversight reviewer.
pub struct ResearchAgent {
    llm: Arc<dyn LanguageModel>,
    telemetry: Arc<TelemetryBus>,
    max_tokens: u32,
    history: RwLock<Vec<ResearchRecord>>,
}

impl ResearchAgent {
    pub fn new(llm: Arc<dyn LanguageModel>, telemetry: Arc<TelemetryBus>, max_tokens: u32) -> Self {
        Self {
            llm,
            telemetry,
            max_tokens,
            history: RwLock::new(Vec::new()),
        }
    }

    /// Conduct research on a topic. Upstream failures propagate as a failed
    /// phase; they are never silently flattened into empty findings.
    pub async fn conduct_research(&self, topic: &str, parameters: &Value) -> Result<Value> {
        self.telemetry
            .publish("research", json!({"type": "research_started", "topic": topic}))
            .await;

        let prompt = format!(
            "Conduct investment research on: {topic}\n\n\
             Parameters: {parameters}\n\n\
             Provide a structured analysis including:\n\
             1. Key market factors\n\
             2. Risk assessment\n\
             3. Opportunity identification\n\
             4. Recommended actions (if any)\n\n\
             Focus on risk-adjusted returns and capital preservation."
        );

        let content = match self.llm.complete(PERSONA, &prompt, 0.5, self.max_tokens).await {
            Ok(content) => content,
            Err(e) => {
                self.telemetry
                    .publish(
                        "research",
                        json!({"type": "research_error", "topic": topic, "error": e.to_string()}),
                    )
                    .await;
                return Err(e);
            }
        };

        let timestamp = Utc::now();
        self.history.write().await.push(ResearchRecord {
            topic: topic.to_string(),
            timestamp,
        });

        let confidence = 0.85;
        self.telemetry
            .publish(
                "research",
                json!({"type": "research_completed", "topic": topic, "confidence": confidence}),
            )
            .await;

        Ok(json!({
            "agent": ROLE,
            "action": "research",
            "topic": topic,
            "findings": [content],
            "confidence": confidence,
            "timestamp": timestamp,
        }))
    }

    /// Lightweight sector scan; no LLM round-trip.
    pub async fn analyze_sector(&self, sector: &str) -> Value {
        self.telemetry
            .publish("research", json!({"type": "sector_analysis", "sector": sector}))
            .await;

        json!({
            "agent": ROLE,
            "action": "sector_analysis",
            "sector": sector,
            "status": "completed",
        })
    }

    /// Topics researched so far, oldest first.
    pub async fn topics(&self) -> Vec<String> {
        self.history
            .read()
            .await
            .iter()
            .map(|r| r.topic.clone())
            .collect()
    }

    pub async fn status(&self) -> AgentStatus {
        let history = self.history.read().await;
        AgentStatus::operational(ROLE, history.len(), history.last().map(|r| r.timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AegisError;
    use crate::llm::CannedModel;
    use async_trait::async_trait;

    struct FailingModel;

    #[async_trait]
    impl LanguageModel for FailingModel {
        async fn complete(&self, _: &str, _: &str, _: f64, _: u32) -> Result<String> {
            Err(AegisError::Upstream("quota exhausted".to_string()))
        }
    }

    #[tokio::test]
    async fn test_research_output_shape() {
        let agent = ResearchAgent::new(
            Arc::new(CannedModel("stable risk-adjusted outlook")),
            Arc::new(TelemetryBus::new()),
            1024,
        );

        let output = agent
            .conduct_research("fixed income", &json!({"amount": 50_000}))
            .await
            .unwrap();

        assert_eq!(output["agent"], "Research");
        assert_eq!(output["topic"], "fixed income");
        assert_eq!(output["findings"][0], "stable risk-adjusted outlook");

        let status = agent.status().await;
        assert_eq!(status.actions_count, 1);
        assert!(status.last_action.is_some());
    }

    #[tokio::test]
    async fn test_sector_analysis_shape_and_telemetry() {
        let bus = Arc::new(TelemetryBus::new());
        let mut sub = bus.subscribe().await;
        let agent = ResearchAgent::new(
            Arc::new(CannedModel("unused")),
            Arc::clone(&bus),
            1024,
        );

        let output = agent.analyze_sector("utilities").await;
        assert_eq!(output["agent"], "Research");
        assert_eq!(output["sector"], "utilities");
        assert_eq!(output["status"], "completed");

        let event = sub.events.recv().await.unwrap();
        assert_eq!(event.event_type, "sector_analysis");
        assert_eq!(event.data["sector"], "utilities");
    }

    #[tokio::test]
    async fn test_upstream_failure_propagates() {
        let agent = ResearchAgent::new(
            Arc::new(FailingModel),
            Arc::new(TelemetryBus::new()),
            1024,
        );

        let err = agent
            .conduct_research("fixed income", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, AegisError::Upstream(_)));
        assert_eq!(agent.status().await.actions_count, 0);
    }
}
