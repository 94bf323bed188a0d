//! Pluggable routing intelligence
//!
//! A [`RoutingStrategy`] is an external decision service (for example one
//! backed by a language model) that picks a target agent. [`SmartRouter`]
//! consults it under a timeout and falls back to the heuristic [`Router`]
//! whenever the strategy cannot produce a usable decision in time. Parsing
//! raw output is the strategy's job; [`RoutingDecision::from_response_text`]
//! helps with that.

use super::registry::{AgentCapabilities, CapabilityRegistry};
use super::router::Router;
use crate::handoff::HandoffRequest;
use crate::{metrics, HandoffError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Confidence attached to heuristic decisions
pub const HEURISTIC_CONFIDENCE: f64 = 0.4;

/// Default upper bound on a strategy call
pub const DEFAULT_DECISION_TIMEOUT: Duration = Duration::from_secs(2);

/// A routing recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Recommended target agent
    pub target_agent: String,

    /// Confidence in [0.0, 1.0]
    pub confidence: f64,

    /// Human-readable explanation
    pub reasoning: String,

    /// Alternatives in preference order
    #[serde(default)]
    pub fallback_agents: Vec<String>,
}

impl RoutingDecision {
    /// Check the decision is well-formed
    pub fn validate(&self) -> Result<()> {
        if self.target_agent.trim().is_empty() {
            return Err(HandoffError::Routing("decision has an empty target_agent".to_string()));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(HandoffError::Routing(format!(
                "confidence {} is outside [0, 1]",
                self.confidence
            )));
        }
        Ok(())
    }

    /// Parse the first JSON object embedded in free text
    ///
    /// Text generators often wrap their answer in prose or code fences; only
    /// the outermost `{ ... }` span is decoded.
    pub fn from_response_text(text: &str) -> Result<Self> {
        let start = text.find('{');
        let end = text.rfind('}');
        let json = match (start, end) {
            (Some(start), Some(end)) if start < end => &text[start..=end],
            _ => {
                return Err(HandoffError::Routing(
                    "no JSON object found in routing response".to_string(),
                ))
            }
        };

        let decision: Self = serde_json::from_str(json)
            .map_err(|e| HandoffError::Routing(format!("invalid routing decision: {}", e)))?;
        decision.validate()?;
        Ok(decision)
    }
}

/// Routing-intelligence collaborator
#[async_trait]
pub trait RoutingStrategy: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Choose a target among `available_agents` (the source agent is excluded)
    async fn decide(
        &self,
        request: &HandoffRequest,
        available_agents: &[AgentCapabilities],
    ) -> anyhow::Result<RoutingDecision>;
}

/// The heuristic router exposed through the strategy interface
#[derive(Debug, Clone, Default)]
pub struct HeuristicStrategy {
    router: Router,
}

impl HeuristicStrategy {
    pub fn new(router: Router) -> Self {
        Self { router }
    }

    /// Heuristic decision, or `None` when no agent other than the source exists
    ///
    /// The source agent is never chosen, even when it is the only capable one.
    pub fn decide_now(
        &self,
        request: &HandoffRequest,
        preferred: Option<&[String]>,
    ) -> Option<RoutingDecision> {
        let others: Vec<String> = self
            .router
            .registry()
            .agent_ids()
            .into_iter()
            .filter(|id| *id != request.from_agent)
            .map(str::to_string)
            .collect();

        let target = self
            .router
            .candidates(request, preferred)
            .into_iter()
            .find(|id| *id != request.from_agent)
            .or_else(|| others.first().cloned())?;
        let fallback_agents = others.into_iter().filter(|id| *id != target).collect();

        Some(RoutingDecision {
            target_agent: target,
            confidence: HEURISTIC_CONFIDENCE,
            reasoning: "Heuristic: selected by keyword-capability match.".to_string(),
            fallback_agents,
        })
    }
}

#[async_trait]
impl RoutingStrategy for HeuristicStrategy {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn decide(
        &self,
        request: &HandoffRequest,
        _available_agents: &[AgentCapabilities],
    ) -> anyhow::Result<RoutingDecision> {
        self.decide_now(request, None)
            .ok_or_else(|| anyhow::anyhow!("no agent available besides {}", request.from_agent))
    }
}

/// Router that prefers an external strategy and falls back to the heuristic
pub struct SmartRouter {
    heuristic: HeuristicStrategy,
    strategy: Option<Box<dyn RoutingStrategy>>,
    timeout: Duration,
}

impl SmartRouter {
    /// Heuristic-only router over `registry`
    pub fn new(registry: CapabilityRegistry) -> Self {
        Self {
            heuristic: HeuristicStrategy::new(Router::new(registry)),
            strategy: None,
            timeout: DEFAULT_DECISION_TIMEOUT,
        }
    }

    /// Consult `strategy` before the heuristic
    pub fn with_strategy(mut self, strategy: impl RoutingStrategy + 'static) -> Self {
        self.strategy = Some(Box::new(strategy));
        self
    }

    /// Bound each strategy call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        self.heuristic.router.registry()
    }

    /// Pick a target agent
    ///
    /// Never waits longer than the configured timeout on the strategy. Fails
    /// only when neither the strategy nor the heuristic can name an agent.
    pub async fn route(
        &self,
        request: &HandoffRequest,
        preferred: Option<&[String]>,
    ) -> Result<RoutingDecision> {
        if let Some(strategy) = &self.strategy {
            match self.consult(strategy.as_ref(), request).await {
                Ok(decision) => return Ok(decision),
                Err((cause, error)) => {
                    metrics::record_routing_fallback(cause);
                    tracing::warn!(
                        strategy = strategy.name(),
                        cause,
                        error = %error,
                        "Routing strategy unavailable, using heuristic"
                    );
                }
            }
        }

        self.heuristic.decide_now(request, preferred).ok_or_else(|| {
            HandoffError::Routing(format!(
                "no agent available to receive a handoff from {}",
                request.from_agent
            ))
        })
    }

    async fn consult(
        &self,
        strategy: &dyn RoutingStrategy,
        request: &HandoffRequest,
    ) -> std::result::Result<RoutingDecision, (&'static str, String)> {
        let available: Vec<AgentCapabilities> = self
            .registry()
            .agents()
            .iter()
            .filter(|a| a.agent_id != request.from_agent)
            .cloned()
            .collect();

        let decision = match tokio::time::timeout(self.timeout, strategy.decide(request, &available)).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(e)) => return Err(("error", e.to_string())),
            Err(_) => return Err(("timeout", format!("no decision within {:?}", self.timeout))),
        };

        decision.validate().map_err(|e| ("invalid", e.to_string()))?;
        if !available.iter().any(|a| a.agent_id == decision.target_agent) {
            return Err((
                "unknown_agent",
                format!("unknown target agent {}", decision.target_agent),
            ));
        }

        tracing::debug!(
            strategy = strategy.name(),
            target = %decision.target_agent,
            confidence = decision.confidence,
            "Routing strategy decided"
        );
        Ok(decision)
    }
}

impl std::fmt::Debug for SmartRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartRouter")
            .field("agents", &self.registry().len())
            .field("strategy", &self.strategy.as_ref().map(|s| s.name().to_string()))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(RoutingDecision);

    #[async_trait]
    impl RoutingStrategy for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn decide(
            &self,
            _request: &HandoffRequest,
            _available_agents: &[AgentCapabilities],
        ) -> anyhow::Result<RoutingDecision> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    #[async_trait]
    impl RoutingStrategy for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn decide(
            &self,
            _request: &HandoffRequest,
            _available_agents: &[AgentCapabilities],
        ) -> anyhow::Result<RoutingDecision> {
            anyhow::bail!("provider unreachable")
        }
    }

    struct Slow;

    #[async_trait]
    impl RoutingStrategy for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn decide(
            &self,
            _request: &HandoffRequest,
            _available_agents: &[AgentCapabilities],
        ) -> anyhow::Result<RoutingDecision> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            anyhow::bail!("unreachable")
        }
    }

    fn registry() -> CapabilityRegistry {
        let mut registry = CapabilityRegistry::new();
        registry.register("agent-alpha", ["python", "data-analysis"]);
        registry.register("agent-beta", ["java", "reporting"]);
        registry
    }

    fn request() -> HandoffRequest {
        HandoffRequest::new("agent-alpha", "", "Process the sales dataset").unwrap()
    }

    fn decision(target: &str, confidence: f64) -> RoutingDecision {
        RoutingDecision {
            target_agent: target.to_string(),
            confidence,
            reasoning: "Best capability match.".to_string(),
            fallback_agents: vec![],
        }
    }

    #[tokio::test]
    async fn test_strategy_decision_is_used() {
        let router = SmartRouter::new(registry()).with_strategy(Fixed(decision("agent-beta", 0.95)));
        let chosen = router.route(&request(), None).await.unwrap();
        assert_eq!(chosen.target_agent, "agent-beta");
        assert_eq!(chosen.confidence, 0.95);
    }

    #[tokio::test]
    async fn test_strategy_error_falls_back() {
        let router = SmartRouter::new(registry()).with_strategy(Broken);
        let chosen = router.route(&request(), None).await.unwrap();
        assert_eq!(chosen.target_agent, "agent-beta");
        assert_eq!(chosen.confidence, HEURISTIC_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_strategy_timeout_falls_back() {
        let router = SmartRouter::new(registry())
            .with_strategy(Slow)
            .with_timeout(Duration::from_millis(20));
        let chosen = router.route(&request(), None).await.unwrap();
        assert_eq!(chosen.confidence, HEURISTIC_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_unknown_or_invalid_target_falls_back() {
        let unknown = SmartRouter::new(registry()).with_strategy(Fixed(decision("agent-zeta", 0.9)));
        assert_eq!(unknown.route(&request(), None).await.unwrap().target_agent, "agent-beta");

        let overconfident = SmartRouter::new(registry()).with_strategy(Fixed(decision("agent-beta", 1.5)));
        let chosen = overconfident.route(&request(), None).await.unwrap();
        assert_eq!(chosen.confidence, HEURISTIC_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_source_agent_is_never_offered() {
        // The source agent is filtered from the available list, so choosing it falls back.
        let router = SmartRouter::new(registry()).with_strategy(Fixed(decision("agent-alpha", 0.9)));
        let chosen = router.route(&request(), None).await.unwrap();
        assert_eq!(chosen.target_agent, "agent-beta");
    }

    #[tokio::test]
    async fn test_no_agents_is_routing_error() {
        let router = SmartRouter::new(CapabilityRegistry::new());
        let err = router.route(&request(), None).await.unwrap_err();
        assert!(matches!(err, HandoffError::Routing(_)));
    }

    #[test]
    fn test_heuristic_fallback_list_excludes_source_and_target() {
        let mut registry = registry();
        registry.register("agent-gamma", ["go"]);
        let strategy = HeuristicStrategy::new(Router::new(registry));
        let preferred = vec!["reporting".to_string()];
        let decision = strategy.decide_now(&request(), Some(preferred.as_slice())).unwrap();
        assert_eq!(decision.target_agent, "agent-beta");
        assert_eq!(decision.fallback_agents, vec!["agent-gamma"]);
    }

    #[tokio::test]
    async fn test_heuristic_skips_capable_source_agent() {
        let mut registry = CapabilityRegistry::new();
        registry.register("agent-alpha", ["python", "write"]);
        registry.register("agent-beta", ["java"]);
        let request = HandoffRequest::new("agent-alpha", "", "write python").unwrap();

        let chosen = SmartRouter::new(registry).route(&request, None).await.unwrap();
        assert_eq!(chosen.target_agent, "agent-beta");
        assert_ne!(chosen.target_agent, request.from_agent);
        assert!(chosen.fallback_agents.is_empty());
    }

    #[test]
    fn test_heuristic_prefers_next_capable_agent_over_source() {
        let mut registry = CapabilityRegistry::new();
        registry.register("agent-alpha", ["python", "reporting"]);
        registry.register("agent-beta", ["java"]);
        registry.register("agent-gamma", ["python"]);
        let strategy = HeuristicStrategy::new(Router::new(registry));
        let preferred = vec!["python".to_string()];
        let decision = strategy.decide_now(&request(), Some(preferred.as_slice())).unwrap();
        assert_eq!(decision.target_agent, "agent-gamma");
        assert_eq!(decision.fallback_agents, vec!["agent-beta"]);
    }

    #[test]
    fn test_decision_from_response_text() {
        let text = "Here you go:\n```json\n{\"target_agent\": \"agent-beta\", \"confidence\": 0.8, \"reasoning\": \"java\", \"fallback_agents\": [\"agent-alpha\"]}\n```";
        let decision = RoutingDecision::from_response_text(text).unwrap();
        assert_eq!(decision.target_agent, "agent-beta");
        assert_eq!(decision.fallback_agents, vec!["agent-alpha"]);
    }

    #[test]
    fn test_decision_from_bad_text() {
        assert!(RoutingDecision::from_response_text("no json here").is_err());
        assert!(RoutingDecision::from_response_text("{\"target_agent\": \"x\"}").is_err());
        assert!(RoutingDecision::from_response_text(
            "{\"target_agent\": \"x\", \"confidence\": -0.1, \"reasoning\": \"\"}"
        )
        .is_err());
    }
}
