//! Heuristic capability router
//!
//! Picks a target agent for a request from the registry alone. Routing never
//! mutates the registry.

use super::registry::CapabilityRegistry;
use crate::handoff::HandoffRequest;

/// Words must be longer than this to count as keywords
const MIN_KEYWORD_LEN: usize = 4;

/// Punctuation stripped from keyword edges
const KEYWORD_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];

/// Routes handoff requests to the best available agent
#[derive(Debug, Clone, Default)]
pub struct Router {
    registry: CapabilityRegistry,
}

impl Router {
    /// Create a router that owns `registry`
    pub fn new(registry: CapabilityRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut CapabilityRegistry {
        &mut self.registry
    }

    /// Select a target agent
    ///
    /// A non-empty `preferred` list is used verbatim; otherwise keywords are
    /// taken from the task description. With no capable agent, falls back to the
    /// first registered agent other than the request's source. Returns `None`
    /// when there is no such agent.
    pub fn route(&self, request: &HandoffRequest, preferred: Option<&[String]>) -> Option<String> {
        let candidates = self.candidates(request, preferred);
        let chosen = candidates.into_iter().next();
        tracing::trace!(
            from = %request.from_agent,
            chosen = ?chosen,
            "Heuristic route"
        );
        chosen
    }

    /// Every candidate in preference order (capable agents, else fallbacks)
    pub fn candidates(&self, request: &HandoffRequest, preferred: Option<&[String]>) -> Vec<String> {
        let required = match preferred {
            Some(caps) if !caps.is_empty() => caps.to_vec(),
            _ => extract_keywords(&request.task_description),
        };

        let capable = self.registry.find_capable(&required);
        if !capable.is_empty() {
            return capable;
        }

        self.registry
            .agent_ids()
            .into_iter()
            .filter(|id| *id != request.from_agent)
            .map(str::to_string)
            .collect()
    }
}

/// Lowercased words longer than four characters, punctuation trimmed
///
/// Length is measured before trimming, so `"data,"` qualifies and yields
/// `"data"`.
pub fn extract_keywords(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .filter(|word| word.chars().count() > MIN_KEYWORD_LEN)
        .map(|word| word.trim_matches(KEYWORD_PUNCTUATION).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> Router {
        let mut registry = CapabilityRegistry::new();
        registry.register("agent-alpha", ["python", "data-analysis", "reporting"]);
        registry.register("agent-beta", ["java", "data-analysis"]);
        registry.register("agent-gamma", ["analysis", "dataset", "large", "perform"]);
        Router::new(registry)
    }

    fn request(from: &str, task: &str) -> HandoffRequest {
        HandoffRequest::new(from, "", task).unwrap()
    }

    #[test]
    fn test_extract_keywords() {
        assert_eq!(
            extract_keywords("perform analysis on large dataset"),
            vec!["perform", "analysis", "large", "dataset"]
        );
    }

    #[test]
    fn test_extract_strips_punctuation_and_lowercases() {
        let keywords = extract_keywords("Please ANALYZE data, quickly!");
        assert_eq!(keywords, vec!["please", "analyze", "data", "quickly"]);
    }

    #[test]
    fn test_extract_short_words_and_empty() {
        assert!(extract_keywords("a an the to by").is_empty());
        assert!(extract_keywords("").is_empty());
    }

    #[test]
    fn test_route_with_preferred_capabilities() {
        let preferred = vec!["python".to_string()];
        let chosen = router().route(&request("agent-gamma", "need help"), Some(preferred.as_slice()));
        assert_eq!(chosen.as_deref(), Some("agent-alpha"));
    }

    #[test]
    fn test_route_uses_keywords() {
        let chosen = router().route(&request("agent-alpha", "perform analysis on large dataset"), None);
        assert_eq!(chosen.as_deref(), Some("agent-gamma"));
    }

    #[test]
    fn test_route_falls_back_to_other_agent() {
        let preferred = vec!["quantum-computing".to_string()];
        let chosen = router().route(&request("agent-alpha", "obscure"), Some(preferred.as_slice()));
        assert_eq!(chosen.as_deref(), Some("agent-beta"));
    }

    #[test]
    fn test_route_empty_preferred_uses_keywords() {
        let empty: Vec<String> = Vec::new();
        let chosen = router().route(
            &request("agent-alpha", "perform analysis on large dataset"),
            Some(empty.as_slice()),
        );
        assert_eq!(chosen.as_deref(), Some("agent-gamma"));

        let chosen = router().route(
            &request("agent-alpha", "obscure quantum chores"),
            Some(empty.as_slice()),
        );
        assert_eq!(chosen.as_deref(), Some("agent-beta"));
    }

    #[test]
    fn test_route_none_without_other_agents() {
        let mut registry = CapabilityRegistry::new();
        registry.register("solo", ["x"]);
        let router = Router::new(registry);
        let preferred = vec!["y".to_string()];
        assert!(router.route(&request("solo", "anything"), Some(preferred.as_slice())).is_none());
        assert!(Router::default().route(&request("solo", "anything"), None).is_none());
    }

    #[test]
    fn test_route_does_not_mutate_registry() {
        let router = router();
        let before = router.registry().clone();
        router.route(&request("agent-beta", "generate reporting"), None);
        assert_eq!(router.registry(), &before);
    }
}
