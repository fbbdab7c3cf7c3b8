// src/router.rs
// Query Router: purely lexical classification, no LLM call. Grounded
// verbatim on original_source/Orchestrator/src/orchestrator/agent.py's
// `_is_platform_specific_query` / `_is_rca_query` and its keyword/indicator
// lists.

use once_cell::sync::Lazy;
use regex::Regex;

pub const RCA_INDICATORS: &[&str] = &[
    "failing",
    "failed",
    "error",
    "broken",
    "not working",
    "issue",
    "problem",
    "why",
    "debug",
    "troubleshoot",
    "investigate",
    "rca",
    "root cause",
    "crashing",
    "down",
    "unavailable",
    "timeout",
    "stuck",
    "help",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    MainAgent,
    ParallelRca,
}

/// A whole-word, case-insensitive match for `needle` inside `haystack`.
/// Multi-word needles (e.g. "build job") match as a literal phrase.
fn contains_keyword(haystack: &str, needle: &str) -> bool {
    let pattern = format!(r"(?i)\b{}\b", regex::escape(needle));
    // Compiling per call is fine here: the keyword lists are tiny and this
    // path only runs once per incoming chat turn, not in a hot loop.
    Regex::new(&pattern)
        .map(|re| re.is_match(haystack))
        .unwrap_or(false)
}

static RCA_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    RCA_INDICATORS
        .iter()
        .map(|kw| Regex::new(&format!(r"(?i)\b{}\b", regex::escape(kw))).unwrap())
        .collect()
});

pub fn is_rca_query(text: &str) -> bool {
    RCA_REGEXES.iter().any(|re| re.is_match(text))
}

/// Which configured peer (if any) this query names specifically, checked
/// against each peer's own keyword list.
pub fn platform_specific_peer<'a>(
    text: &str,
    peers: impl IntoIterator<Item = (&'a str, &'a [String])>,
) -> Option<&'a str> {
    for (peer_name, keywords) in peers {
        if keywords.iter().any(|kw| contains_keyword(text, kw)) {
            return Some(peer_name);
        }
    }
    None
}

/// The full routing decision table (spec.md §4.F, unchanged):
/// 1. platform-specific -> Main Agent
/// 2. non-specific + RCA-intent + >=2 specialists -> Parallel RCA Coordinator
/// 3. else -> Main Agent
pub fn route<'a>(
    text: &str,
    peers: impl IntoIterator<Item = (&'a str, &'a [String])>,
    specialist_count: usize,
) -> RoutingDecision {
    let peers: Vec<_> = peers.into_iter().collect();
    if platform_specific_peer(text, peers.iter().map(|(n, k)| (*n, *k))).is_some() {
        return RoutingDecision::MainAgent;
    }
    if is_rca_query(text) && specialist_count >= 2 {
        return RoutingDecision::ParallelRca;
    }
    RoutingDecision::MainAgent
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peers() -> Vec<(String, Vec<String>)> {
        vec![
            (
                "jenkins".to_string(),
                vec!["jenkins".to_string(), "pipeline".to_string(), "build job".to_string()],
            ),
            (
                "kubernetes".to_string(),
                vec!["kubernetes".to_string(), "k8s".to_string(), "pod".to_string()],
            ),
        ]
    }

    fn peer_refs(peers: &[(String, Vec<String>)]) -> Vec<(&str, &[String])> {
        peers.iter().map(|(n, k)| (n.as_str(), k.as_slice())).collect()
    }

    #[test]
    fn platform_specific_query_routes_to_main_agent_even_with_rca_words() {
        let peers = peers();
        let decision = route(
            "why is the jenkins pipeline failing",
            peer_refs(&peers),
            2,
        );
        assert_eq!(decision, RoutingDecision::MainAgent);
    }

    #[test]
    fn non_specific_rca_query_with_two_specialists_fans_out() {
        let peers = peers();
        let decision = route("everything is down and broken, help", peer_refs(&peers), 2);
        assert_eq!(decision, RoutingDecision::ParallelRca);
    }

    #[test]
    fn non_specific_rca_query_with_one_specialist_stays_with_main_agent() {
        let peers = peers();
        let decision = route("everything is down and broken, help", peer_refs(&peers), 1);
        assert_eq!(decision, RoutingDecision::MainAgent);
    }

    #[test]
    fn non_rca_non_specific_query_goes_to_main_agent() {
        let peers = peers();
        let decision = route("what can you help me with", peer_refs(&peers), 2);
        assert_eq!(decision, RoutingDecision::MainAgent);
    }

    #[test]
    fn keyword_matching_is_whole_word() {
        // "k8s" must not match inside an unrelated longer token.
        assert!(!contains_keyword("the k8sx service", "k8s"));
        assert!(contains_keyword("the k8s service", "k8s"));
    }

    #[test]
    fn multi_word_keyword_matches_as_phrase() {
        assert!(contains_keyword("please check the build job status", "build job"));
        assert!(!contains_keyword("please build the job queue", "build job"));
    }
}
