//! Classification of container-engine build output.
//!
//! The engine reports tooling noise and real failures through the same
//! loose event stream, so failure detection is substring-based. The
//! allow-list below is load-bearing: widening it fails healthy builds,
//! narrowing it ships broken images.

/// Policy deciding which build-output lines abort a build.
#[derive(Debug, Clone)]
pub struct CriticalErrorPolicy {
    critical_substrings: Vec<String>,
    prerender_marker: String,
    noise_markers: Vec<String>,
}

impl Default for CriticalErrorPolicy {
    fn default() -> Self {
        Self {
            critical_substrings: vec![
                "returned a non-zero code".to_string(),
                "executor failed".to_string(),
                "The command".to_string(),
            ],
            prerender_marker: "Error occurred prerendering".to_string(),
            noise_markers: vec![
                "ESLint:".to_string(),
                "⨯ ESLint".to_string(),
                "Failed to load config".to_string(),
            ],
        }
    }
}

impl CriticalErrorPolicy {
    /// Lines that look alarming but never indicate a failed build, such
    /// as linter output surfaced by the framework.
    pub fn is_noise(&self, line: &str) -> bool {
        self.noise_markers.iter().any(|marker| line.contains(marker))
    }

    /// Prerender failures surface in the text stream rather than the
    /// error fields and always indicate missing runtime configuration.
    pub fn is_prerender_failure(&self, line: &str) -> bool {
        line.contains(&self.prerender_marker)
    }

    /// True when an engine-reported error message matches the allow-list.
    pub fn is_critical(&self, error_message: &str) -> bool {
        self.critical_substrings
            .iter()
            .any(|needle| error_message.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_matches_real_failures() {
        let policy = CriticalErrorPolicy::default();
        assert!(policy.is_critical(
            "The command '/bin/sh -c npm run build' returned a non-zero code: 1"
        ));
        assert!(policy.is_critical("executor failed running [/bin/sh -c npm ci]"));
        assert!(policy.is_critical("The command failed"));
    }

    #[test]
    fn unrelated_errors_are_not_critical() {
        let policy = CriticalErrorPolicy::default();
        assert!(!policy.is_critical("warning: slow layer export"));
        assert!(!policy.is_critical("npm WARN deprecated package"));
    }

    #[test]
    fn linter_output_is_noise() {
        let policy = CriticalErrorPolicy::default();
        assert!(policy.is_noise("ESLint: 12 problems found"));
        assert!(policy.is_noise("⨯ ESLint rule violation"));
        assert!(policy.is_noise("Failed to load config \"next\" to extend from."));
        assert!(!policy.is_noise("Step 5/12 : RUN npm run build"));
    }

    #[test]
    fn prerender_marker_is_detected() {
        let policy = CriticalErrorPolicy::default();
        assert!(policy.is_prerender_failure(
            "Error occurred prerendering page \"/\". Read more: https://nextjs.org"
        ));
        assert!(!policy.is_prerender_failure("Generating static pages (3/3)"));
    }
}
