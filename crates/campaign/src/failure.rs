//! Critical-failure classification.

/// The known patterns that mark a stage failure as critical.
///
/// A critical failure halts automatic progress: the error handler flips a
/// `Running` campaign into `InternalError`. Anything that matches none of
/// the patterns is treated as transient and left to the retry mechanism.
#[derive(Debug, Clone)]
pub struct CriticalFailures {
    patterns: Vec<String>,
}

impl Default for CriticalFailures {
    fn default() -> Self {
        Self {
            patterns: [
                // Smart-contract execution failures.
                "contract execution failed",
                "transaction reverted",
                "insufficient escrow",
                // Social-API auth and sustained rate-limiting.
                "authentication expired",
                "invalid or expired token",
                "rate limit exceeded",
                "too many requests",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
        }
    }
}

impl CriticalFailures {
    /// The built-in set extended with operator-configured patterns.
    pub fn with_extra(extra: &[String]) -> Self {
        let mut this = Self::default();
        this.patterns
            .extend(extra.iter().map(|p| p.to_lowercase()));
        this
    }

    /// Case-insensitive substring match against the pattern set.
    pub fn is_critical(&self, error_message: &str) -> bool {
        let msg = error_message.to_lowercase();
        self.patterns.iter().any(|p| msg.contains(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_and_auth_failures_are_critical() {
        let critical = CriticalFailures::default();
        assert!(critical.is_critical("ledger: Contract execution failed (code 5)"));
        assert!(critical.is_critical("social api: authentication expired"));
        assert!(critical.is_critical("HTTP 429 Too Many Requests"));
    }

    #[test]
    fn unknown_errors_are_not_critical() {
        let critical = CriticalFailures::default();
        assert!(!critical.is_critical("connection reset by peer"));
        assert!(!critical.is_critical("timeout waiting for engagement data"));
    }

    #[test]
    fn extra_patterns_extend_the_builtin_set() {
        let critical = CriticalFailures::with_extra(&["Wallet Frozen".to_string()]);
        assert!(critical.is_critical("settlement: wallet frozen by compliance"));
        assert!(critical.is_critical("transaction reverted"));
    }
}
