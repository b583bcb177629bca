//! Validation predicates shared by nutype-based domain types.

/// Rejects glob metacharacters (`*`, `?`, `[`, `]`).
///
/// Stream names reserve these so that stream-name patterns can be introduced
/// without escaping.
pub(crate) fn no_glob_metacharacters(s: &str) -> bool {
    !s.contains(['*', '?', '[', ']'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn names_without_metacharacters_pass() {
        proptest!(|(s in "[^*?\\[\\]]*")| {
            prop_assert!(no_glob_metacharacters(&s));
        });
    }

    #[test]
    fn names_with_a_metacharacter_fail() {
        let metachar = prop_oneof![Just('*'), Just('?'), Just('['), Just(']')];
        let strategy = ("[a-z-]{0,16}", metachar, "[a-z0-9]{0,16}")
            .prop_map(|(prefix, mc, suffix)| format!("{prefix}{mc}{suffix}"));

        proptest!(|(s in strategy)| {
            prop_assert!(!no_glob_metacharacters(&s));
        });
    }
}
