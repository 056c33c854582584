//! Pure keyword categorization for rule text.

use std::collections::BTreeSet;

const CATEGORY_TABLE: &[(&str, &[&str])] = &[
    ("git", &["git", "commit", "branch", "merge", "rebase", "pull request"]),
    ("typescript", &["typescript", "tsconfig", "ts-node", " .ts "]),
    ("debugging", &["debug", "breakpoint", "stack trace", "root cause", "repro"]),
    ("testing", &["test", "assertion", "coverage", "mock", "fixture"]),
    ("architecture", &["architecture", "module boundary", "coupling", "layering"]),
    ("config", &["config", "environment variable", "flag", "settings"]),
    ("security", &["security", "vulnerability", "credential", "secret", "auth"]),
    ("planning", &["plan", "roadmap", "scope", "prioritize"]),
    ("deployment", &["deploy", "release", "rollout", "rollback", "ci/cd", "pipeline"]),
];

const GENERAL_CATEGORY: &str = "general";

/// Categorize `text` against a fixed keyword table. Always returns a
/// non-empty set; falls back to `general` when nothing matches.
#[must_use]
pub fn categorize_rule(text: &str) -> BTreeSet<String> {
    let lower = text.to_lowercase();
    let mut categories: BTreeSet<String> = CATEGORY_TABLE
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(name, _)| (*name).to_string())
        .collect();

    if categories.is_empty() {
        categories.insert(GENERAL_CATEGORY.to_string());
    }
    categories
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_keyword() {
        let categories = categorize_rule("Always run `git status` before committing.");
        assert!(categories.contains("git"));
    }

    #[test]
    fn matches_multiple_categories() {
        let categories =
            categorize_rule("Rotate the credential used by the deployment pipeline every quarter.");
        assert!(categories.contains("security"));
        assert!(categories.contains("deployment"));
    }

    #[test]
    fn falls_back_to_general() {
        let categories = categorize_rule("Say good morning to the team before standup.");
        assert_eq!(categories, BTreeSet::from(["general".to_string()]));
    }
}
