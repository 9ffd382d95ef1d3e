//! Gray release rule evaluation.
//!
//! Rule kinds are checked in a fixed order and the first kind that matches
//! decides the outcome:
//! 1. explicit client-ID allow-list
//! 2. tag allow-list
//! 3. percentage bucket of the client ID
//!
//! Evaluation is pure: no I/O, and the same rules and context always give
//! the same answer.

use sha2::{Digest, Sha256};
use shared_types::{ClientContext, GrayRules};

/// Kind of rule that selected a client for the gray variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    ClientId,
    Tag,
    Percentage,
}

impl RuleKind {
    pub const PRECEDENCE: [RuleKind; 3] = [RuleKind::ClientId, RuleKind::Tag, RuleKind::Percentage];

    fn matches(self, rules: &GrayRules, context: &ClientContext) -> bool {
        match self {
            RuleKind::ClientId => context
                .client_id
                .as_ref()
                .is_some_and(|id| rules.client_ids.contains(id)),
            RuleKind::Tag => !rules.tags.is_disjoint(&context.tags),
            RuleKind::Percentage => match (rules.percentage, context.client_id.as_deref()) {
                (Some(percentage), Some(id)) => bucket(id) < percentage,
                _ => false,
            },
        }
    }
}

/// Outcome of evaluating a rule set against one client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Canonical,
    Gray(RuleKind),
}

pub struct GrayRuleEvaluator;

impl GrayRuleEvaluator {
    pub fn evaluate(rules: &GrayRules, context: Option<&ClientContext>) -> Resolution {
        let Some(context) = context else {
            return Resolution::Canonical;
        };

        RuleKind::PRECEDENCE
            .into_iter()
            .find(|kind| kind.matches(rules, context))
            .map_or(Resolution::Canonical, Resolution::Gray)
    }

    /// Rejects rule sets that can never be evaluated sensibly
    pub fn validate(rules: &GrayRules) -> Result<(), String> {
        match rules.percentage {
            Some(p) if p > 100 => Err(format!("gray percentage must be within 0..=100, got {p}")),
            _ => Ok(()),
        }
    }
}

/// Stable 0..100 bucket for a client identifier; identical across builds and hosts.
pub fn bucket(client_id: &str) -> u8 {
    let digest = Sha256::digest(client_id.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn rules() -> GrayRules {
        GrayRules {
            value: "gray".to_string(),
            client_ids: BTreeSet::from(["node-1".to_string()]),
            tags: BTreeSet::from(["beta".to_string(), "test".to_string()]),
            percentage: None,
        }
    }

    fn context(id: Option<&str>, tags: &[&str]) -> ClientContext {
        ClientContext::new(
            id.map(str::to_string),
            tags.iter().map(|t| (*t).to_string()),
        )
    }

    #[test]
    fn test_absent_context_is_canonical() {
        assert_eq!(GrayRuleEvaluator::evaluate(&rules(), None), Resolution::Canonical);
    }

    #[test]
    fn test_tag_match() {
        let ctx = context(None, &["prod", "beta"]);
        assert_eq!(
            GrayRuleEvaluator::evaluate(&rules(), Some(&ctx)),
            Resolution::Gray(RuleKind::Tag)
        );
    }

    #[test]
    fn test_no_match_is_canonical() {
        let ctx = context(Some("node-9"), &["prod"]);
        assert_eq!(
            GrayRuleEvaluator::evaluate(&rules(), Some(&ctx)),
            Resolution::Canonical
        );
    }

    #[test]
    fn test_tags_are_not_substring_matched() {
        let ctx = context(None, &["beta-2", "alphabeta"]);
        assert_eq!(
            GrayRuleEvaluator::evaluate(&rules(), Some(&ctx)),
            Resolution::Canonical
        );
    }

    #[test]
    fn test_client_id_takes_precedence_over_tag() {
        let ctx = context(Some("node-1"), &["beta"]);
        assert_eq!(
            GrayRuleEvaluator::evaluate(&rules(), Some(&ctx)),
            Resolution::Gray(RuleKind::ClientId)
        );
    }

    #[test]
    fn test_percentage_bounds() {
        let mut all = rules();
        all.client_ids.clear();
        all.tags.clear();
        all.percentage = Some(100);

        let mut none = all.clone();
        none.percentage = Some(0);

        for id in ["a", "b", "node-42", "10.0.0.7"] {
            let ctx = context(Some(id), &[]);
            assert_eq!(
                GrayRuleEvaluator::evaluate(&all, Some(&ctx)),
                Resolution::Gray(RuleKind::Percentage)
            );
            assert_eq!(
                GrayRuleEvaluator::evaluate(&none, Some(&ctx)),
                Resolution::Canonical
            );
        }
    }

    #[test]
    fn test_percentage_needs_client_id() {
        let mut by_percent = rules();
        by_percent.tags.clear();
        by_percent.percentage = Some(100);

        let ctx = context(None, &["prod"]);
        assert_eq!(
            GrayRuleEvaluator::evaluate(&by_percent, Some(&ctx)),
            Resolution::Canonical
        );
    }

    #[test]
    fn test_percentage_selects_roughly_the_requested_share() {
        let mut half = rules();
        half.client_ids.clear();
        half.tags.clear();
        half.percentage = Some(50);

        let selected = (0..1000)
            .map(|n| context(Some(&format!("client-{n}")), &[]))
            .filter(|ctx| GrayRuleEvaluator::evaluate(&half, Some(ctx)) != Resolution::Canonical)
            .count();

        assert!((400..=600).contains(&selected), "selected {selected} of 1000");
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let mut mixed = rules();
        mixed.percentage = Some(30);
        let ctx = context(Some("node-77"), &["prod"]);

        let first = GrayRuleEvaluator::evaluate(&mixed, Some(&ctx));
        for _ in 0..50 {
            assert_eq!(GrayRuleEvaluator::evaluate(&mixed, Some(&ctx)), first);
        }
        assert_eq!(bucket("node-77"), bucket("node-77"));
    }

    #[test]
    fn test_validate_percentage() {
        let mut invalid = rules();
        invalid.percentage = Some(101);
        assert!(GrayRuleEvaluator::validate(&invalid).is_err());

        invalid.percentage = Some(100);
        assert!(GrayRuleEvaluator::validate(&invalid).is_ok());
    }
}
