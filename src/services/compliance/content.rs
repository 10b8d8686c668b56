use crate::domain::campaign::UseCase;
use regex::RegexSet;
use serde::Deserialize;
use std::path::Path;

/// Data-driven content-rule table. Category rules apply to every message;
/// use-case rules apply only to campaigns declaring that use case. The
/// table ships with built-in defaults and can be replaced wholesale from a
/// JSON file at boot.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentRuleSet {
    #[serde(default)]
    pub categories: Vec<CategoryRule>,
    #[serde(default)]
    pub use_cases: Vec<UseCaseRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRule {
    /// Violation name reported to callers.
    pub category: String,
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UseCaseRule {
    pub use_case: UseCase,
    /// Violation name reported to callers.
    pub violation: String,
    /// Patterns that must not appear in the body.
    #[serde(default)]
    pub forbidden_patterns: Vec<String>,
    /// At least one of these substrings must appear (case-insensitive).
    #[serde(default)]
    pub required_any: Vec<String>,
}

impl Default for ContentRuleSet {
    fn default() -> Self {
        Self {
            categories: vec![
                CategoryRule {
                    category: "sexual".into(),
                    patterns: vec![r"(?i)\b(xxx|porn|nudes?|escorts?)\b".into()],
                },
                CategoryRule {
                    category: "hate".into(),
                    patterns: vec![r"(?i)\b(white\s+power|racial\s+purity)\b".into()],
                },
                CategoryRule {
                    category: "alcohol".into(),
                    patterns: vec![
                        r"(?i)\b(beer|whiskey|vodka|tequila|liquor)\b".into(),
                        r"(?i)\bwine\s+(sale|deal|offer)s?\b".into(),
                    ],
                },
                CategoryRule {
                    category: "firearms".into(),
                    patterns: vec![r"(?i)\b(firearms?|handguns?|rifles?|ammo|ammunition)\b".into()],
                },
                CategoryRule {
                    category: "tobacco".into(),
                    patterns: vec![r"(?i)\b(cigarettes?|vapes?|vaping|nicotine|tobacco)\b".into()],
                },
            ],
            use_cases: vec![
                UseCaseRule {
                    use_case: UseCase::Authentication,
                    violation: "promotional_content_in_authentication".into(),
                    forbidden_patterns: vec![
                        r"(?i)\b(sale|discount|offer|promo|coupon)\b".into(),
                        r"(?i)\d+%\s*off".into(),
                    ],
                    required_any: Vec::new(),
                },
                UseCaseRule {
                    use_case: UseCase::Promotional,
                    violation: "missing_opt_out_instruction".into(),
                    forbidden_patterns: Vec::new(),
                    required_any: vec!["reply stop".into(), "txt stop".into(), "text stop".into()],
                },
            ],
        }
    }
}

#[derive(Debug)]
struct CompiledCategory {
    category: String,
    patterns: RegexSet,
}

#[derive(Debug)]
struct CompiledUseCaseRule {
    use_case: UseCase,
    violation: String,
    forbidden: RegexSet,
    required_any: Vec<String>,
}

/// Compiled form of the rule table; the check iterates it generically.
#[derive(Debug)]
pub struct ContentPolicy {
    categories: Vec<CompiledCategory>,
    use_case_rules: Vec<CompiledUseCaseRule>,
}

impl ContentPolicy {
    /// Compiles a rule set.
    ///
    /// # Errors
    /// Returns an error if any pattern fails to compile.
    pub fn from_rules(rules: ContentRuleSet) -> anyhow::Result<Self> {
        let categories = rules
            .categories
            .into_iter()
            .map(|rule| {
                Ok(CompiledCategory { category: rule.category, patterns: RegexSet::new(&rule.patterns)? })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let use_case_rules = rules
            .use_cases
            .into_iter()
            .map(|rule| {
                Ok(CompiledUseCaseRule {
                    use_case: rule.use_case,
                    violation: rule.violation,
                    forbidden: RegexSet::new(&rule.forbidden_patterns)?,
                    required_any: rule.required_any.iter().map(|s| s.to_lowercase()).collect(),
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self { categories, use_case_rules })
    }

    /// Loads and compiles a rule table from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or compiled.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_rules(serde_json::from_str(&raw)?)
    }

    /// Names of every violated rule; empty when the body is clean.
    #[must_use]
    pub fn check(&self, body: &str, use_case: Option<UseCase>) -> Vec<String> {
        let mut violations = Vec::new();

        for rule in &self.categories {
            if rule.patterns.is_match(body) {
                violations.push(rule.category.clone());
            }
        }

        if let Some(use_case) = use_case {
            let lowered = body.to_lowercase();
            for rule in self.use_case_rules.iter().filter(|r| r.use_case == use_case) {
                let forbidden_hit = rule.forbidden.is_match(body);
                let required_missing = !rule.required_any.is_empty()
                    && !rule.required_any.iter().any(|phrase| lowered.contains(phrase));
                if forbidden_hit || required_missing {
                    violations.push(rule.violation.clone());
                }
            }
        }

        violations
    }
}

impl Default for ContentPolicy {
    fn default() -> Self {
        // The built-in table always compiles; tested below.
        Self::from_rules(ContentRuleSet::default())
            .unwrap_or(Self { categories: Vec::new(), use_case_rules: Vec::new() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_rules_compile() {
        ContentPolicy::from_rules(ContentRuleSet::default()).expect("default table compiles");
    }

    #[test]
    fn prohibited_categories_are_reported_by_name() {
        let policy = ContentPolicy::default();

        assert_eq!(policy.check("Cheap cigarettes and vodka!", None), vec!["alcohol", "tobacco"]);
        assert_eq!(policy.check("rifles in stock", None), vec!["firearms"]);
        assert!(policy.check("Your order has shipped", None).is_empty());
    }

    #[test]
    fn authentication_use_case_rejects_promotional_language() {
        let policy = ContentPolicy::default();

        let violations =
            policy.check("Your code is 123456. Use promo SAVE20!", Some(UseCase::Authentication));
        assert_eq!(violations, vec!["promotional_content_in_authentication"]);

        assert!(policy.check("Your code is 123456.", Some(UseCase::Authentication)).is_empty());
    }

    #[test]
    fn promotional_use_case_requires_opt_out_instruction() {
        let policy = ContentPolicy::default();

        let violations = policy.check("Flash deal today only!", Some(UseCase::Promotional));
        assert_eq!(violations, vec!["missing_opt_out_instruction"]);

        assert!(
            policy.check("Flash deal today only! Reply STOP to opt out.", Some(UseCase::Promotional)).is_empty()
        );
    }

    #[test]
    fn custom_tables_deserialize() {
        let raw = r#"{
            "categories": [
                { "category": "gambling", "patterns": ["(?i)\\b(casino|lottery)\\b"] }
            ],
            "use_cases": []
        }"#;
        let rules: ContentRuleSet = serde_json::from_str(raw).expect("parse");
        let policy = ContentPolicy::from_rules(rules).expect("compile");

        assert_eq!(policy.check("Win big at the casino", None), vec!["gambling"]);
        assert!(policy.check("vodka", None).is_empty(), "custom table replaces the defaults");
    }
}
