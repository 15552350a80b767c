//! The account pattern language used by `in_accounts`, `trusts` and `assume.accounts`.
//!
//! A token is one of:
//! - a keyword: `all`, `parent` or `children`;
//! - a service principal marker, anything containing a `.` (e.g. `ec2.amazonaws.com`);
//! - the parent account's SAML provider name;
//! - a regex fragment, matched from the start (but not anchored at the end)
//!   against every account id and every account name.
//!
//! Service and SAML tokens are accepted but never select an account.
//!
//! `all` and `children` replace whatever earlier tokens of the same list selected,
//! rather than adding to it: `[dev, children]` selects exactly the children.
//! Existing configurations rely on this, so it is kept.

use std::collections::BTreeSet;

use regex::Regex;
use strum_macros::{AsRefStr, Display, EnumString};
use tracing::debug;

use crate::accounts::AccountRegistry;
use crate::error::CompileError;

/// Reserved pattern keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum AccountKeyword {
    All,
    Parent,
    Children,
}

/// A classified pattern token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternToken<'t> {
    Keyword(AccountKeyword),
    Service(&'t str),
    Saml(&'t str),
    Pattern(&'t str),
}

impl<'t> PatternToken<'t> {
    pub fn classify(token: &'t str, registry: &AccountRegistry) -> Self {
        if let Ok(keyword) = token.parse::<AccountKeyword>() {
            PatternToken::Keyword(keyword)
        } else if token.contains('.') {
            PatternToken::Service(token)
        } else if registry.saml_provider() == Some(token) {
            PatternToken::Saml(token)
        } else {
            PatternToken::Pattern(token)
        }
    }
}

/// Resolves pattern tokens against an [`AccountRegistry`].
#[derive(Debug, Clone, Copy)]
pub struct AccountMatcher<'a> {
    registry: &'a AccountRegistry,
}

impl<'a> AccountMatcher<'a> {
    pub fn new(registry: &'a AccountRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'a AccountRegistry {
        self.registry
    }

    /// Resolve a list of tokens into the set of account names they select.
    ///
    /// Fails with `UnresolvedPattern` on the first token that selects nothing
    /// and is not a service or SAML marker.
    pub fn resolve<S: AsRef<str>>(&self, tokens: &[S]) -> Result<BTreeSet<String>, CompileError> {
        let mut matched = BTreeSet::new();

        for token in tokens {
            let token = token.as_ref();
            match PatternToken::classify(token, self.registry) {
                PatternToken::Keyword(AccountKeyword::All) => matched = self.registry.all(),
                PatternToken::Keyword(AccountKeyword::Children) => {
                    matched = self.registry.children()
                }
                PatternToken::Keyword(AccountKeyword::Parent) => {
                    matched.insert(self.registry.parent_name().to_string());
                }
                PatternToken::Service(_) | PatternToken::Saml(_) => {}
                PatternToken::Pattern(pattern) => {
                    let found = self.match_pattern(pattern)?;
                    if found.is_empty() {
                        return Err(CompileError::UnresolvedPattern(token.to_string()));
                    }
                    matched.extend(found);
                }
            }
        }

        debug!(
            event = "Resolve",
            phase = "Pattern",
            tokens = ?tokens.iter().map(|t| t.as_ref()).collect::<Vec<&str>>(),
            matched = ?matched
        );
        Ok(matched)
    }

    /// Resolve a single token.
    pub fn resolve_one(&self, token: &str) -> Result<BTreeSet<String>, CompileError> {
        self.resolve(&[token])
    }

    /// Every account whose id or name matches `pattern` from its first character.
    fn match_pattern(&self, pattern: &str) -> Result<BTreeSet<String>, CompileError> {
        let re = Regex::new(&format!("^(?:{pattern})")).map_err(|e| {
            CompileError::InvalidPattern {
                token: pattern.to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(self
            .registry
            .accounts()
            .filter(|account| re.is_match(account.id()) || re.is_match(account.name()))
            .map(|account| account.name().to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::tests::sample_registry;
    use yare::parameterized;

    fn names(set: BTreeSet<String>) -> Vec<String> {
        set.into_iter().collect()
    }

    #[parameterized(
        all = { &["all"], &["dev", "prod", "root"] },
        all_with_others = { &["dev", "all", "parent"], &["dev", "prod", "root"] },
        all_overrides_earlier = { &["root", "all"], &["dev", "prod", "root"] },
        children = { &["children"], &["dev", "prod"] },
        children_overrides_earlier = { &["root", "children"], &["dev", "prod"] },
        children_then_parent = { &["children", "parent"], &["dev", "prod", "root"] },
        parent = { &["parent"], &["root"] },
        name = { &["dev"], &["dev"] },
        id = { &["333333333333"], &["prod"] },
        id_prefix = { &["22"], &["dev"] },
        name_prefix = { &["pr"], &["prod"] },
        regex = { &["(dev|prod)"], &["dev", "prod"] },
        dedup = { &["dev", "222222222222", "de"], &["dev"] },
        service_only = { &["ec2.amazonaws.com"], &[] },
        saml_only = { &["idp"], &[] },
        mixed_passthrough = { &["idp", "lambda.amazonaws.com", "prod"], &["prod"] },
        empty = { &[], &[] },
    )]
    fn test_resolve(tokens: &[&str], expected: &[&str]) {
        let registry = sample_registry();
        let matcher = AccountMatcher::new(&registry);
        assert_eq!(names(matcher.resolve(tokens).unwrap()), expected);
    }

    #[test]
    fn test_all_matches_registry() {
        let registry = sample_registry();
        let matcher = AccountMatcher::new(&registry);
        assert_eq!(matcher.resolve(&["all"]).unwrap(), registry.all());
        assert_eq!(matcher.resolve(&["children"]).unwrap(), registry.children());
    }

    #[parameterized(
        unknown_name = { "staging" },
        suffix_only = { "rod" },
        unknown_id = { "444444444444" },
        case_differs = { "Dev" },
    )]
    fn test_unresolved(token: &str) {
        let registry = sample_registry();
        let matcher = AccountMatcher::new(&registry);
        assert_eq!(
            matcher.resolve(&["dev", token]),
            Err(CompileError::UnresolvedPattern(token.to_string()))
        );
    }

    #[test]
    fn test_invalid_regex() {
        let registry = sample_registry();
        let matcher = AccountMatcher::new(&registry);
        assert!(matches!(
            matcher.resolve_one("(dev"),
            Err(CompileError::InvalidPattern { token, .. }) if token == "(dev"
        ));
    }

    #[test]
    fn test_resolution_is_repeatable() {
        let registry = sample_registry();
        let matcher = AccountMatcher::new(&registry);
        let tokens = ["pr", "parent", "idp", "s3.amazonaws.com"];
        assert_eq!(
            matcher.resolve(&tokens).unwrap(),
            matcher.resolve(&tokens).unwrap()
        );
    }

    #[parameterized(
        all = { "all", PatternToken::Keyword(AccountKeyword::All) },
        parent = { "parent", PatternToken::Keyword(AccountKeyword::Parent) },
        children = { "children", PatternToken::Keyword(AccountKeyword::Children) },
        service = { "ec2.amazonaws.com", PatternToken::Service("ec2.amazonaws.com") },
        saml = { "idp", PatternToken::Saml("idp") },
        pattern = { "dev", PatternToken::Pattern("dev") },
    )]
    fn test_classify(token: &str, expected: PatternToken<'_>) {
        let registry = sample_registry();
        assert_eq!(PatternToken::classify(token, &registry), expected);
    }
}
