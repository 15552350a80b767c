//! Assume-role trust documents built from a role's `trusts` list.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::document::{PolicyDocument, Principal, Statement};
use crate::error::CompileError;
use crate::matcher::AccountMatcher;

static SERVICE_PRINCIPAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+(\.[A-Za-z0-9_-]+)+$").expect("service principal regex is valid")
});

/// What a single trust token grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustToken {
    /// The root of an account in the registry, by name.
    Account { account: String },
    /// Federated sign-in through the parent account's SAML provider.
    Saml { provider: String },
    /// An AWS service principal such as `ec2.amazonaws.com`.
    Service { principal: String },
}

#[derive(Debug, Clone, Copy)]
pub struct TrustPolicyBuilder<'a> {
    matcher: AccountMatcher<'a>,
}

impl<'a> TrustPolicyBuilder<'a> {
    pub fn new(matcher: AccountMatcher<'a>) -> Self {
        Self { matcher }
    }

    /// Decide what a trust token refers to.
    ///
    /// Account resolution comes first: a token selecting exactly one account is an
    /// account trust. Tokens selecting nothing, or several accounts, fall through to
    /// the SAML provider and service principal checks. A token that still matches
    /// nothing but selected several accounts fails with [`CompileError::AmbiguousTrust`].
    pub fn classify(&self, token: &str) -> Result<TrustToken, CompileError> {
        let registry = self.matcher.registry();

        let resolved = match self.matcher.resolve_one(token) {
            Ok(accounts) => accounts,
            Err(CompileError::UnresolvedPattern(_)) => Default::default(),
            Err(e) => return Err(e),
        };

        let classified = if resolved.len() == 1 {
            let account = resolved.into_iter().next().unwrap_or_default();
            TrustToken::Account { account }
        } else if registry.saml_provider() == Some(token) {
            TrustToken::Saml {
                provider: token.to_string(),
            }
        } else if SERVICE_PRINCIPAL.is_match(token) {
            TrustToken::Service {
                principal: token.to_string(),
            }
        } else if resolved.len() > 1 {
            return Err(CompileError::AmbiguousTrust {
                token: token.to_string(),
                accounts: resolved.into_iter().collect(),
            });
        } else {
            return Err(CompileError::UnknownTrust(token.to_string()));
        };

        debug!(event = "Trust", phase = "Classify", token = token, trust = ?classified);
        Ok(classified)
    }

    /// The trust statement for a classified token.
    pub fn statement(&self, trust: &TrustToken) -> Result<Statement, CompileError> {
        let registry = self.matcher.registry();
        Ok(match trust {
            TrustToken::Account { account } => {
                Statement::trust(Principal::Aws(registry.account(account)?.root_arn()))
            }
            TrustToken::Saml { provider } => Statement::saml_trust(format!(
                "arn:aws:iam::{}:saml-provider/{provider}",
                registry.parent().id()
            )),
            TrustToken::Service { principal } => {
                Statement::trust(Principal::Service(principal.clone()))
            }
        })
    }

    /// Build the trust document. Account and service statements come first,
    /// then SAML statements, each group in input order.
    pub fn build<S: AsRef<str>>(&self, trusts: &[S]) -> Result<PolicyDocument, CompileError> {
        let mut direct = Vec::new();
        let mut federated = Vec::new();

        for token in trusts {
            let trust = self.classify(token.as_ref())?;
            let statement = self.statement(&trust)?;
            match trust {
                TrustToken::Saml { .. } => federated.push(statement),
                _ => direct.push(statement),
            }
        }

        direct.extend(federated);
        Ok(PolicyDocument::new(direct))
    }
}
