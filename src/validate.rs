//! Whole-configuration validation, run before anything is emitted.
//!
//! Every entity is checked and every problem is collected, so a broken
//! configuration reports all of its errors at once, in a stable order.

use std::collections::{BTreeMap, BTreeSet};

use strum::IntoEnumIterator;
use tracing::{debug, info};

use crate::accounts::AccountRegistry;
use crate::config::{Config, EntityKind, PolicyBody};
use crate::error::CompileError;
use crate::matcher::AccountMatcher;
use crate::references::ReferenceResolver;
use crate::traits::Placed;
use crate::trust::TrustPolicyBuilder;

/// Validate `config` against `registry`.
///
/// A single problem is returned as itself, several as [`CompileError::Invalid`].
pub fn validate(config: &Config, registry: &AccountRegistry) -> Result<(), CompileError> {
    Validator::new(config, registry).run()
}

struct Validator<'a> {
    config: &'a Config,
    matcher: AccountMatcher<'a>,
    resolver: ReferenceResolver,
    buckets: BTreeMap<&'a str, BTreeSet<String>>,
    errors: Vec<CompileError>,
}

impl<'a> Validator<'a> {
    fn new(config: &'a Config, registry: &'a AccountRegistry) -> Self {
        let matcher = AccountMatcher::new(registry);
        // Placement failures are reported per policy; references to those
        // policies repeat the same error, which `push` drops.
        let (resolver, _) = ReferenceResolver::partial(&config.policies, &matcher);
        Self {
            config,
            matcher,
            resolver,
            buckets: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    fn run(mut self) -> Result<(), CompileError> {
        for kind in EntityKind::iter() {
            let before = self.errors.len();
            match kind {
                EntityKind::Policy => self.policies(),
                EntityKind::Role => self.roles(),
                EntityKind::Group => self.groups(),
                EntityKind::User => self.users(),
                EntityKind::Bucket => self.buckets(),
                EntityKind::Trail => self.trails(),
            }
            debug!(
                event = "Validate",
                phase = kind.as_ref(),
                errors = self.errors.len() - before
            );
        }

        info!(event = "Validate", phase = "Result", errors = self.errors.len());
        CompileError::collect(self.errors)
    }

    fn push(&mut self, error: CompileError) {
        if !self.errors.contains(&error) {
            self.errors.push(error);
        }
    }

    /// The accounts `entity` is placed in, or `None` if its context does not resolve.
    fn placement<T: Placed>(&mut self, entity: &T) -> Option<BTreeSet<String>> {
        match self.matcher.resolve(&entity.context()) {
            Ok(accounts) => Some(accounts),
            Err(e) => {
                self.push(e);
                None
            }
        }
    }

    fn managed_policies(&mut self, references: &[String], accounts: &BTreeSet<String>, entity: &str) {
        let mut found = Vec::new();
        for account in accounts {
            for reference in references {
                if let Err(e) = self.resolver.resolve_managed_policy(reference, account, entity) {
                    found.push(e);
                }
            }
        }
        found.into_iter().for_each(|e| self.push(e));
    }

    fn policies(&mut self) {
        let config = self.config;
        for (name, policy) in &config.policies {
            self.placement(policy);
            match policy.body(name) {
                Ok(PolicyBody::Assume(assume)) => {
                    if let Err(e) = self.matcher.resolve(&assume.accounts) {
                        self.push(e);
                    }
                }
                Ok(_) => {}
                Err(e) => self.push(e),
            }
        }
    }

    fn roles(&mut self) {
        let config = self.config;
        let trust = TrustPolicyBuilder::new(self.matcher);
        for (name, role) in &config.roles {
            for token in &role.trusts {
                if let Err(e) = trust.classify(token) {
                    self.push(e);
                }
            }
            if let Some(accounts) = self.placement(role) {
                self.managed_policies(&role.managed_policies, &accounts, name);
            }
        }
    }

    fn groups(&mut self) {
        let config = self.config;
        let has_children = self.matcher.registry().accounts().any(|a| !a.is_parent());
        for (name, group) in &config.groups {
            if let Some(roles) = &group.inline_policies {
                if roles.is_empty() || !has_children {
                    self.push(CompileError::EmptyInlineGroup(name.clone()));
                }
            }
            if let Some(accounts) = self.placement(group) {
                self.managed_policies(&group.managed_policies, &accounts, name);
            }
        }
    }

    fn users(&mut self) {
        let config = self.config;
        for (name, user) in &config.users {
            if let Some(accounts) = self.placement(user) {
                self.managed_policies(&user.managed_policies, &accounts, name);
            }
        }
    }

    fn buckets(&mut self) {
        let config = self.config;
        for (name, bucket) in &config.buckets {
            if let Some(accounts) = self.placement(bucket) {
                self.buckets.insert(name.as_str(), accounts);
            }
        }
    }

    fn trails(&mut self) {
        let config = self.config;
        for (name, trail) in &config.trails {
            let Some(accounts) = self.placement(trail) else {
                continue;
            };
            let Some(bucket) = trail.bucket.as_deref() else {
                continue;
            };
            // Buckets managed outside this configuration are taken on trust.
            let Some(placed) = self.buckets.get(bucket).cloned() else {
                continue;
            };
            for account in accounts.difference(&placed) {
                self.push(CompileError::BucketNotInAccount {
                    trail: name.clone(),
                    bucket: bucket.to_string(),
                    account: account.clone(),
                });
            }
        }
    }
}
