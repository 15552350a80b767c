//! Per-entity resource builders.
//!
//! Each builder turns one configured entity into the resources of one account.
//! The account is always passed in; nothing here remembers which account it is working on.

mod buckets;
mod groups;
mod policies;
mod roles;
mod trails;
mod users;

use std::collections::BTreeMap;

use serde_json::{Value, json};
use tracing::debug;

use crate::accounts::{Account, AccountRegistry};
use crate::config::{Config, EntityKind, NameSettings};
use crate::error::CompileError;
use crate::matcher::AccountMatcher;
use crate::references::ReferenceResolver;
use crate::render::{PolicyRenderer, PolicySource};
use crate::template::{OutputDescriptor, ResourceDescriptor, TemplateSink};
use crate::traits::Placed;
use crate::trust::TrustPolicyBuilder;

pub use buckets::build_bucket;
pub use groups::build_group;
pub use policies::build_policy;
pub use roles::build_role;
pub use trails::build_trail;
pub use users::build_user;

/// Everything a builder may consult. Read-only.
pub struct BuildContext<'a, S> {
    pub config: &'a Config,
    pub registry: &'a AccountRegistry,
    pub matcher: AccountMatcher<'a>,
    pub resolver: &'a ReferenceResolver,
    pub trust: TrustPolicyBuilder<'a>,
    pub renderer: &'a PolicyRenderer<S>,
}

impl<'a, S: PolicySource> BuildContext<'a, S> {
    pub fn new(
        config: &'a Config,
        registry: &'a AccountRegistry,
        resolver: &'a ReferenceResolver,
        renderer: &'a PolicyRenderer<S>,
    ) -> Self {
        let matcher = AccountMatcher::new(registry);
        Self {
            config,
            registry,
            matcher,
            resolver,
            trust: TrustPolicyBuilder::new(matcher),
            renderer,
        }
    }

    pub fn names(&self) -> &NameSettings {
        &self.config.global.names
    }

    /// Attach `output` to `resource` unless outputs are disabled globally.
    pub(crate) fn with_output(
        &self,
        resource: ResourceDescriptor,
        output: OutputDescriptor,
    ) -> ResourceDescriptor {
        if self.config.global.template_outputs.enabled() {
            resource.output(output)
        } else {
            resource
        }
    }

    /// `ManagedPolicyArns` values for `entity` in `account`.
    pub(crate) fn managed_policy_arns(
        &self,
        references: &[String],
        account: &Account,
        entity: &str,
    ) -> Result<Vec<Value>, CompileError> {
        Ok(self
            .resolver
            .resolve_managed_policies(references, account.name(), entity)?
            .iter()
            .map(|r| r.to_value())
            .collect())
    }
}

/// Builds one entity of type `T` into one account.
pub type BuildFn<S, T> = fn(
    &BuildContext<'_, S>,
    &mut dyn TemplateSink,
    &Account,
    &str,
    &T,
) -> Result<(), CompileError>;

/// Run `build` for every entity of one kind in every account it is placed in.
pub fn build_all<S: PolicySource, T: Placed>(
    ctx: &BuildContext<'_, S>,
    sink: &mut dyn TemplateSink,
    entities: &BTreeMap<String, T>,
    build: BuildFn<S, T>,
) -> Result<(), CompileError> {
    for (name, entity) in entities {
        for account in ctx.matcher.resolve(&entity.context())? {
            let account = ctx.registry.account(&account)?;
            debug!(
                event = "Build",
                phase = %T::kind(),
                name = name.as_str(),
                account = account.name()
            );
            build(ctx, sink, account, name, entity)?;
        }
    }
    Ok(())
}

/// Build every entity of `kind`.
pub fn build_kind<S: PolicySource>(
    ctx: &BuildContext<'_, S>,
    sink: &mut dyn TemplateSink,
    kind: EntityKind,
) -> Result<(), CompileError> {
    let config = ctx.config;
    match kind {
        EntityKind::Policy => build_all(ctx, sink, &config.policies, build_policy),
        EntityKind::Role => build_all(ctx, sink, &config.roles, build_role),
        EntityKind::Group => build_all(ctx, sink, &config.groups, build_group),
        EntityKind::User => build_all(ctx, sink, &config.users, build_user),
        EntityKind::Bucket => build_all(ctx, sink, &config.buckets, build_bucket),
        EntityKind::Trail => build_all(ctx, sink, &config.trails, build_trail),
    }
}

/// `<logical id>Arn` pointing at the resource's `Arn` attribute.
pub(crate) fn arn_output(logical_id: &str, description: String) -> OutputDescriptor {
    OutputDescriptor::new(
        format!("{logical_id}Arn"),
        description,
        json!({ "Fn::GetAtt": [logical_id, "Arn"] }),
    )
}
