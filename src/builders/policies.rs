use serde_json::Value;

use crate::accounts::Account;
use crate::config::{AssumeConfig, PolicyBody, PolicyConfig};
use crate::document::{PolicyDocument, Statement};
use crate::error::CompileError;
use crate::references::{ReferenceResolver, ValueRef};
use crate::render::PolicySource;
use crate::template::{
    OutputDescriptor, ResourceDescriptor, ResourceKind, TemplateSink, scrub_name,
};
use crate::traits::Placed;

use super::BuildContext;

/// Emit the managed policy `name` into `account`. Inline policies are skipped,
/// the groups that use them carry their documents.
pub fn build_policy<S: PolicySource>(
    ctx: &BuildContext<'_, S>,
    sink: &mut dyn TemplateSink,
    account: &Account,
    name: &str,
    policy: &PolicyConfig,
) -> Result<(), CompileError> {
    let document = match policy.body(name)? {
        PolicyBody::Inline => return Ok(()),
        PolicyBody::File(file) => {
            ctx.renderer
                .render(file, ctx.config, account, ctx.registry.parent())?
        }
        PolicyBody::Assume(assume) => assume_document(ctx, assume)?.to_value(),
    };

    let logical_id = scrub_name(name);
    let description = policy
        .description
        .clone()
        .unwrap_or_else(|| format!("Managed Policy {name}"));

    let resource = ResourceDescriptor::new(account.name(), &logical_id, ResourceKind::ManagedPolicy)
        .property("Description", description.as_str())
        .property("PolicyDocument", document)
        .list_property("Groups", import_values(&policy.groups))
        .list_property("Users", import_values(&policy.users))
        .list_property("Roles", import_values(&policy.roles))
        .property_opt("ManagedPolicyName", ctx.names().policies.then_some(name))
        .retain(policy.retain_on_delete());

    let output = OutputDescriptor::new(
        format!("{logical_id}PolicyArn"),
        format!("{description} Policy Document ARN"),
        serde_json::json!({ "Ref": logical_id }),
    );
    sink.emit(ctx.with_output(resource, output))?;
    Ok(())
}

/// One `sts:AssumeRole` statement per role and matched account.
fn assume_document<S: PolicySource>(
    ctx: &BuildContext<'_, S>,
    assume: &AssumeConfig,
) -> Result<PolicyDocument, CompileError> {
    let accounts = ctx.matcher.resolve(&assume.accounts)?;
    let mut statements = Vec::with_capacity(assume.roles.len() * accounts.len());
    for role in &assume.roles {
        for account in &accounts {
            statements.push(Statement::assume_role(
                ctx.registry.account(account)?.role_arn(role),
            ));
        }
    }
    Ok(PolicyDocument::new(statements))
}

fn import_values(values: &[String]) -> Vec<Value> {
    ReferenceResolver::resolve_import_or_literal(values)
        .iter()
        .map(ValueRef::to_value)
        .collect()
}
