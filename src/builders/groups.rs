use serde_json::{Value, json};

use crate::accounts::Account;
use crate::config::GroupConfig;
use crate::document::{PolicyDocument, Statement};
use crate::error::CompileError;
use crate::render::PolicySource;
use crate::template::{ResourceDescriptor, ResourceKind, TemplateSink, scrub_name};
use crate::traits::Placed;

use super::{BuildContext, arn_output};

/// Emit the group `name` into `account`.
///
/// A group with `inline_policies` is expanded instead: for every child account and
/// every listed role, a group `<child id>-<role>` that may assume that role there.
pub fn build_group<S: PolicySource>(
    ctx: &BuildContext<'_, S>,
    sink: &mut dyn TemplateSink,
    account: &Account,
    name: &str,
    group: &GroupConfig,
) -> Result<(), CompileError> {
    let Some(roles) = &group.inline_policies else {
        return emit_group(ctx, sink, account, name, group, None);
    };

    for child in ctx.registry.accounts().filter(|a| !a.is_parent()) {
        for role in roles {
            let group_name = format!("{}-{role}", child.id());
            let document = PolicyDocument::new(vec![Statement::assume_role(child.role_arn(role))]);
            let policy = json!({
                "PolicyName": group_name,
                "PolicyDocument": document.to_value(),
            });
            emit_group(ctx, sink, account, &group_name, group, Some(policy))?;
        }
    }
    Ok(())
}

fn emit_group<S: PolicySource>(
    ctx: &BuildContext<'_, S>,
    sink: &mut dyn TemplateSink,
    account: &Account,
    name: &str,
    group: &GroupConfig,
    inline_policy: Option<Value>,
) -> Result<(), CompileError> {
    let logical_id = scrub_name(&format!("{name}Group"));

    let resource = ResourceDescriptor::new(account.name(), &logical_id, ResourceKind::Group)
        .property("Path", "/")
        .list_property(
            "ManagedPolicyArns",
            ctx.managed_policy_arns(&group.managed_policies, account, name)?,
        )
        .list_property("Policies", inline_policy.into_iter().collect())
        .property_opt("GroupName", ctx.names().groups.then_some(name))
        .retain(group.retain_on_delete());

    sink.emit(ctx.with_output(resource, arn_output(&logical_id, format!("Group {name} ARN"))))?;
    Ok(())
}
