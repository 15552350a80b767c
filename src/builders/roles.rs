use crate::accounts::Account;
use crate::config::RoleConfig;
use crate::error::CompileError;
use crate::render::PolicySource;
use crate::template::{
    OutputDescriptor, ResourceDescriptor, ResourceHandle, ResourceKind, TemplateSink, scrub_name,
};
use crate::traits::Placed;

use super::{BuildContext, arn_output};

/// Emit the role `name` into `account`, plus an instance profile when EC2 may assume it.
pub fn build_role<S: PolicySource>(
    ctx: &BuildContext<'_, S>,
    sink: &mut dyn TemplateSink,
    account: &Account,
    name: &str,
    role: &RoleConfig,
) -> Result<(), CompileError> {
    let logical_id = scrub_name(&format!("{name}Role"));
    let named = ctx.names().roles;

    let resource = ResourceDescriptor::new(account.name(), &logical_id, ResourceKind::Role)
        .property("Path", "/")
        .property("AssumeRolePolicyDocument", ctx.trust.build(&role.trusts)?.to_value())
        .list_property(
            "ManagedPolicyArns",
            ctx.managed_policy_arns(&role.managed_policies, account, name)?,
        )
        .property_opt("RoleName", named.then_some(name))
        .retain(role.retain_on_delete());
    let resource = ctx.with_output(resource, arn_output(&logical_id, format!("Role {name} ARN")));
    let handle = sink.emit(resource)?;

    if role.needs_instance_profile() {
        instance_profile(ctx, sink, &handle, name, role)?;
    }
    Ok(())
}

fn instance_profile<S: PolicySource>(
    ctx: &BuildContext<'_, S>,
    sink: &mut dyn TemplateSink,
    role_handle: &ResourceHandle,
    name: &str,
    role: &RoleConfig,
) -> Result<(), CompileError> {
    let logical_id = scrub_name(&format!("{name}InstanceProfile"));
    let resource = ResourceDescriptor::new(
        role_handle.account.as_str(),
        &logical_id,
        ResourceKind::InstanceProfile,
    )
    .property("Path", "/")
    .property("Roles", vec![role_handle.reference()])
    .property_opt("InstanceProfileName", ctx.names().roles.then_some(name))
    .retain(role.retain_on_delete());

    let output = OutputDescriptor::new(
        format!("{logical_id}Arn"),
        format!("Instance profile for Role {name} ARN"),
        serde_json::json!({ "Ref": logical_id }),
    );
    sink.emit(ctx.with_output(resource, output))?;
    Ok(())
}
