use serde_json::{Value, json};

use crate::accounts::Account;
use crate::config::UserConfig;
use crate::error::CompileError;
use crate::references::{ReferenceResolver, ValueRef};
use crate::render::PolicySource;
use crate::template::{ResourceDescriptor, ResourceKind, TemplateSink, scrub_name};
use crate::traits::Placed;

use super::{BuildContext, arn_output};

pub fn build_user<S: PolicySource>(
    ctx: &BuildContext<'_, S>,
    sink: &mut dyn TemplateSink,
    account: &Account,
    name: &str,
    user: &UserConfig,
) -> Result<(), CompileError> {
    let logical_id = scrub_name(&format!("{name}User"));
    let groups: Vec<Value> = ReferenceResolver::resolve_import_or_literal(&user.groups)
        .iter()
        .map(ValueRef::to_value)
        .collect();
    // The password is only a first-login credential.
    let login_profile = user.password.as_ref().map(|password| {
        json!({
            "Password": password,
            "PasswordResetRequired": true,
        })
    });

    let resource = ResourceDescriptor::new(account.name(), &logical_id, ResourceKind::User)
        .property("Path", "/")
        .list_property("Groups", groups)
        .list_property(
            "ManagedPolicyArns",
            ctx.managed_policy_arns(&user.managed_policies, account, name)?,
        )
        .property_opt("LoginProfile", login_profile)
        .property_opt("UserName", ctx.names().users.then_some(name))
        .retain(user.retain_on_delete());

    sink.emit(ctx.with_output(resource, arn_output(&logical_id, format!("User {name} ARN"))))?;
    Ok(())
}
