use crate::accounts::Account;
use crate::config::BucketConfig;
use crate::error::CompileError;
use crate::render::PolicySource;
use crate::template::{ResourceDescriptor, ResourceKind, TemplateSink, scrub_name};
use crate::traits::Placed;

use super::{BuildContext, arn_output};

/// Emit the bucket `name` into `account`, with its bucket policy if one is configured.
pub fn build_bucket<S: PolicySource>(
    ctx: &BuildContext<'_, S>,
    sink: &mut dyn TemplateSink,
    account: &Account,
    name: &str,
    bucket: &BucketConfig,
) -> Result<(), CompileError> {
    let logical_id = scrub_name(&format!("{name}Bucket"));
    let resource = ResourceDescriptor::new(account.name(), &logical_id, ResourceKind::Bucket)
        .property_opt("BucketName", ctx.names().buckets.then_some(name))
        .retain(bucket.retain_on_delete());
    let handle = sink.emit(ctx.with_output(
        resource,
        arn_output(&logical_id, format!("Bucket {name} ARN")),
    ))?;

    if let Some(policy) = &bucket.bucket_policy {
        let document = ctx
            .renderer
            .render(policy.file(), ctx.config, account, ctx.registry.parent())?;
        let policy_id = scrub_name(&format!("{name}BucketPolicy"));
        sink.emit(
            ResourceDescriptor::new(account.name(), policy_id, ResourceKind::BucketPolicy)
                .property("Bucket", handle.reference())
                .property("PolicyDocument", document),
        )?;
    }
    Ok(())
}
