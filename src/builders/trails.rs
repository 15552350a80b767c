use crate::accounts::Account;
use crate::config::TrailConfig;
use crate::error::CompileError;
use crate::render::PolicySource;
use crate::template::{ResourceDescriptor, ResourceKind, TemplateSink, scrub_name};
use crate::traits::Placed;

use super::{BuildContext, arn_output};

pub fn build_trail<S: PolicySource>(
    ctx: &BuildContext<'_, S>,
    sink: &mut dyn TemplateSink,
    account: &Account,
    name: &str,
    trail: &TrailConfig,
) -> Result<(), CompileError> {
    let logical_id = scrub_name(&format!("{name}Trail"));

    let mut resource = ResourceDescriptor::new(account.name(), &logical_id, ResourceKind::Trail)
        .property(
            "IncludeGlobalServiceEvents",
            trail.global_events.unwrap_or(true),
        )
        .property_opt("IsLogging", trail.logging)
        .property_opt("IsMultiRegionTrail", trail.multiregion)
        .property_opt("S3BucketName", trail.bucket.as_deref())
        .property_opt("TrailName", ctx.names().trails.then_some(name))
        .retain(trail.retain_on_delete());

    // A bucket from this configuration is created in the same stack, so wait for it.
    if let Some(bucket) = trail.bucket.as_deref() {
        if ctx.config.buckets.contains_key(bucket) {
            resource = resource.depends_on(scrub_name(&format!("{bucket}Bucket")));
        }
    }

    sink.emit(ctx.with_output(resource, arn_output(&logical_id, format!("Trail {name} ARN"))))?;
    Ok(())
}
