//! Entity kinds and their processing order.
//!
//! Later kinds may reference earlier ones (a role references a managed policy),
//! so the declaration order of this enum is the order the compiler walks them in.

use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// The configured entity collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, AsRefStr, Display, EnumIter, EnumString)]
pub enum EntityKind {
    /// A managed policy (`policies:`)
    Policy,
    /// An assumable role (`roles:`)
    Role,
    /// An IAM group (`groups:`)
    Group,
    /// An IAM user (`users:`)
    User,
    /// An S3 bucket (`buckets:`)
    Bucket,
    /// A CloudTrail trail (`trails:` or `cloudtrail:`)
    Trail,
}

impl EntityKind {
    /// The `in_accounts` context used when an entity does not declare one.
    pub fn default_context(&self) -> &'static [&'static str] {
        match self {
            Self::Policy | Self::Role | Self::Group | Self::Trail => &["all"],
            Self::User | Self::Bucket => &["parent"],
        }
    }
}
