// src/lib.rs
pub use accounts::{Account, AccountRegistry};
pub use compiler::{CompileOptions, Compilation, Compiler};
pub use config::{Config, TagResolver};
pub use error::CompileError;
pub use matcher::AccountMatcher;
pub use output::{OutputFormat, write_templates};
pub use references::{ManagedPolicyReference, ReferenceResolver, ValueRef};
pub use template::{TemplateSet, TemplateSink};
pub use trust::{TrustPolicyBuilder, TrustToken};
pub use validate::validate;

pub mod accounts;
pub mod builders;
pub mod compiler;
pub mod config;
pub mod document;
pub mod matcher;
pub mod output;
pub mod references;
pub mod render;
pub mod template;
pub mod traits;
pub mod trust;
pub mod validate;

mod error;
