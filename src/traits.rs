use crate::config::EntityKind;

/// Anything from the configuration that is placed into one or more accounts,
/// e.g. a role, a managed policy or a bucket.
pub trait Placed {
    /// The entity kind ("Role", "Policy", etc), which decides the default context.
    fn kind() -> EntityKind;

    /// The `in_accounts` patterns as written in the config, if any.
    fn in_accounts(&self) -> Option<&[String]>;

    /// The pattern tokens deciding which accounts this entity goes into,
    /// falling back to the per-kind default when `in_accounts` is absent.
    fn context(&self) -> Vec<String> {
        match self.in_accounts() {
            Some(tokens) => tokens.to_vec(),
            None => Self::kind()
                .default_context()
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }

    /// Whether the resources emitted for this entity get `DeletionPolicy: Retain`.
    fn retain_on_delete(&self) -> bool {
        false
    }
}
