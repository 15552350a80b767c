use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum CompileError {
    #[error("no account is marked as parent, one account must have `parent: true`")]
    MissingParentAccount,

    #[error("more than one account is marked as parent: {}", .0.join(", "))]
    MultipleParentAccounts(Vec<String>),

    #[error("account id {id} is used by both '{first}' and '{second}'")]
    DuplicateAccountId {
        id: String,
        first: String,
        second: String,
    },

    #[error("account name '{0}' is declared more than once")]
    DuplicateAccountName(String),

    #[error("account '{account}' has a non-numeric id '{id}'")]
    InvalidAccountId { account: String, id: String },

    #[error("unknown account: {0}")]
    UnknownAccount(String),

    #[error("unable to find account matching '{0}' in the accounts section of the config")]
    UnresolvedPattern(String),

    #[error("invalid account pattern '{token}': {reason}")]
    InvalidPattern { token: String, reason: String },

    #[error("working on '{entity}': managed policy '{policy}' does not exist in the config")]
    UndeclaredPolicy { policy: String, entity: String },

    #[error(
        "working on '{entity}': policy '{policy}' is inline and cannot be referenced as a managed policy"
    )]
    InlinePolicyReference { policy: String, entity: String },

    #[error(
        "working on '{entity}': managed policy '{policy}' is not configured to go into account '{account}'"
    )]
    PolicyNotInAccount {
        policy: String,
        account: String,
        entity: String,
    },

    #[error("policy '{0}' must set exactly one of `inline: true`, `policy_file` or `assume`")]
    InvalidPolicyBody(String),

    #[error("unable to find trust '{0}': not an account, the SAML provider or a service principal")]
    UnknownTrust(String),

    #[error(
        "trust '{token}' matches several accounts ({}), name a single account or use its id",
        .accounts.join(", ")
    )]
    AmbiguousTrust { token: String, accounts: Vec<String> },

    #[error("group '{0}' has `inline_policies` but expands to no groups: it needs at least one role and one child account")]
    EmptyInlineGroup(String),

    #[error("trail '{trail}': bucket '{bucket}' is not configured to go into account '{account}'")]
    BucketNotInAccount {
        trail: String,
        bucket: String,
        account: String,
    },

    #[error("resource '{logical_id}' is emitted twice into account '{account}'")]
    DuplicateResource { account: String, logical_id: String },

    #[error("failed to read policy file {path}: {reason}")]
    PolicyFileRead { path: String, reason: String },

    #[error("failed to render policy file {path}: {reason}")]
    PolicyFileRender { path: String, reason: String },

    #[error("policy file {path} did not render to valid JSON: {reason}")]
    PolicyFileJson { path: String, reason: String },

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("secret '{0}' is not defined in any secrets.yaml")]
    UndefinedSecret(String),

    #[error("environment variable '{0}' is not defined and has no default")]
    UndefinedEnvVar(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("failed to serialize template: {0}")]
    Serialize(String),

    #[error("configuration has {} errors:\n  {}", .0.len(), .0.iter().join("\n  "))]
    Invalid(Vec<CompileError>),
}

impl CompileError {
    /// Fold a list of collected errors into a single error, if any.
    pub(crate) fn collect(mut errors: Vec<CompileError>) -> Result<(), CompileError> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(CompileError::Invalid(errors)),
        }
    }

    /// Every individual error, flattening `Invalid`.
    pub fn errors(&self) -> Vec<&CompileError> {
        match self {
            CompileError::Invalid(errors) => errors.iter().flat_map(|e| e.errors()).collect(),
            other => vec![other],
        }
    }
}

impl From<std::io::Error> for CompileError {
    fn from(err: std::io::Error) -> Self {
        CompileError::Io(err.to_string())
    }
}

impl From<serde_yaml::Error> for CompileError {
    fn from(err: serde_yaml::Error) -> Self {
        CompileError::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for CompileError {
    fn from(err: serde_json::Error) -> Self {
        CompileError::Serialize(err.to_string())
    }
}
