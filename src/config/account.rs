use serde::{Deserialize, Deserializer, Serialize};

/// One entry of the `accounts:` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountConfig {
    /// Numeric account id. YAML integers and strings are both accepted.
    #[serde(deserialize_with = "deserialize_account_id")]
    pub id: String,
    #[serde(default)]
    pub parent: bool,
    #[serde(
        default,
        alias = "samlProvider",
        skip_serializing_if = "Option::is_none"
    )]
    pub saml_provider: Option<String>,
}

impl AccountConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent: false,
            saml_provider: None,
        }
    }

    pub fn parent(mut self) -> Self {
        self.parent = true;
        self
    }

    pub fn with_saml_provider(mut self, provider: impl Into<String>) -> Self {
        self.saml_provider = Some(provider.into());
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAccountId {
    Number(u64),
    Text(String),
}

fn deserialize_account_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawAccountId::deserialize(deserializer)? {
        RawAccountId::Number(n) => n.to_string(),
        RawAccountId::Text(s) => s,
    })
}
