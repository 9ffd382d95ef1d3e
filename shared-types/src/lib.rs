#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Page size used when a caller asks for a non-positive size
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Logical identity of a configuration item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigKey {
    pub app_id: String,
    pub namespace: String,
    pub key: String,
}

impl ConfigKey {
    pub fn new(
        app_id: impl Into<String>,
        namespace: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            namespace: namespace.into(),
            key: key.into(),
        }
    }

    /// Generate a path-like string representation
    pub fn to_path(&self) -> String {
        format!("{}/{}/{}", self.app_id, self.namespace, self.key)
    }

    /// Key under which resolved reads of this item are cached.
    ///
    /// `%`, `:` and `@` are percent-escaped in each part, so distinct keys
    /// never share a cache key and `@` is free to mark context-scoped entries.
    pub fn cache_key(&self) -> String {
        format!(
            "config:{}:{}:{}",
            escape_cache_part(&self.app_id),
            escape_cache_part(&self.namespace),
            escape_cache_part(&self.key)
        )
    }

    /// Same key with surrounding whitespace removed from every part
    pub fn trimmed(&self) -> Self {
        Self::new(self.app_id.trim(), self.namespace.trim(), self.key.trim())
    }

    pub fn is_complete(&self) -> bool {
        !self.app_id.is_empty() && !self.namespace.is_empty() && !self.key.is_empty()
    }
}

fn escape_cache_part(part: &str) -> String {
    let mut escaped = String::with_capacity(part.len());
    for c in part.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            ':' => escaped.push_str("%3A"),
            '@' => escaped.push_str("%40"),
            c => escaped.push(c),
        }
    }
    escaped
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_path())
    }
}

/// Rule set deciding which clients receive the gray variant.
///
/// `value` is what a matching client is served instead of the canonical value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GrayRules {
    pub value: String,
    #[serde(default)]
    pub client_ids: BTreeSet<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<u8>,
}

/// Caller-supplied identity used to evaluate gray rules
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl ClientContext {
    pub fn new(client_id: Option<String>, tags: impl IntoIterator<Item = String>) -> Self {
        Self {
            client_id,
            tags: tags.into_iter().collect(),
        }
    }

    /// Build a context from the `client_id` / `client_tags` query parameters.
    /// Returns `None` when neither carries anything.
    pub fn from_query(client_id: Option<&str>, client_tags: Option<&str>) -> Option<Self> {
        let client_id = client_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        let tags = client_tags
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        let context = Self::new(client_id, tags);
        if context.is_empty() {
            None
        } else {
            Some(context)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.client_id.is_none() && self.tags.is_empty()
    }
}

/// The live record for a `ConfigKey`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigItem {
    pub id: Uuid,
    #[serde(flatten)]
    pub config_key: ConfigKey,
    pub value: String,
    pub description: String,
    pub version: u64,
    pub is_active: bool,
    pub gray_release: bool,
    pub gray_rules: Option<GrayRules>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConfigItem {
    /// Snapshot of the current value for the version ledger
    pub fn version_record(&self) -> VersionRecord {
        VersionRecord {
            config_id: self.id,
            version: self.version,
            value: self.value.clone(),
            description: self.description.clone(),
            created_at: self.updated_at,
        }
    }
}

/// Immutable history entry, one per committed create/update
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionRecord {
    pub config_id: Uuid,
    pub version: u64,
    pub value: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Which value a pull served
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Canonical,
    Gray,
}

/// A config item as served to a pulling client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedConfig {
    #[serde(flatten)]
    pub item: ConfigItem,
    pub variant: Variant,
}

fn default_active() -> bool {
    true
}

/// Body of `POST /configs`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConfigRequest {
    pub app_id: String,
    pub namespace: String,
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub gray_release: bool,
    #[serde(default)]
    pub gray_rules: Option<GrayRules>,
}

impl CreateConfigRequest {
    pub fn new(key: &ConfigKey, value: impl Into<String>) -> Self {
        Self {
            app_id: key.app_id.clone(),
            namespace: key.namespace.clone(),
            key: key.key.clone(),
            value: value.into(),
            description: String::new(),
            is_active: true,
            gray_release: false,
            gray_rules: None,
        }
    }

    /// The item's key, with surrounding whitespace dropped as on the pull path
    pub fn config_key(&self) -> ConfigKey {
        ConfigKey::new(&self.app_id, &self.namespace, &self.key).trimmed()
    }
}

/// Body of `PUT /configs/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfigRequest {
    pub value: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub gray_release: bool,
    #[serde(default)]
    pub gray_rules: Option<GrayRules>,
}

impl UpdateConfigRequest {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            description: String::new(),
            is_active: true,
            gray_release: false,
            gray_rules: None,
        }
    }
}

/// Optional filters for listing items
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListFilter {
    pub app_id: Option<String>,
    pub namespace: Option<String>,
}

impl ListFilter {
    pub fn matches(&self, key: &ConfigKey) -> bool {
        self.app_id.as_deref().is_none_or(|a| a == key.app_id)
            && self.namespace.as_deref().is_none_or(|n| n == key.namespace)
    }
}

/// Normalized page window for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub size: usize,
}

impl Pagination {
    /// `page < 1` becomes 1, `size <= 0` becomes [`DEFAULT_PAGE_SIZE`]
    pub fn new(page: i64, size: i64) -> Self {
        let page = usize::try_from(page).ok().filter(|p| *p >= 1).unwrap_or(1);
        let size = usize::try_from(size)
            .ok()
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Self { page, size }
    }

    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.size)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_key_formats() {
        let key = ConfigKey::new("shop", "prod", "db.url");
        assert_eq!(key.to_path(), "shop/prod/db.url");
        assert_eq!(key.cache_key(), "config:shop:prod:db.url");
        assert_eq!(key.to_string(), "shop/prod/db.url");
        assert!(key.is_complete());
        assert!(!ConfigKey::new("shop", "", "db.url").is_complete());
    }

    #[test]
    fn test_cache_key_is_unambiguous() {
        let left = ConfigKey::new("a:b", "c", "d");
        let right = ConfigKey::new("a", "b:c", "d");
        assert_ne!(left.cache_key(), right.cache_key());

        let at = ConfigKey::new("a", "n", "k@x");
        assert_eq!(at.cache_key(), "config:a:n:k%40x");
        assert!(!at.cache_key().contains('@'));

        // An escape sequence typed literally stays distinct from the character
        assert_ne!(
            ConfigKey::new("a", "n", "k%3Ax").cache_key(),
            ConfigKey::new("a", "n", "k:x").cache_key()
        );
    }

    #[test]
    fn test_create_request_key_is_trimmed() {
        let request = CreateConfigRequest::new(&ConfigKey::new(" shop", "prod ", " timeout "), "1");
        assert_eq!(request.config_key(), ConfigKey::new("shop", "prod", "timeout"));
        assert!(!CreateConfigRequest::new(&ConfigKey::new("shop", " ", "k"), "1")
            .config_key()
            .is_complete());
    }

    #[test]
    fn test_pagination_normalizes() {
        assert_eq!(Pagination::new(0, 5), Pagination::new(1, 5));
        assert_eq!(Pagination::new(-3, 0), Pagination::new(1, 10));
        assert_eq!(Pagination::new(3, 0).offset(), 20);
        assert_eq!(Pagination::new(2, 7).offset(), 7);
    }

    #[test]
    fn test_client_context_from_query() {
        assert_eq!(ClientContext::from_query(None, None), None);
        assert_eq!(ClientContext::from_query(Some(" "), Some(", ,")), None);

        let context = ClientContext::from_query(Some("node-7"), Some("beta, canary")).unwrap();
        assert_eq!(context.client_id.as_deref(), Some("node-7"));
        assert!(context.tags.contains("beta"));
        assert!(context.tags.contains("canary"));
    }

    #[test]
    fn test_create_request_defaults() {
        let request: CreateConfigRequest = serde_json::from_value(serde_json::json!({
            "app_id": "shop",
            "namespace": "prod",
            "key": "timeout",
            "value": "30"
        }))
        .unwrap();

        assert!(request.is_active);
        assert!(!request.gray_release);
        assert!(request.gray_rules.is_none());
        assert_eq!(request.description, "");
    }

    #[test]
    fn test_resolved_config_is_flat() {
        let now = Utc::now();
        let resolved = ResolvedConfig {
            item: ConfigItem {
                id: Uuid::new_v4(),
                config_key: ConfigKey::new("shop", "prod", "timeout"),
                value: "30".to_string(),
                description: String::new(),
                version: 1,
                is_active: true,
                gray_release: false,
                gray_rules: None,
                created_at: now,
                updated_at: now,
            },
            variant: Variant::Canonical,
        };

        let json = serde_json::to_value(&resolved).unwrap();
        assert_eq!(json["app_id"], "shop");
        assert_eq!(json["key"], "timeout");
        assert_eq!(json["variant"], "canonical");

        let back: ResolvedConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, resolved);
    }
}
