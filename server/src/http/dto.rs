use serde::{Deserialize, Serialize};
use shared_types::{ClientContext, ConfigKey, ListFilter, Pagination};

/// Query string of `GET /configs`.
///
/// `page` and `size` are kept as text so that junk values fall back to the
/// defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub app_id: Option<String>,
    pub namespace: Option<String>,
    pub page: Option<String>,
    pub size: Option<String>,
}

impl ListParams {
    pub fn filter(&self) -> ListFilter {
        ListFilter {
            app_id: non_empty(self.app_id.as_deref()),
            namespace: non_empty(self.namespace.as_deref()),
        }
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::new(lenient_number(self.page.as_deref()), lenient_number(self.size.as_deref()))
    }
}

/// Query string of `GET /configs/pull`
#[derive(Debug, Default, Deserialize)]
pub struct PullParams {
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub key: String,
    pub client_id: Option<String>,
    pub client_tags: Option<String>,
}

impl PullParams {
    pub fn config_key(&self) -> ConfigKey {
        ConfigKey::new(&self.app_id, &self.namespace, &self.key).trimmed()
    }

    pub fn context(&self) -> Option<ClientContext> {
        ClientContext::from_query(self.client_id.as_deref(), self.client_tags.as_deref())
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn lenient_number(value: Option<&str>) -> i64 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}
