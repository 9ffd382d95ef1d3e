use sha2::{Digest, Sha256};
use shared_types::{ClientContext, ConfigKey};

/// Separates the base key from a client-context fingerprint
pub(super) const SCOPE_SEPARATOR: char = '@';

/// Cache key for one pull.
///
/// Context-free pulls use the plain `config:{app}:{ns}:{key}` form. Pulls with
/// a client context get their own entry, so one client's gray variant is never
/// served to a client the rules would not select.
pub fn scoped_key(key: &ConfigKey, context: Option<&ClientContext>) -> String {
    match context {
        Some(context) if !context.is_empty() => format!(
            "{}{SCOPE_SEPARATOR}{}",
            key.cache_key(),
            context_fingerprint(context)
        ),
        _ => key.cache_key(),
    }
}

/// Stable hex digest of a client context; tag order does not matter.
pub fn context_fingerprint(context: &ClientContext) -> String {
    let mut hasher = Sha256::new();
    if let Some(id) = &context.client_id {
        hasher.update(b"id:");
        hasher.update(id.as_bytes());
    }
    // BTreeSet iterates in sorted order
    for tag in &context.tags {
        hasher.update(b"\0tag:");
        hasher.update(tag.as_bytes());
    }
    hasher
        .finalize()
        .iter()
        .take(12)
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(id: Option<&str>, tags: &[&str]) -> ClientContext {
        ClientContext::new(id.map(str::to_string), tags.iter().map(|t| (*t).to_string()))
    }

    #[test]
    fn test_context_free_key() {
        let key = ConfigKey::new("shop", "prod", "timeout");
        assert_eq!(scoped_key(&key, None), "config:shop:prod:timeout");
        assert_eq!(
            scoped_key(&key, Some(&ClientContext::default())),
            "config:shop:prod:timeout"
        );
    }

    #[test]
    fn test_scoped_key_extends_base_key() {
        let key = ConfigKey::new("shop", "prod", "timeout");
        let scoped = scoped_key(&key, Some(&context(Some("n1"), &["beta"])));

        assert!(scoped.starts_with("config:shop:prod:timeout@"));
        assert_eq!(scoped.len(), "config:shop:prod:timeout@".len() + 24);
    }

    #[test]
    fn test_fingerprint_ignores_tag_order_but_not_content() {
        let a = context(Some("n1"), &["beta", "canary"]);
        let b = context(Some("n1"), &["canary", "beta"]);
        let c = context(Some("n1"), &["beta"]);
        let d = context(Some("n2"), &["beta", "canary"]);

        assert_eq!(context_fingerprint(&a), context_fingerprint(&b));
        assert_ne!(context_fingerprint(&a), context_fingerprint(&c));
        assert_ne!(context_fingerprint(&a), context_fingerprint(&d));
    }

    #[test]
    fn test_id_and_tag_with_same_text_differ() {
        let by_id = context(Some("beta"), &[]);
        let by_tag = context(None, &["beta"]);
        assert_ne!(context_fingerprint(&by_id), context_fingerprint(&by_tag));
    }
}
