//! Response mutation rules applied before a captured response reaches the page.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::pattern::UrlPattern;
use crate::TapError;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RewriteAction {
    /// Drop a top-level key of a JSON object body.
    RemoveKey { key: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResponseRewrite {
    pub pattern: UrlPattern,
    pub action: RewriteAction,
}

impl ResponseRewrite {
    pub fn remove_key(pattern: UrlPattern, key: impl Into<String>) -> Self {
        Self {
            pattern,
            action: RewriteAction::RemoveKey { key: key.into() },
        }
    }

    pub fn applies_to(&self, url: &str) -> bool {
        self.pattern.matches(url)
    }

    /// Rewrites a response body. The body must be a JSON object.
    pub fn apply(&self, body: &[u8]) -> Result<Vec<u8>, TapError> {
        let mut value: Value = serde_json::from_slice(body)
            .map_err(|err| TapError::Rewrite(format!("response is not JSON: {err}")))?;
        let object = value
            .as_object_mut()
            .ok_or_else(|| TapError::Rewrite("response is not a JSON object".to_string()))?;

        match &self.action {
            RewriteAction::RemoveKey { key } => {
                if object.remove(key).is_none() {
                    debug!(key = %key, "rewrite key absent from response");
                }
            }
        }

        serde_json::to_vec(&value).map_err(|err| TapError::Rewrite(err.to_string()))
    }
}

/// Ordered set of rewrite rules. The first matching rule wins.
#[derive(Default)]
pub struct RewriteTable {
    rules: RwLock<Vec<ResponseRewrite>>,
}

impl RewriteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, rule: ResponseRewrite) {
        self.rules.write().push(rule);
    }

    pub fn clear(&self) {
        self.rules.write().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }

    pub fn find(&self, url: &str) -> Option<ResponseRewrite> {
        self.rules
            .read()
            .iter()
            .find(|rule| rule.applies_to(url))
            .cloned()
    }

    pub fn patterns(&self) -> Vec<UrlPattern> {
        self.rules
            .read()
            .iter()
            .map(|rule| rule.pattern.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn datasets_rule(key: &str) -> ResponseRewrite {
        ResponseRewrite::remove_key(UrlPattern::glob("**/api/datasets*").unwrap(), key)
    }

    #[test]
    fn removes_named_top_level_key() {
        let body = serde_json::to_vec(&json!({
            "assets": [1, 2],
            "hazards": [3],
            "index": {"a": 1},
            "others": []
        }))
        .unwrap();

        let out = datasets_rule("hazards").apply(&body).unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert!(value.get("hazards").is_none());
        assert_eq!(value["assets"], json!([1, 2]));
        assert!(value.get("index").is_some());
        assert!(value.get("others").is_some());
    }

    #[test]
    fn nested_keys_are_untouched() {
        let body = serde_json::to_vec(&json!({"index": {"assets": 1}})).unwrap();
        let out = datasets_rule("assets").apply(&body).unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value, json!({"index": {"assets": 1}}));
    }

    #[test]
    fn non_object_bodies_are_rejected() {
        assert!(matches!(
            datasets_rule("assets").apply(b"[1,2]"),
            Err(TapError::Rewrite(_))
        ));
        assert!(matches!(
            datasets_rule("assets").apply(b"<html>"),
            Err(TapError::Rewrite(_))
        ));
    }

    #[test]
    fn table_returns_first_matching_rule() {
        let table = RewriteTable::new();
        assert!(table.find("https://x/api/datasets").is_none());
        table.push(datasets_rule("assets"));
        table.push(datasets_rule("others"));
        let rule = table.find("https://x/api/datasets").unwrap();
        assert_eq!(
            rule.action,
            RewriteAction::RemoveKey {
                key: "assets".to_string()
            }
        );
        assert!(table.find("https://x/api/other").is_none());
        table.clear();
        assert!(table.is_empty());
    }
}
