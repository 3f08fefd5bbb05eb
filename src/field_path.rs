//! JSONPath queries selecting a single value from a raw JSON document.
//!
//! Paths follow RFC 9535 as implemented by `serde_json_path`, so filters
//! (`$.status.conditions[?(@.type=='Ready')].status`), wildcards and
//! recursive descent (`$..phase`) all work. Annotations commonly omit the
//! root, so `.status.phase` and `status.phase` are read as `$.status.phase`.

use std::{borrow::Cow, fmt, sync::Arc};

use serde_json::Value;
use serde_json_path::JsonPath;

/// A parsed field path.
#[derive(Clone)]
pub struct FieldPath {
    source: String,
    path: Arc<JsonPath>,
}

impl FieldPath {
    /// Parses a path expression, returning `None` if it is not valid JSONPath.
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.trim();
        let source = if path.starts_with('$') {
            path.to_owned()
        } else if path.starts_with(['.', '[']) {
            format!("${path}")
        } else {
            format!("$.{path}")
        };

        match JsonPath::parse(&source) {
            Ok(parsed) => Some(Self {
                source,
                path: Arc::new(parsed),
            }),
            Err(err) => {
                log::debug!("Invalid field path {source:?}: {err}");
                None
            }
        }
    }

    /// The normalized expression, always rooted at `$`.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns the first value selected by this path.
    pub fn query<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        self.path.query(document).first()
    }
}

impl fmt::Debug for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FieldPath").field(&self.source).finish()
    }
}

impl PartialEq for FieldPath {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for FieldPath {}

/// Renders a JSON value the way it is compared against annotation strings.
///
/// Strings are used verbatim; every other value uses its JSON text (`true`, `3`, `null`).
pub fn render(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{render, FieldPath};

    fn query(path: &str, document: &serde_json::Value) -> Option<serde_json::Value> {
        FieldPath::parse(path)?.query(document).cloned()
    }

    #[test]
    fn selects_nested_members() {
        let doc = json!({"status": {"phase": "Ready", "conditions": [{"type": "Synced"}]}});

        assert_eq!(query(".status.phase", &doc), Some(json!("Ready")));
        assert_eq!(query("$.status.phase", &doc), Some(json!("Ready")));
        assert_eq!(query("status.phase", &doc), Some(json!("Ready")));
        assert_eq!(query("$['status'][\"phase\"]", &doc), Some(json!("Ready")));
        assert_eq!(query(".status.conditions[0].type", &doc), Some(json!("Synced")));
        assert_eq!(query("$", &doc), Some(doc.clone()));
    }

    #[test]
    fn leading_root_is_added() {
        assert_eq!(FieldPath::parse(".status.phase").unwrap().as_str(), "$.status.phase");
        assert_eq!(FieldPath::parse("status.phase").unwrap().as_str(), "$.status.phase");
        assert_eq!(FieldPath::parse("['status']").unwrap().as_str(), "$['status']");
        assert_eq!(FieldPath::parse(" $..phase ").unwrap().as_str(), "$..phase");
    }

    #[test]
    fn filters_select_matching_condition() {
        let doc = json!({"status": {"conditions": [
            {"type": "Synced", "status": "False"},
            {"type": "Ready", "status": "True"},
        ]}});

        assert_eq!(
            query("$.status.conditions[?(@.type=='Ready')].status", &doc),
            Some(json!("True"))
        );
        assert_eq!(
            query(".status.conditions[?@.type=='Synced'].status", &doc),
            Some(json!("False"))
        );
        assert_eq!(query("$.status.conditions[?(@.type=='Gone')].status", &doc), None);
    }

    #[test]
    fn wildcards_and_descent_take_first_match() {
        let doc = json!({"status": {"phase": "Ready", "conditions": [
            {"type": "Synced"},
            {"type": "Ready"},
        ]}});

        assert_eq!(query("$..phase", &doc), Some(json!("Ready")));
        assert_eq!(query("$.status.conditions[*].type", &doc), Some(json!("Synced")));
        assert_eq!(query("$..missing", &doc), None);
    }

    #[test]
    fn missing_or_mistyped_segments_select_nothing() {
        let doc = json!({"status": {"phase": "Ready", "conditions": []}});

        assert_eq!(query(".status.missing", &doc), None);
        assert_eq!(query(".status.conditions[0]", &doc), None);
        assert_eq!(query(".status.phase.inner", &doc), None);
        assert_eq!(query(".status[0]", &doc), None);
    }

    #[test]
    fn rejects_unparseable_paths() {
        for path in [".status.", "$[", "[abc]", "['unterminated]", "$.status[?(@.type==]"] {
            assert_eq!(FieldPath::parse(path), None, "{path:?} should be rejected");
        }
    }

    #[test]
    fn renders_scalars_as_text() {
        assert_eq!(render(&json!("Ready")), "Ready");
        assert_eq!(render(&json!(true)), "true");
        assert_eq!(render(&json!(3)), "3");
    }
}
