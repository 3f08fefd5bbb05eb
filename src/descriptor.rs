//! Per-kind behavior synthesized from the annotations on a type definition.
//!
//! A discovered kind does not get its own type. Instead every discovered kind
//! is described by an immutable [`ResourceDescriptor`] value, optionally
//! carrying a [`SuccessPredicate`] that decides when a deploy of that kind has
//! succeeded.

use std::{collections::BTreeMap, fmt, time::Duration};

use serde_json::Value;

use crate::{
    field_path::{self, FieldPath},
    Error,
};

pub mod timeout;

pub const STATUS_FIELD_ANNOTATION: &str = "kubernetes-deploy.shopify.io/status-field";
pub const STATUS_SUCCESS_ANNOTATION: &str = "kubernetes-deploy.shopify.io/status-success";
pub const TIMEOUT_ANNOTATION: &str = "kubernetes-deploy.shopify.io/timeout";
pub const PREDEPLOY_ANNOTATION: &str = "kubernetes-deploy.shopify.io/predeploy";
pub const PRUNABLE_ANNOTATION: &str = "kubernetes-deploy.shopify.io/prunable";

/// Annotations on the metadata of a type definition.
pub type Annotations = BTreeMap<String, String>;

/// Which extension API a type definition was discovered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// ThirdPartyResource, the removed extension mechanism.
    Legacy,
    /// CustomResourceDefinition.
    Current,
}

/// Uniquely identifies a resource kind at a specific version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity {
    /// The API group, or empty string for the core group.
    pub group: String,
    pub kind: String,
    pub version: String,
}

impl Identity {
    pub fn new(
        group: impl Into<String>,
        kind: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
            version: version.into(),
        }
    }

    /// The `apiVersion` string of objects with this identity.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.group, self.version, self.kind)
    }
}

/// Decides success by comparing one field of a live object against an expected string.
#[derive(Debug, Clone, PartialEq)]
pub struct SuccessPredicate {
    field: String,
    path: Option<FieldPath>,
    expected: String,
}

impl SuccessPredicate {
    pub fn new(field: impl Into<String>, expected: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            path: FieldPath::parse(&field),
            field,
            expected: expected.into(),
        }
    }

    /// The field-path expression as written in the annotation.
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn expected(&self) -> &str {
        &self.expected
    }

    /// Whether the field path could be parsed. An unparseable path never matches.
    pub fn is_valid(&self) -> bool {
        self.path.is_some()
    }

    /// Evaluates the predicate against a freshly fetched raw document.
    pub fn evaluate(&self, document: &Value) -> bool {
        let Some(path) = &self.path else {
            return false;
        };
        path.query(document)
            .is_some_and(|value| field_path::render(value) == self.expected.as_str())
    }
}

/// Behavior and configuration of one discovered kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    identity: Identity,
    prunable: bool,
    predeploy: bool,
    timeout: Option<Duration>,
    status_field: Option<String>,
    status_success: Option<String>,
    predicate: Option<SuccessPredicate>,
}

impl ResourceDescriptor {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn group(&self) -> &str {
        &self.identity.group
    }

    pub fn kind(&self) -> &str {
        &self.identity.kind
    }

    pub fn version(&self) -> &str {
        &self.identity.version
    }

    /// Whether objects of this kind may be deleted when no longer declared.
    pub fn prunable(&self) -> bool {
        self.prunable
    }

    /// Whether objects of this kind are applied before the main batch.
    pub fn predeploy(&self) -> bool {
        self.predeploy
    }

    /// The timeout override from the type definition, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn status_field(&self) -> Option<&str> {
        self.status_field.as_deref()
    }

    pub fn status_success(&self) -> Option<&str> {
        self.status_success.as_deref()
    }

    /// Present only if both status annotations were set.
    pub fn success_predicate(&self) -> Option<&SuccessPredicate> {
        self.predicate.as_ref()
    }
}

/// Builds the descriptor of a discovered kind from its definition's annotations.
///
/// Legacy kind names are capitalized since that API is inconsistent about
/// capitalization; kinds from the current API are used as declared.
///
/// Fails only if the timeout annotation is not a valid ISO-8601 duration.
pub fn synthesize(
    source: Source,
    group: &str,
    kind: &str,
    version: &str,
    annotations: &Annotations,
) -> Result<ResourceDescriptor, Error> {
    let kind = match source {
        Source::Legacy => capitalize(kind),
        Source::Current => kind.to_owned(),
    };
    let annotation = |key: &str| annotations.get(key).map(String::as_str);

    let timeout = parse_timeout(&kind, annotation(TIMEOUT_ANNOTATION))?;
    let status_field = annotation(STATUS_FIELD_ANNOTATION).map(str::to_owned);
    let status_success = annotation(STATUS_SUCCESS_ANNOTATION).map(str::to_owned);

    let predicate = match (&status_field, &status_success) {
        (Some(field), Some(expected)) => {
            let predicate = SuccessPredicate::new(field, expected);
            if !predicate.is_valid() {
                log::warn!("Resource {kind} has unparseable status field '{field}', it will never be considered successful");
            }
            Some(predicate)
        }
        _ => None,
    };

    Ok(ResourceDescriptor {
        prunable: parse_bool(annotation(PRUNABLE_ANNOTATION)),
        predeploy: parse_bool(annotation(PREDEPLOY_ANNOTATION)),
        timeout,
        status_field,
        status_success,
        predicate,
        identity: Identity::new(group, kind, version),
    })
}

/// Only the exact string `true` enables a flag.
pub fn parse_bool(value: Option<&str>) -> bool {
    value == Some("true")
}

pub fn parse_timeout(kind: &str, value: Option<&str>) -> Result<Option<Duration>, Error> {
    let Some(value) = value else {
        return Ok(None);
    };
    match timeout::parse(value) {
        Some(duration) => Ok(Some(duration)),
        None => Err(Error::InvalidTimeout {
            kind: kind.to_owned(),
            value: value.to_owned(),
        }),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    fn annotations(pairs: &[(&str, &str)]) -> Annotations {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parse_bool_is_exact() {
        assert!(parse_bool(Some("true")));
        assert!(!parse_bool(None));
        assert!(!parse_bool(Some("True")));
        assert!(!parse_bool(Some("yes")));
        assert!(!parse_bool(Some("")));
    }

    #[test]
    fn missing_annotations_use_defaults() {
        let descriptor =
            synthesize(Source::Current, "example.com", "Widget", "v1", &Annotations::new())
                .unwrap();

        assert_eq!(descriptor.identity().to_string(), "example.com/v1/Widget");
        assert!(!descriptor.prunable());
        assert!(!descriptor.predeploy());
        assert_eq!(descriptor.timeout(), None);
        assert!(descriptor.success_predicate().is_none());
    }

    #[test]
    fn flags_and_timeout_come_from_annotations() {
        let descriptor = synthesize(
            Source::Current,
            "example.com",
            "Widget",
            "v1",
            &annotations(&[
                (PRUNABLE_ANNOTATION, "true"),
                (PREDEPLOY_ANNOTATION, "true"),
                (TIMEOUT_ANNOTATION, "PT45S"),
            ]),
        )
        .unwrap();

        assert!(descriptor.prunable());
        assert!(descriptor.predeploy());
        assert_eq!(descriptor.timeout(), Some(Duration::from_secs(45)));
    }

    #[test]
    fn invalid_timeout_names_kind_and_literal() {
        let err = synthesize(
            Source::Current,
            "example.com",
            "Widget",
            "v1",
            &annotations(&[(TIMEOUT_ANNOTATION, "foobar")]),
        )
        .unwrap_err();

        assert!(matches!(&err, Error::InvalidTimeout { kind, value } if kind == "Widget" && value == "foobar"));
        let message = err.to_string();
        assert!(message.contains("Widget"), "{message}");
        assert!(message.contains("'foobar'"), "{message}");
    }

    #[test]
    fn only_legacy_kinds_are_capitalized() {
        let legacy =
            synthesize(Source::Legacy, "example.com", "gizmo", "v1", &Annotations::new()).unwrap();
        let current =
            synthesize(Source::Current, "example.com", "gizmo", "v1", &Annotations::new())
                .unwrap();

        assert_eq!(legacy.kind(), "Gizmo");
        assert_eq!(current.kind(), "gizmo");
        assert_eq!(capitalize("cronTab"), "Crontab");
    }

    #[test]
    fn predicate_requires_both_status_annotations() {
        let field_only = synthesize(
            Source::Current,
            "example.com",
            "Widget",
            "v1",
            &annotations(&[(STATUS_FIELD_ANNOTATION, ".status.phase")]),
        )
        .unwrap();
        assert!(field_only.success_predicate().is_none());
        assert_eq!(field_only.status_field(), Some(".status.phase"));

        let both = synthesize(
            Source::Current,
            "example.com",
            "Widget",
            "v1",
            &annotations(&[
                (STATUS_FIELD_ANNOTATION, ".status.phase"),
                (STATUS_SUCCESS_ANNOTATION, "Ready"),
            ]),
        )
        .unwrap();
        let predicate = both.success_predicate().unwrap();

        assert!(predicate.evaluate(&json!({"status": {"phase": "Ready"}})));
        assert!(!predicate.evaluate(&json!({"status": {"phase": "ready"}})));
        assert!(!predicate.evaluate(&json!({"status": {"phase": "Pending"}})));
        assert!(!predicate.evaluate(&json!({"status": {}})));
    }

    #[test]
    fn predicate_accepts_filter_and_descent_paths() {
        let doc = json!({"status": {"phase": "Running", "conditions": [
            {"type": "Synced", "status": "True"},
            {"type": "Ready", "status": "False"},
        ]}});

        let ready = SuccessPredicate::new("$.status.conditions[?(@.type=='Ready')].status", "True");
        assert!(ready.is_valid());
        assert!(!ready.evaluate(&doc));
        assert!(SuccessPredicate::new("$.status.conditions[?(@.type=='Synced')].status", "True")
            .evaluate(&doc));
        assert!(SuccessPredicate::new("$..phase", "Running").evaluate(&doc));
        assert!(SuccessPredicate::new("$.status.conditions[*].type", "Synced").evaluate(&doc));
    }

    #[test]
    fn api_version_omits_core_group() {
        assert_eq!(Identity::new("example.com", "Widget", "v1").api_version(), "example.com/v1");
        assert_eq!(Identity::new("", "ConfigMap", "v1").api_version(), "v1");
    }

    #[test]
    fn unparseable_predicate_never_matches() {
        let predicate = SuccessPredicate::new(".status.", "Ready");

        assert!(!predicate.is_valid());
        assert!(!predicate.evaluate(&json!({"status": "Ready"})));
    }
}
