//! Watch request parameters: resume version, inactivity timeout and the
//! equality-based label/field selectors of a list-watch request.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use crate::ObjectMeta;
use crate::WatchError;

/// Parameters of a Watch request
#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    /// Resume token. `None`, `""` and `"0"` start from now.
    pub resource_version: Option<String>,
    /// Retire the watcher after this much time without a delivered event
    pub timeout: Option<Duration>,
    pub label_selector: LabelSelector,
    pub field_selector: FieldSelector,
}

impl WatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource_version(
        mut self,
        version: impl Into<String>,
    ) -> Self {
        self.resource_version = Some(version.into());
        self
    }

    pub fn with_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_label_selector(
        mut self,
        selector: LabelSelector,
    ) -> Self {
        self.label_selector = selector;
        self
    }

    pub fn with_field_selector(
        mut self,
        selector: FieldSelector,
    ) -> Self {
        self.field_selector = selector;
        self
    }

    /// Order key the watcher must exceed, `None` to start from now
    pub(crate) fn start_version(&self) -> Result<Option<u64>, WatchError> {
        match self.resource_version.as_deref().map(str::trim) {
            None | Some("") | Some("0") => Ok(None),
            Some(v) => v
                .parse::<u64>()
                .map(Some)
                .map_err(|_| WatchError::InvalidResourceVersion(v.to_string())),
        }
    }
}

//---------------------------------------------------------------------
// Label selector

#[derive(Debug, Clone, PartialEq, Eq)]
enum LabelRequirement {
    Equals(String, String),
    NotEquals(String, String),
    Exists(String),
    NotExists(String),
}

impl LabelRequirement {
    fn matches(
        &self,
        labels: &BTreeMap<String, String>,
    ) -> bool {
        match self {
            LabelRequirement::Equals(k, v) => labels.get(k) == Some(v),
            // absent keys satisfy `!=`
            LabelRequirement::NotEquals(k, v) => labels.get(k) != Some(v),
            LabelRequirement::Exists(k) => labels.contains_key(k),
            LabelRequirement::NotExists(k) => !labels.contains_key(k),
        }
    }
}

/// Equality-based label selector: `app=web,tier!=db,canary,!legacy`
///
/// The empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<LabelRequirement>,
}

impl LabelSelector {
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn matches(
        &self,
        labels: &BTreeMap<String, String>,
    ) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl FromStr for LabelSelector {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut requirements = Vec::new();
        for term in split_terms(s)? {
            let requirement = if let Some((k, v)) = term.split_once("!=") {
                LabelRequirement::NotEquals(label_key(s, k)?, label_value(s, v)?)
            } else if let Some((k, v)) = term.split_once("==") {
                LabelRequirement::Equals(label_key(s, k)?, label_value(s, v)?)
            } else if let Some((k, v)) = term.split_once('=') {
                LabelRequirement::Equals(label_key(s, k)?, label_value(s, v)?)
            } else if let Some(k) = term.strip_prefix('!') {
                LabelRequirement::NotExists(label_key(s, k)?)
            } else {
                LabelRequirement::Exists(label_key(s, term)?)
            };
            requirements.push(requirement);
        }
        Ok(Self { requirements })
    }
}

fn label_key(
    selector: &str,
    key: &str,
) -> Result<String, WatchError> {
    let key = key.trim();
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'));
    if !valid {
        return Err(invalid(selector, format!("invalid label key {key:?}")));
    }
    Ok(key.to_string())
}

fn label_value(
    selector: &str,
    value: &str,
) -> Result<String, WatchError> {
    let value = value.trim();
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(invalid(selector, format!("invalid label value {value:?}")));
    }
    Ok(value.to_string())
}

//---------------------------------------------------------------------
// Field selector

/// Selectable object fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Namespace,
}

impl Field {
    fn parse(
        selector: &str,
        name: &str,
    ) -> Result<Self, WatchError> {
        match name.trim() {
            "metadata.name" => Ok(Field::Name),
            "metadata.namespace" => Ok(Field::Namespace),
            other => Err(invalid(selector, format!("field {other:?} is not selectable"))),
        }
    }

    fn value<'a>(
        &self,
        meta: &'a ObjectMeta,
    ) -> &'a str {
        match self {
            Field::Name => &meta.name,
            Field::Namespace => &meta.namespace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldRequirement {
    field: Field,
    value: String,
    negated: bool,
}

/// Field selector over `metadata.name` and `metadata.namespace`
///
/// The empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelector {
    requirements: Vec<FieldRequirement>,
}

impl FieldSelector {
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn matches(
        &self,
        meta: &ObjectMeta,
    ) -> bool {
        self.requirements
            .iter()
            .all(|r| (r.field.value(meta) == r.value) != r.negated)
    }
}

impl FromStr for FieldSelector {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut requirements = Vec::new();
        for term in split_terms(s)? {
            let (field, value, negated) = if let Some((f, v)) = term.split_once("!=") {
                (f, v, true)
            } else if let Some((f, v)) = term.split_once("==") {
                (f, v, false)
            } else if let Some((f, v)) = term.split_once('=') {
                (f, v, false)
            } else {
                return Err(invalid(s, format!("term {term:?} has no operator")));
            };
            requirements.push(FieldRequirement {
                field: Field::parse(s, field)?,
                value: value.trim().to_string(),
                negated,
            });
        }
        Ok(Self { requirements })
    }
}

//---------------------------------------------------------------------

fn split_terms(s: &str) -> Result<Vec<&str>, WatchError> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(',')
        .map(str::trim)
        .map(|term| {
            if term.is_empty() {
                Err(invalid(s, "empty term".to_string()))
            } else {
                Ok(term)
            }
        })
        .collect()
}

fn invalid(
    selector: &str,
    reason: String,
) -> WatchError {
    WatchError::InvalidSelector {
        selector: selector.to_string(),
        reason,
    }
}
