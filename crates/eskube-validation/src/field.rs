//! Field-scoped validation errors
//!
//! Mirrors the Kubernetes API machinery taxonomy: every violation names the
//! field it applies to, the offending value, and a reason from the message
//! table.

use std::fmt;

use crate::messages::Reason;

/// Path to a field of the resource, rendered as `spec.nodeSets[0].config`
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(String);

impl FieldPath {
    /// Root a path at a top-level field
    pub fn new(root: &str) -> Self {
        Self(root.to_string())
    }

    /// Descend into a named child
    pub fn child(&self, name: &str) -> Self {
        Self(format!("{}.{}", self.0, name))
    }

    /// Descend into a list element
    pub fn index(&self, i: usize) -> Self {
        Self(format!("{}[{}]", self.0, i))
    }

    /// Rendered path
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of violation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The value is present but not acceptable
    Invalid,
    /// A required value is missing
    Required,
    /// The value is not allowed at all
    Forbidden,
}

impl ErrorKind {
    fn label(self) -> &'static str {
        match self {
            ErrorKind::Invalid => "Invalid value",
            ErrorKind::Required => "Required value",
            ErrorKind::Forbidden => "Forbidden",
        }
    }
}

/// A single violation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    /// Kind of violation
    pub kind: ErrorKind,
    /// Field the violation applies to
    pub field: FieldPath,
    /// Offending value, when there is one to show
    pub value: Option<String>,
    /// Reason from the message table
    pub reason: Reason,
    /// Extra context, such as the offending keys
    pub detail: Option<String>,
}

impl FieldError {
    /// An invalid value
    pub fn invalid(field: FieldPath, value: impl Into<String>, reason: Reason) -> Self {
        Self {
            kind: ErrorKind::Invalid,
            field,
            value: Some(value.into()),
            reason,
            detail: None,
        }
    }

    /// A missing value
    pub fn required(field: FieldPath, reason: Reason) -> Self {
        Self {
            kind: ErrorKind::Required,
            field,
            value: None,
            reason,
            detail: None,
        }
    }

    /// A value that is not allowed
    pub fn forbidden(field: FieldPath, reason: Reason) -> Self {
        Self {
            kind: ErrorKind::Forbidden,
            field,
            value: None,
            reason,
            detail: None,
        }
    }

    /// Attach extra context to the message
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Human readable message: the table entry, with the detail interpolated or appended
    pub fn message(&self) -> String {
        let template = self.reason.message();
        match (&self.detail, template.contains(Reason::PLACEHOLDER)) {
            (Some(detail), true) => template.replace(Reason::PLACEHOLDER, detail),
            (Some(detail), false) => format!("{template}: {detail}"),
            (None, _) => template.to_string(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(
                f,
                "{}: {}: {:?}: {}",
                self.field,
                self.kind.label(),
                value,
                self.message()
            ),
            None => write!(f, "{}: {}: {}", self.field, self.kind.label(), self.message()),
        }
    }
}

/// Ordered collection of violations; empty means the object is valid
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorList(Vec<FieldError>);

impl ErrorList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a violation
    pub fn push(&mut self, err: FieldError) {
        self.0.push(err);
    }

    /// Append every violation of another list, keeping order
    pub fn extend(&mut self, other: ErrorList) {
        self.0.extend(other.0);
    }

    /// True when no violation was found
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of violations
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over violations in order
    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.0.iter()
    }

    /// Reasons of every violation, in order
    pub fn reasons(&self) -> Vec<Reason> {
        self.0.iter().map(|e| e.reason).collect()
    }

    /// Convert to an error for `cluster`, or `None` when valid
    pub fn into_error(self, cluster: &str) -> Option<eskube_common::Error> {
        let field = self.0.first()?.field.to_string();
        Some(eskube_common::Error::validation_for_field(
            cluster,
            field,
            self.to_string(),
        ))
    }
}

impl From<Vec<FieldError>> for ErrorList {
    fn from(errors: Vec<FieldError>) -> Self {
        Self(errors)
    }
}

impl FromIterator<FieldError> for ErrorList {
    fn from_iter<I: IntoIterator<Item = FieldError>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ErrorList {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => Ok(()),
            [only] => write!(f, "{only}"),
            many => {
                let rendered: Vec<String> = many.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
        }
    }
}
