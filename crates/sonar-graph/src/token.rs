//! Deferred values.
//!
//! A [`Token`] stands for a value that may only exist once the provisioning
//! engine has realized the graph, such as a database endpoint address. The
//! builder never reads or validates such values; it only records which
//! resources they come from and renders them as template intrinsics.

use std::collections::BTreeSet;
use std::fmt;

use serde_json::{Value, json};
use sonar_common::types::LogicalId;

/// A possibly-unresolved string value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A value known at declaration time.
    Literal(String),
    /// The provisioned identifier of a resource.
    Ref(LogicalId),
    /// A named attribute of a resource, known only after provisioning.
    Attribute {
        /// Resource exposing the attribute.
        resource: LogicalId,
        /// Attribute name, e.g. `Endpoint.Address`.
        attribute: String,
    },
    /// One JSON field of a stored secret, fetched by the provisioning engine.
    ///
    /// The secret value itself is never part of the rendered output; only a
    /// dynamic reference naming the secret and the field is.
    SecretField {
        /// Secret holding the field.
        secret: LogicalId,
        /// Field name inside the secret's JSON document.
        field: String,
    },
    /// String interpolation of several parts.
    Concat(Vec<Token>),
}

/// A rendered fragment of a token: either plain text or an intrinsic.
enum Fragment {
    Text(String),
    Intrinsic(Value),
}

impl Token {
    /// Creates a literal token.
    #[must_use]
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    /// Creates an attribute token.
    #[must_use]
    pub fn attribute(resource: LogicalId, attribute: impl Into<String>) -> Self {
        Self::Attribute {
            resource,
            attribute: attribute.into(),
        }
    }

    /// Interpolates `parts` into a single token.
    ///
    /// Nested concatenations are flattened and adjacent literals merged, so a
    /// concatenation of literals collapses into one literal.
    #[must_use]
    pub fn concat(parts: impl IntoIterator<Item = Self>) -> Self {
        let mut flat: Vec<Self> = Vec::new();
        for part in parts {
            match part {
                Self::Concat(inner) => {
                    for p in inner {
                        push_merged(&mut flat, p);
                    }
                }
                other => push_merged(&mut flat, other),
            }
        }
        match flat.len() {
            0 => Self::Literal(String::new()),
            1 => flat.remove(0),
            _ => Self::Concat(flat),
        }
    }

    /// Returns `true` if the value is known at declaration time.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    /// Returns every resource this token reads from.
    #[must_use]
    pub fn references(&self) -> BTreeSet<&LogicalId> {
        let mut out = BTreeSet::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut BTreeSet<&'a LogicalId>) {
        match self {
            Self::Literal(_) => {}
            Self::Ref(id) => {
                let _ = out.insert(id);
            }
            Self::Attribute { resource, .. } => {
                let _ = out.insert(resource);
            }
            Self::SecretField { secret, .. } => {
                let _ = out.insert(secret);
            }
            Self::Concat(parts) => {
                for p in parts {
                    p.collect_references(out);
                }
            }
        }
    }

    /// Returns `true` if any part of this token reads a secret field.
    #[must_use]
    pub fn contains_secret(&self) -> bool {
        match self {
            Self::SecretField { .. } => true,
            Self::Concat(parts) => parts.iter().any(Self::contains_secret),
            _ => false,
        }
    }

    /// Returns `true` if any part of this token reads `attribute` of `resource`.
    #[must_use]
    pub fn reads_attribute(&self, resource: &LogicalId, attribute: &str) -> bool {
        match self {
            Self::Attribute {
                resource: r,
                attribute: a,
            } => r == resource && a == attribute,
            Self::Concat(parts) => parts.iter().any(|p| p.reads_attribute(resource, attribute)),
            _ => false,
        }
    }

    /// Renders the token as a template value.
    #[must_use]
    pub fn render(&self) -> Value {
        let mut fragments = Vec::new();
        self.fragments(&mut fragments);
        let mut parts: Vec<Value> = fragments
            .into_iter()
            .map(|f| match f {
                Fragment::Text(s) => Value::String(s),
                Fragment::Intrinsic(v) => v,
            })
            .collect();
        match parts.len() {
            0 => Value::String(String::new()),
            1 => parts.remove(0),
            _ => json!({ "Fn::Join": ["", parts] }),
        }
    }

    fn fragments(&self, out: &mut Vec<Fragment>) {
        match self {
            Self::Literal(s) => push_text(out, s),
            Self::Ref(id) => out.push(Fragment::Intrinsic(json!({ "Ref": id.as_str() }))),
            Self::Attribute {
                resource,
                attribute,
            } => out.push(Fragment::Intrinsic(
                json!({ "Fn::GetAtt": [resource.as_str(), attribute] }),
            )),
            Self::SecretField { secret, field } => {
                push_text(out, "{{resolve:secretsmanager:");
                out.push(Fragment::Intrinsic(json!({ "Ref": secret.as_str() })));
                push_text(out, &format!(":SecretString:{field}::}}}}"));
            }
            Self::Concat(parts) => {
                for p in parts {
                    p.fragments(out);
                }
            }
        }
    }
}

fn push_merged(flat: &mut Vec<Token>, part: Token) {
    if let Token::Literal(next) = &part {
        if next.is_empty() {
            return;
        }
        if let Some(Token::Literal(prev)) = flat.last_mut() {
            prev.push_str(next);
            return;
        }
    }
    flat.push(part);
}

fn push_text(out: &mut Vec<Fragment>, text: &str) {
    if let Some(Fragment::Text(prev)) = out.last_mut() {
        prev.push_str(text);
    } else {
        out.push(Fragment::Text(text.to_owned()));
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self::Literal(value.to_owned())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self::Literal(value)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "{s}"),
            Self::Ref(id) => write!(f, "${{{id}}}"),
            Self::Attribute {
                resource,
                attribute,
            } => write!(f, "${{{resource}.{attribute}}}"),
            Self::SecretField { secret, field } => write!(f, "${{secret:{secret}:{field}}}"),
            Self::Concat(parts) => parts.iter().try_for_each(|p| write!(f, "{p}")),
        }
    }
}
