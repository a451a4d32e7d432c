//! Duck-typed exceptions from isolated build components.
//!
//! Compiler and asset providers run behind their own classloaders; none of
//! their exception types are known here. Each exception is therefore seen
//! as a class-name string plus accessors that can be invoked by name, and
//! the classifier decides what it is by name alone.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReflectError {
    #[error("no such method `{class}.{method}()`")]
    NoSuchMethod { class: String, method: String },

    #[error("`{method}()` returned {found}, expected {expected}")]
    TypeMismatch {
        method: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("invocation failed: {0}")]
    Invocation(String),
}

/// Value returned by a reflective accessor call.
#[derive(Debug, Clone)]
pub enum Reflected {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    Array(Vec<Reflected>),
    Object(Arc<dyn Reflect>),
}

impl Reflected {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Str(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[cfg(test)]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Reflected]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&dyn Reflect> {
        match self {
            Self::Object(obj) => Some(obj.as_ref()),
            _ => None,
        }
    }
}

/// An object whose methods can only be called by name.
pub trait Reflect: fmt::Debug + Send + Sync {
    /// Fully-qualified class name, e.g. `com.example.CompilerException`.
    fn class_name(&self) -> &str;

    /// Invoke a zero-argument accessor.
    fn invoke(&self, method: &str) -> Result<Reflected, ReflectError>;

    /// Class name without its package (and without outer classes).
    fn simple_name(&self) -> &str {
        let name = self.class_name();
        let name = name.rsplit('.').next().unwrap_or(name);
        name.rsplit('$').next().unwrap_or(name)
    }
}

/// A reflective exception with a cause chain.
pub trait Throwable: Reflect {
    fn message(&self) -> Option<&str>;
    fn cause(&self) -> Option<&dyn Throwable>;
}

impl fmt::Display for dyn Throwable + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(message) => write!(f, "{}: {}", self.class_name(), message),
            None => f.write_str(self.class_name()),
        }
    }
}

// =============================================================================
// Recorded exceptions (JSON failure reports and locally raised errors)
// =============================================================================

/// An exception captured as data.
///
/// Failure reports written by the build use this shape:
///
/// ```json
/// { "class": "org.apache.maven.plugin.MojoFailureException",
///   "message": "Compilation failed",
///   "cause": { "class": "com.google.code.sbt.compiler.api.CompilerException",
///              "accessors": { "getProblems": [ { "class": "...Problem",
///                                                "getSeverity": "Error", ... } ] } } }
/// ```
///
/// Nested JSON objects become reflective objects; `class` defaults to
/// `java.lang.Object` when absent.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordedThrowable {
    class: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    accessors: Map<String, Value>,
    #[serde(default)]
    cause: Option<Box<RecordedThrowable>>,
}

impl RecordedThrowable {
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            message: Some(message.into()),
            accessors: Map::new(),
            cause: None,
        }
    }

    #[cfg(test)]
    pub fn with_accessor(mut self, method: impl Into<String>, value: Value) -> Self {
        self.accessors.insert(method.into(), value);
        self
    }

    #[cfg(test)]
    pub fn with_cause(mut self, cause: RecordedThrowable) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Parse a failure report: a single exception or an array of them.
    pub fn parse_report(content: &str) -> Result<Vec<Self>, serde_json::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Report {
            Many(Vec<RecordedThrowable>),
            One(RecordedThrowable),
        }

        Ok(match serde_json::from_str(content)? {
            Report::Many(all) => all,
            Report::One(one) => vec![one],
        })
    }
}

impl Reflect for RecordedThrowable {
    fn class_name(&self) -> &str {
        &self.class
    }

    fn invoke(&self, method: &str) -> Result<Reflected, ReflectError> {
        if method == "getMessage" && !self.accessors.contains_key(method) {
            return Ok(self
                .message
                .clone()
                .map_or(Reflected::Null, Reflected::Str));
        }
        lookup(&self.class, &self.accessors, method)
    }
}

impl Throwable for RecordedThrowable {
    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    fn cause(&self) -> Option<&dyn Throwable> {
        self.cause.as_deref().map(|c| c as &dyn Throwable)
    }
}

/// A plain object inside a recorded exception (problem, position, ...).
#[derive(Debug, Clone)]
struct RecordedObject {
    class: String,
    accessors: Map<String, Value>,
}

impl Reflect for RecordedObject {
    fn class_name(&self) -> &str {
        &self.class
    }

    fn invoke(&self, method: &str) -> Result<Reflected, ReflectError> {
        lookup(&self.class, &self.accessors, method)
    }
}

fn lookup(class: &str, accessors: &Map<String, Value>, method: &str) -> Result<Reflected, ReflectError> {
    accessors
        .get(method)
        .map(to_reflected)
        .ok_or_else(|| ReflectError::NoSuchMethod {
            class: class.to_string(),
            method: method.to_string(),
        })
}

fn to_reflected(value: &Value) -> Reflected {
    match value {
        Value::Null => Reflected::Null,
        Value::Bool(b) => Reflected::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Reflected::Int(i),
            None => Reflected::Str(n.to_string()),
        },
        Value::String(s) => Reflected::Str(s.clone()),
        Value::Array(items) => Reflected::Array(items.iter().map(to_reflected).collect()),
        Value::Object(map) => {
            let class = map
                .get("class")
                .and_then(Value::as_str)
                .unwrap_or("java.lang.Object")
                .to_string();
            let mut accessors = map.clone();
            accessors.remove("class");
            Reflected::Object(Arc::new(RecordedObject { class, accessors }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple_name() {
        let t = RecordedThrowable::new("org.apache.maven.plugin.MojoFailureException", "x");
        assert_eq!(t.simple_name(), "MojoFailureException");

        let t = RecordedThrowable::new("a.Outer$Inner", "x");
        assert_eq!(t.simple_name(), "Inner");

        let t = RecordedThrowable::new("Bare", "x");
        assert_eq!(t.simple_name(), "Bare");
    }

    #[test]
    fn test_invoke_missing_method() {
        let t = RecordedThrowable::new("a.B", "boom");
        let err = t.invoke("getProblems").unwrap_err();
        assert_eq!(
            err,
            ReflectError::NoSuchMethod {
                class: "a.B".into(),
                method: "getProblems".into()
            }
        );
    }

    #[test]
    fn test_get_message_falls_back_to_message() {
        let t = RecordedThrowable::new("a.B", "boom");
        assert_eq!(t.invoke("getMessage").unwrap().as_str(), Some("boom"));
    }

    #[test]
    fn test_nested_objects() {
        let t = RecordedThrowable::new("a.B", "x").with_accessor(
            "getPosition",
            json!({ "class": "a.Position", "getLine": 3, "getFile": null }),
        );

        let position = t.invoke("getPosition").unwrap();
        let position = position.as_object().unwrap();
        assert_eq!(position.class_name(), "a.Position");
        assert_eq!(position.invoke("getLine").unwrap().as_int(), Some(3));
        assert!(position.invoke("getFile").unwrap().is_null());
    }

    #[test]
    fn test_parse_report_single_and_many() {
        let one = RecordedThrowable::parse_report(
            r#"{"class":"a.Outer","message":"wrapped","cause":{"class":"a.Inner"}}"#,
        )
        .unwrap();
        assert_eq!(one.len(), 1);
        let cause = one[0].cause().unwrap();
        assert_eq!(cause.class_name(), "a.Inner");
        assert!(cause.message().is_none());

        let many =
            RecordedThrowable::parse_report(r#"[{"class":"a.A"},{"class":"a.B"}]"#).unwrap();
        assert_eq!(many.len(), 2);
    }

    #[test]
    fn test_display() {
        let t: Box<dyn Throwable> = Box::new(RecordedThrowable::new("a.B", "boom"));
        assert_eq!(t.to_string(), "a.B: boom");
    }
}
