//! Build failure classification.
//!
//! Exceptions are recognized by fully-qualified class name and read through
//! reflective accessors. Two shapes are understood:
//!
//! - **compilation exception**: `getSource()`, `getMessage()`, `getLine()`,
//!   `getPosition()` directly on the exception (asset, route and template
//!   compilers)
//! - **compiler exception**: `getProblems()` returning problems with
//!   `getSeverity()`, `getMessage()` and an optional `getPosition()` object
//!   exposing `getFile()`, `getLine()`, `getPointer()` (Scala/Java compiler)
//!
//! Everything else, including any reflective failure while reading a known
//! shape, becomes an [`OpaqueBuildError`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::outcome::{BuildOutcome, CompilationFailure, OpaqueBuildError};
use super::throwable::{Reflect, ReflectError, Reflected, Throwable};

/// Severity string of problems that fail a compilation.
const ERROR_SEVERITY: &str = "Error";

/// Class names per exception shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExceptionShapes {
    /// Single compilation error with direct accessors.
    pub compilation_exceptions: Vec<String>,
    /// Compiler exception carrying a problem list.
    pub compiler_exceptions: Vec<String>,
    /// Build-tool wrappers unwrapped through their cause.
    pub wrapper_exceptions: Vec<String>,
    /// "Nothing to compile" signals, logged and skipped.
    pub no_sources_exceptions: Vec<String>,
}

impl Default for ExceptionShapes {
    fn default() -> Self {
        fn names(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }

        Self {
            compilation_exceptions: names(&[
                "com.google.code.play2.provider.api.AssetCompilationException",
                "com.google.code.play2.provider.api.RoutesCompilationException",
                "com.google.code.play2.provider.api.TemplateCompilationException",
            ]),
            compiler_exceptions: names(&["com.google.code.sbt.compiler.api.CompilerException"]),
            wrapper_exceptions: names(&[
                "org.apache.maven.lifecycle.LifecycleExecutionException",
                "org.apache.maven.plugin.MojoExecutionException",
                "org.apache.maven.plugin.MojoFailureException",
            ]),
            no_sources_exceptions: names(&["devloop.NoSources"]),
        }
    }
}

fn is_any(names: &[String], class: &str) -> bool {
    names.iter().any(|n| n == class)
}

/// Turns a failed build's exception into a structured outcome.
#[derive(Debug, Clone, Default)]
pub struct FailureClassifier {
    shapes: ExceptionShapes,
}

impl FailureClassifier {
    pub fn new(shapes: ExceptionShapes) -> Self {
        Self { shapes }
    }

    /// Whether the chain only says there was nothing to compile.
    pub fn is_no_sources(&self, exception: &dyn Throwable) -> bool {
        let mut current = Some(exception);
        while let Some(t) = current {
            if is_any(&self.shapes.no_sources_exceptions, t.class_name()) {
                return true;
            }
            current = t.cause();
        }
        false
    }

    /// Classify `exception`. Never fails: anything unreadable is opaque.
    pub fn classify(&self, exception: &dyn Throwable) -> BuildOutcome {
        let target = self.unwrap(exception);
        let class = target.class_name();

        let result = if is_any(&self.shapes.compilation_exceptions, class) {
            compilation_exception(target)
        } else if is_any(&self.shapes.compiler_exceptions, class) {
            compiler_exception(target)
        } else {
            return opaque(target);
        };

        match result {
            Ok(failure) => BuildOutcome::CompilationFailure(failure),
            Err(e) => {
                crate::debug!("classify"; "cannot read {}: {}", class, e);
                opaque(target)
            }
        }
    }

    /// Skip build-tool wrappers down to the exception that carries the detail.
    fn unwrap<'a>(&self, exception: &'a dyn Throwable) -> &'a dyn Throwable {
        let mut current = exception;
        while is_any(&self.shapes.wrapper_exceptions, current.class_name()) {
            match current.cause() {
                Some(cause) => current = cause,
                None => break,
            }
        }
        current
    }
}

fn opaque(exception: &dyn Throwable) -> BuildOutcome {
    BuildOutcome::OpaqueBuildError(OpaqueBuildError {
        description: exception.simple_name().to_string(),
        cause: exception.message().map(str::to_string),
    })
}

/// Shape (a): accessors directly on the exception.
fn compilation_exception(exception: &dyn Throwable) -> Result<CompilationFailure, ReflectError> {
    Ok(CompilationFailure {
        source: optional_str(exception, "getSource")?.map(PathBuf::from),
        message: optional_str(exception, "getMessage")?.unwrap_or_default(),
        line: optional_u32(exception, "getLine")?,
        column: optional_u32(exception, "getPosition")?,
    })
}

/// Shape (b): first problem with `Error` severity.
fn compiler_exception(exception: &dyn Throwable) -> Result<CompilationFailure, ReflectError> {
    let problems = exception.invoke("getProblems")?;
    let problems = problems.as_array().ok_or_else(|| mismatch("getProblems", "array", &problems))?;

    for problem in problems {
        let problem = problem
            .as_object()
            .ok_or_else(|| mismatch("getProblems", "object elements", problem))?;
        if optional_str(problem, "getSeverity")?.as_deref() != Some(ERROR_SEVERITY) {
            continue;
        }

        let message = optional_str(problem, "getMessage")?.unwrap_or_default();
        let position = problem.invoke("getPosition")?;
        let Some(position) = position.as_object() else {
            if !position.is_null() {
                return Err(mismatch("getPosition", "object", &position));
            }
            return Ok(CompilationFailure {
                source: None,
                message,
                line: None,
                column: None,
            });
        };

        return Ok(CompilationFailure {
            source: optional_str(position, "getFile")?.map(PathBuf::from),
            message,
            line: optional_u32(position, "getLine")?,
            column: optional_u32(position, "getPointer")?,
        });
    }

    Err(ReflectError::Invocation(format!(
        "no problem with severity {ERROR_SEVERITY}"
    )))
}

fn mismatch(method: &str, expected: &'static str, found: &Reflected) -> ReflectError {
    ReflectError::TypeMismatch {
        method: method.to_string(),
        expected,
        found: found.kind(),
    }
}

/// String accessor; `null` → `None`.
fn optional_str<R: Reflect + ?Sized>(obj: &R, method: &str) -> Result<Option<String>, ReflectError> {
    match obj.invoke(method)? {
        Reflected::Null => Ok(None),
        Reflected::Str(s) => Ok(Some(s)),
        other => Err(mismatch(method, "string", &other)),
    }
}

/// Integer accessor; `null` and negative sentinels → `None`.
fn optional_u32<R: Reflect + ?Sized>(obj: &R, method: &str) -> Result<Option<u32>, ReflectError> {
    match obj.invoke(method)? {
        Reflected::Null => Ok(None),
        Reflected::Int(i) => Ok(u32::try_from(i).ok()),
        other => Err(mismatch(method, "integer", &other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::throwable::RecordedThrowable;
    use serde_json::json;

    const COMPILER: &str = "com.google.code.sbt.compiler.api.CompilerException";
    const ROUTES: &str = "com.google.code.play2.provider.api.RoutesCompilationException";
    const MOJO: &str = "org.apache.maven.plugin.MojoExecutionException";
    const LIFECYCLE: &str = "org.apache.maven.lifecycle.LifecycleExecutionException";

    fn classify(t: &RecordedThrowable) -> BuildOutcome {
        FailureClassifier::default().classify(t)
    }

    fn problem(severity: &str, message: &str, position: serde_json::Value) -> serde_json::Value {
        json!({
            "class": "com.google.code.sbt.compiler.api.Problem",
            "getSeverity": severity,
            "getMessage": message,
            "getPosition": position,
        })
    }

    fn compiler_exception(problems: serde_json::Value) -> RecordedThrowable {
        RecordedThrowable::new(COMPILER, "Compilation failed").with_accessor("getProblems", problems)
    }

    #[test]
    fn test_compiler_exception_first_error() {
        let t = compiler_exception(json!([problem(
            "Error",
            "expected ';'",
            json!({ "getFile": "/src/Foo.scala", "getLine": 10, "getPointer": 5 })
        )]));

        assert_eq!(
            classify(&t),
            BuildOutcome::CompilationFailure(CompilationFailure {
                source: Some(PathBuf::from("/src/Foo.scala")),
                message: "expected ';'".into(),
                line: Some(10),
                column: Some(5),
            })
        );
    }

    #[test]
    fn test_compiler_exception_skips_warnings() {
        let t = compiler_exception(json!([
            problem("Warning", "deprecated", json!(null)),
            problem("Info", "note", json!(null)),
            problem("Error", "not found: value x", json!({ "getFile": "/src/A.scala", "getLine": 3, "getPointer": null })),
            problem("Error", "second error", json!(null)),
        ]));

        let BuildOutcome::CompilationFailure(failure) = classify(&t) else {
            panic!("expected compilation failure");
        };
        assert_eq!(failure.message, "not found: value x");
        assert_eq!(failure.line, Some(3));
        assert_eq!(failure.column, None);
    }

    #[test]
    fn test_compiler_exception_without_position() {
        let t = compiler_exception(json!([problem("Error", "boom", json!(null))]));
        let BuildOutcome::CompilationFailure(failure) = classify(&t) else {
            panic!("expected compilation failure");
        };
        assert_eq!(failure.source, None);
        assert_eq!(failure.line, None);
    }

    #[test]
    fn test_compiler_exception_without_errors_is_opaque() {
        let t = compiler_exception(json!([problem("Warning", "meh", json!(null))]));
        assert_eq!(
            classify(&t),
            BuildOutcome::OpaqueBuildError(OpaqueBuildError {
                description: "CompilerException".into(),
                cause: Some("Compilation failed".into()),
            })
        );
    }

    #[test]
    fn test_missing_accessor_is_opaque() {
        // Declared as a compiler exception but without getProblems()
        let t = RecordedThrowable::new(COMPILER, "odd build");
        assert!(matches!(classify(&t), BuildOutcome::OpaqueBuildError(_)));
    }

    #[test]
    fn test_wrong_accessor_type_is_opaque() {
        let t = compiler_exception(json!("not an array"));
        assert!(matches!(classify(&t), BuildOutcome::OpaqueBuildError(_)));
    }

    #[test]
    fn test_compilation_exception_shape() {
        let t = RecordedThrowable::new(ROUTES, "unknown verb")
            .with_accessor("getSource", json!("/proj/web/conf/routes"))
            .with_accessor("getMessage", json!("HTTP Verb (GET, POST, ...) expected"))
            .with_accessor("getLine", json!(7))
            .with_accessor("getPosition", json!(-1));

        assert_eq!(
            classify(&t),
            BuildOutcome::CompilationFailure(CompilationFailure {
                source: Some(PathBuf::from("/proj/web/conf/routes")),
                message: "HTTP Verb (GET, POST, ...) expected".into(),
                line: Some(7),
                column: None,
            })
        );
    }

    #[test]
    fn test_compilation_exception_missing_accessor_is_opaque() {
        let t = RecordedThrowable::new(ROUTES, "unknown verb").with_accessor("getLine", json!(7));
        assert_eq!(
            classify(&t),
            BuildOutcome::OpaqueBuildError(OpaqueBuildError {
                description: "RoutesCompilationException".into(),
                cause: Some("unknown verb".into()),
            })
        );
    }

    #[test]
    fn test_wrappers_are_unwrapped() {
        let inner = compiler_exception(json!([problem(
            "Error",
            "type mismatch",
            json!({ "getFile": "/src/B.scala", "getLine": 1, "getPointer": 0 })
        )]));
        let t = RecordedThrowable::new(LIFECYCLE, "Failed to execute goal")
            .with_cause(RecordedThrowable::new(MOJO, "Compilation failed").with_cause(inner));

        let BuildOutcome::CompilationFailure(failure) = classify(&t) else {
            panic!("expected compilation failure");
        };
        assert_eq!(failure.message, "type mismatch");
    }

    #[test]
    fn test_unknown_exception_is_opaque() {
        let t = RecordedThrowable::new(LIFECYCLE, "Failed to execute goal").with_cause(
            RecordedThrowable::new(
                "org.eclipse.aether.resolution.DependencyResolutionException",
                "Could not resolve dependencies",
            ),
        );
        assert_eq!(
            classify(&t),
            BuildOutcome::OpaqueBuildError(OpaqueBuildError {
                description: "DependencyResolutionException".into(),
                cause: Some("Could not resolve dependencies".into()),
            })
        );
    }

    #[test]
    fn test_wrapper_without_cause_is_opaque() {
        let t = RecordedThrowable::new(MOJO, "bad config");
        assert_eq!(
            classify(&t),
            BuildOutcome::OpaqueBuildError(OpaqueBuildError {
                description: "MojoExecutionException".into(),
                cause: Some("bad config".into()),
            })
        );
    }

    #[test]
    fn test_no_sources_detected_in_chain() {
        let classifier = FailureClassifier::default();
        let t = RecordedThrowable::new(MOJO, "x")
            .with_cause(RecordedThrowable::new("devloop.NoSources", "no sources to compile"));
        assert!(classifier.is_no_sources(&t));
        assert!(!classifier.is_no_sources(&RecordedThrowable::new(MOJO, "x")));
    }

    #[test]
    fn test_custom_shapes() {
        let classifier = FailureClassifier::new(ExceptionShapes {
            compiler_exceptions: vec!["my.Compiler".into()],
            ..ExceptionShapes::default()
        });
        let t = RecordedThrowable::new("my.Compiler", "x").with_accessor(
            "getProblems",
            json!([problem("Error", "custom", json!(null))]),
        );
        assert!(matches!(
            classifier.classify(&t),
            BuildOutcome::CompilationFailure(_)
        ));
    }
}
