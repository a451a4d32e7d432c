//! Running builds and interpreting their failures.
//!
//! # Modules
//!
//! - `driver` - build tool driver trait and the command-based driver
//! - `executor` - runs a driver on a dedicated build thread
//! - `throwable` - duck-typed exceptions (class name + accessors by name)
//! - `classify` - exception chain → [`BuildOutcome`]
//! - `outcome` - result of a reload check
//! - `pointer` - caret rendering under the offending source line

pub mod classify;
pub mod driver;
pub mod executor;
pub mod outcome;
pub mod pointer;
pub mod throwable;

pub use classify::{ExceptionShapes, FailureClassifier};
pub use driver::{BuildReport, CommandDriver};
pub use executor::RebuildExecutor;
pub use outcome::{BuildOutcome, CompilationFailure, OpaqueBuildError};
pub use throwable::Throwable;
