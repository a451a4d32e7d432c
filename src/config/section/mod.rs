//! Configuration section definitions.
//!
//! Each module corresponds to a section in `devloop.toml`:
//!
//! | Module   | TOML Section   | Purpose                              |
//! |----------|----------------|--------------------------------------|
//! | `build`  | `[build]`      | Build tool invocation and goals      |
//! | `module` | `[[module]]`   | Module layout and dependencies       |
//! | `serve`  | `[serve]`      | Development server                   |
//!
//! The `[classifier]` section maps onto `build::ExceptionShapes` directly.

mod build;
mod module;
mod serve;

pub use build::BuildConfig;
pub use module::{ModuleConfig, validate_modules};
pub use serve::ServeConfig;
