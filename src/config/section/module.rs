//! `[[module]]` entries: the static module graph.
//!
//! Modules are declared in build order. Paths are relative to the module
//! `base`, which is itself relative to the project root; `~` is expanded.
//!
//! # Example
//!
//! ```toml
//! [[module]]
//! name = "core"
//!
//! [[module]]
//! name = "web"
//! base = "web"                                  # Default: the module name
//! source_roots = ["app", "target/generated-sources/routes"]
//! resource_roots = ["conf", "public"]
//! output_dir = "target/classes"
//! build_dir = "target"                          # Roots under it are not watched
//! template_output_dir = "target/src_managed/main"
//! analysis_cache = "target/analysis/compile.json"
//! depends_on = ["core"]
//! ```

use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::config::ConfigDiagnostics;
use crate::project::Module;
use crate::utils::path::normalize_path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub name: String,

    #[serde(default)]
    pub base: Option<PathBuf>,

    #[serde(default = "default_source_roots")]
    pub source_roots: Vec<PathBuf>,

    #[serde(default = "default_resource_roots")]
    pub resource_roots: Vec<PathBuf>,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    #[serde(default)]
    pub template_output_dir: Option<PathBuf>,

    #[serde(default)]
    pub analysis_cache: Option<PathBuf>,

    #[serde(default)]
    pub depends_on: Vec<String>,
}

fn default_source_roots() -> Vec<PathBuf> {
    vec!["src/main/java".into(), "src/main/scala".into()]
}

fn default_resource_roots() -> Vec<PathBuf> {
    vec!["src/main/resources".into()]
}

fn default_output_dir() -> PathBuf {
    "target/classes".into()
}

fn default_build_dir() -> PathBuf {
    "target".into()
}

impl ModuleConfig {
    /// Absolute module directory.
    pub fn base_dir(&self, root: &Path) -> PathBuf {
        let base = self
            .base
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.name));
        resolve(root, &base)
    }

    /// Module with every path made absolute.
    pub fn to_module(&self, root: &Path) -> Module {
        let base = self.base_dir(root);
        let all = |paths: &[PathBuf]| paths.iter().map(|p| resolve(&base, p)).collect();

        Module {
            name: self.name.clone(),
            source_roots: all(&self.source_roots),
            resource_roots: all(&self.resource_roots),
            output_dir: resolve(&base, &self.output_dir),
            build_dir: resolve(&base, &self.build_dir),
            template_output_dir: self.template_output_dir.as_ref().map(|p| resolve(&base, p)),
            analysis_cache: self.analysis_cache.as_ref().map(|p| resolve(&base, p)),
            depends_on: self.depends_on.clone(),
            base,
        }
    }
}

/// Expand `~` and join relative paths onto `base`.
fn resolve(base: &Path, path: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    let path = PathBuf::from(expanded);
    let full_path = if path.is_relative() {
        base.join(&path)
    } else {
        path
    };
    normalize_path(&full_path)
}

/// Names unique and non-empty, dependencies declared.
pub fn validate_modules(modules: &[ModuleConfig], diag: &mut ConfigDiagnostics) {
    if modules.is_empty() {
        diag.error_with_hint(
            "module",
            "no modules declared",
            "add at least one [[module]] table with a `name`",
        );
        return;
    }

    let mut names = FxHashSet::default();
    for module in modules {
        if module.name.trim().is_empty() {
            diag.error("module.name", "module name is empty");
        } else if !names.insert(module.name.as_str()) {
            diag.error("module.name", format!("duplicate module `{}`", module.name));
        }
    }

    for module in modules {
        for dep in &module.depends_on {
            if !names.contains(dep.as_str()) {
                diag.error_with_hint(
                    "module.depends_on",
                    format!("`{}` depends on unknown module `{}`", module.name, dep),
                    "declare the dependency as a [[module]] too",
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_module_defaults() {
        let config = test_parse_config("");
        let module = config.modules[0].to_module(Path::new("/proj"));

        assert_eq!(module.name, "core");
        assert_eq!(module.base, PathBuf::from("/proj/core"));
        assert_eq!(
            module.source_roots,
            vec![
                PathBuf::from("/proj/core/src/main/java"),
                PathBuf::from("/proj/core/src/main/scala")
            ]
        );
        assert_eq!(module.output_dir, PathBuf::from("/proj/core/target/classes"));
        assert_eq!(module.build_dir, PathBuf::from("/proj/core/target"));
        assert!(module.analysis_cache.is_none());
    }

    #[test]
    fn test_module_custom_layout() {
        let config = test_parse_config(
            "[[module]]\nname = \"web\"\nbase = \"apps/web\"\nsource_roots = [\"app\"]\ntemplate_output_dir = \"target/src_managed/main\"\ndepends_on = [\"core\"]",
        );
        let web = config.modules[1].to_module(Path::new("/proj"));

        assert_eq!(web.base, PathBuf::from("/proj/apps/web"));
        assert_eq!(web.source_roots, vec![PathBuf::from("/proj/apps/web/app")]);
        assert_eq!(
            web.template_output_dir,
            Some(PathBuf::from("/proj/apps/web/target/src_managed/main"))
        );
        assert_eq!(web.depends_on, vec!["core"]);
    }

    #[test]
    fn test_absolute_paths_kept() {
        let config = test_parse_config(
            "[[module]]\nname = \"ext\"\nbase = \"/opt/ext\"\noutput_dir = \"/var/out\"",
        );
        let ext = config.modules[1].to_module(Path::new("/proj"));
        assert_eq!(ext.base, PathBuf::from("/opt/ext"));
        assert_eq!(ext.output_dir, PathBuf::from("/var/out"));
    }

    #[test]
    fn test_validate_modules() {
        let config = test_parse_config(
            "[[module]]\nname = \"core\"\n[[module]]\nname = \"web\"\ndepends_on = [\"nope\"]",
        );
        let mut diag = ConfigDiagnostics::new();
        validate_modules(&config.modules, &mut diag);

        assert_eq!(diag.len(), 2);
        assert!(diag.errors()[0].message.contains("duplicate module `core`"));
        assert!(diag.errors()[1].message.contains("unknown module `nope`"));
    }

    #[test]
    fn test_validate_no_modules() {
        let mut diag = ConfigDiagnostics::new();
        validate_modules(&[], &mut diag);
        assert_eq!(diag.len(), 1);
    }
}
