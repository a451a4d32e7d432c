//! Static module graph.
//!
//! Maintains both forward (module → dependencies) and reverse (module →
//! dependents) edges so downstream closures don't need a full scan.
//!
//! # Invariants
//! - Module order is the order modules were declared in (build order)
//! - Every edge points at a known module; self-edges are excluded
//! - The graph is never mutated after construction

use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate module name `{0}`")]
    Duplicate(String),

    #[error("module `{module}` depends on unknown module `{dependency}`")]
    UnknownDependency { module: String, dependency: String },

    #[error("module graph is empty")]
    Empty,
}

/// A single build module (project) with its absolute directory layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    pub base: PathBuf,
    pub source_roots: Vec<PathBuf>,
    pub resource_roots: Vec<PathBuf>,
    /// Compiled classes land here.
    pub output_dir: PathBuf,
    /// Anything under this directory is generated, never watched.
    pub build_dir: PathBuf,
    /// Where the template compiler writes generated sources.
    pub template_output_dir: Option<PathBuf>,
    /// Incremental compiler analysis file.
    pub analysis_cache: Option<PathBuf>,
    pub depends_on: Vec<String>,
}

impl Module {
    /// Whether `path` lives under one of this module's source or resource roots.
    pub fn owns(&self, path: &Path) -> bool {
        self.roots().any(|root| path.starts_with(root))
    }

    /// Source and resource roots that are not build output.
    pub fn watch_dirs(&self) -> Vec<PathBuf> {
        self.roots()
            .filter(|root| !root.starts_with(&self.build_dir))
            .cloned()
            .collect()
    }

    fn roots(&self) -> impl Iterator<Item = &PathBuf> {
        self.source_roots.iter().chain(&self.resource_roots)
    }
}

/// Ordered modules plus the depends-on relation.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    modules: Vec<Module>,
    /// Reverse edges: module → modules that depend on it
    dependents: Vec<Vec<usize>>,
}

impl ModuleGraph {
    pub fn new(modules: Vec<Module>) -> Result<Self, GraphError> {
        if modules.is_empty() {
            return Err(GraphError::Empty);
        }

        let mut index = FxHashMap::default();
        for (i, module) in modules.iter().enumerate() {
            if index.insert(module.name.clone(), i).is_some() {
                return Err(GraphError::Duplicate(module.name.clone()));
            }
        }

        let mut dependents = vec![Vec::new(); modules.len()];
        for (i, module) in modules.iter().enumerate() {
            for dep in &module.depends_on {
                let Some(&j) = index.get(dep) else {
                    return Err(GraphError::UnknownDependency {
                        module: module.name.clone(),
                        dependency: dep.clone(),
                    });
                };
                if i != j && !dependents[j].contains(&i) {
                    dependents[j].push(i);
                }
            }
        }

        Ok(Self {
            modules,
            dependents,
        })
    }

    #[inline]
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[inline]
    pub fn module(&self, i: usize) -> &Module {
        &self.modules[i]
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// First module (in graph order) owning `path`.
    pub fn owner_of(&self, path: &Path) -> Option<usize> {
        self.modules.iter().position(|m| m.owns(path))
    }

    /// Modules depending directly on `i`.
    #[cfg(test)]
    pub fn dependents_of(&self, i: usize) -> &[usize] {
        &self.dependents[i]
    }

    /// `seeds` plus every module depending on them, directly or transitively.
    pub fn downstream_closure(&self, seeds: impl IntoIterator<Item = usize>) -> FxHashSet<usize> {
        let mut closure = FxHashSet::default();
        let mut stack: Vec<usize> = seeds.into_iter().collect();
        while let Some(i) = stack.pop() {
            if closure.insert(i) {
                stack.extend(self.dependents[i].iter().copied());
            }
        }
        closure
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Module rooted at `/proj/<name>` with a conventional Maven layout.
    pub(crate) fn module(name: &str, deps: &[&str]) -> Module {
        let base = PathBuf::from("/proj").join(name);
        Module {
            name: name.to_string(),
            source_roots: vec![
                base.join("src/main/java"),
                base.join("target/generated-sources/routes"),
            ],
            resource_roots: vec![base.join("src/main/resources")],
            output_dir: base.join("target/classes"),
            build_dir: base.join("target"),
            template_output_dir: None,
            analysis_cache: None,
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            base,
        }
    }

    #[test]
    fn test_empty_graph_rejected() {
        assert_eq!(ModuleGraph::new(vec![]).unwrap_err(), GraphError::Empty);
    }

    #[test]
    fn test_duplicate_rejected() {
        let err = ModuleGraph::new(vec![module("a", &[]), module("a", &[])]).unwrap_err();
        assert_eq!(err, GraphError::Duplicate("a".into()));
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let err = ModuleGraph::new(vec![module("a", &["zzz"])]).unwrap_err();
        assert!(matches!(err, GraphError::UnknownDependency { .. }));
    }

    #[test]
    fn test_owner_lookup() {
        let graph = ModuleGraph::new(vec![module("a", &[]), module("b", &["a"])]).unwrap();

        let src = PathBuf::from("/proj/b/src/main/java/app/Home.java");
        let res = PathBuf::from("/proj/a/src/main/resources/application.conf");
        let stray = PathBuf::from("/proj/b/pom.xml");

        assert_eq!(graph.owner_of(&src), Some(1));
        assert_eq!(graph.owner_of(&res), Some(0));
        assert_eq!(graph.owner_of(&stray), None);
    }

    #[test]
    fn test_downstream_closure_is_transitive() {
        let graph = ModuleGraph::new(vec![
            module("a", &[]),
            module("b", &["a"]),
            module("c", &["b"]),
            module("d", &[]),
        ])
        .unwrap();

        let closure = graph.downstream_closure([0]);
        assert_eq!(closure.len(), 3);
        assert!(closure.contains(&2));
        assert!(!closure.contains(&3));
    }

    #[test]
    fn test_diamond_dependents_deduplicated() {
        let graph = ModuleGraph::new(vec![
            module("a", &[]),
            module("b", &["a"]),
            module("c", &["a"]),
            module("d", &["b", "c", "a", "a"]),
        ])
        .unwrap();

        assert_eq!(graph.dependents_of(0), &[1, 2, 3]);
        assert_eq!(graph.downstream_closure([0]).len(), 4);
    }

    #[test]
    fn test_watch_dirs_exclude_generated() {
        let m = module("a", &[]);
        let dirs = m.watch_dirs();
        assert_eq!(dirs.len(), 2);
        assert!(dirs.iter().all(|d| !d.starts_with(&m.build_dir)));
    }
}
