//! Rebuild scoping: which modules must be rebuilt for a set of changed paths.
//!
//! Pure functions, no side effects.

use std::path::{Path, PathBuf};

use super::graph::ModuleGraph;

/// Reload flags that decide whether scoping is allowed at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeFlags {
    pub after_first_success: bool,
    pub force_reload: bool,
}

/// Modules selected for the next rebuild, in graph order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildScope {
    /// Graph indices, ascending.
    pub modules: Vec<usize>,
    /// `true` when scoping was bypassed and every module is included.
    pub full: bool,
    /// Changed paths no module owns (dropped from scope computation).
    pub unowned: Vec<PathBuf>,
}

impl BuildScope {
    pub fn full(graph: &ModuleGraph) -> Self {
        Self {
            modules: (0..graph.len()).collect(),
            full: true,
            unowned: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn names<'g>(&self, graph: &'g ModuleGraph) -> Vec<&'g str> {
        self.modules
            .iter()
            .map(|&i| graph.module(i).name.as_str())
            .collect()
    }
}

/// Compute the rebuild scope for `changed` paths.
///
/// Scoping only applies once a build has succeeded, no reload is forced and
/// the project has more than one module; otherwise every module is rebuilt.
pub fn compute_scope<'a>(
    changed: impl IntoIterator<Item = &'a Path>,
    graph: &ModuleGraph,
    flags: ScopeFlags,
) -> BuildScope {
    if !flags.after_first_success || flags.force_reload || graph.len() <= 1 {
        return BuildScope::full(graph);
    }

    let mut owners = Vec::new();
    let mut unowned = Vec::new();
    for path in changed {
        match graph.owner_of(path) {
            Some(i) => owners.push(i),
            None => {
                crate::debug!("scope"; "no module owns {}", path.display());
                unowned.push(path.to_path_buf());
            }
        }
    }

    let closure = graph.downstream_closure(owners);
    let mut modules: Vec<usize> = closure.into_iter().collect();
    modules.sort_unstable();

    BuildScope {
        modules,
        full: false,
        unowned,
    }
}
