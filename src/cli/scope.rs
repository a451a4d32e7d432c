//! `devloop scope`: show what a change would rebuild.

use std::path::PathBuf;

use anyhow::Result;
use owo_colors::OwoColorize;

use crate::config::DevloopConfig;
use crate::project::{BuildScope, ModuleGraph, ScopeFlags, compute_scope};
use crate::utils::path::resolve_path;

/// Print the modules rebuilt for `paths`, as after a first successful build.
pub fn print_scope(config: &DevloopConfig, paths: &[PathBuf]) -> Result<()> {
    let graph = config.module_graph()?;
    let changed: Vec<PathBuf> = paths.iter().map(|p| resolve_path(p, &config.root)).collect();

    let scope = scope_for(&graph, &changed);
    println!("{}", render(&graph, &scope));
    Ok(())
}

fn scope_for(graph: &ModuleGraph, changed: &[PathBuf]) -> BuildScope {
    let flags = ScopeFlags {
        after_first_success: true,
        force_reload: false,
    };
    compute_scope(changed.iter().map(PathBuf::as_path), graph, flags)
}

fn render(graph: &ModuleGraph, scope: &BuildScope) -> String {
    let mut out = if scope.is_empty() {
        format!("{}", "nothing to rebuild".dimmed())
    } else {
        let label = if scope.full { "rebuild all:" } else { "rebuild:" };
        format!("{} {}", label.bold(), scope.names(graph).join(", "))
    };
    for path in &scope.unowned {
        out.push_str(&format!("\n{} {}", "unowned:".yellow(), path.display()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::graph::tests::module;

    fn graph() -> ModuleGraph {
        ModuleGraph::new(vec![
            module("core", &[]),
            module("api", &["core"]),
            module("web", &["api"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_scope_for_upstream_change() {
        let graph = graph();
        let scope = scope_for(
            &graph,
            &[PathBuf::from("/proj/api/src/main/java/api/Client.java")],
        );
        assert_eq!(scope.names(&graph), ["api", "web"]);
    }

    #[test]
    fn test_render_lists_unowned_paths() {
        owo_colors::set_override(false);
        let graph = graph();
        let scope = scope_for(&graph, &[PathBuf::from("/proj/README.md")]);

        assert_eq!(render(&graph, &scope), "nothing to rebuild\nunowned: /proj/README.md");
    }
}
