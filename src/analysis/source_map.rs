//! Class name → source file maps, used to point stack traces at sources.
//!
//! Maps are rebuilt wholesale for every module in a successful build scope.
//! Modules outside the scope keep their previous map: their outputs did not
//! change, so their entries are still valid.

use std::path::{Component, Path, PathBuf};

use rustc_hash::FxHashMap;

use super::ModuleAnalysis;
use super::template::GeneratedTemplate;
use crate::project::{Module, ModuleGraph};

/// Separator the compiler uses for nested and synthetic classes.
const NESTED_SEPARATOR: char = '$';

/// Fully-qualified artifact name → originating source file.
pub type SourceMap = FxHashMap<String, PathBuf>;

/// A resolved source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePosition {
    pub file: PathBuf,
    /// `None` when a generated line has no mapping back to its template.
    pub line: Option<u32>,
}

/// Build the source map of `module` from its analysis data.
///
/// Only top-level artifacts are tracked; products whose file name carries
/// the nested separator are skipped, as are products outside the module's
/// output directory.
pub fn rebuild_source_map(module: &Module, analysis: &ModuleAnalysis) -> SourceMap {
    let mut map = SourceMap::default();
    for entry in &analysis.sources {
        for product in &entry.products {
            let is_nested = product
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains(NESTED_SEPARATOR));
            if is_nested {
                continue;
            }

            match qualified_name(&module.output_dir, product) {
                Some(name) => {
                    map.insert(name, entry.source.clone());
                }
                None => {
                    crate::debug!("analysis"; "{}: product outside output dir: {}",
                        module.name, product.display());
                }
            }
        }
    }
    map
}

/// `<output>/app/models/User.class` → `app.models.User`.
fn qualified_name(output_dir: &Path, product: &Path) -> Option<String> {
    let relative = product.strip_prefix(output_dir).ok()?;
    let relative = relative.with_extension("");

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            _ => return None,
        }
    }
    (!parts.is_empty()).then(|| parts.join("."))
}

/// Source maps of every module, indexed like the module graph.
#[derive(Debug, Default)]
pub struct SourceMaps {
    maps: Vec<SourceMap>,
}

impl SourceMaps {
    pub fn new(graph: &ModuleGraph) -> Self {
        Self {
            maps: vec![SourceMap::default(); graph.len()],
        }
    }

    /// Replace the map of module `i`.
    pub fn replace(&mut self, i: usize, map: SourceMap) {
        self.maps[i] = map;
    }

    #[cfg(test)]
    pub fn get(&self, i: usize) -> &SourceMap {
        &self.maps[i]
    }

    /// Resolve a class name and line to a source position.
    ///
    /// Nested-type suffixes (`Outer$Inner`) are stripped before lookup.
    /// Sources generated by the template compiler are mapped back to the
    /// template: the file becomes the template when the metadata names it,
    /// and the line is translated (or `None` when no mapping exists).
    pub fn find_source(
        &self,
        graph: &ModuleGraph,
        class_name: &str,
        line: Option<u32>,
    ) -> Option<SourcePosition> {
        let key = class_name
            .split_once(NESTED_SEPARATOR)
            .map_or(class_name, |(outer, _)| outer);

        let (i, file) = self
            .maps
            .iter()
            .enumerate()
            .find_map(|(i, map)| map.get(key).map(|file| (i, file)))?;

        let module = graph.module(i);
        let generated = module
            .template_output_dir
            .as_ref()
            .is_some_and(|dir| file.starts_with(dir));
        if !generated {
            return Some(SourcePosition {
                file: file.clone(),
                line,
            });
        }

        Some(map_template_position(module, file, line))
    }
}

fn map_template_position(module: &Module, generated: &Path, line: Option<u32>) -> SourcePosition {
    let Some(meta) = GeneratedTemplate::load(generated) else {
        return SourcePosition {
            file: generated.to_path_buf(),
            line: None,
        };
    };

    let file = match &meta.source {
        Some(source) if source.is_relative() => module.base.join(source),
        Some(source) => source.clone(),
        None => generated.to_path_buf(),
    };
    SourcePosition {
        file,
        line: line.and_then(|l| meta.map_line(l)),
    }
}
