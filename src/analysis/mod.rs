//! Incremental compiler analysis data and the source maps built from it.
//!
//! # Modules
//!
//! - `source_map` - class name → source file maps, `find_source`
//! - `template` - generated template metadata (line mapping)

pub mod source_map;
pub mod template;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::project::Module;

pub use source_map::{SourceMap, SourceMaps, SourcePosition, rebuild_source_map};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("malformed analysis file `{0}`")]
    Parse(PathBuf, #[source] serde_json::Error),
}

/// One compiled source file and the artifacts it produced.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CompiledSource {
    pub source: PathBuf,
    #[serde(default)]
    pub products: Vec<PathBuf>,
    /// Epoch millis of the compilation that produced `products`.
    #[serde(default)]
    pub compiled_at: i64,
}

/// Analysis data of a single module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ModuleAnalysis {
    #[serde(default)]
    pub sources: Vec<CompiledSource>,
}

impl ModuleAnalysis {
    /// Resolve relative source/product paths against `base`.
    fn absolutize(mut self, base: &Path) -> Self {
        for entry in &mut self.sources {
            if entry.source.is_relative() {
                entry.source = base.join(&entry.source);
            }
            for product in &mut entry.products {
                if product.is_relative() {
                    *product = base.join(&*product);
                }
            }
        }
        self
    }
}

/// Reads a module's analysis cache.
///
/// The cache format belongs to the compiler integration; implementations
/// translate it into [`ModuleAnalysis`].
pub trait AnalysisReader: Send + Sync {
    fn read_analysis(&self, module: &Module, cache: &Path) -> Result<ModuleAnalysis, AnalysisError>;
}

/// Reads analysis exported as JSON:
///
/// ```json
/// { "sources": [ { "source": "src/main/scala/A.scala",
///                  "products": ["target/classes/app/A.class"],
///                  "compiled_at": 1700000000000 } ] }
/// ```
///
/// Relative paths are resolved against the module base directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonAnalysisReader;

impl AnalysisReader for JsonAnalysisReader {
    fn read_analysis(&self, module: &Module, cache: &Path) -> Result<ModuleAnalysis, AnalysisError> {
        let content =
            fs::read_to_string(cache).map_err(|e| AnalysisError::Io(cache.to_path_buf(), e))?;
        let analysis: ModuleAnalysis = serde_json::from_str(&content)
            .map_err(|e| AnalysisError::Parse(cache.to_path_buf(), e))?;
        Ok(analysis.absolutize(&module.base))
    }
}
