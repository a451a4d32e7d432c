//! Generated template metadata.
//!
//! The template compiler appends a metadata block to every generated source:
//!
//! ```text
//! /*
//!     -- GENERATED --
//!     SOURCE: app/views/index.scala.html
//!     LINES: 20->1|25->3|31->7
//!     -- GENERATED --
//! */
//! ```
//!
//! `LINES` pairs a generated line with the template line it came from.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

static META_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(SOURCE|LINES):[ \t]*(.*?)\s*$").expect("valid metadata regex")
});

/// Parsed metadata of one generated template source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedTemplate {
    /// Original template file as written in the metadata block.
    pub source: Option<PathBuf>,
    /// `(generated line, template line)`, sorted by generated line.
    lines: Vec<(u32, u32)>,
}

impl GeneratedTemplate {
    /// Parse the metadata block. Returns `None` if there is none.
    pub fn parse(content: &str) -> Option<Self> {
        if !content.contains("-- GENERATED --") {
            return None;
        }

        let mut template = Self::default();
        for caps in META_FIELD.captures_iter(content) {
            let value = &caps[2];
            match &caps[1] {
                "SOURCE" if !value.is_empty() => template.source = Some(PathBuf::from(value)),
                "LINES" => template.lines = parse_pairs(value),
                _ => {}
            }
        }
        template.lines.sort_unstable();
        Some(template)
    }

    /// Read and parse a generated file.
    pub fn load(path: &Path) -> Option<Self> {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|content| Self::parse(&content))
    }

    /// Template line for a generated line: the last mapping at or before it.
    pub fn map_line(&self, generated: u32) -> Option<u32> {
        self.lines
            .iter()
            .take_while(|(g, _)| *g <= generated)
            .last()
            .map(|(_, s)| *s)
    }
}

/// Parse `a->b|c->d`, skipping malformed pairs.
fn parse_pairs(value: &str) -> Vec<(u32, u32)> {
    value
        .split('|')
        .filter_map(|pair| {
            let (g, s) = pair.split_once("->")?;
            Some((g.trim().parse().ok()?, s.trim().parse().ok()?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENERATED: &str = r#"
package views.html

object index extends BaseScalaTemplate {
  def apply(message: String) = { ... }
}

              /*
                  -- GENERATED --
                  DATE: Mon Oct 14 10:00:00 CEST 2024
                  SOURCE: app/views/index.scala.html
                  HASH: 4b4a1a4b1f
                  MATRIX: 505->1|614->17
                  LINES: 20->1|25->3|31->7
                  -- GENERATED --
              */
"#;

    #[test]
    fn test_parse_source_and_lines() {
        let meta = GeneratedTemplate::parse(GENERATED).unwrap();
        assert_eq!(meta.source, Some(PathBuf::from("app/views/index.scala.html")));
        assert_eq!(meta.lines, vec![(20, 1), (25, 3), (31, 7)]);
    }

    #[test]
    fn test_map_line() {
        let meta = GeneratedTemplate::parse(GENERATED).unwrap();
        assert_eq!(meta.map_line(20), Some(1));
        assert_eq!(meta.map_line(27), Some(3));
        assert_eq!(meta.map_line(100), Some(7));
    }

    #[test]
    fn test_map_line_before_first_mapping() {
        let meta = GeneratedTemplate::parse(GENERATED).unwrap();
        assert_eq!(meta.map_line(3), None);
    }

    #[test]
    fn test_not_generated() {
        assert!(GeneratedTemplate::parse("object plain { }").is_none());
    }

    #[test]
    fn test_generated_without_lines() {
        let meta = GeneratedTemplate::parse("/* -- GENERATED --\n SOURCE: a.html\n */").unwrap();
        assert_eq!(meta.source, Some(PathBuf::from("a.html")));
        assert_eq!(meta.map_line(10), None);
    }

    #[test]
    fn test_malformed_pairs_skipped() {
        assert_eq!(parse_pairs("1->2|x->3|4-5|6->7"), vec![(1, 2), (6, 7)]);
    }
}
