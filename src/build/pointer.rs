//! Caret rendering under an offending source line.

use std::fs;

use super::outcome::CompilationFailure;

/// Caret line pointing at `column` characters into `line`.
///
/// Preceding characters become spaces, except tabs which stay tabs so the
/// caret lines up however the terminal or browser expands them.
pub fn caret_line(line: &str, column: usize) -> String {
    let mut out: String = line
        .chars()
        .chain(std::iter::repeat(' '))
        .take(column)
        .map(|c| if c == '\t' { '\t' } else { ' ' })
        .collect();
    out.push('^');
    out
}

/// The offending source line of `failure`, plus the caret line when the
/// column is known. `None` if the source or line is unavailable.
pub fn source_excerpt(failure: &CompilationFailure) -> Option<(String, Option<String>)> {
    let source = failure.source.as_ref()?;
    let line_no = failure.line?;
    let content = fs::read_to_string(source).ok()?;
    let line = content
        .lines()
        .nth(usize::try_from(line_no).ok()?.checked_sub(1)?)?
        .to_string();
    let caret = failure
        .column
        .and_then(|c| usize::try_from(c).ok())
        .map(|c| caret_line(&line, c));
    Some((line, caret))
}

/// Terminal rendering: `file:line`, the source line, the caret.
pub fn render_failure(failure: &CompilationFailure) -> String {
    let mut out = failure.message.clone();
    if let Some(source) = &failure.source {
        out.push('\n');
        out.push_str(&source.display().to_string());
        if let Some(line) = failure.line {
            out.push_str(&format!(":{line}"));
        }
    }
    if let Some((line, caret)) = source_excerpt(failure) {
        out.push('\n');
        out.push_str(&line);
        if let Some(caret) = caret {
            out.push('\n');
            out.push_str(&caret);
        }
    }
    out
}
