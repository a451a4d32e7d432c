//! HTTP responses: outcome pages and small JSON/plain replies.

use std::borrow::Cow;

use anyhow::Result;
use tiny_http::{Header, Request, Response, StatusCode};

use crate::build::pointer::source_excerpt;
use crate::build::{CompilationFailure, OpaqueBuildError};

pub const HTML: &str = "text/html; charset=utf-8";
pub const PLAIN: &str = "text/plain; charset=utf-8";
pub const JSON: &str = "application/json";

/// A response, decoupled from the connection it goes out on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl Reply {
    pub fn plain(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: PLAIN,
            body: body.into(),
        }
    }

    pub fn html(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: HTML,
            body,
        }
    }

    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self {
            status,
            content_type: JSON,
            body: value.to_string(),
        }
    }

    pub fn send(self, request: Request) -> Result<()> {
        let response = Response::from_string(self.body)
            .with_status_code(StatusCode(self.status))
            .with_header(make_header("Content-Type", self.content_type)?)
            .with_header(make_header("Cache-Control", "no-store")?);
        request.respond(response)?;
        Ok(())
    }
}

fn make_header(key: &str, value: &str) -> Result<Header> {
    Header::from_bytes(key, value).map_err(|()| anyhow::anyhow!("invalid header {key}: {value}"))
}

/// Escape HTML special characters in text content.
pub fn escape(s: &str) -> Cow<'_, str> {
    const SPECIAL: [char; 5] = ['<', '>', '&', '"', '\''];
    if !s.contains(SPECIAL) {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    Cow::Owned(result)
}

const STYLE: &str = "body{font-family:sans-serif;margin:2em;color:#222}\
h1{color:#b00}pre{background:#f6f6f6;padding:1em;overflow:auto}\
.location{color:#666;font-family:monospace}";

fn page(title: &str, content: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title>\
<style>{STYLE}</style></head>\n<body>\n<h1>{title}</h1>\n{content}</body></html>\n"
    )
}

/// Error page for a compile error, with the offending line and caret.
pub fn compilation_failure_page(failure: &CompilationFailure) -> String {
    let mut content = format!("<p class=\"message\">{}</p>\n", escape(&failure.message));

    if let Some(source) = &failure.source {
        let location = match failure.line {
            Some(line) => format!("{}:{}", source.display(), line),
            None => source.display().to_string(),
        };
        content.push_str(&format!("<p class=\"location\">{}</p>\n", escape(&location)));
    }

    if let Some((line, caret)) = source_excerpt(failure) {
        content.push_str("<pre>");
        content.push_str(&escape(&line));
        if let Some(caret) = caret {
            content.push('\n');
            content.push_str(&caret);
        }
        content.push_str("</pre>\n");
    }

    page("Compilation error", &content)
}

/// Error page for any other build failure.
pub fn build_error_page(error: &OpaqueBuildError) -> String {
    let mut content = format!("<p class=\"message\">{}</p>\n", escape(&error.description));
    if let Some(cause) = &error.cause {
        content.push_str(&format!("<pre>{}</pre>\n", escape(cause)));
    }
    page("Build error", &content)
}
