//! Locating mirror URLs inside catalog lines
//!
//! A resource line is split into `(before, token, host_rest, path, after)`
//! where `token` is the mirror id digits. Rewriting a line swaps the token and
//! reassembles the other parts untouched.

use regex::Regex;

use crate::mirror::{MirrorId, MirrorTemplate};

/// A line split around its first mirror URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLine {
    /// Everything up to and including the host prefix
    pub before: String,
    /// Mirror id as written
    pub token: String,
    /// `.{domain}/`
    pub host_rest: String,
    /// Resource path after the host
    pub path: String,
    /// Rest of the line
    pub after: String,
}

impl ResourceLine {
    /// Reassemble with a replacement mirror id
    pub fn render_with(&self, id: MirrorId) -> String {
        format!(
            "{}{}{}{}{}",
            self.before, id, self.host_rest, self.path, self.after
        )
    }

    /// Reassemble unchanged
    pub fn render(&self) -> String {
        format!(
            "{}{}{}{}{}",
            self.before, self.token, self.host_rest, self.path, self.after
        )
    }
}

/// Regex-backed finder for `{scheme}://{prefix}{id}.{domain}/{path}`
#[derive(Debug, Clone)]
pub struct UrlLocator {
    pattern: Regex,
}

impl UrlLocator {
    pub fn new(template: &MirrorTemplate) -> Result<Self, regex::Error> {
        let pattern = format!(
            r#"{}://{}([^.\s/"'<>]*)(\.{}/)([^\s"'<>]*)"#,
            regex::escape(&template.scheme),
            regex::escape(&template.host_prefix),
            regex::escape(&template.domain),
        );
        Ok(Self {
            pattern: Regex::new(&pattern)?,
        })
    }

    /// Split `text` around its first mirror URL, if any
    pub fn locate(&self, text: &str) -> Option<ResourceLine> {
        let caps = self.pattern.captures(text)?;
        let token = caps.get(1)?;
        let host_rest = caps.get(2)?;
        let path = caps.get(3)?;

        Some(ResourceLine {
            before: text[..token.start()].to_string(),
            token: token.as_str().to_string(),
            host_rest: host_rest.as_str().to_string(),
            path: path.as_str().to_string(),
            after: text[path.end()..].to_string(),
        })
    }
}
