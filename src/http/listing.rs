//! Listing view.
//!
//! Renders a registry snapshot into the page template. The template is loaded
//! once at startup; a template that cannot be read or lacks the `{{entries}}`
//! placeholder is a startup error.

use std::path::Path;

use crate::routing::RegistryEntry;

/// Template compiled into the binary, used when none is configured.
pub const BUILTIN_TEMPLATE: &str = include_str!("../../templates/index.html");

const ENTRIES: &str = "{{entries}}";
const COUNT: &str = "{{count}}";

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("reading template {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("template {0} has no {{{{entries}}}} placeholder")]
    MissingPlaceholder(String),
}

/// Page template split around its entries placeholder.
#[derive(Debug, Clone)]
pub struct ListingTemplate {
    head: String,
    tail: String,
}

impl ListingTemplate {
    /// Parse template text. `name` is used in error messages only.
    pub fn parse(name: &str, text: &str) -> Result<Self, TemplateError> {
        let (head, tail) = text
            .split_once(ENTRIES)
            .ok_or_else(|| TemplateError::MissingPlaceholder(name.to_string()))?;
        Ok(Self {
            head: head.to_string(),
            tail: tail.to_string(),
        })
    }

    pub fn builtin() -> Self {
        Self::parse("<builtin>", BUILTIN_TEMPLATE).unwrap_or_else(|_| Self {
            head: String::new(),
            tail: String::new(),
        })
    }

    /// Load from `path`, or use the built-in template when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, TemplateError> {
        let Some(path) = path else {
            return Ok(Self::builtin());
        };
        let name = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: name.clone(),
            source,
        })?;
        Self::parse(&name, &text)
    }

    /// Render a snapshot. Never touches the registry itself.
    pub fn render(&self, entries: &[RegistryEntry]) -> String {
        let count = entries.len().to_string();
        let mut page = self.head.replace(COUNT, &count);
        for entry in entries {
            let path = escape_html(&entry.path);
            page.push_str(&format!(
                "<li><a href=\"{path}\">{path}</a>\n<pre>{}</pre></li>\n",
                escape_html(&entry.source)
            ));
        }
        page.push_str(&self.tail.replace(COUNT, &count));
        page
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
