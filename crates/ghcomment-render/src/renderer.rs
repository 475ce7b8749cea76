//! Comment rendering on Handlebars.
//!
//! HTML escaping is off since comment bodies are Markdown. Custom helpers:
//! - html_escape: escape `& < > "` for raw HTML blocks
//! - truncate: cut a string to a number of characters, appending `...`
//! - default: fall back when a value is null or missing

use std::collections::BTreeMap;

use ghcomment_core::{RenderError, Renderer};
use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext,
};
use serde_json::Value;

use crate::templates::html_escape;

/// Handlebars-backed [`Renderer`].
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    strict: bool,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail on references to missing fields instead of rendering nothing.
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    fn registry(&self, snippets: &BTreeMap<String, String>) -> Result<Handlebars<'static>, RenderError> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(self.strict);
        handlebars.register_escape_fn(handlebars::no_escape);

        handlebars.register_helper("html_escape", Box::new(HtmlEscapeHelper));
        handlebars.register_helper("truncate", Box::new(TruncateHelper));
        handlebars.register_helper("default", Box::new(DefaultHelper));

        for (name, body) in snippets {
            handlebars
                .register_partial(name, body)
                .map_err(|e| RenderError::Snippet {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
        }
        Ok(handlebars)
    }
}

impl Renderer for TemplateRenderer {
    fn render(
        &self,
        template: &str,
        snippets: &BTreeMap<String, String>,
        data: &Value,
    ) -> Result<String, RenderError> {
        if template.is_empty() {
            return Ok(String::new());
        }
        self.registry(snippets)?
            .render_template(template, data)
            .map_err(|e| RenderError::Render(e.to_string()))
    }
}

// ============================================================================
// Custom Helpers
// ============================================================================

struct HtmlEscapeHelper;

impl HelperDef for HtmlEscapeHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _r: &'reg Handlebars<'reg>,
        _ctx: &'rc Context,
        _rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let text = h.param(0).map(|v| display(v.value())).unwrap_or_default();
        out.write(&html_escape(&text))?;
        Ok(())
    }
}

/// Truncate a string to max characters with ellipsis
struct TruncateHelper;

impl HelperDef for TruncateHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _r: &'reg Handlebars<'reg>,
        _ctx: &'rc Context,
        _rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let text = h.param(0).map(|v| display(v.value())).unwrap_or_default();
        let max_chars = h
            .param(1)
            .and_then(|v| v.value().as_u64())
            .unwrap_or(100) as usize;

        match text.char_indices().nth(max_chars) {
            Some((cut, _)) => {
                out.write(&text[..cut])?;
                out.write("...")?;
            }
            None => out.write(&text)?,
        }
        Ok(())
    }
}

struct DefaultHelper;

impl HelperDef for DefaultHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _r: &'reg Handlebars<'reg>,
        _ctx: &'rc Context,
        _rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let value = h.param(0).map(|v| v.value());
        let fallback = h.param(1).map(|v| display(v.value())).unwrap_or_default();

        match value {
            Some(v) if !v.is_null() => out.write(&display(v))?,
            _ => out.write(&fallback)?,
        }
        Ok(())
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
