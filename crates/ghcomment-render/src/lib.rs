//! ghcomment-render: comment bodies from Handlebars templates
//!
//! Templates see the execution context (`ExitCode`, `JoinCommand`,
//! `CombinedOutput`, `Vars`, ...) and may include named snippets with
//! `{{> name}}`.
//!
//! # Example
//!
//! ```
//! use ghcomment_render::render_string;
//! use serde_json::json;
//!
//! let body = render_string("Failed: {{Command}}", &json!({ "Command": "make" })).unwrap();
//! assert_eq!(body, "Failed: make");
//! ```

pub mod renderer;
pub mod templates;

use std::collections::BTreeMap;

use ghcomment_core::{RenderError, Renderer};
use serde_json::Value;

pub use renderer::TemplateRenderer;
pub use templates::{builtin_snippets, code_fence, html_escape, snippets, SnippetParams};

/// Render an inline template without snippets.
pub fn render_string(template: &str, data: &Value) -> Result<String, RenderError> {
    TemplateRenderer::new().render(template, &BTreeMap::new(), data)
}
