//! Built-in snippets available to every comment template as `{{> name}}`.
//!
//! - status: check mark or cross from the exit code
//! - link: link to the CI build, empty outside CI
//! - join_command: the command line in a fenced code block
//! - hidden_combined_output: collapsed output block

use std::collections::BTreeMap;

pub const STATUS: &str = "status";
pub const LINK: &str = "link";
pub const JOIN_COMMAND: &str = "join_command";
pub const HIDDEN_COMBINED_OUTPUT: &str = "hidden_combined_output";

/// Values baked into the snippets at build time.
#[derive(Debug, Clone, Default)]
pub struct SnippetParams<'a> {
    pub build_link: Option<&'a str>,
    pub joined_command: &'a str,
}

/// Built-in snippets, with `overrides` replacing any of the same name.
pub fn snippets(
    params: &SnippetParams<'_>,
    overrides: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut all = builtin_snippets(params);
    for (name, body) in overrides {
        all.insert(name.clone(), body.clone());
    }
    all
}

pub fn builtin_snippets(params: &SnippetParams<'_>) -> BTreeMap<String, String> {
    let mut snippets = BTreeMap::new();
    snippets.insert(
        STATUS.to_string(),
        "{{#if (eq ExitCode 0)}}:white_check_mark:{{else}}:x:{{/if}}".to_string(),
    );
    let link = match params.build_link {
        Some(url) if !url.is_empty() => format!("[Build link]({})", escape_mustaches(url)),
        _ => String::new(),
    };
    snippets.insert(LINK.to_string(), link);

    let fence = code_fence(params.joined_command);
    snippets.insert(
        JOIN_COMMAND.to_string(),
        format!("{fence}\n$ {{{{JoinCommand}}}}\n{fence}"),
    );
    snippets.insert(
        HIDDEN_COMBINED_OUTPUT.to_string(),
        "<details>\n\n<pre><code>{{html_escape CombinedOutput}}</code></pre>\n\n</details>"
            .to_string(),
    );
    snippets
}

/// A backtick fence longer than any backtick run in `content`.
pub fn code_fence(content: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for ch in content.chars() {
        if ch == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat((longest + 1).max(3))
}

/// Escape `& < > "` for raw HTML blocks.
pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

fn escape_mustaches(text: &str) -> String {
    text.replace("{{", "\\{{")
}
