//! Hidden metadata block appended to every rendered comment.
//!
//! The block is a single-line HTML comment, invisible once GitHub renders
//! the Markdown:
//!
//! ```text
//! <!-- ghcomment: {"SHA1":"abc","TemplateKey":"default","Vars":{"target":""}} -->
//! ```
//!
//! `<`, `>` and `&` inside the JSON are written as `\u003c`, `\u003e` and
//! `\u0026`, so no variable value can terminate the HTML comment early.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const MARKER_PREFIX: &str = "<!-- ghcomment: ";
pub const MARKER_SUFFIX: &str = " -->";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedMetadata {
    #[serde(rename = "SHA1", default)]
    pub commit_sha: String,
    #[serde(rename = "TemplateKey", default)]
    pub template_key: String,
    #[serde(rename = "Vars", default)]
    pub variables: Map<String, Value>,
    /// Keys written by other versions, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Outcome of looking for a metadata block in a comment body.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataScan {
    Absent,
    Malformed(String),
    Found(EmbeddedMetadata),
}

impl MetadataScan {
    pub fn into_metadata(self) -> Option<EmbeddedMetadata> {
        match self {
            MetadataScan::Found(meta) => Some(meta),
            MetadataScan::Absent | MetadataScan::Malformed(_) => None,
        }
    }
}

impl EmbeddedMetadata {
    pub fn new(commit_sha: impl Into<String>, template_key: impl Into<String>) -> Self {
        Self {
            commit_sha: commit_sha.into(),
            template_key: template_key.into(),
            ..Default::default()
        }
    }

    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = variables;
        self
    }

    /// The suffix to append to a rendered body, leading newline included.
    pub fn encode(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("\n{}{}{}", MARKER_PREFIX, escape_html_specials(&json), MARKER_SUFFIX)
    }

    /// Metadata of `body`, or `None` when there is none or it is unreadable.
    pub fn decode(body: &str) -> Option<Self> {
        Self::scan(body).into_metadata()
    }

    /// Like [`decode`](Self::decode) but tells absence from corruption.
    ///
    /// The last marker line wins, since the block is always appended.
    pub fn scan(body: &str) -> MetadataScan {
        let payload = body.lines().rev().find_map(|line| {
            line.trim()
                .strip_prefix(MARKER_PREFIX)
                .and_then(|rest| rest.strip_suffix(MARKER_SUFFIX))
        });
        let payload = match payload {
            Some(payload) => payload,
            None => return MetadataScan::Absent,
        };

        match serde_json::from_str::<Value>(payload) {
            Ok(Value::Object(map)) => {
                match serde_json::from_value::<EmbeddedMetadata>(Value::Object(map)) {
                    Ok(meta) => MetadataScan::Found(meta),
                    Err(e) => MetadataScan::Malformed(e.to_string()),
                }
            }
            Ok(other) => MetadataScan::Malformed(format!(
                "metadata payload is {}, not an object",
                ghcomment_expr::kind_name(&other)
            )),
            Err(e) => MetadataScan::Malformed(e.to_string()),
        }
    }

    /// The object exposed to update conditions as `Comment.Meta`.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }
}

fn escape_html_specials(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for ch in json.chars() {
        match ch {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn sample() -> EmbeddedMetadata {
        let mut vars = Map::new();
        vars.insert("target".into(), json!("lint"));
        vars.insert("attempt".into(), json!(3));
        vars.insert("nested".into(), json!({ "ok": true, "list": [1, "two"] }));
        EmbeddedMetadata::new("abc123", "default").with_variables(vars)
    }

    #[test]
    fn test_encoded_block_is_one_hidden_line() {
        let encoded = sample().encode();
        assert!(encoded.starts_with("\n<!-- ghcomment: {"));
        assert!(encoded.ends_with("} -->"));
        assert_eq!(encoded.trim_start().lines().count(), 1);
    }

    #[test]
    fn test_decode_after_rendered_body() {
        let body = format!("## Build failed\n\nsee logs{}", sample().encode());
        assert_eq!(EmbeddedMetadata::decode(&body), Some(sample()));
    }

    #[test]
    fn test_values_cannot_close_the_comment() {
        let mut vars = Map::new();
        vars.insert("target".into(), json!("x --> <b>&amp;</b>\nsecond line"));
        let meta = EmbeddedMetadata::new("", "k").with_variables(vars);
        let encoded = meta.encode();
        assert!(!encoded[..encoded.len() - MARKER_SUFFIX.len()].contains("-->"));
        assert_eq!(encoded.matches('<').count(), 1);
        assert_eq!(EmbeddedMetadata::decode(&encoded), Some(meta));
    }

    #[test]
    fn test_last_marker_wins() {
        let quoted = EmbeddedMetadata::new("old", "quoted").encode();
        let body = format!("> quoting an older comment{}\n\nnew text{}", quoted, sample().encode());
        assert_eq!(EmbeddedMetadata::decode(&body), Some(sample()));
    }

    #[test]
    fn test_unknown_keys_survive() {
        let body = "<!-- ghcomment: {\"SHA1\":\"a\",\"JoinCommand\":\"make\"} -->";
        let meta = EmbeddedMetadata::decode(body).unwrap();
        assert_eq!(meta.commit_sha, "a");
        assert_eq!(meta.extra.get("JoinCommand"), Some(&json!("make")));
        assert_eq!(meta.to_value()["JoinCommand"], json!("make"));
    }

    #[test]
    fn test_scan_distinguishes_absent_and_malformed() {
        assert_eq!(EmbeddedMetadata::scan("plain comment"), MetadataScan::Absent);
        assert!(matches!(
            EmbeddedMetadata::scan("<!-- ghcomment: {not json -->"),
            MetadataScan::Malformed(_)
        ));
        assert!(matches!(
            EmbeddedMetadata::scan("<!-- ghcomment: [1, 2] -->"),
            MetadataScan::Malformed(_)
        ));
        assert!(matches!(
            EmbeddedMetadata::scan("<!-- ghcomment: {\"Vars\": 5} -->"),
            MetadataScan::Malformed(_)
        ));
    }

    proptest! {
        #[test]
        fn decode_never_panics_on_arbitrary_text(body in ".*") {
            let _ = EmbeddedMetadata::decode(&body);
        }

        #[test]
        fn decode_recovers_string_variables(
            key in "[a-z_]{1,12}",
            value in ".*",
            prefix in "[^\n]*",
        ) {
            let mut vars = Map::new();
            vars.insert(key.clone(), Value::String(value.clone()));
            let meta = EmbeddedMetadata::new("sha", "key").with_variables(vars);
            let body = format!("{}{}", prefix, meta.encode());
            let decoded = EmbeddedMetadata::decode(&body);
            prop_assert_eq!(decoded.map(|m| m.variables.get(&key).cloned()), Some(Some(Value::String(value))));
        }
    }
}
