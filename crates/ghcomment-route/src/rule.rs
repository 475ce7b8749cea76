//! Comment rules
//!
//! A rule pairs a `when` condition with the template to render when it
//! holds. Rules are tried in order and the first match wins.

use ghcomment_core::TARGET_VAR;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TEMPLATE_KEY: &str = "default";

pub const DEFAULT_WHEN: &str = "ExitCode != 0";

pub const DEFAULT_UPDATE_CONDITION: &str =
    r#"Comment.HasMeta && Comment.Meta.TemplateKey == "default""#;

pub const DEFAULT_TEMPLATE: &str =
    "{{> status}} {{> link}}\n\n{{> join_command}}\n\n{{> hidden_combined_output}}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(rename = "when")]
    pub condition: String,

    #[serde(default)]
    pub template: String,

    #[serde(default)]
    pub template_for_too_long: String,

    /// Decides which existing comment gets edited instead of posting anew.
    #[serde(default, alias = "update")]
    pub update_condition: String,

    /// Variables copied into the comment's hidden metadata.
    #[serde(default)]
    pub embedded_var_names: Vec<String>,

    /// Matching stops here but nothing is posted.
    #[serde(default, rename = "dont_comment")]
    pub suppress_comment: bool,
}

impl Rule {
    pub fn new(condition: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            template: String::new(),
            template_for_too_long: String::new(),
            update_condition: String::new(),
            embedded_var_names: Vec::new(),
            suppress_comment: false,
        }
    }

    /// A rule that always applies.
    pub fn always(template: impl Into<String>) -> Self {
        Self::new("true").with_template(template)
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn with_template_for_too_long(mut self, template: impl Into<String>) -> Self {
        self.template_for_too_long = template.into();
        self
    }

    pub fn with_update_condition(mut self, condition: impl Into<String>) -> Self {
        self.update_condition = condition.into();
        self
    }

    pub fn with_embedded_var(mut self, name: impl Into<String>) -> Self {
        self.embedded_var_names.push(name.into());
        self
    }

    pub fn suppressed(mut self) -> Self {
        self.suppress_comment = true;
        self
    }

    /// Declared embedded variables, with `target` appended if missing.
    pub fn embedded_variable_names(&self) -> Vec<String> {
        with_target(&self.embedded_var_names)
    }
}

/// The rule used for the `default` template key when the configuration
/// does not define one.
pub fn default_exec_rule() -> Rule {
    Rule::new(DEFAULT_WHEN)
        .with_template(DEFAULT_TEMPLATE)
        .with_update_condition(DEFAULT_UPDATE_CONDITION)
}

pub(crate) fn with_target(names: &[String]) -> Vec<String> {
    let mut names = names.to_vec();
    if !names.iter().any(|n| n == TARGET_VAR) {
        names.push(TARGET_VAR.to_string());
    }
    names
}
