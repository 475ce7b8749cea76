//! Configuration file loading.
//!
//! Supports the `.ghcomment.yaml` format with:
//! - Repository defaults (`base`) and shared variables (`vars`)
//! - Named snippets (`templates`) overriding the built-in ones
//! - `post` templates keyed by name
//! - `exec` rule lists keyed by template key

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ghcomment_core::ConfigError;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::rule::{default_exec_rule, Rule, DEFAULT_TEMPLATE_KEY};

/// File names looked up in each directory, in order.
pub const CONFIG_FILE_NAMES: [&str; 4] = [
    ".ghcomment.yaml",
    ".ghcomment.yml",
    "ghcomment.yaml",
    "ghcomment.yml",
];

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub base: Option<BaseConfig>,
    #[serde(default)]
    pub vars: Map<String, Value>,
    #[serde(default)]
    pub templates: BTreeMap<String, String>,
    #[serde(default)]
    pub ghe_base_url: String,
    #[serde(default)]
    pub ghe_graphql_endpoint: String,
    #[serde(default)]
    pub skip_no_token: bool,
    #[serde(default)]
    pub post: BTreeMap<String, PostTemplate>,
    #[serde(default)]
    pub exec: BTreeMap<String, Vec<Rule>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BaseConfig {
    #[serde(default)]
    pub org: String,
    #[serde(default)]
    pub repo: String,
}

/// A `post` entry: either just the template, or the long form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PostTemplate {
    Inline(String),
    Detailed(PostConfig),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PostConfig {
    pub template: String,
    #[serde(default)]
    pub template_for_too_long: String,
    #[serde(default, alias = "update")]
    pub update_condition: String,
    #[serde(default)]
    pub embedded_var_names: Vec<String>,
}

impl PostTemplate {
    /// The always-true rule this entry stands for.
    pub fn to_rule(&self) -> Rule {
        match self {
            PostTemplate::Inline(template) => Rule::always(template.clone()),
            PostTemplate::Detailed(cfg) => {
                let mut rule = Rule::always(cfg.template.clone())
                    .with_template_for_too_long(cfg.template_for_too_long.clone())
                    .with_update_condition(cfg.update_condition.clone());
                rule.embedded_var_names = cfg.embedded_var_names.clone();
                rule
            }
        }
    }
}

impl Config {
    /// Parse configuration from YAML content. Blank content is the empty
    /// configuration.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Self::parse(yaml, "<inline>")
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    fn parse(yaml: &str, origin: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    /// First configuration file found in `dir` or any of its ancestors.
    pub fn find(dir: &Path) -> Option<PathBuf> {
        dir.ancestors().find_map(|d| {
            CONFIG_FILE_NAMES
                .iter()
                .map(|name| d.join(name))
                .find(|candidate| candidate.is_file())
        })
    }

    /// Read `explicit` when given, otherwise the file found from
    /// `working_dir` upward. No file at all is the empty configuration.
    pub fn find_and_read(explicit: Option<&Path>, working_dir: &Path) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load(path),
            None => match Self::find(working_dir) {
                Some(path) => Self::load(&path),
                None => Ok(Self::default()),
            },
        }
    }

    /// Rules for an `exec` template key.
    pub fn exec_rules(&self, template_key: &str) -> Result<Vec<Rule>, ConfigError> {
        match self.exec.get(template_key) {
            Some(rules) => Ok(rules.clone()),
            None if template_key == DEFAULT_TEMPLATE_KEY => Ok(vec![default_exec_rule()]),
            None => Err(ConfigError::UnknownTemplateKey(template_key.to_string())),
        }
    }

    /// The rule for a `post` template key.
    pub fn post_rule(&self, template_key: &str) -> Result<Rule, ConfigError> {
        self.post
            .get(template_key)
            .map(PostTemplate::to_rule)
            .ok_or_else(|| ConfigError::UnknownTemplateKey(template_key.to_string()))
    }

    pub fn base_org(&self) -> &str {
        self.base.as_ref().map_or("", |b| b.org.as_str())
    }

    pub fn base_repo(&self) -> &str {
        self.base.as_ref().map_or("", |b| b.repo.as_str())
    }
}
