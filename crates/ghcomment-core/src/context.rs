//! Execution Context: everything one invocation knows about the command it
//! ran and where the comment goes.
use crate::data_model::{CommandOutcome, CommitRef};
use serde::Serialize;
use serde_json::{Map, Value};

/// Variable that disambiguates rule sets sharing a pull request.
pub const TARGET_VAR: &str = "target";

/// Built once per invocation, then only read.
///
/// Serializes to the flat schema `when` conditions and templates see:
/// `ExitCode`, `Command`, `JoinCommand`, `Stdout`, `Stderr`,
/// `CombinedOutput`, `PRNumber`, `Org`, `Repo`, `SHA1`, `TemplateKey`,
/// `Template`, `UpdateCondition`, `Vars`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecutionContext {
    pub exit_code: i32,
    pub command: String,
    #[serde(rename = "JoinCommand")]
    pub joined_command: String,
    pub stdout: String,
    pub stderr: String,
    pub combined_output: String,
    #[serde(rename = "PRNumber")]
    pub pull_request_number: u64,
    pub org: String,
    pub repo: String,
    #[serde(rename = "SHA1")]
    pub commit_sha: String,
    pub template_key: String,
    #[serde(rename = "Template")]
    pub explicit_template: String,
    pub update_condition: String,
    #[serde(rename = "Vars")]
    pub variables: Map<String, Value>,
}

impl ExecutionContext {
    pub fn new(commit: CommitRef) -> Self {
        let mut ctx = Self {
            pull_request_number: commit.pull_request_number,
            org: commit.org,
            repo: commit.repo,
            commit_sha: commit.sha,
            ..Default::default()
        };
        ctx.ensure_target();
        ctx
    }

    pub fn with_outcome(mut self, outcome: CommandOutcome) -> Self {
        self.exit_code = outcome.exit_code;
        self.command = outcome.command;
        self.joined_command = outcome.joined_command;
        self.stdout = outcome.stdout;
        self.stderr = outcome.stderr;
        self.combined_output = outcome.combined_output;
        self
    }

    pub fn with_template_key(mut self, key: impl Into<String>) -> Self {
        self.template_key = key.into();
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.explicit_template = template.into();
        self
    }

    pub fn with_update_condition(mut self, condition: impl Into<String>) -> Self {
        self.update_condition = condition.into();
        self
    }

    /// Replace the variables; `target` is filled in when absent.
    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = variables;
        self.ensure_target();
        self
    }

    fn ensure_target(&mut self) {
        let missing = self
            .variables
            .get(TARGET_VAR)
            .map_or(true, Value::is_null);
        if missing {
            self.variables
                .insert(TARGET_VAR.to_string(), Value::String(String::new()));
        }
    }

    /// The target variable with its JSON kind intact; `""` when unset.
    pub fn target(&self) -> Value {
        match self.variables.get(TARGET_VAR) {
            Some(Value::Null) | None => Value::String(String::new()),
            Some(value) => value.clone(),
        }
    }

    pub fn commit(&self) -> CommitRef {
        CommitRef {
            org: self.org.clone(),
            repo: self.repo.clone(),
            pull_request_number: self.pull_request_number,
            sha: self.commit_sha.clone(),
        }
    }

    /// The flat evaluation/render view.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn commit() -> CommitRef {
        CommitRef::new("acme", "widgets").with_pull_request(7).with_sha("abc")
    }

    #[test]
    fn test_target_defaults_to_empty() {
        let ctx = ExecutionContext::new(commit());
        assert_eq!(ctx.variables.get(TARGET_VAR), Some(&json!("")));

        let ctx = ctx.with_variables(Map::new());
        assert_eq!(ctx.target(), json!(""));
    }

    #[test]
    fn test_explicit_target_is_kept() {
        let mut vars = Map::new();
        vars.insert("target".into(), json!("lint"));
        let ctx = ExecutionContext::new(commit()).with_variables(vars);
        assert_eq!(ctx.target(), json!("lint"));

        let mut vars = Map::new();
        vars.insert("target".into(), json!(1));
        let ctx = ExecutionContext::new(commit()).with_variables(vars);
        assert_eq!(ctx.target(), json!(1));
    }

    #[test]
    fn test_flat_schema_names() {
        let ctx = ExecutionContext::new(commit())
            .with_outcome(CommandOutcome {
                exit_code: 2,
                command: "make".into(),
                joined_command: "make test".into(),
                ..Default::default()
            })
            .with_template_key("default");
        let value = ctx.to_value();
        assert_eq!(value["ExitCode"], json!(2));
        assert_eq!(value["JoinCommand"], json!("make test"));
        assert_eq!(value["PRNumber"], json!(7));
        assert_eq!(value["SHA1"], json!("abc"));
        assert_eq!(value["TemplateKey"], json!("default"));
        assert_eq!(value["Vars"]["target"], json!(""));
    }
}
