//! Comment assembly: pick a template, render it, embed metadata and attach
//! the comment to edit.

use std::collections::BTreeMap;

use ghcomment_core::{
    CommentError, EmbeddedMetadata, ExecutionContext, ExistingComments, Renderer, ResolvedComment,
};
use ghcomment_expr::Evaluator;
use serde_json::Map;
use tracing::{debug, Span};

use crate::matcher::RuleMatcher;
use crate::resolver::{UpdateRequest, UpdateResolver};
use crate::rule::{with_target, Rule};

/// The template chosen for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub template: String,
    pub template_for_too_long: String,
    pub update_condition: String,
    /// Always contains `target`.
    pub embedded_var_names: Vec<String>,
}

impl Selection {
    /// A literal template given by the caller, outside any rule.
    pub fn literal(template: impl Into<String>, update_condition: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            template_for_too_long: String::new(),
            update_condition: update_condition.into(),
            embedded_var_names: with_target(&[]),
        }
    }

    /// `rule` applied with `fallback_condition` when it declares none.
    pub fn from_rule(rule: &Rule, fallback_condition: &str) -> Self {
        let update_condition = if rule.update_condition.is_empty() {
            fallback_condition.to_string()
        } else {
            rule.update_condition.clone()
        };
        Self {
            template: rule.template.clone(),
            template_for_too_long: rule.template_for_too_long.clone(),
            update_condition,
            embedded_var_names: rule.embedded_variable_names(),
        }
    }
}

pub struct CommentAssembler {
    renderer: Box<dyn Renderer>,
    evaluator: Evaluator,
    matcher: RuleMatcher,
    resolver: UpdateResolver,
    span: Span,
}

impl CommentAssembler {
    pub fn new(renderer: Box<dyn Renderer>, span: Span) -> Self {
        Self {
            renderer,
            evaluator: Evaluator::new(),
            matcher: RuleMatcher::new(span.clone()),
            resolver: UpdateResolver::new(span.clone()),
            span,
        }
    }

    /// Decide what to post. `None` means post nothing: no rule matched, or
    /// the matching rule suppresses commenting.
    ///
    /// A non-empty `explicit_template` on the context skips rule matching.
    pub fn select(
        &mut self,
        rules: &[Rule],
        context: &ExecutionContext,
    ) -> Result<Option<Selection>, CommentError> {
        if !context.explicit_template.is_empty() {
            return Ok(Some(Selection::literal(
                context.explicit_template.clone(),
                context.update_condition.clone(),
            )));
        }

        let rule = match self.matcher.find(&mut self.evaluator, rules, context)? {
            Some(rule) => rule,
            None => {
                debug!(parent: &self.span, rules = rules.len(), "no rule matched");
                return Ok(None);
            }
        };
        if rule.suppress_comment {
            debug!(parent: &self.span, when = %rule.condition, "matched rule suppresses the comment");
            return Ok(None);
        }
        Ok(Some(Selection::from_rule(rule, &context.update_condition)))
    }

    /// Whether [`assemble_selection`](Self::assemble_selection) will look at
    /// existing comments, so callers only fetch them when needed.
    pub fn needs_existing_comments(selection: &Selection, context: &ExecutionContext) -> bool {
        !selection.update_condition.is_empty() && context.pull_request_number != 0
    }

    pub fn assemble_selection(
        &mut self,
        selection: &Selection,
        context: &ExecutionContext,
        snippets: &BTreeMap<String, String>,
        existing: &ExistingComments,
    ) -> Result<ResolvedComment, CommentError> {
        let data = context.to_value();
        let body = self.renderer.render(&selection.template, snippets, &data)?;
        let body_for_too_long = self
            .renderer
            .render(&selection.template_for_too_long, snippets, &data)?;

        let mut embedded = Map::new();
        for name in &selection.embedded_var_names {
            if let Some(value) = context.variables.get(name) {
                embedded.insert(name.clone(), value.clone());
            }
        }
        let marker = EmbeddedMetadata::new(context.commit_sha.clone(), context.template_key.clone())
            .with_variables(embedded)
            .encode();

        let commit = context.commit();
        let target = context.target();
        let existing_comment_id = if Self::needs_existing_comments(selection, context) {
            let request = UpdateRequest {
                base_condition: &selection.update_condition,
                target: &target,
                commit: &commit,
                variables: &context.variables,
            };
            self.resolver.resolve(&mut self.evaluator, &request, existing)?
        } else {
            None
        };

        Ok(ResolvedComment {
            org: commit.org,
            repo: commit.repo,
            pull_request_number: commit.pull_request_number,
            commit_sha: commit.sha,
            body: body + &marker,
            body_for_too_long: body_for_too_long + &marker,
            template_key: context.template_key.clone(),
            variables: context.variables.clone(),
            existing_comment_id,
        })
    }

    /// Select and assemble in one step.
    pub fn assemble(
        &mut self,
        rules: &[Rule],
        context: &ExecutionContext,
        snippets: &BTreeMap<String, String>,
        existing: &ExistingComments,
    ) -> Result<Option<ResolvedComment>, CommentError> {
        match self.select(rules, context)? {
            Some(selection) => self
                .assemble_selection(&selection, context, snippets, existing)
                .map(Some),
            None => Ok(None),
        }
    }
}
