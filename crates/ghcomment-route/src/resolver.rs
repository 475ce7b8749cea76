//! Update resolution: which existing comment, if any, to edit in place.
//!
//! Unlike rule matching, the LAST qualifying comment in listing order wins.

use ghcomment_core::{
    CommentId, CommitRef, EmbeddedMetadata, ExistingComment, ExistingComments, MetadataScan,
};
use ghcomment_expr::{CompileError, Evaluator, Expr};
use serde_json::{json, Map, Value};
use tracing::{debug, warn, Span};

/// What the resolver needs to know about the comment being posted.
#[derive(Debug, Clone, Copy)]
pub struct UpdateRequest<'a> {
    pub base_condition: &'a str,
    /// The `target` variable as it will be embedded in the new comment.
    pub target: &'a Value,
    pub commit: &'a CommitRef,
    pub variables: &'a Map<String, Value>,
}

pub struct UpdateResolver {
    span: Span,
}

impl UpdateResolver {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    /// Whether resolution can select anything at all for this request.
    pub fn applies(request: &UpdateRequest<'_>) -> bool {
        !request.base_condition.is_empty() && request.commit.is_pull_request()
    }

    /// Id of the comment to edit, or `None` to post a new one.
    ///
    /// Only a malformed update condition is an error; a comment whose
    /// evaluation fails is logged and treated as not matching.
    pub fn resolve(
        &self,
        evaluator: &mut Evaluator,
        request: &UpdateRequest<'_>,
        existing: &ExistingComments,
    ) -> Result<Option<CommentId>, CompileError> {
        if !Self::applies(request) {
            return Ok(None);
        }

        let condition = augment_condition(request.base_condition, request.target);
        let program = evaluator.compile(&condition)?;

        let login = existing.authenticated_login.as_deref().filter(|l| !l.is_empty());
        if login.is_none() {
            debug!(parent: &self.span, "no authenticated login, comments of every author are candidates");
        }

        let mut selected = None;
        for comment in &existing.comments {
            if comment.is_minimized {
                continue;
            }
            if let Some(login) = login {
                if comment.author_login != login {
                    continue;
                }
            }

            let data = comment_context(comment, request.commit, request.variables);
            match program.matches(&data) {
                Ok(true) => {
                    debug!(parent: &self.span, comment_id = %comment.id, "existing comment qualifies for update");
                    selected = Some(comment.id);
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(
                        parent: &self.span,
                        comment_id = %comment.id,
                        condition = %condition,
                        error = %err,
                        "skipping comment whose update condition failed to evaluate"
                    );
                }
            }
        }
        Ok(selected)
    }
}

/// `base` restricted to comments embedding the same `target` variable.
///
/// The target keeps its JSON kind, so a numeric target only matches a
/// numeric embedded one.
pub fn augment_condition(base: &str, target: &Value) -> String {
    format!("({}) && Comment.Meta.Vars.target == {}", base, target_operand(target))
}

/// Scalars the grammar can spell are spliced as literals; anything else is
/// compared through the comment context's own `Vars.target`.
fn target_operand(target: &Value) -> String {
    match target {
        Value::String(_) | Value::Bool(_) | Value::Null => Expr::Literal(target.clone()).to_string(),
        Value::Number(n) if n.is_u64() => n.to_string(),
        _ => "Vars.target".to_string(),
    }
}

/// The evaluation context of one existing comment:
/// `Comment.{Body, Meta, HasMeta}`, `Commit.{Org, Repo, PRNumber, SHA1}`
/// and `Vars`.
pub fn comment_context(
    comment: &ExistingComment,
    commit: &CommitRef,
    variables: &Map<String, Value>,
) -> Value {
    let (meta, has_meta) = match EmbeddedMetadata::scan(&comment.body) {
        MetadataScan::Found(meta) => (meta.to_value(), true),
        MetadataScan::Absent | MetadataScan::Malformed(_) => (Value::Object(Map::new()), false),
    };
    json!({
        "Comment": {
            "Body": comment.body,
            "Meta": meta,
            "HasMeta": has_meta,
        },
        "Commit": commit,
        "Vars": variables,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghcomment_expr::parse_expression;

    #[test]
    fn test_augmented_condition_parses_for_awkward_targets() {
        for target in ["", "lint", "a\"b", "x\\\"; true || \"", "line\nbreak"] {
            let condition = augment_condition("Comment.HasMeta", &json!(target));
            assert!(parse_expression(&condition).is_ok(), "{}", condition);
        }
    }

    #[test]
    fn test_augmented_condition_keeps_target_kind() {
        assert_eq!(
            augment_condition("true", &json!(1)),
            "(true) && Comment.Meta.Vars.target == 1"
        );
        assert_eq!(
            augment_condition("true", &json!(false)),
            "(true) && Comment.Meta.Vars.target == false"
        );
        for target in [json!(-3), json!(2.5e30), json!(["a"]), json!({ "k": 1 })] {
            let condition = augment_condition("true", &target);
            assert!(condition.ends_with("== Vars.target"), "{}", condition);
            assert!(parse_expression(&condition).is_ok(), "{}", condition);
        }
    }

    #[test]
    fn test_comment_context_without_metadata() {
        let comment = ExistingComment::new(1, "bot", "just text");
        let commit = CommitRef::new("acme", "widgets").with_pull_request(2).with_sha("abc");
        let data = comment_context(&comment, &commit, &Map::new());
        assert_eq!(data["Comment"]["HasMeta"], json!(false));
        assert_eq!(data["Comment"]["Meta"], json!({}));
        assert_eq!(data["Commit"]["PRNumber"], json!(2));
        assert_eq!(data["Commit"]["SHA1"], json!("abc"));
    }

    #[test]
    fn test_comment_context_with_metadata() {
        let meta = EmbeddedMetadata::new("abc", "default");
        let comment = ExistingComment::new(1, "bot", format!("body{}", meta.encode()));
        let commit = CommitRef::new("acme", "widgets").with_pull_request(2);
        let data = comment_context(&comment, &commit, &Map::new());
        assert_eq!(data["Comment"]["HasMeta"], json!(true));
        assert_eq!(data["Comment"]["Meta"]["TemplateKey"], json!("default"));
        assert_eq!(data["Comment"]["Meta"]["Vars"], json!({}));
    }
}
