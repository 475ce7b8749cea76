//! Rule matching: first rule whose `when` holds.

use ghcomment_core::ExecutionContext;
use ghcomment_expr::{Evaluator, ExprError};
use tracing::{debug, Span};

use crate::rule::Rule;

pub struct RuleMatcher {
    span: Span,
}

impl RuleMatcher {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    /// The first rule whose condition is true, or `None`.
    ///
    /// Later rules are never evaluated once one matches. A condition that
    /// fails to compile or evaluate aborts matching.
    pub fn find<'r>(
        &self,
        evaluator: &mut Evaluator,
        rules: &'r [Rule],
        context: &ExecutionContext,
    ) -> Result<Option<&'r Rule>, ExprError> {
        let data = context.to_value();
        for (index, rule) in rules.iter().enumerate() {
            let matched = evaluator.matches(&rule.condition, &data)?;
            debug!(parent: &self.span, index, when = %rule.condition, matched, "evaluated rule");
            if matched {
                return Ok(Some(rule));
            }
        }
        Ok(None)
    }
}
