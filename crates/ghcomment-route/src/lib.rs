//! ghcomment-route: deciding what to post and where.
//!
//! - [`RuleMatcher`]: first rule whose `when` condition holds
//! - [`UpdateResolver`]: last existing comment satisfying the update condition
//! - [`CommentAssembler`]: rendering, hidden metadata, and the final comment
//! - [`Config`]: the `.ghcomment.yaml` file the rules come from

pub mod assembler;
pub mod config;
pub mod matcher;
pub mod resolver;
pub mod rule;

pub use assembler::{CommentAssembler, Selection};
pub use config::{BaseConfig, Config, PostConfig, PostTemplate, CONFIG_FILE_NAMES};
pub use matcher::RuleMatcher;
pub use resolver::{augment_condition, comment_context, UpdateRequest, UpdateResolver};
pub use rule::{default_exec_rule, Rule, DEFAULT_TEMPLATE_KEY};
