//! ghcomment Core: Data Model, Embedded Metadata, Errors and Collaborators
//!
//! Shared types for the comment router. Nothing here performs I/O.

pub mod collaborator;
pub mod context;
pub mod data_model;
pub mod error;
pub mod metadata;

pub use collaborator::{BestEffort, CiDetector, CommandExecutor, CommentTransport, Renderer};
pub use context::{ExecutionContext, TARGET_VAR};
pub use data_model::{
    CommandOutcome, CommentId, CommitRef, ExistingComment, ExistingComments, ResolvedComment,
    MAX_COMMENT_CHARS,
};
pub use error::{CommentError, ConfigError, ExecError, RenderError, TransportError};
pub use metadata::{EmbeddedMetadata, MetadataScan};
