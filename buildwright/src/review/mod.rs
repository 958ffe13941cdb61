//! Pull-request assistants: per-file code review and a chat reply, both
//! posted back as pull-request comments.

mod chat;
mod code_review;

pub use chat::{ChatAssistant, ChatOutcome, DEFAULT_MESSAGE};
pub use code_review::{CodeReviewer, FileReview, ReviewVerdict};
