pub mod config;
pub mod error;
pub mod export;
pub mod frontmatter;
pub mod reconcile;
pub mod runtime;
pub mod slug;
pub mod source;
