pub mod annotation;
pub mod common;
pub mod document;
pub mod filter;
pub mod label;
pub mod project;
pub mod user_context;

pub use annotation::*;
pub use common::*;
pub use document::*;
pub use filter::*;
pub use label::*;
pub use project::*;
pub use user_context::*;
