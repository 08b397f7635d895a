pub mod get;
pub mod search;

pub use get::{PromptGetParams, PromptGetTool};
pub use search::{PromptSearchParams, PromptSearchTool};
