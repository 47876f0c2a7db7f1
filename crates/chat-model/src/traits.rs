use crate::{ChatRequest, Result};

pub trait ChatModel: Send + Sync {
    /// Produce one completion for `request`. May block for a long time.
    fn complete(&self, request: &ChatRequest) -> Result<String>;

    fn name(&self) -> &str;
}
