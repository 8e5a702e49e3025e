//! Answer generation capability and prompt template.

use async_trait::async_trait;

use crate::error::GenerationError;

/// Opaque prompt → text capability.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4-turbo"`).
    fn model_name(&self) -> &str;

    /// Complete a prompt.
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Build the grounded legal-assistant prompt from assembled context.
pub fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "You are a legal expert assistant. Answer the following question based on the provided legal documents.\n\
         \n\
         LEGAL CONTEXT:\n\
         {context}\n\
         \n\
         QUESTION:\n\
         {query}\n\
         \n\
         Provide a detailed and accurate answer based solely on the information in the provided legal context.\n\
         If the context doesn't contain enough information to answer the question, say so.\n"
    )
}
