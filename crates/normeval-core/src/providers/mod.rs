pub mod judgment;
pub mod llm;
