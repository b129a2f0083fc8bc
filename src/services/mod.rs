pub mod book;
pub mod catalog;
pub mod cover;
pub mod document;
pub mod llm;
pub mod pipeline;
pub mod retry;
pub mod storage;

#[cfg(test)]
pub mod testing;
