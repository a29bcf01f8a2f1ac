pub mod gemini;
pub mod kv_file;
pub mod kv_memory;
pub mod mock_llm;

pub use gemini::GeminiAdapter;
pub use kv_file::FileKvAdapter;
pub use kv_memory::MemoryKvAdapter;
pub use mock_llm::MockGeneratorAdapter;
