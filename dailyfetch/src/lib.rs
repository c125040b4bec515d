// Library interface for dailyfetch modules
// Tests and the binary import the pipeline from here

pub mod error;
pub mod llm;
pub mod mcp;
pub mod news;
pub mod orchestrator;
pub mod server;

pub use error::{DailyFetchError, DailyFetchResult};
