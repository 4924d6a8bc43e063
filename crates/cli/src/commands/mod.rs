//! Command handlers for the Sage CLI.

pub mod ask;
pub mod knowledge;
pub mod train;

pub use ask::AskCommand;
pub use knowledge::KnowledgeCommand;
pub use train::TrainCommand;
