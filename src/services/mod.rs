//! Business logic services.
//!
//! Services orchestrate storage backends and provide high-level operations.

mod assembler;
mod orchestrator;

pub use assembler::ContextAssembler;
pub use orchestrator::MemoryOrchestrator;
