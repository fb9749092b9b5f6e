//! The engine layer: one long-running UCI
//! subprocess per [`session::EngineSession`], pooled and scheduled by
//! [`pool::EnginePool`].

pub mod pool;
pub mod session;
pub mod types;

pub use pool::EnginePool;
pub use session::EngineSession;
pub use types::{EngineError, EngineResult, EngineState};
