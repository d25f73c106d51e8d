pub mod anonymous_usage;
pub mod background_remover;
pub mod mask;
pub mod pipeline;
pub mod quota;

pub use background_remover::{BackgroundRemover, RemovalError, RemovalOutput};
pub use pipeline::{Caller, ProcessingPipeline, Upload};
pub use quota::QuotaGate;
