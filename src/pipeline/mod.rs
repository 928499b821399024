pub mod runner;
pub mod stream;

pub use runner::run_sampler;
pub use stream::{PipelineError, ResultStream};
