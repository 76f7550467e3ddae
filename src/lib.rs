pub mod candidates;
pub mod compare;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod pro_mode;
pub mod progress;
pub mod response;
pub mod server;
pub mod synthesis;
pub mod tools;

pub use config::{Config, GenerationParams};
pub use dispatch::{GenerationRequest, GenerationResult, InferenceClient};
pub use error::{InferenceError, ProModeError};
pub use pro_mode::ProMode;
pub use response::ProModeResult;
