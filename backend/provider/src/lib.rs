//! Analysis and generation client.
//!
//! Shapes requests for the hosted model and validates what comes back; it
//! never retries and never classifies errors for the user.

pub mod aspect;
pub mod gemini;
pub mod mock;
pub mod prompts;
pub mod wire;

pub use aspect::{map_aspect_ratio, ProviderAspectRatio};
pub use gemini::GeminiProvider;
pub use mock::{GenerateCall, MockModel};
