//! Workflow controller for the sketchnote wizard.
//!
//! Owns the five-step state machine (setup → import → analyze → beautify →
//! result) and the working data of one run, and drives the two model calls.

pub mod classify;
pub mod controller;
pub mod credential;
pub mod loading;
pub mod snapshot;
pub mod stage;

pub use classify::{
    is_credential_failure, ANALYSIS_FAILED_MESSAGE, CREDENTIAL_ERROR_MARKER,
    CREDENTIAL_FAILED_MESSAGE, GENERATION_FAILED_MESSAGE,
};
pub use controller::{ImportedFile, WorkflowController};
pub use credential::KeySlotCredentials;
pub use loading::{LoadingFlag, LoadingGuard};
pub use snapshot::WorkflowSnapshot;
pub use stage::Stage;
