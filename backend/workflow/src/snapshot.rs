use serde::{Deserialize, Serialize};

use sketchnote_core::{GenerationSettings, Step, StructuredNote};

/// Read-only projection of a workflow, everything a view needs to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSnapshot {
    pub step: Step,
    pub step_label: String,
    pub progress_index: Option<usize>,
    pub settings: GenerationSettings,
    pub note: Option<StructuredNote>,
    pub error: Option<String>,
    pub loading: bool,
    pub has_source_image: bool,
    pub has_generated_image: bool,
    pub download_file_name: Option<String>,
}
