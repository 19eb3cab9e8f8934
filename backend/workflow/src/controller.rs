use std::sync::Arc;

use tracing::{error, info, warn};

use sketchnote_core::{
    CredentialProvider, GeneratedImage, GenerationSettings, NoteModel, SettingsPatch,
    SourceImage, Step, StructuredNote,
};

use crate::classify::{
    ANALYSIS_FAILED_MESSAGE, CREDENTIAL_FAILED_MESSAGE, GENERATION_FAILED_MESSAGE,
    is_credential_failure,
};
use crate::loading::LoadingFlag;
use crate::snapshot::WorkflowSnapshot;
use crate::stage::Stage;

/// A file picked by the user, read fully into memory.
#[derive(Debug, Clone)]
pub struct ImportedFile {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImportedFile {
    pub fn new(bytes: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// One run of the wizard.
///
/// Every operation returns the step that is active afterwards. Model failures
/// never escape: they become a user-facing message in [`error`](Self::error)
/// and are logged with their full cause chain.
pub struct WorkflowController {
    stage: Stage,
    settings: GenerationSettings,
    error: Option<String>,
    loading: LoadingFlag,
    model: Arc<dyn NoteModel>,
    credentials: Arc<dyn CredentialProvider>,
}

impl WorkflowController {
    pub fn new(model: Arc<dyn NoteModel>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            stage: Stage::Setup,
            settings: GenerationSettings::default(),
            error: None,
            loading: LoadingFlag::new(),
            model,
            credentials,
        }
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn step(&self) -> Step {
        self.stage.step()
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn settings(&self) -> GenerationSettings {
        self.settings
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_set()
    }

    /// A handle on the loading flag that stays readable while a call is awaited.
    pub fn loading_flag(&self) -> LoadingFlag {
        self.loading.clone()
    }

    pub fn source_image(&self) -> Option<&SourceImage> {
        self.stage.source()
    }

    pub fn note(&self) -> Option<&StructuredNote> {
        self.stage.note()
    }

    pub fn generated_image(&self) -> Option<&GeneratedImage> {
        self.stage.generated()
    }

    /// Save-as name for the generated image, once there is one.
    pub fn download_file_name(&self) -> Option<String> {
        match &self.stage {
            Stage::Result { note, .. } => Some(note.download_file_name()),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        let step = self.step();
        WorkflowSnapshot {
            step,
            step_label: step.label().to_string(),
            progress_index: step.progress_index(),
            settings: self.settings,
            note: self.note().cloned(),
            error: self.error.clone(),
            loading: self.is_loading(),
            has_source_image: self.source_image().is_some(),
            has_generated_image: self.generated_image().is_some(),
            download_file_name: self.download_file_name(),
        }
    }

    /// Pick the first step: `Import` if a key is already selected, else `Setup`.
    pub async fn check_entry_point(&mut self) -> Step {
        if self.stage != Stage::Setup {
            return self.step();
        }
        if self.credentials.has_selected_credential().await {
            info!("Provider key already selected; starting at import");
            self.stage = Stage::Import;
        }
        self.step()
    }

    /// Open the key picker and move on to `Import`.
    ///
    /// Success of the picker is taken as a selected key; nothing re-checks it.
    pub async fn select_credential(&mut self) -> Step {
        if self.stage != Stage::Setup {
            warn!(step = %self.step(), "Credential selection requested outside setup; ignoring");
            return self.step();
        }
        match self.credentials.open_selector().await {
            Ok(()) => {
                info!("Key selector completed");
                self.stage = Stage::Import;
            }
            Err(e) => error!(error = %format!("{e:#}"), "Failed to open key selector"),
        }
        self.step()
    }

    /// Take a user-selected file and move to `Analyze`. `None` (no file
    /// chosen) leaves everything untouched.
    pub fn import_image(&mut self, file: Option<ImportedFile>) -> Step {
        let Some(file) = file else {
            return self.step();
        };
        let source = SourceImage::from_bytes(&file.bytes, file.mime_type);
        info!(
            mime = %source.data_uri().mime_type(),
            bytes = file.bytes.len(),
            "Imported note image"
        );
        self.stage = Stage::Analyze { source, note: None };
        self.step()
    }

    /// Send the imported photo for analysis. Only valid in `Analyze`.
    pub async fn run_analysis(&mut self) -> Step {
        let Stage::Analyze { source, .. } = &self.stage else {
            warn!(step = %self.step(), "Analysis requested without an imported image; ignoring");
            return self.step();
        };
        let source = source.clone();

        let Some(_busy) = self.loading.try_acquire() else {
            warn!("A model call is already in flight; ignoring analysis request");
            return self.step();
        };
        self.error = None;

        match self.model.analyze(&source).await {
            Ok(note) => {
                info!(
                    provider = %self.model.name(),
                    title = %note.title,
                    key_points = note.key_points.len(),
                    "Note analyzed"
                );
                self.stage = Stage::Beautify { source, note };
            }
            Err(e) => {
                error!(provider = %self.model.name(), error = %format!("{e:#}"), "Analysis failed");
                self.error = Some(ANALYSIS_FAILED_MESSAGE.to_string());
            }
        }
        self.step()
    }

    /// Merge new output settings.
    pub fn update_settings(&mut self, patch: SettingsPatch) -> GenerationSettings {
        if self.step() != Step::Beautify {
            warn!(step = %self.step(), "Settings changed outside the beautify step");
        }
        self.settings.apply(patch);
        self.settings
    }

    /// Render the sketchnote from the analyzed note. Only valid in `Beautify`.
    pub async fn run_generation(&mut self) -> Step {
        let Stage::Beautify { source, note } = &self.stage else {
            warn!(step = %self.step(), "Generation requested without an analyzed note; ignoring");
            return self.step();
        };
        let (source, note) = (source.clone(), note.clone());

        let Some(_busy) = self.loading.try_acquire() else {
            warn!("A model call is already in flight; ignoring generation request");
            return self.step();
        };
        self.error = None;

        match self.model.generate(&note, &self.settings).await {
            Ok(image) => {
                info!(
                    provider = %self.model.name(),
                    aspect_ratio = %self.settings.aspect_ratio,
                    image_size = %self.settings.image_size,
                    "Sketchnote generated"
                );
                self.stage = Stage::Result {
                    source,
                    note,
                    image,
                };
            }
            Err(e) if is_credential_failure(&e) => {
                error!(provider = %self.model.name(), error = %format!("{e:#}"), "Generation rejected the provider key");
                self.error = Some(CREDENTIAL_FAILED_MESSAGE.to_string());
                self.stage = Stage::Setup;
            }
            Err(e) => {
                error!(provider = %self.model.name(), error = %format!("{e:#}"), "Generation failed");
                self.error = Some(GENERATION_FAILED_MESSAGE.to_string());
            }
        }
        self.step()
    }

    /// `Beautify` → `Analyze`, keeping the note until it is re-analyzed.
    pub fn back_to_preview(&mut self) -> Step {
        match std::mem::take(&mut self.stage) {
            Stage::Beautify { source, note } => {
                self.stage = Stage::Analyze {
                    source,
                    note: Some(note),
                };
            }
            other => {
                warn!(step = %other.step(), "Back requested outside the beautify step; ignoring");
                self.stage = other;
            }
        }
        self.step()
    }

    /// Abandon the imported photo from `Analyze`.
    pub fn cancel(&mut self) -> Step {
        if self.step() != Step::Analyze {
            warn!(step = %self.step(), "Cancel requested outside the analyze step; ignoring");
            return self.step();
        }
        self.reset()
    }

    /// Drop all working data and return to `Import`. Output settings and
    /// the selected key are kept.
    pub fn reset(&mut self) -> Step {
        self.stage = Stage::Import;
        self.error = None;
        info!("Workflow reset");
        self.step()
    }
}
