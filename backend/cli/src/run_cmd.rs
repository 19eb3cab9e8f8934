use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;

use sketchnote_config::SketchnoteConfig;
use sketchnote_core::{
    detect_mime_type, AspectRatio, CredentialProvider, ImageSize, NoteModel, SettingsPatch, Step,
    StructuredNote,
};
use sketchnote_workflow::{ImportedFile, WorkflowController};

use crate::selector::StdinKeySelector;
use crate::session::{initial_key, model_factory};

const FALLBACK_FILE_NAME: &str = "sketchnote_beautified.png";

/// Options for a one-shot run.
pub struct RunOptions {
    pub image: PathBuf,
    pub aspect_ratio: Option<AspectRatio>,
    pub image_size: Option<ImageSize>,
    /// Output file; defaults to the note's download name in the current directory.
    pub out: Option<PathBuf>,
}

/// Walk one photo through the whole wizard from the terminal.
pub async fn run(config: &SketchnoteConfig, options: RunOptions) -> Result<PathBuf> {
    let key = initial_key(&config.provider);
    let model = model_factory(&config.provider)(key.clone());
    let credentials = Arc::new(StdinKeySelector::new(key));
    run_with(model, credentials, config, options).await
}

pub async fn run_with(
    model: Arc<dyn NoteModel>,
    credentials: Arc<dyn CredentialProvider>,
    config: &SketchnoteConfig,
    options: RunOptions,
) -> Result<PathBuf> {
    let mut controller = WorkflowController::new(model, credentials).with_settings(config.defaults);

    if controller.check_entry_point().await == Step::Setup
        && controller.select_credential().await == Step::Setup
    {
        bail!("No API key selected");
    }

    let bytes = tokio::fs::read(&options.image)
        .await
        .with_context(|| format!("Failed to read {}", options.image.display()))?;
    controller.import_image(Some(ImportedFile::new(
        bytes,
        detect_mime_type(&options.image),
    )));

    eprintln!("Analyzing {}...", options.image.display());
    if controller.run_analysis().await != Step::Beautify {
        bail!(failure(&controller));
    }
    if let Some(note) = controller.note() {
        print_note(note);
    }

    let settings = controller.update_settings(SettingsPatch {
        aspect_ratio: options.aspect_ratio,
        image_size: options.image_size,
    });
    eprintln!(
        "Generating {} sketchnote at {}...",
        settings.aspect_ratio, settings.image_size
    );
    if controller.run_generation().await != Step::Result {
        bail!(failure(&controller));
    }

    let (image, file_name) = match (controller.generated_image(), controller.download_file_name()) {
        (Some(image), Some(name)) => (image, name),
        _ => bail!("Generation finished without an image"),
    };
    let out = options.out.unwrap_or_else(|| default_output_path(&file_name));
    write_image(&out, &image.to_bytes()?).await?;
    info!(path = %out.display(), "Sketchnote saved");
    Ok(out)
}

/// Save location in the current directory. Only the final component of the
/// name is used, so a title can never steer the write elsewhere.
fn default_output_path(file_name: &str) -> PathBuf {
    Path::new(file_name)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(FALLBACK_FILE_NAME))
}

fn failure(controller: &WorkflowController) -> String {
    controller
        .error()
        .unwrap_or("The workflow stopped unexpectedly")
        .to_string()
}

fn print_note(note: &StructuredNote) {
    println!("{}", note.title);
    println!();
    println!("{}", note.summary);
    println!();
    for point in &note.key_points {
        println!("  - {point}");
    }
    if !note.visual_themes.is_empty() {
        println!();
        println!("Themes: {}", note.visual_themes.join(", "));
    }
    println!();
}

async fn write_image(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
