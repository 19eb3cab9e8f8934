use sketchnote_core::StructuredNote;

/// Instruction sent alongside the photographed note.
pub const ANALYSIS_INSTRUCTION: &str = "Analyze this hand-drawn note image. \
Extract the main title, a concise summary, the most important key points as a list, \
and suggest visual themes (icons, styles) that would suit a digital sketchnote. \
Also return the full transcribed text. Return the result strictly as a JSON object.";

/// Fixed look of every generated sketchnote.
pub const STYLE_DIRECTIVE: &str = "Style Requirements:
- Pure white background.
- Clean, high-quality line art with a hand-drawn feel, digitally polished.
- Restrained palette: mostly black ink with subtle accents such as yellow or soft blue.
- Legible, neat handwriting-style lettering for all text.
- Simple icons and a structured layout with sections, arrows and banners.
- Vertical composition.";

/// Build the text prompt for the image model.
pub fn generation_prompt(note: &StructuredNote) -> String {
    format!(
        "Create a vertical digital sketchnote infographic based on these notes:\n\
         Title: {}\n\
         Summary: {}\n\
         Key Points: {}\n\n\
         {}",
        note.title,
        note.summary,
        note.key_points.join(", "),
        STYLE_DIRECTIVE
    )
}
