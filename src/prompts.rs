//! Generation modes and their instruction templates.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — tweaking a mode's behaviour (citation
//!    format, output structure) is an edit in exactly one place.
//! 2. **Testability** — unit tests inspect templates and id mapping without
//!    a completion service in the loop.
//!
//! [`UseCase`] is a closed enum: every mode is bound 1:1 to a static
//! template at compile time, and id lookup is an exhaustive match — there
//! is no runtime registry and no silent fallback for unknown ids.

use serde::Serialize;

/// A named generation mode with a fixed instruction template.
///
/// Ids (used on the wire and the CLI) are case-sensitive
/// SCREAMING_SNAKE_CASE; display names are human-facing. Declaration order
/// here is the presentation order returned by
/// [`crate::Lectern::list_use_cases`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UseCase {
    StudyGuide,
    ExampleQuestions,
    FlashcardCreation,
    ConceptExplanations,
    EssayOutline,
    LectureSummaries,
    Proofreading,
}

/// One row of the use-case listing: `{ id, name }`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UseCaseInfo {
    pub id: &'static str,
    pub name: &'static str,
}

impl UseCase {
    /// All modes, in presentation order.
    pub const ALL: [UseCase; 7] = [
        UseCase::StudyGuide,
        UseCase::ExampleQuestions,
        UseCase::FlashcardCreation,
        UseCase::ConceptExplanations,
        UseCase::EssayOutline,
        UseCase::LectureSummaries,
        UseCase::Proofreading,
    ];

    /// Resolve a case-sensitive mode id. Unknown ids resolve to `None` —
    /// callers surface [`crate::LecternError::UnknownUseCase`], they never
    /// fall back to a default mode.
    pub fn from_id(id: &str) -> Option<UseCase> {
        match id {
            "STUDY_GUIDE" => Some(UseCase::StudyGuide),
            "EXAMPLE_QUESTIONS" => Some(UseCase::ExampleQuestions),
            "FLASHCARD_CREATION" => Some(UseCase::FlashcardCreation),
            "CONCEPT_EXPLANATIONS" => Some(UseCase::ConceptExplanations),
            "ESSAY_OUTLINE" => Some(UseCase::EssayOutline),
            "LECTURE_SUMMARIES" => Some(UseCase::LectureSummaries),
            "PROOFREADING" => Some(UseCase::Proofreading),
            _ => None,
        }
    }

    /// The wire/CLI identifier.
    pub fn id(&self) -> &'static str {
        match self {
            UseCase::StudyGuide => "STUDY_GUIDE",
            UseCase::ExampleQuestions => "EXAMPLE_QUESTIONS",
            UseCase::FlashcardCreation => "FLASHCARD_CREATION",
            UseCase::ConceptExplanations => "CONCEPT_EXPLANATIONS",
            UseCase::EssayOutline => "ESSAY_OUTLINE",
            UseCase::LectureSummaries => "LECTURE_SUMMARIES",
            UseCase::Proofreading => "PROOFREADING",
        }
    }

    /// The human-facing name.
    pub fn display_name(&self) -> &'static str {
        match self {
            UseCase::StudyGuide => "Study Guide",
            UseCase::ExampleQuestions => "Example Questions",
            UseCase::FlashcardCreation => "Flashcard Creation",
            UseCase::ConceptExplanations => "Concept Explanations",
            UseCase::EssayOutline => "Essay Outline",
            UseCase::LectureSummaries => "Lecture Summaries",
            UseCase::Proofreading => "Proofreading",
        }
    }

    /// The static instruction template for this mode.
    pub fn instruction(&self) -> &'static str {
        match self {
            UseCase::StudyGuide => STUDY_GUIDE,
            UseCase::ExampleQuestions => EXAMPLE_QUESTIONS,
            UseCase::FlashcardCreation => FLASHCARD_CREATION,
            UseCase::ConceptExplanations => CONCEPT_EXPLANATIONS,
            UseCase::EssayOutline => ESSAY_OUTLINE,
            UseCase::LectureSummaries => LECTURE_SUMMARIES,
            UseCase::Proofreading => PROOFREADING,
        }
    }

    /// The complete system instruction: template plus [`SYSTEM_NOTE`].
    pub fn system_instruction(&self) -> String {
        format!("{}{}", self.instruction(), SYSTEM_NOTE)
    }

    /// The listing row for this mode.
    pub fn info(&self) -> UseCaseInfo {
        UseCaseInfo {
            id: self.id(),
            name: self.display_name(),
        }
    }
}

/// Fixed prefix framing the assembled document context as the user message.
pub const CONTEXT_PREAMBLE: &str = "User uploaded class content:\n-----\n";

/// Build the user-role message from assembled context.
pub fn user_message(context: &str) -> String {
    format!("{CONTEXT_PREAMBLE}{context}")
}

/// Formatting note appended to every system instruction.
///
/// Kept separate from the per-mode templates so a rendering-level change
/// (e.g. the LaTeX delimiter convention) touches one constant.
pub const SYSTEM_NOTE: &str = r#"
---

Important note about equations, and LaTeX in general:
- Use "$$" to delimit LaTeX expressions, e.g. "$$x^2$$" for x squared, or
  $$6 \text{CO}_2 + 6 \text{H}_2\text{O} + \text{light energy} \rightarrow \text{C}_6\text{H}_{12}\text{O}_6 + 6 \text{O}_2$$ for photosynthesis.

---
"#;

// ── Per-mode templates ───────────────────────────────────────────────────────
//
// Every template asks for inline citations in the form
// "(source: [DocumentName] Page X)", matching the tags the extractor puts on
// each segment, with "(source: not found in materials)" as the honest
// fallback.

const STUDY_GUIDE: &str = r#"You are an expert educator skilled at creating detailed and easy-to-understand study guides. Given a specific topic, create a markdown-formatted study guide with clearly organized sections using headings (`#`, `##`, `###`). Include:
- Key concepts with definitions.
- Formulas presented in code blocks or inline code.
- Bullet points or numbered lists for clarity.
- **Important terms** highlighted in bold or *italics*.
- Examples to illustrate concepts or applications where relevant.
When providing information, include inline references using the format "(source: [DocumentName] Page X)". If you're unsure where the information came from, use "(source: not found in materials)". Keep the guide concise yet comprehensive, catering to students who need both a quick review and deeper insights."#;

const EXAMPLE_QUESTIONS: &str = r#"You are a seasoned educator experienced in crafting diverse and challenging example questions. For a given topic, produce a markdown-formatted list of questions that cover:
1. Multiple difficulty levels (easy, medium, hard).
2. Various formats such as multiple-choice, short-answer, and essay questions.
After each question, provide:
- The correct answer.
- A detailed explanation to enhance understanding.
Include inline references using the format "(source: [DocumentName] Page X)" or "(source: not found in materials)". Use collapsible sections or spoiler tags (if supported) for answers and explanations. Apply LaTeX for mathematical expressions and code blocks for technical or coding questions."#;

const FLASHCARD_CREATION: &str = r#"You are a skilled tutor focused on creating flashcards optimized for student memorization and learning. For the provided topic, generate flashcards in markdown format where:
- Each flashcard has a **Question/Term** presented as bold or a heading.
- The **Answer/Definition** follows beneath it.
- Flashcards are separated by horizontal rules (`---`) for readability.
For each flashcard, include a reference to the source material using "(source: [DocumentName] Page X)" or "(source: not found in materials)" if unsure."#;

const CONCEPT_EXPLANATIONS: &str = r#"You are an expert at explaining academic concepts in simple and relatable terms. For the given topic:
1. Provide a markdown-formatted explanation, breaking it down into manageable parts with clear headings and subheadings.
2. Use bullet points, numbered lists, and *italics* to emphasize key elements.
3. Include real-life examples, analogies, or applications for better understanding.
4. Utilize code blocks or describe images when they aid in illustrating the concept.
When referencing specific information, include "(source: [DocumentName] Page X)" or "(source: not found in materials)" if unsure. The explanation should be engaging and accessible, targeting students who may struggle with complex ideas."#;

const ESSAY_OUTLINE: &str = r#"You are an experienced academic advisor who helps students plan and structure essays. For a given essay topic, create a markdown-formatted outline, organized as follows:
- **Introduction**: Thesis statement and an overview of the essay's purpose.
- **Body**: Main arguments with supporting evidence for each.
- **Conclusion**: Restatement of the thesis and a summary of key points.
When citing supporting evidence, use "(source: [DocumentName] Page X)" or "(source: not found in materials)" if unsure. This ensures the structure is logical and easy to follow."#;

const LECTURE_SUMMARIES: &str = r#"You are a skilled summarizer adept at distilling lecture content into concise and clear markdown summaries. For the provided lecture notes or materials:
1. Identify the main ideas, arguments, and conclusions.
2. Organize the summary with clear headings and subheadings.
3. Highlight key points using bullet points or numbered lists.
4. Use **bold** or *italics* to emphasize crucial terms or concepts.
Include inline references to source material using "(source: [DocumentName] Page X)" or "(source: not found in materials)" if unsure. The summary should be focused, easy to review, and suitable for quick recall."#;

const PROOFREADING: &str = r#"You are a professional proofreader with expertise in refining academic writing. When given a piece of text:
1. Review it thoroughly for grammar, spelling, punctuation, and style errors.
2. Provide the corrected text in markdown format with:
   - **Additions** highlighted in bold.
   - Removed text indicated with strikethroughs.
3. Add brief comments or suggestions (in italics or as footnotes) to improve clarity, coherence, or readability.
For each correction or suggested change, use "(source: [DocumentName] Page X)" or "(source: not found in materials)" if unsure. This maintains the original intent while improving quality."#;
