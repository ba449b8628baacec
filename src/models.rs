use serde::{Deserialize, Serialize};

use crate::errors::ErrorKind;

/// The four question types recognized by the importer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    TrueFalse,
    Essay,
    Calculation,
}

impl QuestionType {
    /// The Chinese type label used in block headers (`<label>ID: <id>`).
    pub fn label(&self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "单选题",
            QuestionType::TrueFalse => "是非题",
            QuestionType::Essay => "论述题",
            QuestionType::Calculation => "计算题",
        }
    }

    /// The `question_id` prefix that must accompany this type.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "sc_",
            QuestionType::TrueFalse => "tf_",
            QuestionType::Essay => "es_",
            QuestionType::Calculation => "calc_",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "单选题" => Some(QuestionType::SingleChoice),
            "是非题" => Some(QuestionType::TrueFalse),
            "论述题" => Some(QuestionType::Essay),
            "计算题" => Some(QuestionType::Calculation),
            _ => None,
        }
    }

    pub fn all() -> [QuestionType; 4] {
        [
            QuestionType::SingleChoice,
            QuestionType::TrueFalse,
            QuestionType::Essay,
            QuestionType::Calculation,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "single_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::Essay => "essay",
            QuestionType::Calculation => "calculation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "single_choice" => Some(QuestionType::SingleChoice),
            "true_false" => Some(QuestionType::TrueFalse),
            "essay" => Some(QuestionType::Essay),
            "calculation" => Some(QuestionType::Calculation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Accepts both the English vocabulary and the Chinese spellings that
    /// appear in authored documents.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "easy" | "简单" | "容易" => Some(Difficulty::Easy),
            "medium" | "中等" | "中" => Some(Difficulty::Medium),
            "hard" | "困难" | "难" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// Derived from field presence, never read from input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Zh,
    En,
    Both,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Zh => "zh",
            Language::En => "en",
            Language::Both => "both",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "zh" => Some(Language::Zh),
            "en" => Some(Language::En),
            "both" => Some(Language::Both),
            _ => None,
        }
    }
}

/// Answer letter for a single-choice question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionLetter {
    A,
    B,
    C,
    D,
}

impl OptionLetter {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "A" => Some(OptionLetter::A),
            "B" => Some(OptionLetter::B),
            "C" => Some(OptionLetter::C),
            "D" => Some(OptionLetter::D),
            _ => None,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            OptionLetter::A => 0,
            OptionLetter::B => 1,
            OptionLetter::C => 2,
            OptionLetter::D => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OptionLetter::A => "A",
            OptionLetter::B => "B",
            OptionLetter::C => "C",
            OptionLetter::D => "D",
        }
    }

    pub fn all() -> [OptionLetter; 4] {
        [
            OptionLetter::A,
            OptionLetter::B,
            OptionLetter::C,
            OptionLetter::D,
        ]
    }
}

/// True/false answer, strictly `T` or `F` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrueFalseAnswer {
    T,
    F,
}

impl TrueFalseAnswer {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "T" => Some(TrueFalseAnswer::T),
            "F" => Some(TrueFalseAnswer::F),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrueFalseAnswer::T => "T",
            TrueFalseAnswer::F => "F",
        }
    }
}

/// One segment of a scoring guide: criterion text plus the points parsed
/// from a trailing `(N分)` / `(N points)` annotation. Points are `None`
/// when the author omitted the annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringCriterion {
    pub criterion: String,
    pub points: Option<f64>,
}

/// One `(label, value)` pair from the `参数` list of a calculation question.
/// Values may contain their own `:` sub-delimiters; only the top-level
/// split is interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub label: String,
    pub value: String,
}

/// One investment option of a calculation question, pairing the
/// `投资方案N` and `Investment Option N` texts by their shared index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentOption {
    /// Raw index as written (usually numeric).
    pub label: String,
    pub text_zh: Option<String>,
    pub text_en: Option<String>,
}

/// Requirements text of a calculation question: the full string plus the
/// ordered sub-questions produced by splitting on `#`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirements {
    pub full: String,
    pub items: Vec<String>,
}

impl Requirements {
    pub fn parse(raw: &str) -> Self {
        let items = raw
            .split('#')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Requirements {
            full: raw.to_string(),
            items,
        }
    }
}

/// Type-specific fields, one variant per question type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    SingleChoice {
        /// Exactly four entries in A..D order once validated.
        options_zh: Vec<String>,
        options_en: Option<Vec<String>>,
        correct_answer: OptionLetter,
        explanation_zh: Option<String>,
        explanation_en: Option<String>,
    },
    TrueFalse {
        correct_answer: TrueFalseAnswer,
        explanation_zh: Option<String>,
        explanation_en: Option<String>,
    },
    Essay {
        reference_answer_zh: Option<String>,
        reference_answer_en: Option<String>,
        scoring_guide_zh: Option<Vec<ScoringCriterion>>,
        scoring_guide_en: Option<Vec<ScoringCriterion>>,
    },
    Calculation {
        options_list: Vec<InvestmentOption>,
        parameters: Vec<Parameter>,
        requirements_zh: Option<Requirements>,
        requirements_en: Option<Requirements>,
    },
}

/// A validated, canonicalized question. Immutable once produced by the
/// validator; persistence timestamps belong to the store, not to this type.
///
/// For calculation questions `content_zh`/`content_en` hold the background
/// text (`中文背景`/`英文背景`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub question_id: String,
    pub question_type: QuestionType,
    pub subject: Option<String>,
    pub knowledge_point: Option<String>,
    pub tags: Vec<String>,
    pub difficulty: Option<Difficulty>,
    pub language: Language,
    pub content_zh: String,
    pub content_en: Option<String>,
    pub payload: Payload,
}

/// Upsert decision for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Insert,
    Update,
    Skip,
}

/// One planned change, in source-document order. `applied` stays false for
/// dry runs, strict-mode aborts, and records past a store failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedAction {
    pub plan: Plan,
    pub record: Record,
    pub applied: bool,
}

/// A rejected block, with enough context to find it in the source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub question_id: Option<String>,
    /// 1-based inclusive line range over the flattened paragraph sequence.
    pub line_range: (usize, usize),
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    MissingEnglishCounterpart,
    MissingSubject,
    MissingKnowledgePoint,
    MissingTags,
    MissingDifficulty,
    MissingScoringGuide,
    MissingParameters,
    MissingRequirements,
    OptionsEnLengthMismatch,
    NonNumericOptionIndex,
    UnknownDifficulty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub question_id: String,
    pub kind: WarningKind,
    pub message: String,
}

/// Outcome of a full import run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub rejected: usize,
    pub warned: usize,
    pub actions: Vec<PlannedAction>,
    pub rejections: Vec<Rejection>,
    pub warnings: Vec<Warning>,
    /// Set when `apply` failed mid-batch; the rest of the report is still
    /// the fully validated view of the document.
    pub store_error: Option<String>,
}

impl ImportReport {
    pub fn empty() -> Self {
        ImportReport {
            inserted: 0,
            updated: 0,
            skipped: 0,
            rejected: 0,
            warned: 0,
            actions: Vec::new(),
            rejections: Vec::new(),
            warnings: Vec::new(),
            store_error: None,
        }
    }
}
