//! Type-Specific Validator / Normalizer: turns an extracted field map into
//! a canonical [`Record`] or an [`ImportError`].
//!
//! Hard errors reject the block; soft warnings ride along with an accepted
//! record. `language` is derived from field presence, never read from the
//! document.

use std::collections::HashSet;

use crate::errors::ImportError;
use crate::extractor::ExtractedFields;
use crate::models::{
    Difficulty, Language, OptionLetter, Payload, QuestionType, Record, TrueFalseAnswer, Warning,
    WarningKind,
};
use crate::segmenter::Block;

/// Run-scoped validator. Tracks question ids across blocks so that the
/// second occurrence of an id is rejected.
#[derive(Debug, Default)]
pub struct Validator {
    seen_ids: HashSet<String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate one block. Ids are recorded on first sight even when the
    /// block is rejected, so a later block reusing the id is still a
    /// duplicate.
    pub fn validate(
        &mut self,
        block: &Block,
        fields: &ExtractedFields,
    ) -> Result<(Record, Vec<Warning>), ImportError> {
        let id = block.question_id.clone();

        if !self.seen_ids.insert(id.clone()) {
            return Err(ImportError::DuplicateId(id));
        }
        check_id_prefix(&id, block.question_type)?;

        let mut warnings = Vec::new();
        let payload = build_payload(&id, block.question_type, fields, &mut warnings)?;

        let (content_zh, content_en) = match block.question_type {
            QuestionType::Calculation => {
                let zh = fields.background_zh.clone().ok_or_else(|| {
                    ImportError::MissingRequiredField {
                        question_id: id.clone(),
                        field: "background_zh".to_string(),
                    }
                })?;
                (zh, fields.background_en.clone())
            }
            _ => {
                let zh = fields.content_zh.clone().ok_or_else(|| {
                    ImportError::MissingRequiredField {
                        question_id: id.clone(),
                        field: "content_zh".to_string(),
                    }
                })?;
                (zh, fields.content_en.clone())
            }
        };

        common_warnings(&id, block.question_type, fields, &mut warnings);

        let difficulty = match &fields.difficulty_raw {
            Some(raw) => {
                let parsed = Difficulty::parse(raw);
                if parsed.is_none() {
                    warnings.push(warn(
                        &id,
                        WarningKind::UnknownDifficulty,
                        format!("difficulty '{}' is not one of easy/medium/hard", raw),
                    ));
                }
                parsed
            }
            None => None,
        };

        let tags = dedup_tags(&fields.tags);
        let language = derive_language(&content_en, fields);

        let record = Record {
            question_id: id,
            question_type: block.question_type,
            subject: fields.subject.clone(),
            knowledge_point: fields.knowledge_point.clone(),
            tags,
            difficulty,
            language,
            content_zh,
            content_en,
            payload,
        };

        Ok((record, warnings))
    }
}

/// An id carrying a *different* type's prefix contradicts the header
/// label. Ids outside the prefix vocabulary entirely are tolerated.
fn check_id_prefix(id: &str, qt: QuestionType) -> Result<(), ImportError> {
    for other in QuestionType::all() {
        if other != qt && id.starts_with(other.id_prefix()) {
            return Err(ImportError::TypeIdMismatch {
                question_id: id.to_string(),
                label: qt.label().to_string(),
                expected_prefix: qt.id_prefix().to_string(),
            });
        }
    }
    Ok(())
}

fn build_payload(
    id: &str,
    qt: QuestionType,
    fields: &ExtractedFields,
    warnings: &mut Vec<Warning>,
) -> Result<Payload, ImportError> {
    match qt {
        QuestionType::SingleChoice => build_single_choice(id, fields, warnings),
        QuestionType::TrueFalse => build_true_false(id, fields),
        QuestionType::Essay => Ok(build_essay(id, fields, warnings)),
        QuestionType::Calculation => Ok(build_calculation(id, fields, warnings)),
    }
}

fn build_single_choice(
    id: &str,
    fields: &ExtractedFields,
    warnings: &mut Vec<Warning>,
) -> Result<Payload, ImportError> {
    let missing: Vec<&str> = OptionLetter::all()
        .iter()
        .filter(|l| fields.options_zh[l.index()].is_none())
        .map(|l| l.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MalformedOptions {
            question_id: id.to_string(),
            message: format!("missing option(s) {}", missing.join(", ")),
        });
    }
    let options_zh: Vec<String> = fields
        .options_zh
        .iter()
        .map(|o| o.clone().unwrap_or_default())
        .collect();

    let raw_answer =
        fields
            .correct_answer
            .as_deref()
            .ok_or_else(|| ImportError::MissingRequiredField {
                question_id: id.to_string(),
                field: "correct_answer".to_string(),
            })?;
    let correct_answer =
        OptionLetter::parse(raw_answer).ok_or_else(|| ImportError::InvalidAnswer {
            question_id: id.to_string(),
            got: raw_answer.to_string(),
            allowed: "A, B, C, D".to_string(),
        })?;

    if options_zh[correct_answer.index()].trim().is_empty() {
        return Err(ImportError::MalformedOptions {
            question_id: id.to_string(),
            message: format!(
                "correct answer '{}' points at an empty option",
                correct_answer.as_str()
            ),
        });
    }

    let present_en: Vec<String> = fields.options_en.iter().flatten().cloned().collect();
    let options_en = match present_en.len() {
        0 => {
            warnings.push(warn(
                id,
                WarningKind::MissingEnglishCounterpart,
                "options_en missing for options_zh".to_string(),
            ));
            None
        }
        4 => Some(present_en),
        n => {
            warnings.push(warn(
                id,
                WarningKind::OptionsEnLengthMismatch,
                format!("options_en has {} entries, expected 4", n),
            ));
            Some(present_en)
        }
    };

    if fields.explanation_zh.is_some() && fields.explanation_en.is_none() {
        warnings.push(warn(
            id,
            WarningKind::MissingEnglishCounterpart,
            "explanation_en missing for explanation_zh".to_string(),
        ));
    }

    Ok(Payload::SingleChoice {
        options_zh,
        options_en,
        correct_answer,
        explanation_zh: fields.explanation_zh.clone(),
        explanation_en: fields.explanation_en.clone(),
    })
}

fn build_true_false(id: &str, fields: &ExtractedFields) -> Result<Payload, ImportError> {
    let raw_answer =
        fields
            .correct_answer
            .as_deref()
            .ok_or_else(|| ImportError::MissingRequiredField {
                question_id: id.to_string(),
                field: "correct_answer".to_string(),
            })?;
    let correct_answer =
        TrueFalseAnswer::parse(raw_answer).ok_or_else(|| ImportError::InvalidAnswer {
            question_id: id.to_string(),
            got: raw_answer.to_string(),
            allowed: "T, F".to_string(),
        })?;

    Ok(Payload::TrueFalse {
        correct_answer,
        explanation_zh: fields.explanation_zh.clone(),
        explanation_en: fields.explanation_en.clone(),
    })
}

fn build_essay(id: &str, fields: &ExtractedFields, warnings: &mut Vec<Warning>) -> Payload {
    if fields.scoring_guide_zh.is_none() {
        warnings.push(warn(
            id,
            WarningKind::MissingScoringGuide,
            "scoring_guide_zh absent".to_string(),
        ));
    } else if fields.scoring_guide_en.is_none() {
        warnings.push(warn(
            id,
            WarningKind::MissingEnglishCounterpart,
            "scoring_guide_en missing for scoring_guide_zh".to_string(),
        ));
    }
    if fields.reference_answer_zh.is_some() && fields.reference_answer_en.is_none() {
        warnings.push(warn(
            id,
            WarningKind::MissingEnglishCounterpart,
            "reference_answer_en missing for reference_answer_zh".to_string(),
        ));
    }

    Payload::Essay {
        reference_answer_zh: fields.reference_answer_zh.clone(),
        reference_answer_en: fields.reference_answer_en.clone(),
        scoring_guide_zh: fields.scoring_guide_zh.clone(),
        scoring_guide_en: fields.scoring_guide_en.clone(),
    }
}

fn build_calculation(id: &str, fields: &ExtractedFields, warnings: &mut Vec<Warning>) -> Payload {
    if fields.parameters.is_empty() {
        warnings.push(warn(
            id,
            WarningKind::MissingParameters,
            "no parameters provided".to_string(),
        ));
    }
    if fields.requirements_zh.is_none() {
        warnings.push(warn(
            id,
            WarningKind::MissingRequirements,
            "requirements missing".to_string(),
        ));
    } else if fields.requirements_en.is_none() {
        warnings.push(warn(
            id,
            WarningKind::MissingEnglishCounterpart,
            "requirements_en missing for requirements_zh".to_string(),
        ));
    }
    for label in &fields.non_numeric_option_labels {
        warnings.push(warn(
            id,
            WarningKind::NonNumericOptionIndex,
            format!("investment option index '{}' is not numeric", label),
        ));
    }
    let unpaired: Vec<&str> = fields
        .options_list
        .iter()
        .filter(|o| o.text_zh.is_some() && o.text_en.is_none())
        .map(|o| o.label.as_str())
        .collect();
    if !unpaired.is_empty() {
        warnings.push(warn(
            id,
            WarningKind::MissingEnglishCounterpart,
            format!(
                "investment option(s) {} missing English text",
                unpaired.join(", ")
            ),
        ));
    }

    Payload::Calculation {
        options_list: fields.options_list.clone(),
        parameters: fields.parameters.clone(),
        requirements_zh: fields.requirements_zh.clone(),
        requirements_en: fields.requirements_en.clone(),
    }
}

/// Envelope-level soft warnings shared by every type.
fn common_warnings(
    id: &str,
    qt: QuestionType,
    fields: &ExtractedFields,
    warnings: &mut Vec<Warning>,
) {
    let (zh_present, en_present, en_field) = match qt {
        QuestionType::Calculation => (
            fields.background_zh.is_some(),
            fields.background_en.is_some(),
            "background_en",
        ),
        _ => (
            fields.content_zh.is_some(),
            fields.content_en.is_some(),
            "content_en",
        ),
    };
    if zh_present && !en_present {
        warnings.push(warn(
            id,
            WarningKind::MissingEnglishCounterpart,
            format!("{} missing for the Chinese side", en_field),
        ));
    }

    if fields.subject.is_none() {
        warnings.push(warn(
            id,
            WarningKind::MissingSubject,
            "subject missing".to_string(),
        ));
    }
    if fields.knowledge_point.is_none() {
        warnings.push(warn(
            id,
            WarningKind::MissingKnowledgePoint,
            "knowledge_point missing".to_string(),
        ));
    }
    if fields.tags.is_empty() {
        warnings.push(warn(id, WarningKind::MissingTags, "tags missing".to_string()));
    }
    if fields.difficulty_raw.is_none() {
        warnings.push(warn(
            id,
            WarningKind::MissingDifficulty,
            "difficulty missing".to_string(),
        ));
    }
}

/// `both` iff any English-side field is non-empty; `en`-only records
/// cannot arise because the Chinese side is required.
fn derive_language(content_en: &Option<String>, fields: &ExtractedFields) -> Language {
    let any_en = content_en.is_some()
        || fields.options_en.iter().any(|o| o.is_some())
        || fields.explanation_en.is_some()
        || fields.reference_answer_en.is_some()
        || fields.scoring_guide_en.is_some()
        || fields.requirements_en.is_some()
        || fields.options_list.iter().any(|o| o.text_en.is_some());
    if any_en { Language::Both } else { Language::Zh }
}

fn dedup_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

fn warn(id: &str, kind: WarningKind, message: String) -> Warning {
    Warning {
        question_id: id.to_string(),
        kind,
        message,
    }
}
