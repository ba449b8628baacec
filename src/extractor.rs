//! Field Extractor: key/value grammar over a block's payload lines.
//!
//! Each line is split on the first `:` or `：`. A left side that matches
//! the block type's key vocabulary opens a new field; any other line is a
//! continuation of the most recently opened field, with the newline
//! preserved. Fields are modelled as an ordered entry list plus an
//! explicit "currently open" pointer, so multi-line stems need no
//! re-scanning.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{InvestmentOption, Parameter, QuestionType, Requirements, ScoringCriterion};
use crate::segmenter::Block;

/// Trailing points annotation of a scoring-guide segment: `(3分)`,
/// `(2.5 points)`, full-width parentheses included.
static POINTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[(（]\s*(\d+(?:\.\d+)?)\s*(?:分|points?)\s*[)）]\s*$").expect("points regex")
});

/// Canonical field identity after key matching.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldKey {
    Subject,
    KnowledgePoint,
    Tags,
    Difficulty,
    ContentZh,
    ContentEn,
    OptionZh(usize),
    OptionEn(usize),
    CorrectAnswer,
    ExplanationZh,
    ExplanationEn,
    ReferenceAnswerZh,
    ReferenceAnswerEn,
    ScoringGuideZh,
    ScoringGuideEn,
    BackgroundZh,
    BackgroundEn,
    InvestmentZh(String),
    InvestmentEn(String),
    Parameters,
    RequirementsZh,
    RequirementsEn,
}

/// Raw field values of one block after extraction and list normalization.
/// Everything is still unvalidated; the validator decides what is required
/// and derives the envelope.
#[derive(Debug, Default, Clone)]
pub struct ExtractedFields {
    pub subject: Option<String>,
    pub knowledge_point: Option<String>,
    pub tags: Vec<String>,
    pub difficulty_raw: Option<String>,
    pub content_zh: Option<String>,
    pub content_en: Option<String>,
    /// Indexed A..D.
    pub options_zh: [Option<String>; 4],
    pub options_en: [Option<String>; 4],
    pub correct_answer: Option<String>,
    pub explanation_zh: Option<String>,
    pub explanation_en: Option<String>,
    pub reference_answer_zh: Option<String>,
    pub reference_answer_en: Option<String>,
    pub scoring_guide_zh: Option<Vec<ScoringCriterion>>,
    pub scoring_guide_en: Option<Vec<ScoringCriterion>>,
    pub background_zh: Option<String>,
    pub background_en: Option<String>,
    /// zh/en variants paired by index label, numeric labels first in
    /// numeric order, non-numeric labels after in insertion order.
    pub options_list: Vec<InvestmentOption>,
    /// Labels of `投资方案N` / `Investment Option N` keys whose N did not
    /// parse as a number; surfaced as a warning by the validator.
    pub non_numeric_option_labels: Vec<String>,
    pub parameters: Vec<Parameter>,
    pub requirements_zh: Option<Requirements>,
    pub requirements_en: Option<Requirements>,
}

/// Extract the field map of one block.
pub fn extract(block: &Block) -> ExtractedFields {
    let mut entries: Vec<(FieldKey, String)> = Vec::new();
    let mut open: Option<usize> = None;

    for (_, line) in &block.lines {
        let matched = split_key(line)
            .and_then(|(key, value)| match_key(key, block.question_type).map(|k| (k, value)));

        match matched {
            Some((key, value)) => {
                entries.push((key, value.trim().to_string()));
                open = Some(entries.len() - 1);
            }
            None => {
                if let Some(idx) = open {
                    let value = &mut entries[idx].1;
                    if !value.is_empty() {
                        value.push('\n');
                    }
                    value.push_str(line);
                }
                // No field open yet: the line has nothing to attach to.
            }
        }
    }

    fold(entries)
}

/// Split a line at the first `:` or `：`. Returns (key, value) with the
/// key stripped; the value keeps only outer whitespace trimmed.
fn split_key(line: &str) -> Option<(&str, &str)> {
    let (idx, ch) = line.char_indices().find(|(_, c)| *c == ':' || *c == '：')?;
    let key = line[..idx].trim();
    let value = line[idx + ch.len_utf8()..].trim();
    Some((key, value))
}

/// The canonical key vocabulary, per block type. Exact match after
/// stripping; the `投资方案N` / `Investment Option N` families match by
/// prefix with a non-empty index remainder.
fn match_key(key: &str, qt: QuestionType) -> Option<FieldKey> {
    // Envelope keys shared by every type.
    match key {
        "科目" => return Some(FieldKey::Subject),
        "知识点" => return Some(FieldKey::KnowledgePoint),
        "标签" => return Some(FieldKey::Tags),
        "难度" => return Some(FieldKey::Difficulty),
        _ => {}
    }

    match qt {
        QuestionType::SingleChoice => match key {
            "中文题干" => Some(FieldKey::ContentZh),
            "英文题干" => Some(FieldKey::ContentEn),
            "A" => Some(FieldKey::OptionZh(0)),
            "B" => Some(FieldKey::OptionZh(1)),
            "C" => Some(FieldKey::OptionZh(2)),
            "D" => Some(FieldKey::OptionZh(3)),
            "A_en" => Some(FieldKey::OptionEn(0)),
            "B_en" => Some(FieldKey::OptionEn(1)),
            "C_en" => Some(FieldKey::OptionEn(2)),
            "D_en" => Some(FieldKey::OptionEn(3)),
            "正确答案" => Some(FieldKey::CorrectAnswer),
            "解释" => Some(FieldKey::ExplanationZh),
            "English Explanation" => Some(FieldKey::ExplanationEn),
            _ => None,
        },
        QuestionType::TrueFalse => match key {
            "中文题干" => Some(FieldKey::ContentZh),
            "英文题干" => Some(FieldKey::ContentEn),
            "答案" => Some(FieldKey::CorrectAnswer),
            "解释" => Some(FieldKey::ExplanationZh),
            "English Explanation" => Some(FieldKey::ExplanationEn),
            _ => None,
        },
        QuestionType::Essay => match key {
            "中文题干" => Some(FieldKey::ContentZh),
            "英文题干" => Some(FieldKey::ContentEn),
            "参考答案" => Some(FieldKey::ReferenceAnswerZh),
            "English Reference Answer" => Some(FieldKey::ReferenceAnswerEn),
            "评分标准" => Some(FieldKey::ScoringGuideZh),
            "English Scoring Guide" => Some(FieldKey::ScoringGuideEn),
            _ => None,
        },
        QuestionType::Calculation => match key {
            "中文背景" => Some(FieldKey::BackgroundZh),
            "英文背景" => Some(FieldKey::BackgroundEn),
            "参数" => Some(FieldKey::Parameters),
            "要求" => Some(FieldKey::RequirementsZh),
            "English Requirements" => Some(FieldKey::RequirementsEn),
            _ => {
                if let Some(label) = key.strip_prefix("投资方案") {
                    let label = label.trim();
                    if !label.is_empty() {
                        return Some(FieldKey::InvestmentZh(label.to_string()));
                    }
                }
                if let Some(label) = key.strip_prefix("Investment Option") {
                    let label = label.trim();
                    if !label.is_empty() {
                        return Some(FieldKey::InvestmentEn(label.to_string()));
                    }
                }
                None
            }
        },
    }
}

/// Fold the ordered entry list into typed fields, applying the list
/// micro-grammars. For scalar fields a repeated key overwrites (last wins).
fn fold(entries: Vec<(FieldKey, String)>) -> ExtractedFields {
    let mut f = ExtractedFields::default();

    for (key, value) in entries {
        match key {
            FieldKey::Subject => f.subject = nonempty(value),
            FieldKey::KnowledgePoint => f.knowledge_point = nonempty(value),
            FieldKey::Difficulty => f.difficulty_raw = nonempty(value),
            FieldKey::Tags => f.tags = split_list(&value, &[',', '，']),
            FieldKey::ContentZh => f.content_zh = nonempty(value),
            FieldKey::ContentEn => f.content_en = nonempty(value),
            FieldKey::OptionZh(i) => f.options_zh[i] = Some(value),
            FieldKey::OptionEn(i) => f.options_en[i] = Some(value),
            FieldKey::CorrectAnswer => f.correct_answer = nonempty(value),
            FieldKey::ExplanationZh => f.explanation_zh = nonempty(value),
            FieldKey::ExplanationEn => f.explanation_en = nonempty(value),
            FieldKey::ReferenceAnswerZh => f.reference_answer_zh = nonempty(value),
            FieldKey::ReferenceAnswerEn => f.reference_answer_en = nonempty(value),
            FieldKey::ScoringGuideZh => f.scoring_guide_zh = Some(parse_scoring_guide(&value)),
            FieldKey::ScoringGuideEn => f.scoring_guide_en = Some(parse_scoring_guide(&value)),
            FieldKey::BackgroundZh => f.background_zh = nonempty(value),
            FieldKey::BackgroundEn => f.background_en = nonempty(value),
            FieldKey::Parameters => f.parameters = parse_parameters(&value),
            FieldKey::RequirementsZh => f.requirements_zh = Some(Requirements::parse(&value)),
            FieldKey::RequirementsEn => f.requirements_en = Some(Requirements::parse(&value)),
            FieldKey::InvestmentZh(label) => {
                upsert_option(&mut f, &label).text_zh = Some(value);
            }
            FieldKey::InvestmentEn(label) => {
                upsert_option(&mut f, &label).text_en = Some(value);
            }
        }
    }

    // Numeric indices in numeric order, non-numeric after, insertion
    // order preserved within each group.
    f.options_list
        .sort_by_key(|o| o.label.parse::<u64>().unwrap_or(u64::MAX));

    f
}

fn upsert_option<'a>(f: &'a mut ExtractedFields, label: &str) -> &'a mut InvestmentOption {
    if label.parse::<u64>().is_err() && !f.non_numeric_option_labels.iter().any(|l| l == label) {
        f.non_numeric_option_labels.push(label.to_string());
    }
    let idx = match f.options_list.iter().position(|o| o.label == label) {
        Some(idx) => idx,
        None => {
            f.options_list.push(InvestmentOption {
                label: label.to_string(),
                text_zh: None,
                text_en: None,
            });
            f.options_list.len() - 1
        }
    };
    &mut f.options_list[idx]
}

fn nonempty(value: String) -> Option<String> {
    if value.trim().is_empty() { None } else { Some(value) }
}

/// Top-level split on any of the given delimiters; segments are trimmed
/// and empties dropped. Sub-delimiters inside segments are left intact.
fn split_list(value: &str, delims: &[char]) -> Vec<String> {
    value
        .split(delims)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// `;`-delimited criteria with optional trailing `(N分)` / `(N points)`.
fn parse_scoring_guide(value: &str) -> Vec<ScoringCriterion> {
    split_list(value, &[';', '；'])
        .into_iter()
        .map(|segment| match POINTS_RE.captures(&segment) {
            Some(caps) => {
                let points = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok());
                let criterion = segment[..caps.get(0).unwrap().start()].trim().to_string();
                ScoringCriterion { criterion, points }
            }
            None => ScoringCriterion {
                criterion: segment,
                points: None,
            },
        })
        .collect()
}

/// `;`-delimited `(label, value)` pairs; the value keeps any further `:`
/// characters verbatim. A segment without a colon becomes a bare label.
fn parse_parameters(value: &str) -> Vec<Parameter> {
    split_list(value, &[';', '；'])
        .into_iter()
        .map(|segment| match split_key(&segment) {
            Some((label, v)) => Parameter {
                label: label.to_string(),
                value: v.to_string(),
            },
            None => Parameter {
                label: segment,
                value: String::new(),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(qt: QuestionType, id: &str, lines: &[&str]) -> Block {
        Block {
            question_type: qt,
            question_id: id.to_string(),
            start_line: 1,
            end_line: 1 + lines.len(),
            lines: lines
                .iter()
                .enumerate()
                .map(|(i, s)| (i + 2, s.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_basic_key_value_and_fullwidth_colon() {
        let b = block(
            QuestionType::SingleChoice,
            "sc_001",
            &[
                "中文题干：下列哪项正确?",
                "A: 甲",
                "B: 乙",
                "C: 丙",
                "D: 丁",
                "正确答案: B",
            ],
        );
        let f = extract(&b);
        assert_eq!(f.content_zh.as_deref(), Some("下列哪项正确?"));
        assert_eq!(f.options_zh[1].as_deref(), Some("乙"));
        assert_eq!(f.correct_answer.as_deref(), Some("B"));
    }

    #[test]
    fn test_continuation_appends_to_open_field() {
        let b = block(
            QuestionType::Essay,
            "es_001",
            &[
                "中文题干: 论述资本结构理论,",
                "并结合实际案例分析。",
                "第二段继续。",
                "参考答案: 要点一",
            ],
        );
        let f = extract(&b);
        assert_eq!(
            f.content_zh.as_deref(),
            Some("论述资本结构理论,\n并结合实际案例分析。\n第二段继续。")
        );
        assert_eq!(f.reference_answer_zh.as_deref(), Some("要点一"));
    }

    #[test]
    fn test_unknown_key_with_colon_is_continuation() {
        // "备注" is not in the vocabulary, so the whole line is appended.
        let b = block(
            QuestionType::TrueFalse,
            "tf_001",
            &["中文题干: 题干", "备注: 这不是字段"],
        );
        let f = extract(&b);
        assert_eq!(f.content_zh.as_deref(), Some("题干\n备注: 这不是字段"));
    }

    #[test]
    fn test_key_vocabulary_is_per_type() {
        // 答案 is a true_false key, not a single_choice key.
        let b = block(
            QuestionType::SingleChoice,
            "sc_001",
            &["中文题干: 题干", "答案: T"],
        );
        let f = extract(&b);
        assert!(f.correct_answer.is_none());
        assert_eq!(f.content_zh.as_deref(), Some("题干\n答案: T"));
    }

    #[test]
    fn test_tags_split_and_trimmed() {
        let b = block(
            QuestionType::TrueFalse,
            "tf_001",
            &["中文题干: 题干", "标签: 财务, 投资 ，估值,"],
        );
        let f = extract(&b);
        assert_eq!(f.tags, vec!["财务", "投资", "估值"]);
    }

    #[test]
    fn test_scoring_guide_micro_grammar() {
        let b = block(
            QuestionType::Essay,
            "es_001",
            &[
                "中文题干: 题干",
                "评分标准: 概念准确(3分); 论证充分（5 分）; 结构清晰",
                "English Scoring Guide: Accuracy (3 points); Structure",
            ],
        );
        let f = extract(&b);
        let zh = f.scoring_guide_zh.unwrap();
        assert_eq!(zh.len(), 3);
        assert_eq!(zh[0].criterion, "概念准确");
        assert_eq!(zh[0].points, Some(3.0));
        assert_eq!(zh[1].points, Some(5.0));
        assert_eq!(zh[2].criterion, "结构清晰");
        assert_eq!(zh[2].points, None);

        let en = f.scoring_guide_en.unwrap();
        assert_eq!(en[0].points, Some(3.0));
        assert_eq!(en[1].points, None);
    }

    #[test]
    fn test_parameters_keep_inner_colons() {
        let b = block(
            QuestionType::Calculation,
            "calc_001",
            &[
                "中文背景: 背景",
                "参数: 折现率: 0.05; 时间系数: 见表 3:1; 期限",
            ],
        );
        let f = extract(&b);
        assert_eq!(f.parameters.len(), 3);
        assert_eq!(f.parameters[0].label, "折现率");
        assert_eq!(f.parameters[0].value, "0.05");
        assert_eq!(f.parameters[1].value, "见表 3:1");
        assert_eq!(f.parameters[2].label, "期限");
        assert_eq!(f.parameters[2].value, "");
    }

    #[test]
    fn test_investment_options_paired_and_ordered() {
        let b = block(
            QuestionType::Calculation,
            "calc_001",
            &[
                "中文背景: 背景",
                "投资方案2: 方案乙",
                "Investment Option 1: Option one",
                "投资方案1: 方案甲",
                "Investment Option 2: Option two",
                "投资方案10: 方案十",
            ],
        );
        let f = extract(&b);
        assert_eq!(f.options_list.len(), 3);
        assert_eq!(f.options_list[0].label, "1");
        assert_eq!(f.options_list[0].text_zh.as_deref(), Some("方案甲"));
        assert_eq!(f.options_list[0].text_en.as_deref(), Some("Option one"));
        assert_eq!(f.options_list[1].label, "2");
        // Numeric ordering, not lexicographic: 10 after 2.
        assert_eq!(f.options_list[2].label, "10");
        assert!(f.non_numeric_option_labels.is_empty());
    }

    #[test]
    fn test_non_numeric_option_label_flagged() {
        let b = block(
            QuestionType::Calculation,
            "calc_001",
            &["中文背景: 背景", "投资方案一: 方案", "投资方案1: 方案甲"],
        );
        let f = extract(&b);
        assert_eq!(f.non_numeric_option_labels, vec!["一"]);
        // Numeric label sorts first.
        assert_eq!(f.options_list[0].label, "1");
        assert_eq!(f.options_list[1].label, "一");
    }

    #[test]
    fn test_requirements_split_on_hash() {
        let b = block(
            QuestionType::Calculation,
            "calc_001",
            &[
                "中文背景: 背景",
                "要求: 计算净现值 # 比较两方案 # 给出建议",
                "English Requirements: Compute NPV # Compare # Recommend",
            ],
        );
        let f = extract(&b);
        let zh = f.requirements_zh.unwrap();
        assert_eq!(zh.items, vec!["计算净现值", "比较两方案", "给出建议"]);
        assert!(zh.full.contains('#'));
        assert_eq!(f.requirements_en.unwrap().items.len(), 3);
    }

    #[test]
    fn test_empty_option_text_is_kept_as_empty() {
        // An empty option value must survive so the validator can reject
        // an answer that points at it.
        let b = block(
            QuestionType::SingleChoice,
            "sc_001",
            &["中文题干: 题干", "A: 甲", "B:", "C: 丙", "D: 丁"],
        );
        let f = extract(&b);
        assert_eq!(f.options_zh[1].as_deref(), Some(""));
    }
}
