//! Renders a [`Record`] back to the documented textual grammar. The output
//! re-parses to an equal record, which is what keeps the grammar honest;
//! the CLI also uses it for `--show` output.

use crate::models::{OptionLetter, Payload, Record, ScoringCriterion};

/// Render one record as the line sequence of its question block, header
/// included.
pub fn render_record(record: &Record) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(format!(
        "{}ID: {}",
        record.question_type.label(),
        record.question_id
    ));

    if let Some(subject) = &record.subject {
        push_field(&mut lines, "科目", subject);
    }
    if let Some(difficulty) = record.difficulty {
        push_field(&mut lines, "难度", difficulty.as_str());
    }
    if let Some(kp) = &record.knowledge_point {
        push_field(&mut lines, "知识点", kp);
    }
    if !record.tags.is_empty() {
        push_field(&mut lines, "标签", &record.tags.join(","));
    }

    match &record.payload {
        Payload::SingleChoice {
            options_zh,
            options_en,
            correct_answer,
            explanation_zh,
            explanation_en,
        } => {
            push_field(&mut lines, "中文题干", &record.content_zh);
            if let Some(en) = &record.content_en {
                push_field(&mut lines, "英文题干", en);
            }
            for (letter, text) in OptionLetter::all().iter().zip(options_zh) {
                push_field(&mut lines, letter.as_str(), text);
            }
            if let Some(en) = options_en {
                for (letter, text) in OptionLetter::all().iter().zip(en) {
                    push_field(&mut lines, &format!("{}_en", letter.as_str()), text);
                }
            }
            push_field(&mut lines, "正确答案", correct_answer.as_str());
            if let Some(zh) = explanation_zh {
                push_field(&mut lines, "解释", zh);
            }
            if let Some(en) = explanation_en {
                push_field(&mut lines, "English Explanation", en);
            }
        }
        Payload::TrueFalse {
            correct_answer,
            explanation_zh,
            explanation_en,
        } => {
            push_field(&mut lines, "中文题干", &record.content_zh);
            if let Some(en) = &record.content_en {
                push_field(&mut lines, "英文题干", en);
            }
            push_field(&mut lines, "答案", correct_answer.as_str());
            if let Some(zh) = explanation_zh {
                push_field(&mut lines, "解释", zh);
            }
            if let Some(en) = explanation_en {
                push_field(&mut lines, "English Explanation", en);
            }
        }
        Payload::Essay {
            reference_answer_zh,
            reference_answer_en,
            scoring_guide_zh,
            scoring_guide_en,
        } => {
            push_field(&mut lines, "中文题干", &record.content_zh);
            if let Some(en) = &record.content_en {
                push_field(&mut lines, "英文题干", en);
            }
            if let Some(zh) = reference_answer_zh {
                push_field(&mut lines, "参考答案", zh);
            }
            if let Some(en) = reference_answer_en {
                push_field(&mut lines, "English Reference Answer", en);
            }
            if let Some(guide) = scoring_guide_zh {
                push_field(&mut lines, "评分标准", &render_guide(guide, true));
            }
            if let Some(guide) = scoring_guide_en {
                push_field(&mut lines, "English Scoring Guide", &render_guide(guide, false));
            }
        }
        Payload::Calculation {
            options_list,
            parameters,
            requirements_zh,
            requirements_en,
        } => {
            push_field(&mut lines, "中文背景", &record.content_zh);
            if let Some(en) = &record.content_en {
                push_field(&mut lines, "英文背景", en);
            }
            for option in options_list {
                if let Some(zh) = &option.text_zh {
                    push_field(&mut lines, &format!("投资方案{}", option.label), zh);
                }
                if let Some(en) = &option.text_en {
                    push_field(
                        &mut lines,
                        &format!("Investment Option {}", option.label),
                        en,
                    );
                }
            }
            if !parameters.is_empty() {
                let rendered: Vec<String> = parameters
                    .iter()
                    .map(|p| {
                        if p.value.is_empty() {
                            p.label.clone()
                        } else {
                            format!("{}: {}", p.label, p.value)
                        }
                    })
                    .collect();
                push_field(&mut lines, "参数", &rendered.join("; "));
            }
            if let Some(req) = requirements_zh {
                push_field(&mut lines, "要求", &req.full);
            }
            if let Some(req) = requirements_en {
                push_field(&mut lines, "English Requirements", &req.full);
            }
        }
    }

    lines
}

/// Multi-line values re-emit their continuation lines verbatim below the
/// opening `key: first-line` pair.
fn push_field(lines: &mut Vec<String>, key: &str, value: &str) {
    let mut parts = value.split('\n');
    let first = parts.next().unwrap_or_default();
    lines.push(format!("{}: {}", key, first));
    for continuation in parts {
        lines.push(continuation.to_string());
    }
}

fn render_guide(guide: &[ScoringCriterion], zh: bool) -> String {
    guide
        .iter()
        .map(|c| match c.points {
            Some(p) if zh => format!("{}({}分)", c.criterion, fmt_points(p)),
            Some(p) => format!("{} ({} points)", c.criterion, fmt_points(p)),
            None => c.criterion.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn fmt_points(p: f64) -> String {
    if p.fract() == 0.0 {
        format!("{}", p as i64)
    } else {
        format!("{}", p)
    }
}
