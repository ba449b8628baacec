use std::io::{Cursor, Write};

use question_bank_importer::{
    ImportMode, ImportOptions, Importer, Language, Payload, Plan, SqliteStore, WarningKind,
};

/// Build a minimal but genuine `.docx` archive in memory, one paragraph
/// per line.
fn docx_bytes(lines: &[&str]) -> Vec<u8> {
    let body: String = lines
        .iter()
        .map(|line| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", xml_escape(line)))
        .collect();
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body>{}</w:body>
</w:document>"#,
        body
    );

    let mut zw = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    zw.start_file("[Content_Types].xml", options).unwrap();
    zw.write_all(
        br#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#,
    )
    .unwrap();
    zw.start_file("word/document.xml", options).unwrap();
    zw.write_all(document.as_bytes()).unwrap();
    zw.finish().unwrap().into_inner()
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn owned(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| s.to_string()).collect()
}

fn canonical_sc_block() -> Vec<&'static str> {
    vec![
        "单选题ID: sc_001",
        "科目: 财务管理",
        "难度: medium",
        "知识点: 资本预算",
        "标签: 财务,投资",
        "中文题干: 下列哪项属于资本预算决策?",
        "英文题干: Which one is a capital budgeting decision?",
        "A: 发放股利",
        "B: 购建生产线",
        "C: 发行债券",
        "D: 回购股票",
        "A_en: Paying dividends",
        "B_en: Building a production line",
        "C_en: Issuing bonds",
        "D_en: Repurchasing shares",
        "正确答案: B",
    ]
}

async fn lenient_importer() -> Importer<SqliteStore> {
    let store = SqliteStore::new("sqlite::memory:").await.unwrap();
    Importer::new(store, ImportOptions::default())
}

#[tokio::test]
async fn test_canonical_single_choice_from_docx() {
    let importer = lenient_importer().await;
    let bytes = docx_bytes(&canonical_sc_block());

    let report = importer.import_bytes(&bytes).await.unwrap();
    assert_eq!(report.inserted, 1);
    assert_eq!(report.rejected, 0);
    assert_eq!(report.warned, 0, "warnings: {:?}", report.warnings);
    assert!(report.actions[0].applied);

    let record = importer.store().get_record("sc_001").await.unwrap().unwrap();
    assert_eq!(record.language, Language::Both);
    match record.payload {
        Payload::SingleChoice {
            correct_answer,
            options_zh,
            options_en,
            ..
        } => {
            assert_eq!(correct_answer.as_str(), "B");
            assert_eq!(options_zh.len(), 4);
            assert_eq!(options_en.unwrap().len(), 4);
        }
        other => panic!("wrong payload: {:?}", other),
    }
}

#[tokio::test]
async fn test_true_false_with_chinese_explanation_only() {
    let importer = lenient_importer().await;
    let report = importer
        .import_lines(&owned(&[
            "是非题ID: tf_001",
            "难度: easy",
            "知识点: 折现",
            "标签: 基础",
            "中文题干: 净现值为正的项目应当接受。",
            "英文题干: Accept projects with positive NPV.",
            "答案: F",
            "解释: 还需考虑互斥方案与资本限额。",
        ]))
        .await
        .unwrap();

    assert_eq!(report.inserted, 1);
    assert!(report.warnings.iter().any(
        |w| w.kind == WarningKind::MissingEnglishCounterpart && w.message.contains("explanation_en")
    ));
    let record = importer.store().get_record("tf_001").await.unwrap().unwrap();
    assert_eq!(record.language, Language::Both);
}

#[tokio::test]
async fn test_essay_missing_english_stem_and_guide() {
    let importer = lenient_importer().await;
    let report = importer
        .import_lines(&owned(&[
            "论述题ID: es_002",
            "难度: hard",
            "知识点: 资本结构",
            "标签: 论述",
            "中文题干: 论述MM定理及其现实局限。",
        ]))
        .await
        .unwrap();

    assert_eq!(report.inserted, 1);
    let kinds: Vec<WarningKind> = report.warnings.iter().map(|w| w.kind).collect();
    assert!(kinds.contains(&WarningKind::MissingEnglishCounterpart));
    assert!(kinds.contains(&WarningKind::MissingScoringGuide));
    let record = importer.store().get_record("es_002").await.unwrap().unwrap();
    assert_eq!(record.language, Language::Zh);
}

#[tokio::test]
async fn test_calculation_minimal() {
    let importer = lenient_importer().await;
    let report = importer
        .import_lines(&owned(&[
            "计算题ID: calc_002",
            "难度: hard",
            "知识点: 净现值",
            "标签: 计算",
            "中文背景: 某公司考虑一个扩产项目。",
        ]))
        .await
        .unwrap();

    assert_eq!(report.inserted, 1);
    let kinds: Vec<WarningKind> = report.warnings.iter().map(|w| w.kind).collect();
    assert!(kinds.contains(&WarningKind::MissingEnglishCounterpart));
    assert!(kinds.contains(&WarningKind::MissingParameters));
    assert!(kinds.contains(&WarningKind::MissingRequirements));
}

#[tokio::test]
async fn test_strict_mode_aborts_all_writes() {
    let store = SqliteStore::new("sqlite::memory:").await.unwrap();
    let importer = Importer::new(
        store,
        ImportOptions {
            mode: ImportMode::Strict,
            dry_run: false,
        },
    );

    let mut lines = canonical_sc_block();
    // Second block is malformed: single choice without a stem.
    lines.extend_from_slice(&[
        "是非题ID: tf_009",
        "答案: T", // missing 中文题干
    ]);

    let report = importer.import_lines(&owned(&lines)).await.unwrap();
    assert_eq!(report.rejected, 1);
    assert_eq!(report.inserted, 1, "the good block is still planned");
    assert_eq!(report.actions[0].plan, Plan::Insert);
    assert!(!report.actions[0].applied, "strict mode must not write");
    assert!(
        report.rejections[0].message.contains("content_zh"),
        "got: {}",
        report.rejections[0].message
    );
    assert_eq!(importer.store().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_reimport_is_idempotent() {
    let importer = lenient_importer().await;
    let lines = owned(&canonical_sc_block());

    let first = importer.import_lines(&lines).await.unwrap();
    assert_eq!(first.inserted, 1);

    let second = importer.import_lines(&lines).await.unwrap();
    assert_eq!(second.skipped, 1);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.updated, 0);
    assert_eq!(second.rejected, 0);
}

#[tokio::test]
async fn test_update_path_replaces_record_in_full() {
    let importer = lenient_importer().await;
    importer
        .import_lines(&owned(&canonical_sc_block()))
        .await
        .unwrap();

    let mut changed = canonical_sc_block();
    let b_line = changed
        .iter()
        .position(|l| l.starts_with("B:"))
        .unwrap();
    changed[b_line] = "B: 购建新的自动化生产线";
    let report = importer.import_lines(&owned(&changed)).await.unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(report.inserted, 0);

    let record = importer.store().get_record("sc_001").await.unwrap().unwrap();
    match record.payload {
        Payload::SingleChoice { options_zh, .. } => {
            assert_eq!(options_zh[1], "购建新的自动化生产线");
        }
        other => panic!("wrong payload: {:?}", other),
    }
}

#[tokio::test]
async fn test_dry_run_leaves_store_untouched() {
    let store = SqliteStore::new("sqlite::memory:").await.unwrap();
    let importer = Importer::new(
        store,
        ImportOptions {
            mode: ImportMode::Lenient,
            dry_run: true,
        },
    );

    let dry = importer
        .import_lines(&owned(&canonical_sc_block()))
        .await
        .unwrap();
    assert_eq!(dry.inserted, 1);
    assert!(dry.actions.iter().all(|a| !a.applied));
    assert_eq!(importer.store().count().await.unwrap(), 0);

    // The same import without dry_run differs only in the applied flags.
    let wet_importer = Importer::new(importer.store().clone(), ImportOptions::default());
    let mut wet = wet_importer
        .import_lines(&owned(&canonical_sc_block()))
        .await
        .unwrap();
    for action in &mut wet.actions {
        action.applied = false;
    }
    assert_eq!(wet, dry);
    assert_eq!(wet_importer.store().count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_duplicate_and_mismatch_rejections_in_order() {
    let importer = lenient_importer().await;
    let report = importer
        .import_lines(&owned(&[
            "单选题ID: tf_050", // type/prefix contradiction
            "中文题干: 混淆题",
            "是非题ID: tf_002",
            "中文题干: 正常",
            "答案: T",
            "是非题ID: tf_002", // duplicate
            "中文题干: 重复",
            "答案: F",
        ]))
        .await
        .unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(report.rejected, 2);
    assert_eq!(report.rejections[0].question_id.as_deref(), Some("tf_050"));
    assert_eq!(report.rejections[1].question_id.as_deref(), Some("tf_002"));
    assert!(report.rejections[0].line_range.0 < report.rejections[1].line_range.0);
}

#[tokio::test]
async fn test_empty_document_reports_all_zero() {
    let importer = lenient_importer().await;
    let report = importer.import_bytes(&docx_bytes(&[])).await.unwrap();
    assert_eq!(
        (report.inserted, report.updated, report.skipped, report.rejected),
        (0, 0, 0, 0)
    );

    let preamble_only = docx_bytes(&["期末考试题库", "编制: 财务教研组"]);
    let report = importer.import_bytes(&preamble_only).await.unwrap();
    assert_eq!(report.rejected, 0);
    assert!(report.actions.is_empty());
}

#[tokio::test]
async fn test_unsupported_format_aborts() {
    let importer = lenient_importer().await;
    let err = importer.import_bytes(b"not a docx at all").await.unwrap_err();
    assert_eq!(
        err.kind(),
        question_bank_importer::ErrorKind::UnsupportedFormat
    );
}

#[tokio::test]
async fn test_cancellation_between_records() {
    use std::sync::atomic::AtomicBool;

    let importer = lenient_importer().await;
    // Cancel before the apply loop starts: plans exist, nothing written.
    let cancel = AtomicBool::new(true);
    let report = importer
        .import_lines_with_cancel(&owned(&canonical_sc_block()), &cancel)
        .await
        .unwrap();
    assert_eq!(report.inserted, 1);
    assert!(report.actions.iter().all(|a| !a.applied));
    assert_eq!(importer.store().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_cancellation_mid_batch_keeps_committed_prefix() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use question_bank_importer::{
        ApplyMode, ApplyOutcome, ImportError, LookupStore, PlannedAction, Record,
    };

    /// Delegates to the real store and raises the flag after each apply,
    /// so the second record of a lenient batch hits the cancel check.
    struct TrippingStore {
        inner: SqliteStore,
        cancel: Arc<AtomicBool>,
    }

    #[async_trait]
    impl LookupStore for TrippingStore {
        async fn get(&self, question_id: &str) -> Result<Option<Record>, ImportError> {
            self.inner.get(question_id).await
        }

        async fn apply(
            &self,
            actions: &[PlannedAction],
            mode: ApplyMode,
        ) -> Result<ApplyOutcome, ImportError> {
            let outcome = self.inner.apply(actions, mode).await?;
            self.cancel.store(true, Ordering::SeqCst);
            Ok(outcome)
        }
    }

    let store = SqliteStore::new("sqlite::memory:").await.unwrap();
    let cancel = Arc::new(AtomicBool::new(false));
    let importer = Importer::new(
        TrippingStore {
            inner: store.clone(),
            cancel: cancel.clone(),
        },
        ImportOptions::default(),
    );

    let mut lines = canonical_sc_block();
    lines.extend_from_slice(&[
        "是非题ID: tf_001",
        "中文题干: 题干",
        "答案: T",
    ]);
    let report = importer
        .import_lines_with_cancel(&owned(&lines), &cancel)
        .await
        .unwrap();

    assert_eq!(report.inserted, 2);
    assert!(report.actions[0].applied, "first record commits before the flag");
    assert!(!report.actions[1].applied, "second record is cut off");
    assert_eq!(store.count().await.unwrap(), 1);
    assert!(store.get_record("sc_001").await.unwrap().is_some());
    assert!(store.get_record("tf_001").await.unwrap().is_none());
}

#[tokio::test]
async fn test_determinism_same_document_same_report() {
    let importer = lenient_importer().await;
    let lines = owned(&[
        "单选题ID: sc_010",
        "中文题干: 题干",
        "A: 甲",
        "B: 乙",
        "C: 丙",
        "D: 丁",
        "正确答案: E", // rejected both times
        "是非题ID: tf_010",
        "中文题干: 题干",
        "答案: T",
    ]);

    let dry = ImportOptions {
        mode: ImportMode::Lenient,
        dry_run: true,
    };
    let importer = Importer::new(importer.store().clone(), dry);
    let a = importer.import_lines(&lines).await.unwrap();
    let b = importer.import_lines(&lines).await.unwrap();
    assert_eq!(a, b);
}
