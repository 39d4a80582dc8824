//! End-to-end tests of the per-part and multi-part pipelines.
//!
//! Exams are built in memory with lopdf, written to a temp directory and run
//! through `run_part` / `run_batch`; the produced files are read back.

mod common;

use std::sync::atomic::AtomicBool;

use common::{image_at, page_texts, text_at, write_part};
use examcrop::{
    EngineConfig, ExamcropError, FailedQuestion, GeometryFile, PartStatus, ProcessingStatistics,
    QuestionEntry, QuestionStatus, run_batch, run_part, summarize,
};

const SEGMENTATION: &str = r#"{
    "questions": [
        {"id": "Q1", "text": "primo", "start_marker": "1. Cual de los siguientes", "page_nums": [1]},
        {"id": "Q2", "text": "figura", "start_marker": "2. Observa la figura", "page_nums": [1],
         "multi_question_references": ["R1"]},
        {"id": "Q3", "text": "ventas", "start_marker": "3. Que region", "page_nums": [2]}
    ],
    "multi_question_references": [
        {"id": "R1", "type": "figure", "text": "grafico", "start_marker": "Figura 1",
         "page_nums": [2], "question_ids": ["Q2", "Q3"]}
    ]
}"#;

fn exam_pages() -> Vec<String> {
    vec![
        format!(
            "{}{}{}",
            text_at(72.0, 700.0, "1. Cual de los siguientes numeros es primo y mayor que diez"),
            text_at(72.0, 680.0, "Opciones: once, doce, quince, dieciocho"),
            text_at(72.0, 400.0, "2. Observa la figura de la pagina siguiente y responde"),
        ),
        format!(
            "{}{}{}",
            text_at(72.0, 720.0, "Figura 1: Ventas anuales por region"),
            image_at(100.0, 450.0, 300.0, 200.0),
            text_at(72.0, 300.0, "3. Que region tuvo mayores ventas segun la figura"),
        ),
    ]
}

fn read_json<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> T {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn questions_with_shared_reference_are_assembled_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_part(dir.path(), "exam", &exam_pages(), SEGMENTATION);
    let out = dir.path().join("out");

    let outcome = run_part(&input, &out, &EngineConfig::default(), &AtomicBool::new(false)).unwrap();
    assert_eq!(outcome.status, PartStatus::Success);
    // 3 of 65 expected questions is an error, but only strict runs stop on it.
    assert!(outcome.report.has_errors());

    let q1 = page_texts(&out.join("questions/question_001.pdf"));
    assert_eq!(q1.len(), 1);
    assert!(q1[0].contains("1. Cual de los siguientes"));
    assert!(q1[0].contains("Opciones"));
    assert!(!q1[0].contains("2. Observa"), "question 2 leaked into question 1");

    // Reference pages come before the question's own pages.
    let q2 = page_texts(&out.join("questions/question_002.pdf"));
    assert_eq!(q2.len(), 2);
    assert!(q2[0].contains("Figura 1"));
    assert!(!q2[0].contains("3. Que region"));
    assert!(q2[1].contains("2. Observa la figura"));
    assert!(!q2[1].contains("1. Cual"));

    let q3 = page_texts(&out.join("questions/question_003.pdf"));
    assert_eq!(q3.len(), 2);
    assert!(q3[0].contains("Figura 1"));
    assert!(q3[1].contains("3. Que region"));
}

#[test]
fn artifacts_describe_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_part(dir.path(), "exam", &exam_pages(), SEGMENTATION);
    let out = dir.path().join("out");
    run_part(&input, &out, &EngineConfig::default(), &AtomicBool::new(false)).unwrap();

    let list: Vec<QuestionEntry> = read_json(&out.join("questions_list.json"));
    let ids: Vec<&str> = list.iter().map(|q| q.id.as_str()).collect();
    assert_eq!(ids, vec!["Q1", "Q2", "Q3"]);
    assert!(list.iter().all(|q| q.status == QuestionStatus::Accepted));
    assert_eq!(list[1].references, vec!["R1"]);
    assert_eq!(list[1].pdf.as_deref(), Some("questions/question_002.pdf"));

    let stats: ProcessingStatistics = read_json(&out.join("processing_statistics.json"));
    assert_eq!(stats.total_segments, 4);
    assert_eq!((stats.questions, stats.references), (3, 1));
    assert_eq!(stats.accepted, 3);
    assert_eq!(stats.by_type["figure"], 1);
    assert_eq!(stats.by_page[&2], 2);

    let failed: Vec<FailedQuestion> = read_json(&out.join("failed_questions_log.json"));
    assert!(failed.is_empty());

    let geometry = GeometryFile::load(&out.join("segments_with_bboxes.json")).unwrap();
    assert_eq!(geometry.segments.len(), 4);
    assert!(geometry.unplaced.is_empty());
    for placed in &geometry.segments {
        assert_eq!(placed.bboxes().len(), placed.segment().page_nums.len());
    }
}

#[test]
fn rejected_and_skipped_questions_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let pages = vec![format!(
        "{}{}",
        text_at(72.0, 700.0, "1. Calcula el perimetro de un cuadrado de lado cuatro"),
        text_at(72.0, 400.0, "2. Si"),
    )];
    let input = write_part(
        dir.path(),
        "exam",
        &pages,
        r#"{"questions": [
            {"id": "Q1", "text": "a", "start_marker": "1. Calcula", "page_nums": [1]},
            {"id": "Q2", "text": "b", "start_marker": "2. Si", "page_nums": [1]},
            {"id": "Q3", "text": "c", "start_marker": "3. Ausente", "page_nums": [1]},
            {"id": "Q4", "text": "d", "start_marker": "4. Fuera", "page_nums": [7]}
        ]}"#,
    );
    let out = dir.path().join("out");
    let outcome = run_part(&input, &out, &EngineConfig::default(), &AtomicBool::new(false)).unwrap();

    assert_eq!(outcome.status, PartStatus::PartialSuccess);
    let stats = &outcome.extraction.statistics;
    assert_eq!((stats.accepted, stats.rejected, stats.skipped), (1, 1, 2));
    assert!(out.join("failed_questions/question_002.pdf").exists());

    let failed: Vec<FailedQuestion> = read_json(&out.join("failed_questions_log.json"));
    assert_eq!(failed.len(), 1);
    assert!(failed[0].reason.contains("has_content"));

    let summary = outcome.summary();
    assert!(summary.reasons.iter().any(|r| r.starts_with("Q2: has_content")));
    assert!(summary.reasons.iter().any(|r| r.starts_with("Q3:")));
    assert!(summary.reasons.iter().any(|r| r.starts_with("Q4:")));
    assert!(
        outcome
            .report
            .errors()
            .any(|issue| issue.code == "PAGE_OUT_OF_RANGE")
    );
}

#[test]
fn question_number_check_rejects_mismatched_files() {
    let dir = tempfile::tempdir().unwrap();
    let pages = vec![text_at(72.0, 700.0, "7. Determina el valor de x en la ecuacion dada")];
    let input = write_part(
        dir.path(),
        "exam",
        &pages,
        r#"{"questions": [{"id": "Q5", "text": "a", "start_marker": "7. Determina", "page_nums": [1]}]}"#,
    );
    let mut config = EngineConfig::default();
    config.acceptance.check_question_number = true;
    let out = dir.path().join("out");
    let outcome = run_part(&input, &out, &config, &AtomicBool::new(false)).unwrap();

    assert_eq!(outcome.status, PartStatus::Failed);
    assert!(out.join("failed_questions/question_005.pdf").exists());
    let failed: Vec<FailedQuestion> = read_json(&out.join("failed_questions_log.json"));
    assert!(failed[0].reason.starts_with("question_number_match"));
}

#[test]
fn question_number_check_reads_only_the_question_pages() {
    let dir = tempfile::tempdir().unwrap();
    let pages = vec![
        text_at(72.0, 700.0, "1. En el siglo XIX la ciudad crecio rapidamente hacia el norte"),
        text_at(72.0, 700.0, "6. Segun el texto, por que crecio la ciudad hacia el norte"),
    ];
    let input = write_part(
        dir.path(),
        "exam",
        &pages,
        r#"{
            "questions": [{"id": "Q6", "text": "a", "start_marker": "6. Segun el texto",
                           "page_nums": [2], "multi_question_references": ["R1"]}],
            "multi_question_references": [{"id": "R1", "type": "text", "text": "r",
                "start_marker": "1. En el siglo", "page_nums": [1], "question_ids": ["Q6"]}]
        }"#,
    );
    let mut config = EngineConfig::default();
    config.acceptance.check_question_number = true;
    let out = dir.path().join("out");
    let outcome = run_part(&input, &out, &config, &AtomicBool::new(false)).unwrap();

    assert_eq!(outcome.status, PartStatus::Success);
    let q6 = page_texts(&out.join("questions/question_006.pdf"));
    assert_eq!(q6.len(), 2);
    assert!(q6[0].starts_with("1. En el siglo"));
}

#[test]
fn colliding_output_names_fail_the_later_question() {
    let dir = tempfile::tempdir().unwrap();
    let pages = vec![
        text_at(72.0, 700.0, "1. Calcula el area del rectangulo de la figura adjunta"),
        text_at(72.0, 700.0, "1. Calcula el perimetro del cuadrado de lado cuatro"),
        text_at(72.0, 700.0, "9. Describe el ciclo del agua en tus propias palabras"),
    ];
    let input = write_part(
        dir.path(),
        "exam",
        &pages,
        r#"{"questions": [
            {"id": "Q1", "text": "a", "start_marker": "1. Calcula el area", "page_nums": [1]},
            {"id": "Q01", "text": "b", "start_marker": "1. Calcula el perimetro", "page_nums": [2]},
            {"id": "../Q9", "text": "c", "start_marker": "9. Describe", "page_nums": [3]}
        ]}"#,
    );
    let out = dir.path().join("out");
    let outcome = run_part(&input, &out, &EngineConfig::default(), &AtomicBool::new(false)).unwrap();

    let q1 = page_texts(&out.join("questions/question_001.pdf"));
    assert!(q1[0].contains("area del rectangulo"));
    let failed: Vec<FailedQuestion> = read_json(&out.join("failed_questions_log.json"));
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].question_id, "Q01");
    assert!(failed[0].reason.contains("already used by Q1"));
    assert_eq!(outcome.extraction.statistics.accepted, 2);
    assert_eq!(outcome.extraction.statistics.failed, 1);

    // Path-like ids stay inside the output tree.
    let q9 = page_texts(&out.join("questions/question____Q9.pdf"));
    assert!(q9[0].contains("ciclo del agua"));
}

#[test]
fn diagram_choices_get_their_own_files() {
    let dir = tempfile::tempdir().unwrap();
    let pages = vec![format!(
        "{}{}{}{}{}",
        text_at(72.0, 700.0, "1. Cual de las figuras es un triangulo equilatero"),
        text_at(72.0, 600.0, "A)"),
        text_at(320.0, 600.0, "B)"),
        image_at(72.0, 450.0, 150.0, 120.0),
        image_at(320.0, 450.0, 150.0, 120.0),
    )];
    let input = write_part(
        dir.path(),
        "exam",
        &pages,
        r#"{"questions": [{"id": "Q1", "text": "a", "start_marker": "1. Cual de las", "page_nums": [1]}]}"#,
    );
    let config = EngineConfig {
        emit_choice_regions: true,
        ..EngineConfig::default()
    };
    let out = dir.path().join("out");
    let outcome = run_part(&input, &out, &config, &AtomicBool::new(false)).unwrap();
    assert_eq!(outcome.status, PartStatus::Success);

    let entry = &outcome.extraction.questions[0];
    let letters: Vec<&str> = entry.choices.iter().map(|c| c.letter.as_str()).collect();
    assert_eq!(letters, vec!["A", "B"]);
    assert!(entry.choices[0].bbox.x1 <= entry.choices[1].bbox.x0);

    let a = page_texts(&out.join("questions/question_001_choice_A.pdf"));
    assert!(a[0].contains("A)"));
    assert!(!a[0].contains("B)"));
    assert!(out.join("questions/question_001_choice_B.pdf").exists());
}

#[test]
fn batch_recombines_parts_in_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let parts: Vec<_> = (1..=3)
        .map(|n| {
            write_part(
                dir.path(),
                &format!("part_{n}"),
                &[text_at(72.0, 700.0, &format!("{n}. Explica el procedimiento utilizado paso a paso"))],
                &format!(
                    r#"{{"questions": [{{"id": "Q{n}", "text": "x", "start_marker": "{n}. Explica", "page_nums": [1]}}]}}"#
                ),
            )
        })
        .collect();
    let out = dir.path().join("out");
    let outcomes = run_batch(&parts, &out, &EngineConfig::default(), 8).unwrap();

    let names: Vec<&str> = outcomes.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["part_1", "part_2", "part_3"]);
    for n in 1..=3 {
        assert!(out.join(format!("part_{n}/questions/question_{n:03}.pdf")).exists());
    }
    let summary = summarize(&outcomes);
    assert!(summary.all_succeeded());
    assert!(summary.to_string().contains("part_2: Success (1 of 1 accepted"));
}

#[test]
fn broken_part_fails_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_part(dir.path(), "part_1", &exam_pages(), SEGMENTATION);
    let bad_pdf = dir.path().join("part_2.pdf");
    std::fs::write(&bad_pdf, b"not a pdf at all").unwrap();
    let bad = examcrop::PartInput::new("part_2", bad_pdf, dir.path().join("part_1.json"));

    let err = run_batch(&[good, bad], &dir.path().join("out"), &EngineConfig::default(), 2).unwrap_err();
    match err {
        ExamcropError::PartPipelineFailure { part, source } => {
            assert_eq!(part, "part_2");
            assert!(!matches!(*source, ExamcropError::Cancelled));
        }
        other => panic!("unexpected error: {other}"),
    }
}
