use std::sync::Arc;

use nodeweave_agent::graph::{instrument, Edge, Step, TraceEntry};
use nodeweave_agent::workflows::chat::{run_chat, ChatDependencies, ChatState};
use nodeweave_agent::workflows::hello::{run_hello, HelloDependencies, HelloState};
use nodeweave_agent::workflows::ingest::{
    ingest_files, FileTypeRouterNode, IngestDependencies, IngestState, IngestionNode,
};
use nodeweave_core::types::AddResult;
use nodeweave_test_utils::{temp_dir_with, FailingLlm, RecordingStore, StubProcessor};

fn ingest_deps(store: Arc<RecordingStore>) -> IngestDependencies {
    IngestDependencies::new(store).with_processor(Arc::new(StubProcessor::new()))
}

#[tokio::test]
async fn hello_from_empty_state() {
    let deps = HelloDependencies::new().without_latency();
    let mut state = HelloState::default();

    let run = run_hello(&mut state, &deps).await.unwrap();

    assert_eq!(run.output, "Hello World!");
    assert_eq!(state.combined_text, "Hello World!");
    assert_eq!(state.execution_history.len(), 4);
    assert_eq!(
        run.trace,
        vec![
            TraceEntry::Node("HelloNode"),
            TraceEntry::Node("WorldNode"),
            TraceEntry::Node("CombineNode"),
            TraceEntry::Node("PrintNode"),
            TraceEntry::End,
        ]
    );
}

#[tokio::test]
async fn hello_keeps_preset_greeting() {
    let deps = HelloDependencies::new().without_latency();
    let mut state = HelloState::with_hello("Custom Hello");

    let run = run_hello(&mut state, &deps).await.unwrap();

    assert_eq!(state.hello_text, "Custom Hello");
    assert_eq!(state.world_text, "World");
    assert_eq!(run.output, "Custom Hello World!");
}

#[tokio::test]
async fn router_splits_heavy_text_and_skip() {
    let (dir, paths) = temp_dir_with(&[
        ("a.pdf", b"%PDF-1.4"),
        ("b.txt", b"plain words"),
        ("c.exe", b"MZ\x00\x00"),
    ]);
    let deps = ingest_deps(Arc::new(RecordingStore::new()));
    let mut state = IngestState::from_paths(&paths, "c");

    let step = instrument::step(&FileTypeRouterNode, &mut state, &deps).await.unwrap();

    assert_eq!(step.edge(), Edge::To("DocumentProcessorNode"));
    assert_eq!(state.documents, vec!["plain words".to_string()]);
    assert_eq!(state.document_ids, vec!["doc_0_b_type_txt".to_string()]);
    assert_eq!(state.metadata.len(), 1);
    assert_eq!(state.file_paths, vec![dir.path().join("a.pdf")]);
    assert_eq!(state.routing.skipped, vec![dir.path().join("c.exe")]);
    assert_eq!(state.routing.total(), 3);
}

#[tokio::test]
async fn text_only_batch_goes_straight_to_ingestion() {
    let (_dir, paths) = temp_dir_with(&[("only.txt", b"solo")]);
    let store = Arc::new(RecordingStore::new());
    let deps = ingest_deps(store.clone());
    let mut state = IngestState::from_paths(&paths, "notes");

    let step = instrument::step(&FileTypeRouterNode, &mut state, &deps).await.unwrap();
    assert_eq!(step.edge(), Edge::To("IngestionNode"));

    let step = instrument::step(&IngestionNode, &mut state, &deps).await.unwrap();
    let Step::End(result) = step else {
        panic!("ingestion must end the run");
    };

    assert_eq!(result, AddResult::ok("notes", vec!["doc_0_only_type_txt".into()]));
    assert_eq!(state.ingestion_results.as_ref(), Some(&result));
    assert_eq!(state.total_time, state.ingestion_time);
    assert_eq!(store.adds().len(), 1);
}

#[tokio::test]
async fn chat_failure_still_reaches_terminal() {
    let deps = ChatDependencies::new(Arc::new(FailingLlm::new("connection refused")));
    let mut state = ChatState::new("hello?");

    let run = run_chat(&mut state, &deps).await.unwrap();

    assert!(state.ai_response.starts_with("Error generating response:"));
    assert_eq!(run.output, state.ai_response);
    assert_eq!(run.trace.last(), Some(&TraceEntry::End));
}

#[tokio::test]
async fn identical_runs_trace_identically() {
    let deps = HelloDependencies::new().without_latency();

    let mut first = HelloState::default();
    let mut second = HelloState::default();
    let a = run_hello(&mut first, &deps).await.unwrap();
    let b = run_hello(&mut second, &deps).await.unwrap();

    assert_eq!(a.trace, b.trace);
    assert_eq!(a.output, b.output);
    assert_eq!(first.execution_history.len(), second.execution_history.len());
}

#[tokio::test]
async fn history_has_one_line_per_node_step() {
    let (_dir, paths) = temp_dir_with(&[("x.pdf", b"%PDF"), ("y.txt", b"why")]);
    let deps = ingest_deps(Arc::new(RecordingStore::new()));
    let mut state = IngestState::from_paths(&paths, "c");

    let run = ingest_files(&mut state, &deps).await.unwrap();

    assert_eq!(state.node_execution_history.len(), run.trace.len() - 1);
    let prefixes: Vec<&str> = state
        .node_execution_history
        .iter()
        .map(|line| line.split(':').next().unwrap_or_default())
        .collect();
    assert_eq!(
        prefixes,
        vec!["FileTypeRouterNode", "DocumentProcessorNode", "IngestionNode"]
    );
}

#[tokio::test]
async fn every_router_input_is_accounted_for() {
    let (_dir, paths) = temp_dir_with(&[
        ("report.docx", b"PK"),
        ("slides.PPTX", b"PK"),
        ("readme.txt", b"read me"),
        ("notes.rst", b"restructured"),
        ("dump.core", b"\x7fELF\x00\x00"),
        ("archive.tar", b"ustar"),
        ("setup.EXE", b"MZ"),
    ]);
    let deps = ingest_deps(Arc::new(RecordingStore::new()));
    let mut state = IngestState::from_paths(&paths, "c");

    ingest_files(&mut state, &deps).await.unwrap();

    let r = &state.routing;
    assert_eq!(r.total(), paths.len());
    assert_eq!(r.heavy.len(), 2);
    assert_eq!(r.direct.len(), 2);
    assert_eq!(r.skipped.len(), 2);
    assert_eq!(r.unreadable.len(), 1);
    for path in &paths {
        let hits = [&r.heavy, &r.direct, &r.skipped, &r.unreadable]
            .iter()
            .filter(|bucket| bucket.contains(path))
            .count();
        assert_eq!(hits, 1, "{} landed in {} buckets", path.display(), hits);
    }
}

#[tokio::test]
async fn duplicate_file_names_get_distinct_ids() {
    let (_dir, paths) = temp_dir_with(&[
        ("one/notes.txt", b"first"),
        ("two/notes.txt", b"second"),
        ("one/paper.pdf", b"%PDF"),
        ("two/paper.pdf", b"%PDF"),
    ]);
    let store = Arc::new(RecordingStore::new());
    let deps = ingest_deps(store.clone());
    let mut state = IngestState::from_paths(&paths, "c");

    ingest_files(&mut state, &deps).await.unwrap();

    let mut ids = state.document_ids.clone();
    assert_eq!(ids.len(), 4);
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 4);
    assert_eq!(
        state.document_ids,
        vec![
            "doc_0_notes_type_txt",
            "doc_1_notes_type_txt",
            "doc_2_paper_type_pdf",
            "doc_3_paper_type_pdf",
        ]
    );
    assert_eq!(store.adds()[0].ids.as_ref().map(Vec::len), Some(4));
}

#[tokio::test]
async fn empty_batch_ingests_documents_already_in_state() {
    let store = Arc::new(RecordingStore::new());
    let deps = ingest_deps(store.clone());
    let mut state = IngestState {
        documents: vec!["pre".to_string()],
        metadata: vec![nodeweave_core::types::metadata_from([("source", "seed")])],
        document_ids: vec!["seed_0".to_string()],
        collection_name: "notes".to_string(),
        ..IngestState::default()
    };

    let run = ingest_files(&mut state, &deps).await.unwrap();

    assert_eq!(run.output, AddResult::ok("notes", vec!["seed_0".into()]));
    assert_eq!(state.routing.total(), 0);
    assert_eq!(state.documents, vec!["pre".to_string()]);
    let adds = store.adds();
    assert_eq!(adds.len(), 1);
    assert_eq!(adds[0].documents, vec!["pre".to_string()]);
    assert_eq!(
        run.trace,
        vec![
            TraceEntry::Node("FileTypeRouterNode"),
            TraceEntry::Node("IngestionNode"),
            TraceEntry::End,
        ]
    );
}
