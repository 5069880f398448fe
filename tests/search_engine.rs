use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use tailscan::{
    Column, ColumnType, Combinator, EngineEvent, EngineEvents, EngineSettings, FileConf,
    FileFormat, LogEngine, SearchId, SearchParam,
};
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(5);

fn fast_settings() -> EngineSettings {
    EngineSettings::default()
        .with_poll_interval(Duration::from_millis(10))
        .with_search_resume_interval(Duration::from_millis(10))
        .with_search_flush_interval(Duration::from_millis(10))
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn append(path: &Path, text: &str) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(text.as_bytes()).unwrap();
}

/// Collect the rows reported for `search`, failing on rows from any other search
fn drain_hits(events: &mut EngineEvents, search: SearchId, hits: &mut BTreeSet<u64>) {
    while let Some(event) = events.try_recv() {
        if let EngineEvent::RowsFound { search: id, rows } = event {
            assert_eq!(id, search, "rows delivered for a stale search");
            hits.extend(rows);
        }
    }
}

/// Wait for the hits of `search` to equal `expected`
fn expect_hits(events: &mut EngineEvents, search: SearchId, expected: &[u64]) -> BTreeSet<u64> {
    let expected: BTreeSet<u64> = expected.iter().copied().collect();
    let mut hits = BTreeSet::new();
    wait_until(|| {
        drain_hits(events, search, &mut hits);
        hits == expected
    });
    hits
}

fn indexed(conf: FileConf, rows: u64) -> (LogEngine, EngineEvents) {
    let (mut engine, events) = LogEngine::open(conf, fast_settings());
    engine.start().unwrap();
    assert!(wait_until(|| engine.row_count() == rows));
    (engine, events)
}

fn fruit_log(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("fruit.log");
    std::fs::write(&path, "apple\nBanana\napple pie\ncherry\nAPPLE\n").unwrap();
    path
}

#[test]
fn substring_search_is_case_sensitive_by_default() {
    let dir = TempDir::new().unwrap();
    let path = fruit_log(&dir);
    let (mut engine, mut events) = indexed(FileConf::new(&path, FileFormat::Text), 5);

    let search = engine
        .start_search(&[SearchParam::substring("apple")], Combinator::And)
        .unwrap();
    let hits = expect_hits(&mut events, search, &[0, 2]);
    assert_eq!(hits.into_iter().collect::<Vec<_>>(), vec![0, 2]);
}

#[test]
fn case_insensitive_and_negated_searches() {
    let dir = TempDir::new().unwrap();
    let path = fruit_log(&dir);
    let (mut engine, mut events) = indexed(FileConf::new(&path, FileFormat::Text), 5);

    let search = engine
        .start_search(
            &[SearchParam::substring("apple").with_case_sensitive(false)],
            Combinator::And,
        )
        .unwrap();
    assert_eq!(expect_hits(&mut events, search, &[0, 2, 4]).len(), 3);

    let search = engine
        .start_search(
            &[SearchParam::substring("apple")
                .with_case_sensitive(false)
                .with_not(true)],
            Combinator::And,
        )
        .unwrap();
    assert_eq!(expect_hits(&mut events, search, &[1, 3]).len(), 2);
}

#[test]
fn regex_search_with_whole_text() {
    let dir = TempDir::new().unwrap();
    let path = fruit_log(&dir);
    let (mut engine, mut events) = indexed(FileConf::new(&path, FileFormat::Text), 5);

    let search = engine
        .start_search(
            &[SearchParam::regex("a.*e").with_whole_text(true)],
            Combinator::And,
        )
        .unwrap();
    assert_eq!(expect_hits(&mut events, search, &[0, 2]).len(), 2);
}

#[test]
fn or_combinator_accepts_any_predicate() {
    let dir = TempDir::new().unwrap();
    let path = fruit_log(&dir);
    let (mut engine, mut events) = indexed(FileConf::new(&path, FileFormat::Text), 5);

    let search = engine
        .start_search(
            &[SearchParam::substring("cherry"), SearchParam::substring("Banana")],
            Combinator::Or,
        )
        .unwrap();
    assert_eq!(expect_hits(&mut events, search, &[1, 3]).len(), 2);
}

#[test]
fn range_search_on_typed_column() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("values.log");
    let lines: Vec<String> = (0..15).map(|n| format!("id={} value={}", n, n)).collect();
    std::fs::write(&path, lines.join("\n") + "\n").unwrap();

    let conf = FileConf::new(&path, FileFormat::Text)
        .with_row_pattern(r"^id=(\d+) value=(\d+)$")
        .with_columns(vec![
            Column::new(0, "1", "id"),
            Column::new(1, "2", "value").with_type(ColumnType::SignedInt),
        ]);
    let (mut engine, mut events) = indexed(conf, 15);

    let search = engine
        .start_search(&[SearchParam::range("5 -> 10", 1)], Combinator::And)
        .unwrap();
    assert_eq!(
        expect_hits(&mut events, search, &[5, 6, 7, 8, 9, 10]).len(),
        6
    );
}

#[test]
fn invalid_searches_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = fruit_log(&dir);
    let (mut engine, _events) = indexed(FileConf::new(&path, FileFormat::Text), 5);

    assert!(engine
        .start_search(&[SearchParam::regex("(unclosed")], Combinator::And)
        .is_err());
    assert!(engine
        .start_search(&[SearchParam::range("1 -> 2", 7)], Combinator::And)
        .is_err());
    assert!(!engine.is_searching());
}

#[test]
fn search_keeps_up_with_appended_rows() {
    let dir = TempDir::new().unwrap();
    let path = fruit_log(&dir);
    let (mut engine, mut events) = indexed(FileConf::new(&path, FileFormat::Text), 5);

    let search = engine
        .start_search(&[SearchParam::substring("apple")], Combinator::And)
        .unwrap();
    let mut hits = expect_hits(&mut events, search, &[0, 2]);

    append(&path, "plum\npineapple\n");
    assert!(wait_until(|| {
        drain_hits(&mut events, search, &mut hits);
        hits.contains(&6)
    }));
    assert!(!hits.contains(&5));
}

#[test]
fn provisional_row_is_retested_when_it_grows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("partial.log");
    std::fs::write(&path, "apple\npine").unwrap();
    let (mut engine, mut events) = indexed(FileConf::new(&path, FileFormat::Text), 2);

    let search = engine
        .start_search(&[SearchParam::substring("apple")], Combinator::And)
        .unwrap();
    let mut hits = expect_hits(&mut events, search, &[0]);

    append(&path, "apple\n");
    assert!(wait_until(|| {
        drain_hits(&mut events, search, &mut hits);
        hits.contains(&1)
    }));
}

#[test]
fn restarting_a_search_drops_stale_results() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("big.log");
    let lines: Vec<String> = (0..5000).map(|n| format!("line {} apple", n)).collect();
    std::fs::write(&path, lines.join("\n") + "\n").unwrap();
    let (mut engine, mut events) = indexed(FileConf::new(&path, FileFormat::Text), 5000);

    let first = engine
        .start_search(&[SearchParam::substring("apple")], Combinator::And)
        .unwrap();
    let second = engine
        .start_search(&[SearchParam::substring("line 4999 ")], Combinator::And)
        .unwrap();
    assert!(second > first);

    let hits = expect_hits(&mut events, second, &[4999]);
    assert_eq!(hits.len(), 1);
}

#[test]
fn stopped_search_delivers_nothing_more() {
    let dir = TempDir::new().unwrap();
    let path = fruit_log(&dir);
    let (mut engine, mut events) = indexed(FileConf::new(&path, FileFormat::Text), 5);

    let search = engine
        .start_search(&[SearchParam::substring("apple")], Combinator::And)
        .unwrap();
    assert!(engine.is_searching());
    engine.stop_search();
    assert!(!engine.is_searching());

    append(&path, "apple again\n");
    assert!(wait_until(|| engine.row_count() == 6));
    std::thread::sleep(Duration::from_millis(50));

    while let Some(event) = events.try_recv() {
        assert!(
            !matches!(event, EngineEvent::RowsFound { .. }),
            "search {} reported rows after being stopped",
            search
        );
    }
}

#[test]
fn search_starts_over_after_recreation() {
    let dir = TempDir::new().unwrap();
    let path = fruit_log(&dir);
    let (mut engine, mut events) = indexed(FileConf::new(&path, FileFormat::Text), 5);

    let search = engine
        .start_search(&[SearchParam::substring("apple")], Combinator::And)
        .unwrap();
    expect_hits(&mut events, search, &[0, 2]);

    std::fs::write(&path, "kiwi\napple\n").unwrap();
    let mut hits = BTreeSet::new();
    assert!(wait_until(|| {
        drain_hits(&mut events, search, &mut hits);
        hits.contains(&1) && engine.row_count() == 2
    }));
    assert_eq!(
        engine.get_row(1).map(|(_, fields)| fields),
        Some(vec!["apple".to_string()])
    );
}

#[test]
fn json_search_in_column() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.json");
    std::fs::write(
        &path,
        "{\"level\":\"info\",\"msg\":\"error budget ok\"}\n\
         {\"level\":\"error\",\"msg\":\"disk full\"}\n\
         {\"level\":\"info\",\"msg\":\"done\"}\n",
    )
    .unwrap();
    let (mut engine, mut events) = indexed(FileConf::new(&path, FileFormat::Json), 3);

    let search = engine
        .start_search(
            &[SearchParam::substring("error").in_column(0)],
            Combinator::And,
        )
        .unwrap();
    assert_eq!(expect_hits(&mut events, search, &[1]).len(), 1);
}
