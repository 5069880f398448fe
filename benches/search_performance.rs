use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::io::Write;
use std::time::{Duration, Instant};
use tailscan::{
    Column, ColumnType, Combinator, EngineEvent, EngineSettings, FileConf, FileFormat, LogEngine,
    RowMatcher, SearchParam,
};
use tempfile::NamedTempFile;

const ROW_PATTERN: &str = r"^\[(\S+)\] (\w+) (\w+): (.*) latency=(\d+)$";

fn create_log_file_with_patterns(size_kb: usize, pattern_frequency: usize) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    let target_size = size_kb * 1024;
    let mut current_size = 0;
    let mut line_num = 0;

    let log_levels = ["DEBUG", "INFO", "WARN", "ERROR", "FATAL"];
    let services = ["auth", "database", "cache", "payment", "notification"];
    let error_patterns = ["timeout", "connection_failed", "null_pointer", "out_of_memory"];

    while current_size < target_size {
        let message = if line_num % pattern_frequency == 0 {
            let error = error_patterns[line_num / pattern_frequency % error_patterns.len()];
            format!("Request {} failed with {} user_{}", line_num, error, line_num % 1000)
        } else {
            format!("Request {} processed successfully user_{}", line_num, line_num % 1000)
        };
        let log_line = format!(
            "[2024-09-02T10:{:02}:{:02}] {} {}: {} latency={}\n",
            (line_num / 60) % 60,
            line_num % 60,
            log_levels[line_num % log_levels.len()],
            services[line_num % services.len()],
            message,
            line_num % 500
        );

        temp_file.write_all(log_line.as_bytes()).unwrap();
        current_size += log_line.len();
        line_num += 1;
    }

    temp_file.flush().unwrap();
    temp_file
}

fn columns() -> Vec<Column> {
    vec![
        Column::new(0, "1", "time").with_type(ColumnType::Timestamp),
        Column::new(1, "2", "level"),
        Column::new(2, "3", "service"),
        Column::new(3, "4", "message"),
        Column::new(4, "5", "latency").with_type(ColumnType::UnsignedInt),
    ]
}

fn started_engine(temp_file: &NamedTempFile) -> LogEngine {
    let conf = FileConf::new(temp_file.path(), FileFormat::Text)
        .with_row_pattern(ROW_PATTERN)
        .with_columns(columns());
    let settings = EngineSettings::default()
        .with_poll_interval(Duration::from_millis(1))
        .with_search_flush_interval(Duration::from_millis(50))
        .with_search_resume_interval(Duration::from_millis(1));
    let (mut engine, _events) = LogEngine::open(conf, settings);
    engine.start().unwrap();

    let size = std::fs::metadata(temp_file.path()).unwrap().len();
    while engine.indexed_bytes() < size {
        std::thread::sleep(Duration::from_millis(1));
    }
    engine
}

fn size_label(size_kb: usize) -> String {
    if size_kb < 1024 {
        format!("{}KB", size_kb)
    } else {
        format!("{}MB", size_kb / 1024)
    }
}

fn bench_row_matchers(c: &mut Criterion) {
    let mut group = c.benchmark_group("row_matchers");
    let columns = columns();
    let rows: Vec<Vec<String>> = (0..1000)
        .map(|n| {
            vec![
                format!("2024-09-02T10:{:02}:{:02}", (n / 60) % 60, n % 60),
                if n % 7 == 0 { "ERROR" } else { "INFO" }.to_string(),
                "payment".to_string(),
                format!("Request {} processed successfully user_{}", n, n % 100),
                (n % 500).to_string(),
            ]
        })
        .collect();

    let cases = [
        ("literal", vec![SearchParam::substring("user_42")]),
        (
            "case_insensitive",
            vec![SearchParam::substring("error").with_case_sensitive(false)],
        ),
        ("regex", vec![SearchParam::regex(r"Request \d+5 ")]),
        ("range_int", vec![SearchParam::range("100 -> 200", 4)]),
        (
            "range_timestamp",
            vec![SearchParam::range("2024-09-02T10:05:00 -> 2024-09-02T10:06:00", 0)],
        ),
        (
            "and_two_columns",
            vec![
                SearchParam::substring("ERROR").in_column(1),
                SearchParam::range("-> 250", 4),
            ],
        ),
    ];

    for (name, params) in cases {
        let matcher = RowMatcher::new(&params, Combinator::And, &columns).unwrap();
        group.bench_function(name, |b| {
            b.iter(|| black_box(rows.iter().filter(|row| matcher.matches_row(row)).count()));
        });
    }

    group.finish();
}

fn bench_background_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("background_search");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(5));

    let pattern_frequency = 100;
    for &size_kb in &[500, 5000] {
        let temp_file = create_log_file_with_patterns(size_kb, pattern_frequency);
        let conf = FileConf::new(temp_file.path(), FileFormat::Text)
            .with_row_pattern(ROW_PATTERN)
            .with_columns(columns());
        let settings = EngineSettings::default()
            .with_poll_interval(Duration::from_millis(1))
            .with_search_flush_interval(Duration::from_millis(50))
            .with_search_resume_interval(Duration::from_millis(1));
        let (mut engine, mut events) = LogEngine::open(conf, settings);
        engine.start().unwrap();
        let size = std::fs::metadata(temp_file.path()).unwrap().len();
        while engine.indexed_bytes() < size {
            std::thread::sleep(Duration::from_millis(1));
        }

        group.bench_function(BenchmarkId::new("timeout", size_label(size_kb)), |b| {
            b.iter(|| {
                let search = engine
                    .start_search(&[SearchParam::substring("timeout")], Combinator::And)
                    .unwrap();
                let deadline = Instant::now() + Duration::from_secs(30);
                let mut found = 0;
                while engine.completed_search_passes() == 0 && Instant::now() < deadline {
                    std::thread::sleep(Duration::from_micros(200));
                }
                while let Some(event) = events.try_recv() {
                    if let EngineEvent::RowsFound { search: id, rows } = event {
                        if id == search {
                            found += rows.len();
                        }
                    }
                }
                engine.stop_search();
                black_box(found)
            });
        });
    }

    group.finish();
}

fn bench_random_row_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_row_access");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(5));

    for &size_kb in &[5000, 15000] {
        let temp_file = create_log_file_with_patterns(size_kb, 100);
        let engine = started_engine(&temp_file);
        let rows = engine.row_count();

        group.bench_function(BenchmarkId::new("get_row", size_label(size_kb)), |b| {
            let mut rng = ChaCha8Rng::seed_from_u64(42); // Fixed seed for reproducibility
            b.iter(|| black_box(engine.get_row(rng.gen_range(0..rows))));
        });

        group.bench_function(BenchmarkId::new("get_row_nearby", size_label(size_kb)), |b| {
            let mut rng = ChaCha8Rng::seed_from_u64(43);
            let mut row = rows / 2;
            b.iter(|| {
                row = (row + rng.gen_range(0..8)).min(rows - 1);
                black_box(engine.get_row(row))
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_row_matchers,
    bench_background_search,
    bench_random_row_access
);
criterion_main!(benches);
