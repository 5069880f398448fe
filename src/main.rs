//! tailscan - index, tail and search large log files from the command line.

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tailscan::{
    validate_file_path, Combinator, EngineEvent, EngineEvents, EngineSettings, FileConf,
    FileFormat, LogEngine, MatchKind, ResultProjection, RowData, RowSource, SearchParam,
};

const TICK: Duration = Duration::from_millis(100);

fn cli() -> Command {
    Command::new("tailscan")
        .version(tailscan::VERSION)
        .about("Index, tail and search large log files")
        .long_about(
            "tailscan indexes a log file incrementally, prints its rows and optionally keeps \
             following it as it grows. With --search only matching rows are printed.",
        )
        .arg(
            Arg::new("file")
                .help("Path to the log file")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .value_parser(["text", "json"])
                .default_value("text")
                .help("Row format of the file"),
        )
        .arg(
            Arg::new("pattern")
                .long("pattern")
                .value_name("REGEX")
                .help("Split text rows into columns by this pattern's capture groups"),
        )
        .arg(
            Arg::new("template")
                .long("template")
                .value_name("TOML")
                .help("Load the file configuration from a TOML template (needs the config feature)"),
        )
        .arg(
            Arg::new("follow")
                .short('f')
                .long("follow")
                .action(ArgAction::SetTrue)
                .help("Keep printing rows as the file grows"),
        )
        .arg(
            Arg::new("search")
                .short('s')
                .long("search")
                .value_name("PATTERN")
                .action(ArgAction::Append)
                .help("Only print rows matching this pattern (repeatable)"),
        )
        .arg(
            Arg::new("regex")
                .short('e')
                .long("regex")
                .action(ArgAction::SetTrue)
                .help("Treat search patterns as regular expressions"),
        )
        .arg(
            Arg::new("range")
                .long("range")
                .value_name("FROM -> TO")
                .help("Match a typed value range in --column"),
        )
        .arg(
            Arg::new("column")
                .short('c')
                .long("column")
                .value_name("INDEX")
                .value_parser(clap::value_parser!(usize))
                .help("Restrict matching to one column"),
        )
        .arg(
            Arg::new("ignore-case")
                .short('i')
                .long("ignore-case")
                .action(ArgAction::SetTrue)
                .help("Case-insensitive matching"),
        )
        .arg(
            Arg::new("whole")
                .short('x')
                .long("whole")
                .action(ArgAction::SetTrue)
                .help("Patterns must match the whole field"),
        )
        .arg(
            Arg::new("not")
                .short('v')
                .long("not")
                .action(ArgAction::SetTrue)
                .help("Invert every pattern"),
        )
        .arg(
            Arg::new("any")
                .long("any")
                .action(ArgAction::SetTrue)
                .help("Print rows matching any pattern instead of all of them"),
        )
}

#[cfg(feature = "config")]
fn load_template(path: &Path) -> Result<FileConf> {
    Ok(FileConf::load(path)?)
}

#[cfg(not(feature = "config"))]
fn load_template(path: &Path) -> Result<FileConf> {
    anyhow::bail!(
        "Cannot load {}: tailscan was built without the config feature",
        path.display()
    )
}

fn file_conf(matches: &ArgMatches, file_path: &Path) -> Result<FileConf> {
    if let Some(template) = matches.get_one::<String>("template") {
        let mut conf = load_template(Path::new(template))?;
        conf.file_path = file_path.to_path_buf();
        return Ok(conf);
    }

    let format = match matches.get_one::<String>("format").map(String::as_str) {
        Some("json") => FileFormat::Json,
        _ => FileFormat::Text,
    };
    let mut conf = FileConf::new(file_path, format);
    if let Some(pattern) = matches.get_one::<String>("pattern") {
        conf = conf.with_row_pattern(pattern.clone());
    }
    Ok(conf)
}

fn search_params(matches: &ArgMatches) -> Result<Vec<SearchParam>> {
    let column = matches.get_one::<usize>("column").copied();
    let kind = if matches.get_flag("regex") {
        MatchKind::Regex
    } else {
        MatchKind::Substring
    };

    let mut params: Vec<SearchParam> = matches
        .get_many::<String>("search")
        .into_iter()
        .flatten()
        .map(|pattern| SearchParam {
            kind,
            pattern: pattern.clone(),
            column,
            ..SearchParam::default()
        })
        .collect();

    if let Some(range) = matches.get_one::<String>("range") {
        let column = column.context("--range needs --column")?;
        params.push(SearchParam::range(range.clone(), column));
    }

    let case_sensitive = !matches.get_flag("ignore-case");
    let whole_text = matches.get_flag("whole");
    let not_operator = matches.get_flag("not");
    Ok(params
        .into_iter()
        .map(|param| {
            param
                .with_case_sensitive(case_sensitive)
                .with_whole_text(whole_text)
                .with_not(not_operator)
        })
        .collect())
}

fn print_row(out: &mut impl Write, row: u64, fields: &RowData) -> Result<()> {
    writeln!(out, "{}\t{}", row + 1, fields.join("\t"))?;
    Ok(())
}

/// True once every byte currently in the file has been indexed
fn caught_up(engine: &LogEngine, path: &Path) -> bool {
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    engine.is_configured() && engine.indexed_bytes() >= size
}

/// Wait for the next event, a tick, or Ctrl-C. Returns false on Ctrl-C.
async fn wait(events: &mut EngineEvents, pending: &mut Vec<EngineEvent>) -> bool {
    let event = tokio::select! {
        _ = tokio::signal::ctrl_c() => return false,
        event = events.recv() => event,
        _ = tokio::time::sleep(TICK) => None,
    };

    pending.extend(event);
    while let Some(event) = events.try_recv() {
        pending.push(event);
    }
    true
}

/// Print rows in order. Following prints only rows that can no longer change.
async fn print_rows(engine: &LogEngine, mut events: EngineEvents, follow: bool) -> Result<()> {
    let stdout = std::io::stdout();
    let mut next = 0u64;
    let mut pending = Vec::new();

    loop {
        for event in pending.drain(..) {
            if let EngineEvent::WatchInterrupted(outcome) = event {
                log::info!("File was {:?}, starting over", outcome);
                next = 0;
            }
        }

        if engine.is_configured() {
            let done = !follow && caught_up(engine, engine.path());
            let limit = if done {
                engine.row_count()
            } else {
                engine.complete_row_count()
            };

            let mut out = stdout.lock();
            while next < limit {
                match engine.get_row(next) {
                    Some((row, fields)) => print_row(&mut out, row, &fields)?,
                    None => break,
                }
                next += 1;
            }
            out.flush()?;

            if done && next >= limit {
                return Ok(());
            }
        }

        if !wait(&mut events, &mut pending).await {
            return Ok(());
        }
    }
}

/// Print matching rows as the search reports them
async fn print_matches(
    engine: &mut LogEngine,
    mut events: EngineEvents,
    params: &[SearchParam],
    combinator: Combinator,
    follow: bool,
) -> Result<()> {
    let stdout = std::io::stdout();
    let mut projection = ResultProjection::new(Arc::new(engine.reader()));
    let mut pending = Vec::new();
    let mut passes_when_caught_up = None;

    while !engine.is_configured() {
        if !wait(&mut events, &mut pending).await {
            return Ok(());
        }
    }
    let search = engine.start_search(params, combinator)?;

    loop {
        let mut out = stdout.lock();
        for event in pending.drain(..) {
            match event {
                EngineEvent::RowsFound { search: id, rows } if id == search => {
                    for row in rows {
                        if projection.add_source_row(row) {
                            if let Some((row, fields)) = projection.source().get_row(row) {
                                print_row(&mut out, row, &fields)?;
                            }
                        }
                    }
                }
                EngineEvent::WatchInterrupted(outcome) => {
                    log::info!("File was {:?}, starting over", outcome);
                    projection.clear();
                    passes_when_caught_up = None;
                }
                _ => {}
            }
        }
        out.flush()?;
        drop(out);

        if !follow {
            match passes_when_caught_up {
                None if caught_up(engine, engine.path()) => {
                    passes_when_caught_up = Some(engine.completed_search_passes());
                }
                // The pass running when indexing caught up may have loaded its
                // chunk before the last growth, so wait for the one after it.
                Some(passes) if engine.completed_search_passes() > passes + 1 => {
                    while let Some(event) = events.try_recv() {
                        pending.push(event);
                    }
                    if pending.is_empty() {
                        log::info!("{} matching rows", projection.len());
                        return Ok(());
                    }
                    continue;
                }
                _ => {}
            }
        }

        if !wait(&mut events, &mut pending).await {
            return Ok(());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let matches = cli().get_matches();
    let file_path = PathBuf::from(
        matches
            .get_one::<String>("file")
            .context("file argument is required")?,
    );
    validate_file_path(&file_path)?;

    let conf = file_conf(&matches, &file_path)?;
    let params = search_params(&matches)?;
    let follow = matches.get_flag("follow");
    let combinator = if matches.get_flag("any") {
        Combinator::Or
    } else {
        Combinator::And
    };

    let (mut engine, events) = LogEngine::open(conf, EngineSettings::default());
    engine.start()?;

    if params.is_empty() {
        print_rows(&engine, events, follow).await?;
    } else {
        print_matches(&mut engine, events, &params, combinator, follow).await?;
    }

    engine.stop();
    Ok(())
}
