use std::path::PathBuf;

use imgscout_engine::config::load_config;
use imgscout_engine::fetch::HttpFetcher;
use imgscout_engine::handler::{self, OutputMode, ScrapeForm};
use imgscout_engine::log::EventLog;
use imgscout_engine::paths::AppPaths;
use imgscout_engine::rank::ContentLengthRanker;
use imgscout_engine::workspace::RequestWorkspace;

fn main() -> Result<(), String> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_help();
        return Ok(());
    }

    let mut url: Option<String> = None;
    let mut base_dir: Option<PathBuf> = None;
    let mut output_dir: Option<PathBuf> = None;
    let mut scoped = false;
    let mut log_to_file = false;
    let mut full = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--url" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--url requires a value".to_string())?;
                url = Some(v.to_string());
            }
            "--base-dir" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--base-dir requires a value".to_string())?;
                base_dir = Some(PathBuf::from(v));
            }
            "--output-dir" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--output-dir requires a value".to_string())?;
                output_dir = Some(PathBuf::from(v));
            }
            "--scoped" => scoped = true,
            "--log-file" => log_to_file = true,
            "--full" => full = true,
            other => return Err(format!("unknown arg: {other} (try --help)")),
        }
        i += 1;
    }

    if scoped && output_dir.is_some() {
        return Err("--scoped and --output-dir are mutually exclusive".to_string());
    }

    let base_dir = base_dir
        .or_else(default_base_dir)
        .map(|dir| AppPaths::normalize_base_dir(&dir))
        .ok_or_else(|| "could not determine base dir; pass --base-dir".to_string())?;
    let paths = AppPaths::new(base_dir);
    paths.ensure_dirs().map_err(|e| e.to_string())?;
    let config = load_config(&paths).map_err(|e| e.to_string())?;

    let log = if log_to_file {
        EventLog::file(paths.request_log_path())
    } else {
        EventLog::stderr()
    };
    let output = if scoped {
        OutputMode::Scoped { parent: None }
    } else {
        OutputMode::Fixed(output_dir.unwrap_or_else(|| paths.static_dir()))
    };

    let fetcher = HttpFetcher::from_config(&config);
    let ranker = ContentLengthRanker::new(config.probe_timeout());
    let form = ScrapeForm { url };
    let result = handler::handle_scrape(&fetcher, &ranker, &config, &output, &form, &log);

    let rendered = match (&result, full) {
        (Ok(outcome), true) => serde_json::to_string_pretty(&outcome.response),
        _ => serde_json::to_string_pretty(&handler::presentation_payload(&result)),
    }
    .map_err(|e| e.to_string())?;
    println!("{rendered}");

    match result {
        Ok(outcome) => {
            eprintln!("{}", workspace_notice(&outcome.workspace));
            Ok(())
        }
        Err(err) => Err(err.to_string()),
    }
}

fn workspace_notice(workspace: &RequestWorkspace) -> String {
    let root = workspace.root().to_string_lossy();
    if workspace.is_scoped() {
        format!(
            "Not kept: {root} (and the downloads/ paths above) is removed on exit; drop --scoped to keep files"
        )
    } else {
        format!("Saved under: {root}")
    }
}

fn default_base_dir() -> Option<PathBuf> {
    if let Ok(v) = std::env::var("IMGSCOUT_BASE_DIR") {
        let t = v.trim();
        if !t.is_empty() {
            return Some(PathBuf::from(t));
        }
    }
    std::env::current_dir().ok()
}

fn print_help() {
    println!(
        r#"imgscout

Fetches a page, picks out its high-resolution images and downloads them.

Usage:
  imgscout --url https://www.oricon.co.jp/news/123456/
  imgscout --url https://example.com/gallery --scoped --full

Options:
  --url <url>          Page to scrape (required)
  --base-dir <path>    Holds config/, logs/ and static/ (default: $IMGSCOUT_BASE_DIR or the current dir)
  --output-dir <path>  Directory whose downloads/ is replaced on every run (default: <base-dir>/static)
  --scoped             Download into a temporary directory removed on exit
  --log-file           Append JSON log lines to <base-dir>/logs/requests.jsonl instead of stderr
  --full               Print the full response (request id, strategy, sizes, digests)
"#
    );
}
