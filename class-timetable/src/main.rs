use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

use class_timetable::config::{parse_port, Config};
use class_timetable::display::TextGridRenderer;
use class_timetable::export::{export_csv_to_file, export_payload_to_file};
use class_timetable::import::{run_clear, run_import, Decision, ImportOutcome, ImportSession, Renderer, UserConfirmation};
use class_timetable::parser::RawPayload;
use class_timetable::store::{JsonFileStore, ScheduleStore};
use class_timetable::web;

const USAGE: &str = "usage: class-timetable <import [--yes] FILE|-> | <scan [--yes] FILE|-> | show | clear | export <json|csv> PATH | web [PORT]";

/// Flags that answer the replace prompt in advance
const ASSUME_YES_FLAGS: [&str; 2] = ["--yes", "-y"];

/// Asks before an import replaces the schedule. With no answer source
/// (`--yes`) every committable preview is accepted.
struct PromptConfirmation {
    answers: Option<Box<dyn BufRead>>,
}

impl PromptConfirmation {
    /// Reads answers from stdin, or from the terminal when stdin carries the
    /// payload itself
    fn for_source(source: &str, assume_yes: bool) -> Result<Self> {
        if assume_yes {
            return Ok(PromptConfirmation { answers: None });
        }
        let answers: Box<dyn BufRead> = if source == "-" {
            let tty = fs::File::open("/dev/tty")
                .context("stdin holds the payload and no terminal is available to confirm; rerun with --yes")?;
            Box::new(io::BufReader::new(tty))
        } else {
            Box::new(io::BufReader::new(io::stdin()))
        };
        Ok(PromptConfirmation { answers: Some(answers) })
    }
}

impl UserConfirmation for PromptConfirmation {
    fn present(&mut self, preview: &str, commit_allowed: bool) -> Decision {
        println!("{}", preview);
        if !commit_allowed {
            return Decision::Cancel;
        }

        let answers = match self.answers.as_mut() {
            Some(answers) => answers,
            None => return Decision::Commit,
        };
        print!("Replace the current schedule? [y/N] ");
        let _ = io::stdout().flush();
        read_decision(&mut **answers)
    }
}

/// Only an explicit yes commits; EOF or a read error cancels
fn read_decision(answers: &mut dyn BufRead) -> Decision {
    let mut answer = String::new();
    match answers.read_line(&mut answer) {
        Ok(_) if matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") => Decision::Commit,
        _ => Decision::Cancel,
    }
}

/// Removes every occurrence of `flags` from `args`; true if any was present
fn take_flag(args: &mut Vec<String>, flags: &[&str]) -> bool {
    let before = args.len();
    args.retain(|arg| !flags.contains(&arg.as_str()));
    args.len() != before
}

/// Reads payload text from a file, or from stdin for `-`
fn read_payload_text(source: &str) -> Result<String> {
    if source == "-" {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text).context("failed to read payload from stdin")?;
        Ok(text)
    } else {
        fs::read_to_string(source).with_context(|| format!("failed to read payload file {}", source))
    }
}

fn import(
    payload: RawPayload,
    confirmation: &mut PromptConfirmation,
    store: &JsonFileStore,
    config: &Config,
) -> Result<()> {
    let mut session = ImportSession::new(config.display_slot_count);
    let mut renderer = TextGridRenderer::new(io::stdout(), config.time_slots());

    match run_import(&mut session, &payload, store, confirmation, &mut renderer)? {
        ImportOutcome::Committed { placed, ignored } => {
            println!("Schedule imported: {} placements, {} entries ignored.", placed, ignored);
        }
        ImportOutcome::Cancelled => println!("Import cancelled; the current schedule is unchanged."),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never mix with the grid or the prompt
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = Config::from_env();
    let store = JsonFileStore::new(&config.store_path, config.display_slot_count);
    info!(
        "Using schedule at {} ({} slots per day)",
        store.path().display(),
        config.display_slot_count
    );

    let mut args: Vec<String> = std::env::args().collect();
    let assume_yes = take_flag(&mut args, &ASSUME_YES_FLAGS);
    let command = args.get(1).map(String::as_str).unwrap_or("show");

    match command {
        "web" => {
            let port = parse_port(args.get(2));
            println!("Access the timetable at http://localhost:{}", port);
            web::start_server(port, Box::new(store), config).await?;
        }
        "import" | "scan" => {
            let source = args.get(2).map(String::as_str).unwrap_or("-");
            let mut confirmation = PromptConfirmation::for_source(source, assume_yes)?;
            let text = read_payload_text(source)?;
            let payload = if command == "scan" {
                RawPayload::scanned(text)
            } else {
                RawPayload::pasted(text)
            };
            import(payload, &mut confirmation, &store, &config)?;
        }
        "show" => {
            let mut renderer = TextGridRenderer::new(io::stdout(), config.time_slots());
            renderer.render(&store.load());
        }
        "clear" => {
            let mut renderer = TextGridRenderer::new(io::stdout(), config.time_slots());
            run_clear(&store, &mut renderer)?;
            println!("Schedule cleared.");
        }
        "export" => {
            let (Some(format), Some(path)) = (args.get(2), args.get(3)) else {
                bail!(USAGE);
            };
            let schedule = store.load();
            let path = Path::new(path);
            match format.as_str() {
                "json" => export_payload_to_file(&schedule, path)?,
                "csv" => export_csv_to_file(&schedule, &config.time_slots(), path)?,
                other => bail!("unknown export format {:?}; {}", other, USAGE),
            }
            println!("Schedule exported to {}", path.display());
        }
        _ => bail!(USAGE),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn answering(text: &'static str) -> PromptConfirmation {
        PromptConfirmation { answers: Some(Box::new(Cursor::new(text))) }
    }

    #[test]
    fn only_explicit_yes_commits() {
        assert_eq!(answering("y\n").present("preview", true), Decision::Commit);
        assert_eq!(answering(" YES \n").present("preview", true), Decision::Commit);
        assert_eq!(answering("n\n").present("preview", true), Decision::Cancel);
        assert_eq!(answering("").present("preview", true), Decision::Cancel);
    }

    #[test]
    fn assume_yes_commits_without_reading() {
        let mut confirmation = PromptConfirmation::for_source("-", true).unwrap();
        assert!(confirmation.answers.is_none());
        assert_eq!(confirmation.present("preview", true), Decision::Commit);
        assert_eq!(confirmation.present("preview", false), Decision::Cancel);
    }

    #[test]
    fn yes_flag_is_taken_out_of_the_arguments() {
        let mut args: Vec<String> = ["bin", "import", "--yes", "-"].iter().map(|a| a.to_string()).collect();
        assert!(take_flag(&mut args, &ASSUME_YES_FLAGS));
        assert_eq!(args, vec!["bin", "import", "-"]);
        assert!(!take_flag(&mut args, &ASSUME_YES_FLAGS));
    }
}
