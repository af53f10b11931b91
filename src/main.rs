mod ai;
mod compose;
mod config;
mod constants;
mod error;
mod export;
mod mail;
mod session;
mod workflow;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::ai::{GenerationPool, OpenRouterBackend};
use crate::config::Config;
use crate::mail::EmlParser;
use crate::session::{Session, SessionEvent};
use crate::workflow::Stage;

fn setup_logging() {
    use std::fs::OpenOptions;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,redraft=debug"));

    let log_file = Config::config_dir()
        .ok()
        .map(|dir| dir.join("redraft.log"))
        .and_then(|path| {
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)
                .ok()
        });

    if let Some(file) = log_file {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

fn print_usage() {
    eprintln!(
        r#"redraft - AI-assisted email reply drafting

Usage: redraft <message-file> [options]
       redraft setup
       redraft help

Options:
    -m, --message <text>   Key messages for the reply (prompted otherwise)
    --model <id>           Override the configured model
    -o, --out <dir>        Output directory for the draft (default: current)

The API key comes from the config file or OPENROUTER_API_KEY.
Configuration file: ~/.config/redraft/config.toml
"#
    );
}

fn run_setup() -> Result<()> {
    let config_path = Config::config_path()?;
    if config_path.exists() {
        println!("Configuration already exists at {}", config_path.display());
        println!("Edit it directly to change identity, model or instructions.");
        return Ok(());
    }

    let config = Config::default();
    config.ensure_dirs()?;
    config.save()?;

    println!("Wrote starter configuration to {}", config_path.display());
    println!("Fill in [identity] and either [ai].api_key or export OPENROUTER_API_KEY.");
    Ok(())
}

struct DraftArgs {
    file: PathBuf,
    key_messages: Option<String>,
    model: Option<String>,
    out_dir: PathBuf,
}

fn parse_draft_args(args: &[String]) -> Result<DraftArgs> {
    let mut file = None;
    let mut key_messages = None;
    let mut model = None;
    let mut out_dir = PathBuf::from(".");

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-m" | "--message" => {
                key_messages = Some(
                    iter.next()
                        .context("missing value for --message")?
                        .to_string(),
                );
            }
            "--model" => {
                model = Some(iter.next().context("missing value for --model")?.to_string());
            }
            "-o" | "--out" => {
                out_dir = PathBuf::from(iter.next().context("missing value for --out")?);
            }
            other if other.starts_with('-') => {
                anyhow::bail!("unknown option: {other}");
            }
            other => {
                if file.replace(PathBuf::from(other)).is_some() {
                    anyhow::bail!("more than one input file given");
                }
            }
        }
    }

    Ok(DraftArgs {
        file: file.context("no message file given")?,
        key_messages,
        model,
        out_dir,
    })
}

fn prompt_line(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Consume one generation to its terminal event, echoing reply text as it
/// streams in.
async fn stream_to_terminal(session: &mut Session<OpenRouterBackend>) -> Result<bool> {
    let mut printed = String::new();
    let mut waiting_ticks = 0;

    loop {
        match session.poll().await {
            SessionEvent::Idle => {
                if printed.is_empty() {
                    waiting_ticks += 1;
                    if waiting_ticks % 10 == 0 {
                        print!(".");
                        io::stdout().flush()?;
                    }
                }
            }
            SessionEvent::Progress => {
                let reply = session.reply();
                if reply == printed {
                    continue;
                }
                if printed.is_empty() && waiting_ticks >= 10 {
                    println!();
                }
                if reply.starts_with(&printed) {
                    print!("{}", &reply[printed.len()..]);
                } else {
                    // The visible reply was rewritten (a reasoning block
                    // resolved mid-stream); redraw it from the top.
                    println!();
                    print!("{reply}");
                }
                io::stdout().flush()?;
                printed = reply.to_string();
            }
            SessionEvent::Completed => {
                let reply = session.reply();
                if reply.starts_with(&printed) {
                    print!("{}", &reply[printed.len()..]);
                } else {
                    println!();
                    print!("{reply}");
                }
                println!();
                if let Some(reasoning) = session.reasoning() {
                    println!("\n[model reasoning]\n{reasoning}");
                }
                return Ok(true);
            }
            SessionEvent::Failed(message) => {
                println!();
                eprintln!("Generation failed: {message}");
                if !session.reply().is_empty() {
                    eprintln!("(partial output above is preserved)");
                }
                return Ok(false);
            }
        }
    }
}

fn print_draft_summary(session: &Session<OpenRouterBackend>) {
    let Some(thread) = session.composed() else {
        return;
    };
    println!("\nDraft header:");
    println!("  To:      {}", thread.to);
    if !thread.cc.is_empty() {
        let cc: Vec<String> = thread.cc.iter().map(|a| a.display()).collect();
        println!("  Cc:      {}", cc.join(", "));
    }
    println!("  Subject: {}", thread.subject);
}

fn print_original_summary(session: &Session<OpenRouterBackend>) {
    let Some(record) = session.record() else {
        return;
    };
    println!("From:    {}", record.sender_display());
    println!("Sent:    {}", record.date);
    if !record.to.is_empty() {
        let to: Vec<String> = record.to.iter().map(|a| a.display()).collect();
        println!("To:      {}", to.join(", "));
    }
    if !record.cc.is_empty() {
        let cc: Vec<String> = record.cc.iter().map(|a| a.display()).collect();
        println!("Cc:      {}", cc.join(", "));
    }
    println!("Subject: {}", record.subject_or_placeholder());
    if record.encoding_issues {
        println!("Note: some characters could not be decoded cleanly.");
    }
    println!();
}

async fn run_draft(args: DraftArgs) -> Result<()> {
    let config = Config::load_or_default()?;
    config.ensure_dirs()?;

    let model = args.model.unwrap_or_else(|| config.ai.model.clone());
    let backend = OpenRouterBackend::new(&config.ai);
    let pool = Arc::new(GenerationPool::new(Arc::new(backend)));
    let mut session = Session::new(pool, config.identity.clone(), config.generation.clone());

    let payload = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let filename = args
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("message.eml");

    session.ingest(filename, &payload, &EmlParser)?;
    tracing::debug!(
        "ingested {filename}: stage {:?}, panels {:?}",
        session.stage(),
        session.visible_panels()
    );
    print_original_summary(&session);

    let key_messages = match args.key_messages {
        Some(messages) => messages,
        None => loop {
            let line = prompt_line("Key messages for the reply: ")?;
            if !line.is_empty() {
                break line;
            }
        },
    };

    session.begin_reply(&key_messages, &model).await?;
    println!("Generating reply with {model}\n");

    if !stream_to_terminal(&mut session).await? {
        anyhow::bail!("generation did not complete");
    }
    print_draft_summary(&session);

    // Revision rounds until the user accepts the draft.
    loop {
        let instructions = prompt_line("\nRevision instructions (blank to accept): ")?;
        if instructions.is_empty() {
            break;
        }
        session.request_revision(&instructions, &model).await?;
        println!("Revising\n");
        if !stream_to_terminal(&mut session).await? {
            anyhow::bail!("revision did not complete");
        }
        print_draft_summary(&session);
    }

    debug_assert_eq!(session.stage(), Stage::Review);
    let (draft_name, eml) = session.export_draft()?;
    let path = args.out_dir.join(draft_name);
    tokio::fs::write(&path, eml)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("\nDraft written to {}", path.display());
    println!("Open it in your mail client to review and send.");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(|s| s.as_str()) {
        None | Some("help") | Some("--help") | Some("-h") => {
            print_usage();
            Ok(())
        }
        Some("setup") => run_setup(),
        Some(_) => {
            setup_logging();
            let draft_args = parse_draft_args(&args).inspect_err(|_| print_usage())?;
            run_draft(draft_args).await
        }
    }
}
