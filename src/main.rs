use clap::{Parser, Subcommand};
use mynote::config::{Credentials, DEFAULT_CONFIG_FILE};
use mynote::container::{self, EDITOR_MAX_CONTENT, MIN_CONTAINER_LEN};
use mynote::sniff::{self, FileFormat};
use mynote::{lines, text};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mynote", about = "Seal, open and inspect MyNote files")]
struct Cli {
    /// Credentials file ([user] identity, [security] secret)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Identity override
    #[arg(long, global = true, env = "MYNOTE_IDENTITY")]
    identity: Option<String>,
    /// Secret override
    #[arg(long, global = true, env = "MYNOTE_SECRET", hide_env_values = true)]
    secret: Option<String>,
    /// Log filter (e.g. warn, debug, mynote=trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seal a text file into a .mynote container
    Seal {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print a note's content (MyNote or plain text)
    Open {
        input: PathBuf,
        /// Fail on identity mismatch or failed integrity check
        #[arg(long)]
        strict: bool,
    },
    /// Show container metadata
    Info {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Write a note's content as a UTF-8 (BOM) text file
    Export {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Report the detected file format
    Detect {
        path: PathBuf,
    },
}

#[derive(Serialize)]
struct InfoReport {
    path:             String,
    identity:         String,
    identity_matches: Option<bool>,
    content_len:      u32,
    container_len:    u64,
    lines:            Option<usize>,
    iv:               Option<String>,
    integrity:        String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    match &cli.command {

        // ── Seal ─────────────────────────────────────────────────────────────
        Commands::Seal { input, output } => {
            let creds = credentials(&cli)?;
            let bytes = read_limited(input)?;
            let body  = text::decode_plain_text(&bytes)?;
            let note  = container::encode(&body, creds.identity(), creds.secret())?;
            std::fs::write(output, &note)?;
            println!("Sealed: {} ({} bytes)", output.display(), note.len());
        }

        // ── Open ─────────────────────────────────────────────────────────────
        Commands::Open { input, strict } => {
            let body = load_note(&cli, input, *strict)?;
            print!("{body}");
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input, json } => {
            let report = inspect(&cli, input)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("── MyNote ───────────────────────────────────────────────");
                println!("  Path           {}", report.path);
                println!("  Identity       {}", report.identity);
                if let Some(m) = report.identity_matches {
                    println!("  Identity match {m}");
                }
                println!("  Content        {} B", report.content_len);
                println!("  Container      {} B", report.container_len);
                if let Some(n) = report.lines {
                    println!("  Lines          {n}");
                }
                if let Some(iv) = &report.iv {
                    println!("  IV             {iv}");
                }
                println!("  Integrity      {}", report.integrity);
            }
        }

        // ── Export ───────────────────────────────────────────────────────────
        Commands::Export { input, output } => {
            let body = load_note(&cli, input, false)?;
            std::fs::write(output, text::encode_plain_text(&body))?;
            println!("Exported: {}", output.display());
        }

        // ── Detect ───────────────────────────────────────────────────────────
        Commands::Detect { path } => {
            println!("{}", sniff::detect_file(path).name());
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn credentials(cli: &Cli) -> Result<Credentials, Box<dyn std::error::Error>> {
    Ok(Credentials::resolve(&cli.config, cli.identity.as_deref(), cli.secret.as_deref())?)
}

fn read_limited(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let len = std::fs::metadata(path)?.len();
    if len > (EDITOR_MAX_CONTENT + MIN_CONTAINER_LEN) as u64 {
        return Err(format!("{}: {len} bytes exceeds the 100 MiB limit", path.display()).into());
    }
    Ok(std::fs::read(path)?)
}

/// Content of `path` as text, decoding MyNote containers with the configured credentials.
fn load_note(cli: &Cli, path: &Path, strict: bool) -> Result<String, Box<dyn std::error::Error>> {
    let bytes = read_limited(path)?;
    if sniff::detect(path, Some(bytes.as_slice())) != FileFormat::MyNote {
        return Ok(text::decode_plain_text(&bytes)?);
    }

    let creds = credentials(cli)?;
    let note  = container::decode(&bytes, creds.secret())?;

    if !note.identity_matches(creds.identity()) {
        let msg = format!(
            "note identity [{}] differs from configured identity [{}]",
            note.identity, creds.identity()
        );
        if strict {
            return Err(msg.into());
        }
        eprintln!("warning: {msg}");
    }
    if let Some(reason) = note.integrity.reason() {
        let msg = format!("integrity check failed ({reason}); the note may have been modified");
        if strict {
            return Err(msg.into());
        }
        eprintln!("warning: {msg}");
    }
    Ok(note.content)
}

fn inspect(cli: &Cli, path: &Path) -> Result<InfoReport, Box<dyn std::error::Error>> {
    let bytes  = read_limited(path)?;
    let header = container::read_header(&bytes)?;

    let mut report = InfoReport {
        path:             path.display().to_string(),
        identity:         header.identity(),
        identity_matches: None,
        content_len:      header.content_len,
        container_len:    header.container_len(),
        lines:            None,
        iv:               None,
        integrity:        "unchecked (no credentials)".into(),
    };

    // Metadata is still useful without credentials; only the verdict needs them.
    if let Ok(creds) = credentials(cli) {
        let note = container::decode(&bytes, creds.secret())?;
        report.identity_matches = Some(note.identity_matches(creds.identity()));
        report.lines            = Some(lines::count_lines(&note.content));
        report.iv               = Some(hex::encode(note.iv));
        report.integrity        = note.integrity.reason().unwrap_or("valid").into();
    }
    Ok(report)
}
