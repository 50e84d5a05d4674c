//! CLI entry point for `lurefill`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;

use lurefill::config::{self, Config};
use lurefill::export;
use lurefill::{Attachment, BaseRecipient, FormatTable, PlaceholderEngine, TemplateContext};

#[derive(Parser)]
#[command(
    name = "lurefill",
    version,
    about = "Fill per-recipient placeholders in phishing-simulation attachments"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (overrides $LUREFILL_CONFIG and the default location)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Render one copy of an attachment for a single recipient context
    Render {
        path: PathBuf,
        /// Treat PATH as a JSON attachment record ({"content","type","name"})
        #[arg(long)]
        record: bool,
        /// JSON recipient context; the built-in sample context if omitted
        #[arg(short, long)]
        context: Option<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Render one copy per recipient from a JSON recipient list
    Batch {
        path: PathBuf,
        #[arg(long)]
        record: bool,
        /// JSON array of recipients (first_name, last_name, email, position, rid)
        #[arg(long)]
        recipients: PathBuf,
        #[arg(long)]
        base_url: Option<String>,
        /// Sender display name
        #[arg(long)]
        from: Option<String>,
        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
        /// Worker threads (0 = available parallelism)
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Check that an attachment's placeholders render against a sample recipient
    Validate {
        path: PathBuf,
        #[arg(long)]
        record: bool,
    },
    /// Show how file names would be handled
    Classify {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

/// One entry of a `batch` recipient list.
#[derive(Debug, Deserialize)]
struct RecipientEntry {
    #[serde(flatten)]
    recipient: BaseRecipient,
    #[serde(default)]
    rid: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => config::load_config_from(path),
        None => config::load_config(),
    };

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let formats = FormatTable::from_config(&config.formats);

    match cli.command {
        Commands::Render {
            path,
            record,
            context,
            output,
        } => cmd_render(&path, record, context.as_deref(), &output, &formats),
        Commands::Batch {
            path,
            record,
            recipients,
            base_url,
            from,
            output,
            jobs,
        } => {
            let mut batch = config.batch.clone();
            if let Some(url) = base_url {
                batch.base_url = url;
            }
            if let Some(from) = from {
                batch.from = from;
            }
            if let Some(jobs) = jobs {
                batch.jobs = jobs;
            }
            cmd_batch(&path, record, &recipients, &output, &batch, &formats)
        }
        Commands::Validate { path, record } => cmd_validate(&path, record, &formats),
        Commands::Classify { names } => cmd_classify(&names, &formats),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_path = config::log_file_path(config);
    let log_dir = log_path.parent().unwrap_or_else(|| Path::new("."));
    let log_name = log_path.file_name().unwrap_or_default();
    if std::fs::create_dir_all(log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(log_dir, log_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Load an attachment either from a raw file or from a JSON record.
fn load_attachment(path: &Path, record: bool) -> anyhow::Result<Attachment> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    if record {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let attachment: Attachment = serde_json::from_str(&text)
            .with_context(|| format!("parsing attachment record {}", path.display()))?;
        Ok(attachment)
    } else {
        Ok(Attachment::from_path(path)?)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn cmd_render(
    path: &Path,
    record: bool,
    context: Option<&Path>,
    output: &Path,
    formats: &FormatTable,
) -> anyhow::Result<()> {
    let attachment = load_attachment(path, record)?;
    let ctx = match context {
        Some(p) => read_json::<TemplateContext>(p)?,
        None => TemplateContext::sample(),
    };

    let start = Instant::now();
    let rendered = attachment
        .apply_template(&ctx, &PlaceholderEngine, formats)
        .with_context(|| format!("templating '{}'", attachment.name))?
        .into_inner();
    std::fs::write(output, &rendered)
        .with_context(|| format!("writing {}", output.display()))?;

    tracing::info!(
        name = %attachment.name,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Rendered attachment"
    );
    println!(
        "{} ({}, {}) -> {}",
        attachment.name,
        attachment.handling(formats),
        humansize::format_size(rendered.len() as u64, humansize::BINARY),
        output.display()
    );
    Ok(())
}

fn cmd_batch(
    path: &Path,
    record: bool,
    recipients_path: &Path,
    output_dir: &Path,
    batch: &config::BatchConfig,
    formats: &FormatTable,
) -> anyhow::Result<()> {
    let attachment = load_attachment(path, record)?;
    let recipients: Vec<RecipientEntry> = read_json(recipients_path)?;
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    let total = recipients.len();
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Rendering [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let next = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let workers = batch.worker_count().min(total.max(1));

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let i = next.fetch_add(1, Ordering::Relaxed);
                let Some(entry) = recipients.get(i) else {
                    break;
                };
                let rid = entry
                    .rid
                    .clone()
                    .unwrap_or_else(|| format!("{:07}", i + 1));
                let ctx = TemplateContext::for_recipient(
                    entry.recipient.clone(),
                    &batch.base_url,
                    &batch.from,
                    &rid,
                );
                let result = attachment
                    .apply_template(&ctx, &PlaceholderEngine, formats)
                    .and_then(|out| {
                        export::write_recipient_copy(
                            output_dir,
                            &rid,
                            &attachment.name,
                            out.get_ref(),
                        )
                    });
                if let Err(e) = result {
                    failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        rid = %rid,
                        email = %entry.recipient.email,
                        error = %e,
                        "Failed to render attachment for recipient"
                    );
                }
                pb.inc(1);
            });
        }
    });

    pb.finish_and_clear();

    let failed = failed.into_inner();
    tracing::info!(
        total,
        failed,
        vanilla = attachment.is_vanilla(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Batch finished"
    );
    println!(
        "Rendered {} of {} copies of '{}' into {}",
        total - failed,
        total,
        attachment.name,
        output_dir.display()
    );
    if failed > 0 {
        anyhow::bail!("{failed} recipient(s) failed");
    }
    Ok(())
}

fn cmd_validate(path: &Path, record: bool, formats: &FormatTable) -> anyhow::Result<()> {
    let attachment = load_attachment(path, record)?;
    attachment
        .validate(&PlaceholderEngine, formats)
        .with_context(|| format!("'{}' failed validation", attachment.name))?;
    println!("{}: ok ({})", attachment.name, attachment.handling(formats));
    Ok(())
}

fn cmd_classify(names: &[String], formats: &FormatTable) -> anyhow::Result<()> {
    let width = names.iter().map(String::len).max().unwrap_or(0);
    for name in names {
        println!("{name:<width$}  {}", formats.classify(name));
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "lurefill", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
