//! CLI entry point for `mbx2mbox`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mbx2mbox::config::{self, Config};
use mbx2mbox::convert::{convert, ConvertOptions};
use mbx2mbox::report::ConversionReport;

#[derive(Parser)]
#[command(
    name = "mbx2mbox",
    version,
    about = "Convert legacy Eudora .mbx mailboxes to standard Unix mbox files"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Eudora mailbox file(s) to convert
    #[arg(value_name = "MAILBOX")]
    mailboxes: Vec<PathBuf>,

    /// Colon-separated list of attachment directories to search
    #[arg(short = 'a', long = "attachments", value_name = "DIRS")]
    attachments: Option<String>,

    /// Destination client hint (e.g. pine, kmail)
    #[arg(short = 't', long, value_name = "HINT")]
    target: Option<String>,

    /// Output mbox path (single mailbox only; default <mailbox>.new)
    #[arg(short = 'o', long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Some(Commands::Completions { shell }) => return cmd_completions(shell),
        Some(Commands::Manpage) => return cmd_manpage(),
        None => {}
    }

    if cli.mailboxes.is_empty() {
        anyhow::bail!("no mailbox file given (see --help)");
    }
    if cli.output.is_some() && cli.mailboxes.len() > 1 {
        anyhow::bail!("--output only applies when converting a single mailbox");
    }

    let attachment_dirs: Vec<PathBuf> = match &cli.attachments {
        Some(spec) => spec
            .split(':')
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect(),
        None => config.conversion.attachment_dirs.clone(),
    };
    let target = cli
        .target
        .clone()
        .unwrap_or_else(|| config.conversion.target.clone());

    let mut all_clean = true;
    for mailbox in &cli.mailboxes {
        let options = ConvertOptions {
            attachment_dirs: attachment_dirs.clone(),
            target: target.clone(),
            output: Some(
                cli.output
                    .clone()
                    .unwrap_or_else(|| output_path_for(mailbox, &config)),
            ),
            scrub_markup: config.conversion.scrub_markup,
            home: None,
        };
        let report = cmd_convert(mailbox, &options, cli.json)?;
        all_clean &= report.clean();
    }

    // Warnings and recoverable errors surface in the exit code so
    // migration scripts notice without scraping the log.
    if !all_clean {
        std::process::exit(1);
    }
    Ok(())
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mbx2mbox.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mbx2mbox", &mut std::io::stdout());
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

/// Default output path: the mailbox name with the configured suffix.
fn output_path_for(mailbox: &Path, config: &Config) -> PathBuf {
    let mut name = mailbox.file_name().unwrap_or_default().to_os_string();
    name.push(&config.output.suffix);
    mailbox.with_file_name(name)
}

/// Convert one mailbox and print its summary.
fn cmd_convert(
    mailbox: &Path,
    options: &ConvertOptions,
    json: bool,
) -> anyhow::Result<ConversionReport> {
    if !mailbox.exists() {
        anyhow::bail!("mailbox not found: {}", mailbox.display());
    }

    let file_size = std::fs::metadata(mailbox)?.len();
    let pb = if json {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(file_size);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} Converting [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                )
                .expect("valid template")
                .progress_chars("#>-"),
        );
        pb
    };

    let start = Instant::now();

    let report = convert(
        mailbox,
        options,
        Some(&|current, total| {
            pb.set_length(total);
            pb.set_position(current);
        }),
    )?;

    pb.finish_and_clear();
    let elapsed = start.elapsed();

    let output = options
        .output
        .clone()
        .unwrap_or_else(|| mbx2mbox::convert::default_output_path(mailbox));

    if json {
        print_summary_json(mailbox, &output, file_size, &report, elapsed)?;
    } else {
        print_summary_table(mailbox, &output, file_size, &report, elapsed);
    }

    Ok(report)
}

/// Print the run summary in a human-readable table.
fn print_summary_table(
    mailbox: &Path,
    output: &Path,
    file_size: u64,
    report: &ConversionReport,
    elapsed: std::time::Duration,
) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<20} {}", "Mailbox", mailbox.display());
    println!("  {:<20} {}", "Size", format_size(file_size, BINARY));
    println!("  {:<20} {}", "Output", output.display());
    println!("  {:<20} {}", "Messages", report.messages);

    if report.attachments.listed > 0 {
        println!(
            "  {:<20} {} ({} found, {} missing)",
            "Attachments",
            report.attachments.listed,
            report.attachments.found,
            report.attachments.missing
        );
    }
    if report.embedded_images > 0 {
        println!("  {:<20} {}", "Embedded images", report.embedded_images);
    }
    println!("  {:<20} {}", "Warnings", report.warnings);
    println!("  {:<20} {}", "Errors", report.errors);
    println!("  {:<20} {:.2?}", "Conversion time", elapsed);

    if !report.attachments.by_path.is_empty() {
        println!();
        println!("  Attachment source folders:");
        for (path, tally) in &report.attachments.by_path {
            println!("    {:>4} found {:>4} missing  {path}", tally.found, tally.missing);
        }
    }
    println!();
}

/// Print the run summary as JSON.
fn print_summary_json(
    mailbox: &Path,
    output: &Path,
    file_size: u64,
    report: &ConversionReport,
    elapsed: std::time::Duration,
) -> anyhow::Result<()> {
    let mut value = serde_json::to_value(report)?;
    value["file"] = serde_json::json!(mailbox.to_string_lossy());
    value["file_size"] = serde_json::json!(file_size);
    value["output"] = serde_json::json!(output.to_string_lossy());
    value["conversion_time_ms"] = serde_json::json!(elapsed.as_millis() as u64);

    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
