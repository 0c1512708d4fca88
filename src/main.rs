//! CLI entry point for `mailexport`.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser};
use indicatif::{ProgressBar, ProgressStyle};

use mailexport::archive::mbox::MboxOptions;
use mailexport::config::{self, Config};
use mailexport::context::{BodyPreference, ExportContext};
use mailexport::export::{self, ExportReport};

#[derive(Parser)]
#[command(
    name = "mailexport",
    version,
    about = "Export every message of a mail archive to standalone .eml files"
)]
struct Cli {
    /// List the available export strategies and exit
    #[arg(long)]
    strategies: bool,

    /// Archive to export: an mbox file or a directory of mbox files
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Root directory for exported files
    #[arg(long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Export strategy to run
    #[arg(long, value_name = "NAME")]
    strategy: Option<String>,

    /// Export the plain-text body only, never HTML
    #[arg(long)]
    plaintext: bool,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Generate shell completions and exit
    #[arg(long, value_name = "SHELL", value_enum)]
    completions: Option<clap_complete::Shell>,

    /// Generate a man page and exit
    #[arg(long)]
    manpage: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        return cmd_completions(shell);
    }
    if cli.manpage {
        return cmd_manpage();
    }
    if cli.strategies {
        return cmd_strategies();
    }

    let (config, config_error) = match config::load_config() {
        Ok(loaded) => (loaded.unwrap_or_default(), None),
        Err(e) => (Config::default(), Some(e)),
    };

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);
    match config_error {
        Some(e) => tracing::warn!(error = %e, "Failed to load config, using defaults"),
        None => tracing::debug!(path = ?config::config_file_path(), "Configuration ready"),
    }

    let ctx = build_context(&cli, &config);
    cmd_export(&ctx, config.archive.clone().into(), cli.json)
}

/// CLI flags override the config file, which overrides built-in defaults.
fn build_context(cli: &Cli, config: &Config) -> ExportContext {
    let mut ctx = ExportContext::from_config(config);
    if let Some(input) = &cli.input {
        ctx = ctx.with_input(input);
    }
    if let Some(output) = &cli.output {
        ctx = ctx.with_output_dir(output);
    }
    if let Some(strategy) = &cli.strategy {
        ctx = ctx.with_strategy(strategy);
    }
    if cli.plaintext {
        ctx = ctx.with_body_preference(BodyPreference::PlaintextOnly);
    }
    ctx
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if config.general.log_to_file && std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailexport.log");
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

fn cmd_strategies() -> anyhow::Result<()> {
    for strategy in export::all_strategies() {
        println!("{}", strategy.name());
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailexport", &mut std::io::stdout());
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

/// Run the export named by `ctx` and print its report.
fn cmd_export(ctx: &ExportContext, options: MboxOptions, json: bool) -> anyhow::Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!("Exporting {}", ctx.input().display()));

    let start = Instant::now();
    let progress = |report: &ExportReport| {
        spinner.set_message(format!(
            "Exporting: {} exported, {} failed, {} folder(s)",
            report.messages_exported, report.messages_failed, report.folders
        ));
    };
    let result = export::execute_by_name(ctx, options, &progress);
    spinner.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "Export failed");
            return Err(e.into());
        }
    };

    if json {
        print_report_json(ctx, &report, start.elapsed())
    } else {
        print_report_table(ctx, &report, start.elapsed());
        Ok(())
    }
}

/// Print the run report in a human-readable table.
fn print_report_table(ctx: &ExportContext, report: &ExportReport, elapsed: Duration) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  Export complete:");
    println!("  {:<25} {}", "Input", ctx.input().display());
    println!("  {:<25} {}", "Output", ctx.output_dir().display());
    println!("  {:<25} {}", "Strategy", ctx.strategy());
    println!("  {:<25} {}", "Folders", report.folders);
    println!("  {:<25} {}", "Messages exported", report.messages_exported);
    if report.messages_failed > 0 {
        println!("  {:<25} {}", "Messages failed", report.messages_failed);
    }
    println!(
        "  {:<25} {}",
        "Attachments written", report.attachments_written
    );
    if report.attachments_skipped > 0 {
        println!(
            "  {:<25} {}",
            "Attachments skipped", report.attachments_skipped
        );
    }
    println!(
        "  {:<25} {}",
        "Bytes written",
        format_size(report.bytes_written, BINARY)
    );
    println!("  {:<25} {:.2?}", "Elapsed", elapsed);
    println!();
}

/// Print the run report as JSON.
fn print_report_json(
    ctx: &ExportContext,
    report: &ExportReport,
    elapsed: Duration,
) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "input": ctx.input().to_string_lossy(),
        "output": ctx.output_dir().to_string_lossy(),
        "strategy": ctx.strategy(),
        "report": report,
        "elapsed_ms": elapsed.as_millis(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
