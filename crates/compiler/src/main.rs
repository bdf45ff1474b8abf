use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use osiris_compiler::watch::watch_project;
use osiris_compiler::{check_project, load_project, render_story, CheckOptions, CheckReport};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Osiris goal checker
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check every goal of a project
    Check {
        /// Project directory, or any path inside it
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Keep running and re-check when files change
        #[arg(short, long)]
        watch: bool,

        /// Enable debug logging
        #[arg(short, long)]
        verbose: bool,

        /// Render diagnostics without colors
        #[arg(long)]
        no_color: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_report(report: &CheckReport) {
    for message in &report.messages {
        println!("{message}");
    }
    println!("{}", report.summary());
}

async fn run(args: Args) -> Result<bool> {
    let Command::Check {
        path,
        watch,
        verbose,
        no_color,
    } = args.command;
    init_tracing(verbose);

    let options = CheckOptions {
        with_color: !no_color,
    };
    let project = load_project(&path)?;
    if watch {
        watch_project(project, options, print_report).await?;
        return Ok(true);
    }

    let story = check_project(&project)?;
    let report = render_story(&story, options);
    print_report(&report);
    Ok(!report.has_errors())
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Args::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
