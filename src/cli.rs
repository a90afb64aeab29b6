use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::commands::{self, CommandReport};
use crate::logging;

#[derive(Debug, Parser)]
#[command(
    name = "report-harvest",
    version,
    about = "Harvest monthly survey reports from the portal into Google Drive"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Debug-level logging (HARVEST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Errors only
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log in, render every listed report to PDF, and archive it to Drive
    Harvest(HarvestArgs),
    /// Run the Drive consent flow and cache the token
    Authorize {
        /// Ignore any cached token
        #[arg(long)]
        force: bool,
        #[arg(long)]
        json: bool,
    },
    /// Show resolved paths, config, dictionaries and token state
    Status {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
struct HarvestArgs {
    /// Portal login email (falls back to HARVEST_PORTAL_EMAIL)
    #[arg(short, long)]
    email: Option<String>,

    /// Portal password (falls back to HARVEST_PORTAL_PASSWORD)
    #[arg(short, long)]
    password: Option<String>,

    /// Reporting year; defaults to the current year in Bogotá
    #[arg(short, long)]
    year: Option<i32>,

    /// First month to harvest (1-12)
    #[arg(short = 's', long)]
    month_start: Option<u32>,

    /// Last month to harvest (1-12)
    #[arg(short = 'm', long)]
    month_end: Option<u32>,

    /// Only this form id
    #[arg(short, long)]
    form_type: Option<u32>,

    /// Drive folder id that receives the year folders
    #[arg(short = 'i', long)]
    parent_folder_id: Option<String>,

    #[arg(long)]
    json: bool,
}

impl From<HarvestArgs> for commands::harvest::HarvestOptions {
    fn from(args: HarvestArgs) -> Self {
        Self {
            email: args.email,
            password: args.password,
            year: args.year,
            month_start: args.month_start,
            month_end: args.month_end,
            form_type: args.form_type,
            parent_folder_id: args.parent_folder_id,
        }
    }
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let state = if report.ok { "ok" } else { "failed" };
    println!("{}: {state}", report.command);
    for detail in &report.details {
        println!("  {detail}");
    }
    for issue in &report.issues {
        println!("  issue: {issue}");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.quiet, cli.verbose)?;

    let (report, json) = match cli.command {
        Command::Harvest(args) => {
            let json = args.json;
            let opts: commands::harvest::HarvestOptions = args.into();
            (commands::harvest::run(&opts)?, json)
        }
        Command::Authorize { force, json } => (commands::authorize::run(force)?, json),
        Command::Status { json } => (commands::status::run()?, json),
    };

    print_report(&report, json)?;
    if !report.ok {
        anyhow::bail!("{} reported {} issue(s)", report.command, report.issues.len());
    }
    Ok(())
}
