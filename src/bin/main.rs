//! dashq CLI - compose and run saved analytics against the dashboard database
//!
//! Usage:
//!   dashq templates [--verbose]
//!   dashq compose <template> [filters]
//!   dashq run <template> [filters] [--format table|json]
//!   dashq check
//!
//! Filters:
//!   --from 2015-01-01 --to 2015-12-31 --region West --region East
//!   --segment Consumer --category Technology
//!
//! Examples:
//!   dashq compose region_perf --region West --region East
//!   dashq run top_products_by_revenue --from 2016-01-01 --format json
//!   RUST_LOG=dashq=debug dashq run kpi_summary

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use dashq::config::Settings;
use dashq::engine::{build_registry, Engine};
use dashq::filter::{FilterError, FilterSelection};
use dashq::TabularResult;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dashq")]
#[command(about = "dashq - filter-aware composition and execution of saved analytics SQL")]
#[command(version)]
struct Cli {
    /// Settings file (defaults: $DASHQ_CONFIG, ./dashq.toml, user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered templates
    Templates {
        /// Show result columns and slots
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the composed statement and its bound parameters
    Compose {
        /// Template name
        template: String,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Compose, execute and print the result
    Run {
        /// Template name
        template: String,

        #[command(flatten)]
        filter: FilterArgs,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Build the registry and report any invalid template
    Check,
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// First order date to include (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last order date to include (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Customer segment (repeatable)
    #[arg(long = "segment")]
    segments: Vec<String>,

    /// Region (repeatable)
    #[arg(long = "region")]
    regions: Vec<String>,

    /// Product category (repeatable)
    #[arg(long = "category")]
    categories: Vec<String>,
}

impl FilterArgs {
    fn to_selection(&self) -> Result<FilterSelection, FilterError> {
        let mut builder = FilterSelection::builder()
            .segments(self.segments.iter().cloned())
            .regions(self.regions.iter().cloned())
            .categories(self.categories.iter().cloned());
        if let Some(from) = self.from {
            builder = builder.date_from(from);
        }
        if let Some(to) = self.to {
            builder = builder.date_to(to);
        }
        builder.build()
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Aligned text table
    Table,
    /// JSON array of records
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = match Settings::load_from(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Templates { verbose } => cmd_templates(&settings, verbose),
        Commands::Compose { template, filter } => cmd_compose(&settings, &template, &filter),
        Commands::Run {
            template,
            filter,
            format,
        } => cmd_run(&settings, &template, &filter, format),
        Commands::Check => cmd_check(&settings),
    }
}

fn cmd_templates(settings: &Settings, verbose: bool) -> ExitCode {
    let registry = match build_registry(settings) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    for registered in registry.iter() {
        let template = registered.template();
        match &template.description {
            Some(description) => println!("{:<28} {}", template.name, description),
            None => println!("{}", template.name),
        }
        if verbose {
            for column in &template.result_columns {
                println!("    {:<24} {}", column.name, column.semantic_type);
            }
            for slot in &template.slots {
                println!("    :{:<23} = {}", slot.name, slot.value);
            }
        }
    }
    ExitCode::SUCCESS
}

fn cmd_compose(settings: &Settings, template: &str, filter: &FilterArgs) -> ExitCode {
    let registry = match build_registry(settings) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let selection = match filter.to_selection() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Invalid filter: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let composer = dashq::compose::Composer::new(settings.filters.clone());
    let result = registry
        .lookup(template)
        .map_err(dashq::EngineError::from)
        .and_then(|registered| Ok(composer.compose(registered, &selection)?));

    match result {
        Ok(composed) => {
            println!("{}", composed.statement_text);
            if !composed.parameters.is_empty() {
                println!();
                for (i, value) in composed.parameters.iter().enumerate() {
                    println!("-- ?{} = {} ({})", i + 1, value, value.type_name());
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_run(
    settings: &Settings,
    template: &str,
    filter: &FilterArgs,
    format: OutputFormat,
) -> ExitCode {
    let selection = match filter.to_selection() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Invalid filter: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let engine = match Engine::from_settings(settings, Default::default()) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match engine.get_or_compute(template, &selection) {
        Ok(result) => {
            match format {
                OutputFormat::Table => print_table(&result),
                OutputFormat::Json => match serde_json::to_string_pretty(&result.to_records()) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Failed to serialize result: {}", e);
                        return ExitCode::FAILURE;
                    }
                },
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_check(settings: &Settings) -> ExitCode {
    match build_registry(settings) {
        Ok(registry) => {
            println!("✓ {} templates registered", registry.len());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_table(result: &TabularResult) {
    let rendered: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect();

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.name.len()).collect();
    for row in &rendered {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let header: Vec<String> = result
        .columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("{:<w$}", c.name, w = *w))
        .collect();
    println!("{}", header.join("  "));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    println!("{}", rule.join("  "));
    for row in &rendered {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<w$}", cell, w = *w))
            .collect();
        println!("{}", line.join("  "));
    }
    println!();
    println!("({} rows)", result.len());
}
