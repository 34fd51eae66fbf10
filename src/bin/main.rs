//! text2sql CLI - Translate advertising analytics questions to SQL
//!
//! Usage:
//!   text2sql translate <text> [--parser keyword|json] [--output sql|json|verbose]
//!   text2sql compile <ir.json|-> [--output sql|json|verbose]
//!   text2sql catalog
//!   text2sql validate
//!   text2sql prompt <text>
//!   text2sql serve [--bind <addr>]
//!
//! Examples:
//!   text2sql translate "CTR by slot for the last 7 days" --anchor 2024-06-15
//!   text2sql --dialect postgres compile request.json --output verbose
//!   text2sql --catalog ./catalog/ads.toml validate
//!
//! Exit codes: 0 success, 2 clarification needed, 1 error.

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use text2sql::catalog::Catalog;
use text2sql::config::Settings;
use text2sql::ir::Response;
use text2sql::parser::{JsonRequirementParser, KeywordParser, RequirementParser};
use text2sql::pipeline::{Pipeline, PipelineOptions};
use text2sql::prompt::translation_prompt;
use text2sql::sql::Dialect;

#[derive(Parser)]
#[command(name = "text2sql")]
#[command(about = "text2sql - Translate advertising analytics questions into partition-safe SQL")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to TEXT2SQL_CONFIG, ./text2sql.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Catalog TOML file (built-in advertising catalog if not specified)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// SQL dialect to generate (databricks, postgres)
    #[arg(short, long, global = true)]
    dialect: Option<Dialect>,

    /// Anchor date for relative time windows (YYYY-MM-DD, defaults to today)
    #[arg(long, global = true)]
    anchor: Option<NaiveDate>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a natural-language question to SQL
    Translate {
        /// The question, or "-" to read it from stdin
        text: String,

        /// How to interpret the text
        #[arg(short, long, default_value = "keyword")]
        parser: ParserArg,

        /// Output format
        #[arg(short, long, default_value = "sql")]
        output: OutputFormat,
    },

    /// Compile a structured requirement (IR JSON) to SQL
    Compile {
        /// Path to the IR JSON file, or "-" for stdin
        input: String,

        /// Output format
        #[arg(short, long, default_value = "sql")]
        output: OutputFormat,
    },

    /// List the catalog's tables, metrics and dimensions
    Catalog,

    /// Validate the catalog without translating anything
    Validate,

    /// Print the LLM translation prompt for a question
    Prompt {
        /// The question
        text: String,
    },

    /// Serve the HTTP API
    #[cfg(feature = "server")]
    Serve {
        /// Address to listen on (overrides the settings file)
        #[arg(long)]
        bind: Option<String>,
    },
}

#[derive(Clone, ValueEnum)]
enum ParserArg {
    /// Match catalog names and synonyms
    Keyword,
    /// Read the text as IR JSON
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Output SQL only
    Sql,
    /// Output the response envelope as JSON
    Json,
    /// Output SQL with explanation and hints as comments
    Verbose,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&settings.log_filter);

    let catalog = match &cli.catalog {
        Some(path) => Catalog::from_file(path).map_err(|e| e.to_string()),
        None => settings.load_catalog().map_err(|e| e.to_string()),
    };
    let catalog = match catalog {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let dialect = cli.dialect.unwrap_or(settings.dialect);
    let anchor = cli
        .anchor
        .or(settings.anchor_date)
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let options = PipelineOptions::default().with_dialect(dialect);

    match cli.command {
        Commands::Translate {
            text,
            parser,
            output,
        } => {
            let parser: Arc<dyn RequirementParser> = match parser {
                ParserArg::Keyword => Arc::new(KeywordParser::new(&catalog)),
                ParserArg::Json => Arc::new(JsonRequirementParser::new()),
            };
            let text = match read_input(&text) {
                Ok(t) => t,
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            let pipeline = Pipeline::new(catalog, parser).with_options(options);
            let response = pipeline.process(&text, anchor).await;
            emit(&response, &output, dialect, anchor)
        }
        Commands::Compile { input, output } => cmd_compile(catalog, &input, options, anchor, output),
        Commands::Catalog => cmd_catalog(&catalog),
        Commands::Validate => {
            println!(
                "OK: catalog is valid ({} tables, {} metrics, {} dimensions)",
                catalog.tables().count(),
                catalog.metrics().count(),
                catalog.dimensions().count()
            );
            ExitCode::SUCCESS
        }
        Commands::Prompt { text } => {
            print!("{}", translation_prompt(&catalog, &text));
            ExitCode::SUCCESS
        }
        #[cfg(feature = "server")]
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| settings.server.bind.clone());
            let parser = Arc::new(KeywordParser::new(&catalog));
            let state = text2sql::web::AppState {
                pipeline: Pipeline::new(catalog, parser).with_options(options),
                anchor: cli.anchor.or(settings.anchor_date),
            };
            match text2sql::web::serve(state, &bind).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("Server error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_input(arg: &str) -> std::io::Result<String> {
    if arg != "-" {
        return Ok(arg.to_string());
    }
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn cmd_compile(
    catalog: Arc<Catalog>,
    input: &str,
    options: PipelineOptions,
    anchor: NaiveDate,
    output: OutputFormat,
) -> ExitCode {
    let source = if input == "-" {
        read_input(input)
    } else {
        fs::read_to_string(input)
    };
    let source = match source {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading '{}': {}", input, e);
            return ExitCode::FAILURE;
        }
    };

    let parser = JsonRequirementParser::new();
    let ir = match parser.parse_str(&source) {
        Ok(ir) => ir,
        Err(e) => {
            eprintln!("Invalid requirement: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let pipeline = Pipeline::new(catalog, Arc::new(parser)).with_options(options);
    let response = pipeline.process_requirement(&ir, anchor);
    emit(&response, &output, options.dialect, anchor)
}

fn emit(response: &Response, output: &OutputFormat, dialect: Dialect, anchor: NaiveDate) -> ExitCode {
    if let OutputFormat::Json = output {
        match serde_json::to_string_pretty(response) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing response: {}", e);
                return ExitCode::FAILURE;
            }
        }
        return exit_code(response);
    }

    match response {
        Response::Success(sql) => {
            if let OutputFormat::Verbose = output {
                println!("-- text2sql");
                println!("-- Dialect: {}", dialect);
                println!("-- Anchor: {}", anchor);
                println!("--");
                println!("-- {}", sql.explanation);
                for hint in &sql.performance_hints {
                    println!("-- Hint: {}", hint);
                }
                println!();
            }
            println!("{}", sql.sql);
        }
        Response::Clarify(questions) => {
            eprintln!("More information is needed:");
            for q in questions {
                eprintln!("  [{}] {}", q.field.as_str(), q.message);
            }
        }
        Response::Error(message) => {
            eprintln!("Error: {}", message);
        }
    }
    exit_code(response)
}

fn exit_code(response: &Response) -> ExitCode {
    ExitCode::from(exit_status(response))
}

/// 0 for SQL, 2 when the request needs clarification, 1 on error.
fn exit_status(response: &Response) -> u8 {
    match response {
        Response::Success(_) => 0,
        Response::Clarify(_) => 2,
        Response::Error(_) => 1,
    }
}

fn cmd_catalog(catalog: &Catalog) -> ExitCode {
    println!("Tables:");
    for table in catalog.tables() {
        match &table.partition_key {
            Some(key) => println!("  - {} (partitioned by {})", table.name, key),
            None => println!("  - {}", table.name),
        }
    }
    println!();

    println!("Metrics:");
    for metric in catalog.metrics() {
        println!(
            "  - {} [{}] = {} (from: {})",
            metric.name,
            metric.metric_type.as_str(),
            metric.formula.source(),
            metric.dependencies.join(", ")
        );
    }
    println!();

    println!("Dimensions:");
    for dim in catalog.dimensions() {
        let targets: Vec<_> = dim.fact_tables();
        println!(
            "  - {} (table: {}, joins: {})",
            dim.name,
            dim.table,
            targets.join(", ")
        );
    }

    ExitCode::SUCCESS
}
