//! Quarry CLI - Compile report configurations to SQL
//!
//! Usage:
//!   quarry compile <config.json> [--preview] [--strategy <strategy>] [--format <format>]
//!   quarry validate <config.json>
//!   quarry entities [--entity <id>]
//!   quarry path <from> <to>
//!   quarry serve
//!
//! Examples:
//!   quarry compile reports/fleet.json --preview
//!   quarry compile reports/fleet.json --strategy shortest-path --format json
//!   quarry path vehicles devices

use clap::{Parser, Subcommand, ValueEnum};
use quarry::catalog::EntityRegistry;
use quarry::config::Settings;
use quarry::planner::{preview, CompileOptions, JoinPathResolver, JoinStrategy, ReportCompiler};
use quarry::report::{ReportConfig, ReportRequest};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quarry")]
#[command(about = "Quarry - Compile declarative report configurations to parameterized SQL")]
#[command(version)]
struct Cli {
    /// Catalog file to use instead of the configured or built-in one
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a report configuration to SQL
    Compile {
        /// Path to the report configuration (JSON)
        file: PathBuf,

        /// Inline parameter values instead of printing them separately
        #[arg(long)]
        preview: bool,

        /// Join path search strategy
        #[arg(short, long)]
        strategy: Option<StrategyArg>,

        /// Output format
        #[arg(short, long, default_value = "sql")]
        format: OutputFormat,

        /// Read the camelCase request form instead of the internal form
        #[arg(long)]
        request: bool,
    },

    /// Compile a configuration and report catalog warnings
    Validate {
        /// Path to the report configuration (JSON)
        file: PathBuf,

        /// Read the camelCase request form instead of the internal form
        #[arg(long)]
        request: bool,
    },

    /// List catalog entities
    Entities {
        /// Show one entity's fields and relationships
        #[arg(short, long)]
        entity: Option<String>,
    },

    /// Show the join path between two entities
    Path {
        from: String,
        to: String,

        /// Join path search strategy
        #[arg(short, long)]
        strategy: Option<StrategyArg>,
    },

    /// Start the HTTP server
    #[cfg(feature = "server")]
    Serve {
        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Priority,
    ShortestPath,
}

impl From<StrategyArg> for JoinStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Priority => JoinStrategy::Priority,
            StrategyArg::ShortestPath => JoinStrategy::ShortestPath,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// SQL text, with parameters listed after it
    Sql,
    /// JSON object with sql, params and columns
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut settings = match Settings::load() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(catalog) = &cli.catalog {
        settings.catalog = Some(catalog.display().to_string());
    }

    let registry = match settings.registry() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Compile {
            file,
            preview,
            strategy,
            format,
            request,
        } => {
            let options = with_strategy(settings.compiler, strategy);
            cmd_compile(&registry, options, file, preview, format, request)
        }
        Commands::Validate { file, request } => {
            cmd_validate(&registry, settings.compiler, file, request)
        }
        Commands::Entities { entity } => cmd_entities(&registry, entity),
        Commands::Path { from, to, strategy } => {
            let options = with_strategy(settings.compiler, strategy);
            cmd_path(&registry, options.join_strategy, &from, &to)
        }
        #[cfg(feature = "server")]
        Commands::Serve { port } => {
            if let Some(port) = port {
                settings.server.port = port;
            }
            cmd_serve(settings)
        }
    }
}

fn with_strategy(options: CompileOptions, strategy: Option<StrategyArg>) -> CompileOptions {
    match strategy {
        Some(s) => options.with_join_strategy(s.into()),
        None => options,
    }
}

fn read_config(file: &PathBuf, request: bool) -> Result<ReportConfig, String> {
    let source = fs::read_to_string(file)
        .map_err(|e| format!("Error reading file '{}': {}", file.display(), e))?;

    if request {
        let req: ReportRequest = serde_json::from_str(&source)
            .map_err(|e| format!("Invalid request in '{}': {}", file.display(), e))?;
        req.into_config().map_err(|e| format!("Invalid request: {}", e))
    } else {
        serde_json::from_str(&source)
            .map_err(|e| format!("Invalid configuration in '{}': {}", file.display(), e))
    }
}

fn cmd_compile(
    registry: &EntityRegistry,
    options: CompileOptions,
    file: PathBuf,
    preview: bool,
    format: OutputFormat,
    request: bool,
) -> ExitCode {
    let config = match read_config(&file, request) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let compiled = match ReportCompiler::new(registry, options).compile(&config) {
        Ok(q) => q,
        Err(e) => {
            eprintln!("Compilation error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match format {
        OutputFormat::Sql if preview => {
            println!("{}", preview::render(&compiled.sql, &compiled.params));
        }
        OutputFormat::Sql => {
            println!("{}", compiled.sql);
            if !compiled.params.is_empty() {
                println!();
                for (i, param) in compiled.params.iter().enumerate() {
                    println!("-- ${} = {}", i + 1, param);
                }
            }
        }
        OutputFormat::Json => {
            let mut value = match serde_json::to_value(&compiled) {
                Ok(v) => v,
                Err(e) => {
                    eprintln!("Error serializing output: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            if preview {
                value["preview"] = preview::render(&compiled.sql, &compiled.params).into();
            }
            match serde_json::to_string_pretty(&value) {
                Ok(s) => println!("{}", s),
                Err(e) => {
                    eprintln!("Error serializing output: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    ExitCode::SUCCESS
}

fn cmd_validate(
    registry: &EntityRegistry,
    options: CompileOptions,
    file: PathBuf,
    request: bool,
) -> ExitCode {
    let config = match read_config(&file, request) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match ReportCompiler::new(registry, options).validate(&config) {
        Ok(report) => {
            for warning in &report.warnings {
                eprintln!("warning: {}", warning);
            }
            if report.is_clean() {
                println!("✓ {} is valid", file.display());
            } else {
                println!(
                    "✓ {} is valid with {} warning(s)",
                    file.display(),
                    report.warnings.len()
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ {} ({})", e, e.kind().as_str());
            ExitCode::FAILURE
        }
    }
}

fn cmd_entities(registry: &EntityRegistry, entity: Option<String>) -> ExitCode {
    let Some(id) = entity else {
        println!("Catalog version {}", registry.version());
        for category in registry.categories() {
            println!();
            println!("{}:", category.name);
            for id in &category.entities {
                if let Some(e) = registry.lookup(id) {
                    println!("  {:<22} {}", e.id, e.display_name());
                }
            }
        }
        return ExitCode::SUCCESS;
    };

    let Some(entity) = registry.lookup(&id) else {
        eprintln!("Entity not found: {}", id);
        return ExitCode::FAILURE;
    };

    println!(
        "{} ({}.{})",
        entity.display_name(),
        entity.schema_name,
        entity.table_name
    );
    println!();
    println!("Fields:");
    for field in &entity.fields {
        let mut flags = Vec::new();
        if field.primary_key {
            flags.push("pk");
        }
        if field.filterable {
            flags.push("filter");
        }
        if field.sortable {
            flags.push("sort");
        }
        println!(
            "  {:<28} {:<12} {}",
            field.id,
            field.field_type.as_str(),
            flags.join(",")
        );
    }

    if !entity.relationships.is_empty() {
        println!();
        println!("Relationships:");
        for rel in &entity.relationships {
            let marker = if registry.lookup(&rel.target).is_some() {
                ""
            } else {
                " (undeclared)"
            };
            println!(
                "  {} -> {} [{}] on {} = {}{}",
                entity.id, rel.target, rel.cardinality, rel.source_field, rel.target_field, marker
            );
        }
    }

    ExitCode::SUCCESS
}

fn cmd_path(registry: &EntityRegistry, strategy: JoinStrategy, from: &str, to: &str) -> ExitCode {
    for id in [from, to] {
        if registry.lookup(id).is_none() {
            eprintln!("Entity not found: {}", id);
            return ExitCode::FAILURE;
        }
    }

    match JoinPathResolver::new(registry, strategy).resolve(from, to) {
        Ok(steps) if steps.is_empty() => {
            println!("{} needs no join", from);
            ExitCode::SUCCESS
        }
        Ok(steps) => {
            for step in steps {
                println!(
                    "{}.{} -> {}.{} ({} join, {})",
                    step.from_entity,
                    step.from_field,
                    step.to_entity,
                    step.to_field,
                    step.join.keyword().to_ascii_lowercase(),
                    step.cardinality
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "server")]
fn cmd_serve(settings: Settings) -> ExitCode {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(quarry::web::serve(settings)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}
