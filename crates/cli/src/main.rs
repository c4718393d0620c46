mod integrations;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use permit_core::{DefaultParser, ParseError, PermissionStatement, SchemaProvider};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Permission statement compiler.
#[derive(Parser)]
#[command(name = "permit", version, about = "Permission statement compiler")]
struct Cli {
    /// Integration definitions file (.json or .toml); repeat to register several
    #[arg(long = "integrations", global = true, value_name = "FILE")]
    integrations: Vec<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log interpreter steps and schema lookups to stderr
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile statements and print the result
    Parse {
        /// Statements to compile, one per argument
        #[arg(required = true)]
        statements: Vec<String>,
    },

    /// Compile every statement of a file, one per line
    Check {
        /// Path to the statements file ('#' starts a comment line)
        file: PathBuf,
    },

    /// List the fields known for a resource type
    Fields {
        /// Resource type, e.g. ISSUES
        resource: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let parser = match integrations::load_registry(cli.integrations.as_slice()) {
        Ok(registry) => DefaultParser::from_registry(registry),
        Err(msg) => {
            report_error(&msg, cli.output, cli.quiet);
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Parse { statements } => {
            cmd_parse(&parser, &statements, cli.output, cli.quiet);
        }
        Commands::Check { file } => {
            cmd_check(&parser, &file, cli.output, cli.quiet);
        }
        Commands::Fields { resource } => {
            cmd_fields(&parser, &resource, cli.output, cli.quiet);
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

// ──────────────────────────────────────────────
// parse
// ──────────────────────────────────────────────

fn cmd_parse(parser: &DefaultParser, statements: &[String], output: OutputFormat, quiet: bool) {
    let mut compiled: Vec<PermissionStatement> = Vec::with_capacity(statements.len());
    for text in statements {
        match parser.parse(text) {
            Ok(statement) => compiled.push(statement),
            Err(e) => {
                report_parse_error(&e, output, quiet);
                process::exit(1);
            }
        }
    }

    match output {
        OutputFormat::Text => {
            for statement in &compiled {
                println!("{}", statement);
            }
        }
        OutputFormat::Json => {
            // One statement prints as an object, several as an array.
            let pretty = match compiled.as_slice() {
                [single] => serde_json::to_string_pretty(single),
                many => serde_json::to_string_pretty(many),
            }
            .unwrap_or_else(|e| format!("serialization error: {}", e));
            println!("{}", pretty);
        }
    }
}

// ──────────────────────────────────────────────
// check
// ──────────────────────────────────────────────

#[derive(Serialize)]
struct LineFailure {
    line: usize,
    statement: String,
    error: serde_json::Value,
}

#[derive(Serialize)]
struct CheckReport {
    checked: usize,
    failures: Vec<LineFailure>,
}

fn check_source(parser: &DefaultParser, source: &str) -> CheckReport {
    let mut report = CheckReport {
        checked: 0,
        failures: Vec::new(),
    };
    for (index, line) in source.lines().enumerate() {
        let text = line.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        report.checked += 1;
        if let Err(e) = parser.parse(text) {
            report.failures.push(LineFailure {
                line: index + 1,
                statement: text.to_owned(),
                error: e.to_json_value(),
            });
        }
    }
    report
}

fn cmd_check(parser: &DefaultParser, file: &Path, output: OutputFormat, quiet: bool) {
    let source = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", file.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let report = check_source(parser, &source);

    match output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            if report.failures.is_empty() {
                println!("{}", json);
            } else {
                eprintln!("{}", json);
            }
        }
        OutputFormat::Text => {
            if !quiet {
                for failure in &report.failures {
                    let message = failure.error["message"].as_str().unwrap_or_default();
                    eprintln!("{}:{}: {}", file.display(), failure.line, message);
                }
                if report.failures.is_empty() {
                    println!("{} statement(s) ok", report.checked);
                } else {
                    eprintln!(
                        "{} of {} statement(s) failed",
                        report.failures.len(),
                        report.checked
                    );
                }
            }
        }
    }

    if !report.failures.is_empty() {
        process::exit(1);
    }
}

// ──────────────────────────────────────────────
// fields
// ──────────────────────────────────────────────

fn cmd_fields(parser: &DefaultParser, resource: &str, output: OutputFormat, quiet: bool) {
    let schema = parser.interpreter().schema();
    let Some(resource_type) = schema.resolve_resource(resource) else {
        let msg = format!("unknown resource type '{}'", resource);
        report_error(&msg, output, quiet);
        process::exit(1);
    };

    let fields = schema.resource_fields(&resource_type);

    match output {
        OutputFormat::Json => {
            let fields: serde_json::Map<String, serde_json::Value> = fields
                .into_iter()
                .map(|(name, field)| {
                    let mut entry = field.attributes;
                    entry.insert(
                        "data_type".to_owned(),
                        field.data_type.map_or(serde_json::Value::Null, Into::into),
                    );
                    (name, serde_json::Value::Object(entry))
                })
                .collect();
            let json = serde_json::json!({
                "resource": resource_type.as_str(),
                "metadata": schema.resource_metadata(&resource_type),
                "fields": fields,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_default()
            );
        }
        OutputFormat::Text => {
            if fields.is_empty() {
                if !quiet {
                    println!("no fields declared for {}", resource_type);
                }
                return;
            }
            let width = fields.keys().map(String::len).max().unwrap_or(0);
            for (name, field) in &fields {
                let data_type = field.data_type.as_deref().unwrap_or("-");
                println!("{:<width$}  {}", name, data_type, width = width);
            }
        }
    }
}

// ──────────────────────────────────────────────
// Error reporting
// ──────────────────────────────────────────────

fn report_parse_error(e: &ParseError, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            let err_json = serde_json::to_string_pretty(&e.to_json_value())
                .unwrap_or_else(|_| format!("{{\"error\": \"{:?}\"}}", e));
            eprintln!("{}", err_json);
        }
        OutputFormat::Text => eprintln!("{}: {}", e.kind(), e),
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_skips_blank_and_comment_lines() {
        let source = "# header\n\nGIVE READ ACCESS TO ISSUES\n   \n# trailing\n";
        let report = check_source(&DefaultParser::default(), source);
        assert_eq!(report.checked, 1);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn check_reports_one_based_line_numbers() {
        let source = "GIVE READ ACCESS TO ISSUES\nFOO READ ACCESS TO ISSUES\n# note\nGIVE ACCESS TO ISSUES\n";
        let report = check_source(&DefaultParser::default(), source);
        assert_eq!(report.checked, 3);
        let lines: Vec<usize> = report.failures.iter().map(|f| f.line).collect();
        assert_eq!(lines, [2, 4]);
        assert_eq!(report.failures[0].error["kind"], "GrammarError");
        assert_eq!(report.failures[1].error["kind"], "ValidationError");
    }
}
