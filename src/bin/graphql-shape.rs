//! graphql-shape CLI - compile `@shape` directives and reshape JSON responses
//!
//! This CLI tool strips transform directives from a query, prints the program
//! they compile to, and replays programs against JSON documents.

use clap::{Parser, Subcommand, ValueEnum};
use graphql_shape::runtime::ShapeConfig;
use graphql_shape::{CompileOptions, FragmentTable, Program, Shape, ShapeError};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "graphql-shape")]
#[command(version, about = "Compile GraphQL shape directives and reshape JSON responses", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a query and print the cleaned query, program and fragments
    Compile {
        /// Path to the GraphQL query
        #[arg(short, long)]
        query: PathBuf,

        /// Path to a YAML config file with directive settings
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the directive name (without `@`)
        #[arg(short, long)]
        directive: Option<String>,

        /// Serialization format for the program
        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },

    /// Apply a serialized program to a JSON document
    Apply {
        /// Path to the program (JSON, or YAML for .yaml/.yml)
        #[arg(short, long)]
        program: PathBuf,

        /// Path to the JSON document
        #[arg(long)]
        data: PathBuf,

        /// Output format for the reshaped document
        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },

    /// Compile a query and apply it to a JSON document
    Run {
        /// Path to the GraphQL query
        #[arg(short, long)]
        query: PathBuf,

        /// Path to the JSON document
        #[arg(long)]
        data: PathBuf,

        /// Path to a YAML config file with directive settings
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the directive name (without `@`)
        #[arg(short, long)]
        directive: Option<String>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

#[derive(Serialize)]
struct CompiledOutput<'a> {
    program: &'a Program,
    fragments: &'a FragmentTable,
}

/// Determine compile options with precedence: CLI > ENV (GRAPHQL_SHAPE_DIRECTIVE) > config file > default
fn resolve_options(config: Option<PathBuf>, cli_directive: Option<String>) -> Result<CompileOptions, ShapeError> {
    let base = match config {
        Some(path) => ShapeConfig::load_from_file(&path).map_err(ShapeError::Config)?,
        None => ShapeConfig::default(),
    };

    let resolved = base.with_env_overrides().with_directive_override(cli_directive);
    if resolved.directive.starts_with('@') {
        return Err(ShapeError::Config(format!(
            "Directive name must not include '@': {}",
            resolved.directive
        )));
    }

    tracing::info!(directive = %resolved.directive, "Using directive");
    Ok(resolved.compile_options())
}

fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile { query, config, directive, format } => {
            compile_query(query, config, directive, format)
        }
        Commands::Apply { program, data, format } => {
            apply_program(program, data, format)
        }
        Commands::Run { query, data, config, directive } => {
            run_query(query, data, config, directive)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Compile a query file and print the results
fn compile_query(
    query: PathBuf,
    config: Option<PathBuf>,
    directive: Option<String>,
    format: Format,
) -> Result<(), ShapeError> {
    let options = resolve_options(config, directive)?;
    let source = read_file(&query)?;
    let compiled = Shape::with_options(options).compile(&source)?;

    println!("{}", compiled.query.trim_end());
    println!();

    let output = CompiledOutput {
        program: &compiled.program,
        fragments: &compiled.fragments,
    };
    println!("{}", render(&output, format)?);

    Ok(())
}

/// Replay a serialized program against a JSON document
fn apply_program(program: PathBuf, data: PathBuf, format: Format) -> Result<(), ShapeError> {
    let program = load_program(&program)?;
    let document = load_json(&data)?;
    let result = Shape::new().transformer().transform(document, &program)?;

    println!("{}", render(&result, format)?);
    Ok(())
}

/// Compile a query and apply it in one step
fn run_query(
    query: PathBuf,
    data: PathBuf,
    config: Option<PathBuf>,
    directive: Option<String>,
) -> Result<(), ShapeError> {
    let options = resolve_options(config, directive)?;
    let source = read_file(&query)?;
    let document = load_json(&data)?;

    let compiled = Shape::with_options(options).compile(&source)?;
    let result = compiled.transform(document)?;

    println!("{}", render(&result, Format::Json)?);
    Ok(())
}

fn read_file(path: &Path) -> Result<String, ShapeError> {
    fs::read_to_string(path).map_err(|e| {
        tracing::error!(path = %path.display(), "Failed to read file");
        ShapeError::Io(e)
    })
}

fn load_json(path: &Path) -> Result<Value, ShapeError> {
    let contents = read_file(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn load_program(path: &Path) -> Result<Program, ShapeError> {
    let contents = read_file(path)?;

    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    );

    tracing::debug!(path = %path.display(), yaml = is_yaml, "Loading program");
    if is_yaml {
        Ok(serde_yaml::from_str(&contents)?)
    } else {
        Ok(serde_json::from_str(&contents)?)
    }
}

fn render<T: Serialize>(value: &T, format: Format) -> Result<String, ShapeError> {
    Ok(match format {
        Format::Json => serde_json::to_string_pretty(value)?,
        Format::Yaml => serde_yaml::to_string(value)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn program_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_program_by_extension() {
        let yaml = program_file(
            ".yaml",
            "- address: user\n  operations:\n    - op: rename\n      key: person\n",
        );
        let json = program_file(".json", r#"[{"address": "user", "operations": [{"op": "rename", "key": "person"}]}]"#);

        let from_yaml = load_program(yaml.path()).unwrap();
        let from_json = load_program(json.path()).unwrap();

        assert_eq!(from_yaml, from_json);
        assert_eq!(from_yaml.len(), 1);
    }

    #[test]
    fn test_load_errors_keep_their_kind() {
        let broken = program_file(".json", "[{");

        assert!(matches!(load_program(broken.path()), Err(ShapeError::Json(_))));
        assert!(matches!(load_json(Path::new("/nonexistent/data.json")), Err(ShapeError::Io(_))));
    }

    #[test]
    fn test_directive_with_at_sign_is_rejected() {
        let result = resolve_options(None, Some("@shape".to_string()));

        assert!(matches!(result, Err(ShapeError::Config(_))));
    }

    #[test]
    fn test_missing_config_file_is_a_config_error() {
        let result = resolve_options(Some(PathBuf::from("/nonexistent/shape.yaml")), None);

        assert!(matches!(result, Err(ShapeError::Config(_))));
    }
}
