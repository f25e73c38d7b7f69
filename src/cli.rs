use crate::config::ComposeConfig;
use crate::document::linter::{LintOptions, Linter};
use crate::document::provider::DocumentProvider;
use crate::document::DocumentFragment;
use crate::extractor::route_builder::relative_location;
use crate::openapi_builder::{generate_fragment, Info};
use crate::oracle::{SourceIndex, DEFAULT_BUILDER_TRAIT};
use crate::parser::AstParser;
use crate::serializer::{render_rust_module, serialize_json, serialize_yaml, write_to_file};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// OpenAPI from routes - generate service fragments from route registrations
/// and compose them into one validated contract
#[derive(Parser, Debug)]
#[command(name = "openapi-from-routes")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan a service's sources and emit its OpenAPI fragment
    Generate {
        /// Path to the Rust project directory
        #[arg(value_name = "PROJECT_PATH")]
        project_path: PathBuf,

        /// Output format
        #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
        output_format: FragmentFormat,

        /// Output file path (if not specified, outputs to stdout)
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output_path: Option<PathBuf>,

        /// Document title (defaults to the project directory name)
        #[arg(long)]
        title: Option<String>,

        /// Document info version
        #[arg(long = "api-version", default_value = "1.0.0")]
        api_version: String,

        /// Name of the route-builder trait registrations are made on
        #[arg(long = "builder-trait", default_value = DEFAULT_BUILDER_TRAIT)]
        builder_trait: String,
    },

    /// Merge and lint fragments listed in a compose configuration
    Compose {
        #[arg(value_name = "CONFIG_FILE")]
        config: PathBuf,

        /// Output format
        #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
        output_format: DocumentFormat,

        /// Output file path (if not specified, outputs to stdout)
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output_path: Option<PathBuf>,
    },

    /// Lint a single fragment or document
    Lint {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Compose configuration supplying lint options
        #[arg(long, value_name = "CONFIG_FILE")]
        config: Option<PathBuf>,

        /// Accept documents without paths, such as shared fragments
        #[arg(long = "allow-empty-paths")]
        allow_empty_paths: bool,
    },
}

/// Fragment output formats
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FragmentFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
    /// Rust module embedding the YAML and endpoint list
    Rust,
}

/// Composed document output formats
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DocumentFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

/// Run the selected subcommand
pub fn run(args: CliArgs) -> Result<()> {
    debug!("Parsed arguments: {:?}", args);

    match args.command {
        Command::Generate {
            project_path,
            output_format,
            output_path,
            title,
            api_version,
            builder_trait,
        } => {
            let title = title.unwrap_or_else(|| project_title(&project_path));
            let info = Info {
                title,
                version: api_version,
                description: None,
            };
            generate(&project_path, output_format, output_path.as_deref(), info, &builder_trait)
        }
        Command::Compose {
            config,
            output_format,
            output_path,
        } => compose(&config, output_format, output_path.as_deref()),
        Command::Lint {
            file,
            config,
            allow_empty_paths,
        } => lint(&file, config.as_deref(), allow_empty_paths),
    }
}

fn project_title(project_path: &Path) -> String {
    project_path
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .map(|name| name.replace(['-', '_', '.'], " "))
        .unwrap_or_else(|| "API".to_string())
}

fn emit(content: &str, output_path: Option<&Path>) -> Result<()> {
    match output_path {
        Some(path) => {
            info!("Writing output to: {}", path.display());
            write_to_file(content, path)
        }
        None => {
            println!("{}", content);
            Ok(())
        }
    }
}

fn generate(
    project_path: &Path,
    format: FragmentFormat,
    output_path: Option<&Path>,
    info: Info,
    builder_trait: &str,
) -> Result<()> {
    info!("Scanning project: {}", project_path.display());

    let parsed_files = AstParser::parse_project(project_path)?;
    if parsed_files.is_empty() {
        anyhow::bail!("No Rust files could be parsed under {}", project_path.display());
    }
    info!("Parsed {} files", parsed_files.len());

    let index = SourceIndex::with_builder_trait(&parsed_files, builder_trait);
    let fragment = generate_fragment(&parsed_files, &index, info);

    for endpoint in &fragment.endpoints {
        debug!(
            "{} {} at {}",
            endpoint.verb,
            endpoint.path,
            relative_location(endpoint, project_path)
        );
    }
    if fragment.endpoints.is_empty() {
        warn!("No route registrations found on '{}'", builder_trait);
    }

    let content = match format {
        FragmentFormat::Yaml => serialize_yaml(&fragment.document)?,
        FragmentFormat::Json => serialize_json(&fragment.document)?,
        FragmentFormat::Rust => render_rust_module(&fragment.document, &fragment.endpoints)?,
    };
    emit(&content, output_path)?;

    info!("Summary:");
    info!("  - Files parsed: {}", parsed_files.len());
    info!("  - Endpoints found: {}", fragment.endpoints.len());
    info!("  - Schemas: {}", fragment.document.components.schemas.len());

    Ok(())
}

fn compose(config_path: &Path, format: DocumentFormat, output_path: Option<&Path>) -> Result<()> {
    let config = ComposeConfig::from_file(config_path)
        .with_context(|| format!("Failed to load configuration: {}", config_path.display()))?;

    let mut provider = DocumentProvider::new(config.loader(), config.merger(), config.linter());
    provider.warm_up()?;
    let document = provider.document()?;

    let content = match format {
        DocumentFormat::Yaml => &document.yaml,
        DocumentFormat::Json => &document.json,
    };
    emit(content, output_path)?;

    info!(
        "Composed {} fragments, {} paths in {:?}",
        document.stats.fragment_count, document.stats.path_count, document.stats.duration
    );
    Ok(())
}

fn lint(file: &Path, config_path: Option<&Path>, allow_empty_paths: bool) -> Result<()> {
    let options = match config_path {
        Some(path) => ComposeConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration: {}", path.display()))?
            .lint,
        None => LintOptions::recommended(),
    };

    let text = fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;
    let source = file.display().to_string();
    let fragment = DocumentFragment::parse(&source, &source, &text)?;

    let errors = Linter::new(options).lint(&fragment.name, &fragment.root, !allow_empty_paths);
    if !errors.is_empty() {
        for error in &errors {
            warn!("{}", error);
        }
        anyhow::bail!("{} lint error(s) in {}", errors.len(), source);
    }

    info!("{} passed lint", source);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_title_from_directory_name() {
        let temp = tempfile::tempdir().unwrap();
        let project = temp.path().join("inventory-service_api.v2");
        std::fs::create_dir(&project).unwrap();

        assert_eq!(project_title(&project), "inventory service api v2");
        assert_eq!(project_title(&temp.path().join("missing")), "API");
    }

    #[test]
    fn test_generate_arguments() {
        let args = CliArgs::try_parse_from([
            "openapi-from-routes",
            "generate",
            "./svc",
            "-f",
            "rust",
            "--builder-trait",
            "Routes",
            "-v",
        ])
        .unwrap();

        assert!(args.verbose);
        let Command::Generate {
            output_format,
            builder_trait,
            api_version,
            ..
        } = args.command
        else {
            panic!("expected generate");
        };
        assert!(matches!(output_format, FragmentFormat::Rust));
        assert_eq!(builder_trait, "Routes");
        assert_eq!(api_version, "1.0.0");
    }

    #[test]
    fn test_lint_arguments() {
        let args = CliArgs::try_parse_from([
            "openapi-from-routes",
            "lint",
            "common/schemas.yaml",
            "--allow-empty-paths",
        ])
        .unwrap();

        let Command::Lint {
            allow_empty_paths,
            config,
            ..
        } = args.command
        else {
            panic!("expected lint");
        };
        assert!(allow_empty_paths);
        assert!(config.is_none());
    }

    #[test]
    fn test_compose_rejects_rust_format() {
        assert!(CliArgs::try_parse_from([
            "openapi-from-routes",
            "compose",
            "compose.yaml",
            "-f",
            "rust"
        ])
        .is_err());
    }
}
