use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Source parser that turns a service's Rust files into a syntax forest.
///
/// The forest is the immutable snapshot every later stage reads: the symbol
/// index, the endpoint scanner and the type resolver all work over the same
/// `[ParsedFile]` slice.
///
/// # Example
///
/// ```no_run
/// use openapi_from_routes::parser::AstParser;
/// use std::path::Path;
///
/// let parsed = AstParser::parse_project(Path::new("./inventory-service")).unwrap();
/// println!("Parsed {} files", parsed.len());
/// ```
pub struct AstParser;

/// A successfully parsed Rust file with its syntax tree.
#[derive(Debug)]
pub struct ParsedFile {
    /// Path to the source file
    pub path: PathBuf,
    /// The parsed syntax tree
    pub syntax_tree: syn::File,
}

impl AstParser {
    /// Parses a single Rust source file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid Rust.
    pub fn parse_file(path: &Path) -> Result<ParsedFile> {
        debug!("Parsing file: {}", path.display());

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        Self::parse_source(path, &content)
    }

    /// Parses in-memory source text as if it were read from `path`.
    pub fn parse_source(path: &Path, content: &str) -> Result<ParsedFile> {
        let syntax_tree = syn::parse_file(content)
            .with_context(|| format!("Failed to parse Rust syntax in file: {}", path.display()))?;

        Ok(ParsedFile {
            path: path.to_path_buf(),
            syntax_tree,
        })
    }

    /// Parses multiple files, continuing past failures.
    ///
    /// One result is returned per input path so callers can report partial
    /// failures while still scanning what did parse.
    pub fn parse_files(paths: &[PathBuf]) -> Vec<Result<ParsedFile>> {
        debug!("Parsing {} files", paths.len());

        let results: Vec<Result<ParsedFile>> = paths
            .iter()
            .map(|path| {
                Self::parse_file(path).map_err(|e| {
                    warn!("Failed to parse {}: {}", path.display(), e);
                    e
                })
            })
            .collect();

        let success_count = results.iter().filter(|r| r.is_ok()).count();
        debug!(
            "Parsing complete: {} succeeded, {} failed",
            success_count,
            results.len() - success_count
        );

        results
    }

    /// Collects every `.rs` file below `root`, skipping `target` and hidden
    /// directories. Paths are returned sorted so scanning order is stable.
    pub fn discover_sources(root: &Path) -> Result<Vec<PathBuf>> {
        if !root.is_dir() {
            anyhow::bail!("Project path is not a directory: {}", root.display());
        }

        let mut sources = Vec::new();
        let walker = WalkDir::new(root).into_iter().filter_entry(|e| {
            if e.path() == root {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            !name.starts_with('.') && name != "target"
        });

        for entry in walker {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if entry.file_type().is_file()
                        && path.extension().and_then(|s| s.to_str()) == Some("rs")
                    {
                        sources.push(path.to_path_buf());
                    }
                }
                Err(e) => warn!("Failed to access path: {}", e),
            }
        }

        sources.sort();
        debug!("Discovered {} source files under {}", sources.len(), root.display());
        Ok(sources)
    }

    /// Discovers and parses a whole project, dropping files that fail to parse.
    pub fn parse_project(root: &Path) -> Result<Vec<ParsedFile>> {
        let sources = Self::discover_sources(root)?;
        Ok(Self::parse_files(&sources)
            .into_iter()
            .filter_map(Result::ok)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_temp_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let file_path = dir.join(name);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&file_path, content).unwrap();
        file_path
    }

    #[test]
    fn test_parse_valid_rust_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = create_temp_file(
            temp_dir.path(),
            "routes.rs",
            "pub struct GetItemCommand { pub id: String }",
        );

        let parsed = AstParser::parse_file(&file_path).unwrap();
        assert_eq!(parsed.path, file_path);
        assert_eq!(parsed.syntax_tree.items.len(), 1);
    }

    #[test]
    fn test_parse_invalid_rust_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = create_temp_file(temp_dir.path(), "broken.rs", "fn broken( {");

        let err = AstParser::parse_file(&file_path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse Rust syntax"));
    }

    #[test]
    fn test_parse_nonexistent_file() {
        let err = AstParser::parse_file(Path::new("/nonexistent/file.rs")).unwrap_err();
        assert!(err.to_string().contains("Failed to read file"));
    }

    #[test]
    fn test_parse_files_keeps_going_after_failure() {
        let temp_dir = TempDir::new().unwrap();
        let good = create_temp_file(temp_dir.path(), "a.rs", "pub fn hello() {}");
        let bad = create_temp_file(temp_dir.path(), "b.rs", "pub fn broken( {");

        let results = AstParser::parse_files(&[good, bad]);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn test_discover_skips_target_and_hidden_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        create_temp_file(root, "src/main.rs", "fn main() {}");
        create_temp_file(root, "src/routes/items.rs", "");
        create_temp_file(root, "target/debug/build.rs", "");
        create_temp_file(root, ".git/hooks.rs", "");
        create_temp_file(root, "README.md", "");

        let sources = AstParser::discover_sources(root).unwrap();
        let names: Vec<_> = sources
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["src/main.rs", "src/routes/items.rs"]);
    }

    #[test]
    fn test_parse_project_drops_unparseable_files() {
        let temp_dir = TempDir::new().unwrap();
        create_temp_file(temp_dir.path(), "ok.rs", "pub struct Ok;");
        create_temp_file(temp_dir.path(), "bad.rs", "struct Missing }");

        let parsed = AstParser::parse_project(temp_dir.path()).unwrap();
        assert_eq!(parsed.len(), 1);
        assert!(parsed[0].path.ends_with("ok.rs"));
    }

    #[test]
    fn test_discover_rejects_missing_directory() {
        assert!(AstParser::discover_sources(Path::new("/nonexistent/project")).is_err());
    }
}
