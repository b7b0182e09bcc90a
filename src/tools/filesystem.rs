//! Filesystem tools - read, list, and write project files

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use async_trait::async_trait;
use serde_json::{json, Value};
use walkdir::WalkDir;
use crate::Result;
use crate::error::Error;
use super::{required_str, truncate_output, Tool};

/// Characters returned by `read_file` before truncation
const MAX_READ_CHARS: usize = 10_000;

/// Entries returned by `list_files`
const MAX_LISTED_FILES: usize = 50;

/// Build and dependency directories never listed
const SKIPPED_DIRS: [&str; 5] = ["node_modules", ".git", "__pycache__", ".next", "target"];

/// Upper bound on disambiguated names tried by `write_file`
const MAX_WRITE_ATTEMPTS: usize = 10_000;

/// Read file contents
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str { "read_file" }
    fn description(&self) -> &str {
        "Read the contents of a file from the project. Use this to examine existing code, components, styles, or config files."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Absolute or relative path to the file to read"
                }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let path = required_str(&params, "file_path")?;

        if !Path::new(path).is_file() {
            return Err(Error::Tool(format!("File {} not found", path)));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Tool(format!("Failed to read {}: {}", path, e)))?;

        Ok(truncate_output(&content, MAX_READ_CHARS))
    }
}

/// List project files recursively
pub struct ListFilesTool;

impl ListFilesTool {
    fn is_skipped(entry: &walkdir::DirEntry) -> bool {
        entry.file_type().is_dir()
            && entry.depth() > 0
            && entry
                .file_name()
                .to_str()
                .map(|name| SKIPPED_DIRS.contains(&name))
                .unwrap_or(false)
    }

    fn matches_extension(path: &Path, extension: Option<&str>) -> bool {
        match extension {
            None => true,
            Some(wanted) => {
                let wanted = wanted.trim_start_matches('.');
                path.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e == wanted)
                    .unwrap_or(false)
            }
        }
    }

    fn collect(root: &Path, extension: Option<&str>) -> Vec<String> {
        let mut files: Vec<String> = WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| !Self::is_skipped(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| Self::matches_extension(e.path(), extension))
            .filter_map(|e| {
                e.path()
                    .strip_prefix(root)
                    .ok()
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
            })
            .collect();

        files.sort();
        files.truncate(MAX_LISTED_FILES);
        files
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str { "list_files" }
    fn description(&self) -> &str {
        "List files in a directory. Use this to understand project structure before reading specific files. Automatically skips node_modules, .git, etc."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "directory": {
                    "type": "string",
                    "description": "Directory path to list"
                },
                "extension": {
                    "type": "string",
                    "description": "Optional file extension filter (e.g., '.tsx', '.css', '.js')"
                }
            },
            "required": ["directory"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let directory = required_str(&params, "directory")?;
        let extension = params.get("extension").and_then(|v| v.as_str()).filter(|e| !e.is_empty());

        let root = Path::new(directory);
        if !root.is_dir() {
            return Err(Error::Tool(format!("Directory {} not found", directory)));
        }

        let files = Self::collect(root, extension);
        if files.is_empty() {
            return Ok(format!("No files found in {}", directory));
        }

        Ok(files.join("\n"))
    }
}

/// Write content to a new file, never replacing an existing one
pub struct WriteFileTool;

impl WriteFileTool {
    /// The `attempt`-th name tried for `path`: the path itself, then
    /// `stem.new.ext`, `stem.new2.ext`, `stem.new3.ext`, ...
    pub fn candidate_path(path: &Path, attempt: usize) -> PathBuf {
        if attempt == 0 {
            return path.to_path_buf();
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let marker = if attempt == 1 { "new".to_string() } else { format!("new{}", attempt) };
        let file_name = match path.extension() {
            Some(ext) => format!("{}.{}.{}", stem, marker, ext.to_string_lossy()),
            None => format!("{}.{}", stem, marker),
        };

        path.with_file_name(file_name)
    }

    /// Create the first free candidate exclusively and write `content` to it
    pub fn write_new(path: &Path, content: &str) -> Result<PathBuf> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Tool(format!("Failed to create directory: {}", e)))?;
        }

        for attempt in 0..MAX_WRITE_ATTEMPTS {
            let candidate = Self::candidate_path(path, attempt);
            let write_failed = |e: std::io::Error| {
                Error::Tool(format!("Failed to write {}: {}", candidate.display(), e))
            };
            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(mut file) => {
                    file.write_all(content.as_bytes()).map_err(write_failed)?;
                    return Ok(candidate);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(write_failed(e)),
            }
        }

        Err(Error::Tool(format!("No free file name found for {}", path.display())))
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str { "write_file" }
    fn description(&self) -> &str {
        "Write content to a file. Use this to output improved component code or new files. IMPORTANT: Existing files are NEVER overwritten - if the file exists, a new file with .new suffix is created instead (e.g., Component.tsx -> Component.new.tsx)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path where the file should be written. If file exists, .new suffix will be added automatically."
                },
                "content": {
                    "type": "string",
                    "description": "Content to write to the file"
                }
            },
            "required": ["file_path", "content"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let path = required_str(&params, "file_path")?;
        let content = required_str(&params, "content")?;

        let written = Self::write_new(Path::new(path), content)?;
        Ok(format!("Successfully wrote to {}", written.display()))
    }
}
