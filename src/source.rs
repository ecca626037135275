//! Source loading and input path expansion.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A loaded source file: text plus the names the pipelines need from it.
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
}

impl SourceFile {
    pub fn load(path: &Path) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            text,
        })
    }

    /// File basename without extension, preserving capitalization.
    /// Used as the module name for `static` segment labels.
    pub fn module(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Unknown")
    }

    /// Display name for diagnostics.
    pub fn name(&self) -> String {
        self.path.display().to_string()
    }
}

/// An input argument expanded to concrete files.
#[derive(Debug)]
pub struct ResolvedInput {
    /// Directory name for a directory input, file stem otherwise.
    pub basename: String,
    /// Directory the outputs land in.
    pub dir: PathBuf,
    /// Files carrying the wanted extension, sorted by name.
    pub files: Vec<PathBuf>,
    pub is_dir: bool,
}

/// Expand a file-or-directory argument into the list of files with the
/// given extension. A file input must carry the extension itself; a
/// directory input must contain at least one such file.
pub fn resolve_input(path: &Path, extension: &str) -> io::Result<ResolvedInput> {
    let meta = fs::metadata(path)?;

    if meta.is_dir() {
        let mut files: Vec<PathBuf> = fs::read_dir(path)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|e| e == extension))
            .collect();
        // Deterministic multi-file output order.
        files.sort();
        if files.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("no .{} files in '{}'", extension, path.display()),
            ));
        }
        let basename = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("out")
            .to_string();
        return Ok(ResolvedInput {
            basename,
            dir: path.to_path_buf(),
            files,
            is_dir: true,
        });
    }

    if !path.extension().is_some_and(|e| e == extension) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("'{}' must have the .{} extension", path.display(), extension),
        ));
    }
    let basename = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("out")
        .to_string();
    Ok(ResolvedInput {
        basename,
        dir: path.parent().unwrap_or(Path::new(".")).to_path_buf(),
        files: vec![path.to_path_buf()],
        is_dir: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        writeln!(f, "// {}", name).unwrap();
        path
    }

    #[test]
    fn test_resolve_single_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = touch(tmp.path(), "Main.jack");
        let resolved = resolve_input(&file, "jack").unwrap();
        assert!(!resolved.is_dir);
        assert_eq!(resolved.basename, "Main");
        assert_eq!(resolved.files, vec![file]);
    }

    #[test]
    fn test_resolve_directory_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "Square.jack");
        touch(tmp.path(), "Main.jack");
        touch(tmp.path(), "notes.txt");
        let resolved = resolve_input(tmp.path(), "jack").unwrap();
        assert!(resolved.is_dir);
        assert_eq!(resolved.files.len(), 2, "only .jack files are collected");
        let names: Vec<_> = resolved
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["Main.jack", "Square.jack"], "sorted by name");
    }

    #[test]
    fn test_resolve_wrong_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let file = touch(tmp.path(), "Main.vm");
        let err = resolve_input(&file, "jack").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_resolve_empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let err = resolve_input(tmp.path(), "vm").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_module_name_preserves_case() {
        let sf = SourceFile {
            path: PathBuf::from("/tmp/ProgramFlow.vm"),
            text: String::new(),
        };
        assert_eq!(sf.module(), "ProgramFlow");
    }
}
