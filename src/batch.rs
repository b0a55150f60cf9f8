//! Directory-level driver: one JSON outline per input PDF.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::ExtractConfig;
use crate::error::{OutlineError, Result};
use crate::extract::extract_outline;

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub extract: ExtractConfig,
}

impl BatchConfig {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            extract: ExtractConfig::default(),
        }
    }

    pub fn with_extract_config(mut self, extract: ExtractConfig) -> Self {
        self.extract = extract;
        self
    }
}

#[derive(Debug)]
pub struct FileFailure {
    pub input: PathBuf,
    pub error: OutlineError,
}

/// Outcome of a batch run; one entry per input file.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<FileFailure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total(&self) -> usize {
        self.written.len() + self.failures.len()
    }
}

fn is_pdf_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".pdf")
}

/// Regular files in `dir` whose name ends in `.pdf` (any case), sorted by name.
pub fn collect_pdf_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(OutlineError::NotADirectory(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_pdf = path
            .file_name()
            .map_or(false, |name| is_pdf_name(&name.to_string_lossy()));
        if is_pdf && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// `report.PDF` becomes `<output_dir>/report.json`. Non-UTF-8 names are kept
/// byte for byte.
pub fn output_path_for(input: &Path, output_dir: &Path) -> Option<PathBuf> {
    let name = input.file_name()?;
    if !is_pdf_name(&name.to_string_lossy()) {
        return None;
    }
    // A bare `.pdf` counts as a hidden file with no extension.
    let stem = match input.file_stem() {
        Some(stem) if stem != name => stem,
        _ => OsStr::new(""),
    };
    let mut out_name = stem.to_os_string();
    out_name.push(".json");
    Some(output_dir.join(out_name))
}

/// Extract one file and write its JSON next to the others.
pub fn process_file(input: &Path, output_dir: &Path, config: &ExtractConfig) -> Result<PathBuf> {
    let out_path = output_path_for(input, output_dir).ok_or_else(|| {
        let message = format!("not a PDF file name: {}", input.display());
        std::io::Error::new(std::io::ErrorKind::InvalidInput, message)
    })?;

    let outline = extract_outline(input, config)?;
    fs::write(&out_path, serde_json::to_string_pretty(&outline)?)?;
    Ok(out_path)
}

/// Process every PDF of the input directory. A failing file is recorded in
/// the report and the batch moves on; only directory-level problems abort.
pub fn run_batch(config: &BatchConfig) -> Result<BatchReport> {
    fs::create_dir_all(&config.output_dir)?;
    let files = collect_pdf_files(&config.input_dir)?;
    info!(
        "Processing {} PDF file(s) from {} into {}",
        files.len(),
        config.input_dir.display(),
        config.output_dir.display()
    );

    let mut report = BatchReport::default();
    for input in files {
        match process_file(&input, &config.output_dir, &config.extract) {
            Ok(out_path) => {
                info!("Wrote {}", out_path.display());
                report.written.push(out_path);
            }
            Err(error) => {
                warn!("Failed to process {}: {}", input.display(), error);
                report.failures.push(FileFailure { input, error });
            }
        }
    }

    info!(
        "Done: {} of {} file(s) succeeded",
        report.written.len(),
        report.total()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_name_strips_the_pdf_suffix() {
        let out = Path::new("/out");
        assert_eq!(
            output_path_for(Path::new("/in/report.pdf"), out),
            Some(PathBuf::from("/out/report.json"))
        );
        assert_eq!(
            output_path_for(Path::new("/in/Scan.2024.PDF"), out),
            Some(PathBuf::from("/out/Scan.2024.json"))
        );
        assert_eq!(output_path_for(Path::new("/in/notes.txt"), out), None);
        assert_eq!(
            output_path_for(Path::new("/in/.pdf"), out),
            Some(PathBuf::from("/out/.json"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_names_round_trip() {
        use std::os::unix::ffi::OsStrExt;

        let input = Path::new("/in").join(OsStr::from_bytes(b"r\xE9sum\xE9.PDF"));
        let expected = Path::new("/out").join(OsStr::from_bytes(b"r\xE9sum\xE9.json"));
        assert_eq!(output_path_for(&input, Path::new("/out")), Some(expected));
    }

    #[test]
    fn only_pdf_files_are_collected() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.PDF", "c.txt", "pdf"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("folder.pdf")).unwrap();

        let names: Vec<String> = collect_pdf_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
    }

    #[test]
    fn missing_input_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_pdf_files(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, OutlineError::NotADirectory(_)));
    }
}
