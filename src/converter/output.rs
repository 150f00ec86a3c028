use crate::converter::errors::{ConverterResult, FileOperationError};
use crate::converter::filename;
use crate::converter::logging::ConversionLogger;
use crate::converter::markdown_splitter::MARKDOWN_EXTENSION;
use log::{debug, error, info, trace, warn};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Name of the generated table of contents
pub const TOC_FILE_NAME: &str = "README.md";
/// Extension of checksum sidecar files
pub const CHECKSUM_EXTENSION: &str = "blake3";
/// Marker left in a run directory whose output must not be trusted
pub const INCOMPLETE_MARKER: &str = ".incomplete";

/// Files written for one conversion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledOutput {
    /// Content files in the order their sections were given
    pub files: Vec<PathBuf>,
    /// Table of contents, present when more than one file was written
    pub toc: Option<PathBuf>,
}

/// Writes section files, their checksum sidecars and the table of contents
pub struct OutputAssembler<'a> {
    output_dir: PathBuf,
    logger: &'a ConversionLogger,
}

impl<'a> OutputAssembler<'a> {
    /// Creates an assembler for `output_dir`, creating the directory if needed
    pub fn new(output_dir: impl Into<PathBuf>, logger: &'a ConversionLogger) -> ConverterResult<Self> {
        let output_dir = output_dir.into();
        trace!("Creating OutputAssembler for directory: {:?}", output_dir);

        if output_dir.as_os_str().is_empty() {
            error!("Output directory path is empty");
            return Err(FileOperationError::InvalidPath("Empty path".to_string()).into());
        }

        if !output_dir.is_dir() {
            info!("Creating output directory: {:?}", output_dir);
            fs::create_dir_all(&output_dir).map_err(|source| {
                logger.log_file_operation(
                    "create_dir",
                    &output_dir.to_string_lossy(),
                    false,
                    Some(&source.to_string()),
                );
                FileOperationError::DirectoryCreationFailed {
                    path: output_dir.clone(),
                    source,
                }
            })?;
        } else {
            debug!("Output directory already exists: {:?}", output_dir);
        }

        Ok(Self { output_dir, logger })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write every (title, content) pair in order, then the table of contents
    /// when more than one file resulted
    pub fn write_sections<I, T, C>(&self, sections: I) -> ConverterResult<AssembledOutput>
    where
        I: IntoIterator<Item = (T, C)>,
        T: AsRef<str>,
        C: AsRef<str>,
    {
        let mut files = Vec::new();
        for (title, content) in sections {
            files.push(self.write_file(title.as_ref(), content.as_ref())?);
        }

        let toc = if files.len() > 1 {
            Some(self.generate_toc(&files)?)
        } else {
            None
        };

        info!("Wrote {} file(s) to {:?}", files.len(), self.output_dir);
        Ok(AssembledOutput { files, toc })
    }

    /// Write one section under a collision-free name derived from its title,
    /// together with its checksum sidecar
    pub fn write_file(&self, title: &str, content: &str) -> ConverterResult<PathBuf> {
        let slug = filename::normalize(title);
        let path = filename::reserve_unique(&slug, MARKDOWN_EXTENSION, &self.output_dir)?;

        if content.trim().is_empty() {
            warn!("Section '{}' has no content", title);
        }
        self.write_text(&path, &with_single_trailing_newline(content))?;
        self.write_checksum(&path)?;
        Ok(path)
    }

    fn write_text(&self, path: &Path, text: &str) -> ConverterResult<()> {
        let path_display = path.to_string_lossy();
        match fs::write(path, text) {
            Ok(()) => {
                self.logger.log_file_operation("write", &path_display, true, None);
                Ok(())
            }
            Err(source) => {
                self.logger
                    .log_file_operation("write", &path_display, false, Some(&source.to_string()));
                Err(FileOperationError::FileWriteFailed {
                    path: path.to_path_buf(),
                    source,
                }
                .into())
            }
        }
    }

    /// Write the table of contents linking `files`, sorted by file name.
    ///
    /// The file is written to a temporary name and renamed into place so a
    /// reader never sees a half-written index.
    pub fn generate_toc(&self, files: &[PathBuf]) -> ConverterResult<PathBuf> {
        let mut names: Vec<String> = files
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();
        names.sort();

        let mut toc = String::from("# Table of Contents\n\n");
        for name in &names {
            let stem = Path::new(name)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| name.clone());
            toc.push_str(&format!("- [{}]({})\n", humanize(&stem), name));
        }

        let toc_path = self.output_dir.join(TOC_FILE_NAME);
        let write_failed = |source: std::io::Error| FileOperationError::FileWriteFailed {
            path: toc_path.clone(),
            source,
        };

        let mut temp = NamedTempFile::new_in(&self.output_dir).map_err(write_failed)?;
        temp.write_all(toc.as_bytes()).map_err(write_failed)?;
        temp.persist(&toc_path).map_err(|e| write_failed(e.error))?;

        self.logger
            .log_file_operation("toc", &toc_path.to_string_lossy(), true, None);
        debug!("Table of contents lists {} file(s)", names.len());
        Ok(toc_path)
    }

    /// Compute the BLAKE3 digest of `path` and store it in the sidecar file
    pub fn write_checksum(&self, path: &Path) -> ConverterResult<PathBuf> {
        let digest = hash_file(path)?;
        let sidecar = checksum_path(path);
        fs::write(&sidecar, format!("{}\n", digest)).map_err(|source| {
            self.logger.log_file_operation(
                "checksum",
                &sidecar.to_string_lossy(),
                false,
                Some(&source.to_string()),
            );
            FileOperationError::FileWriteFailed {
                path: sidecar.clone(),
                source,
            }
        })?;
        trace!("Checksum {} written for {:?}", digest, path);
        Ok(sidecar)
    }

    /// Recompute the digest of `path` and compare it with its sidecar.
    ///
    /// A mismatch or a missing sidecar yields `Ok(false)`; only failing to
    /// read the content file itself is an error.
    pub fn verify_checksum(&self, path: &Path) -> ConverterResult<bool> {
        let digest = hash_file(path)?;
        let sidecar = checksum_path(path);
        let matched = match fs::read_to_string(&sidecar) {
            Ok(recorded) => recorded.trim() == digest,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("No checksum recorded for {:?}", path);
                false
            }
            Err(source) => {
                return Err(FileOperationError::FileReadFailed {
                    path: sidecar,
                    source,
                }
                .into());
            }
        };
        self.logger.log_checksum(&path.to_string_lossy(), matched);
        Ok(matched)
    }

    /// Leave a marker in the output directory so an aborted run is not
    /// mistaken for a complete one
    pub fn mark_incomplete(&self, reason: &str) -> ConverterResult<PathBuf> {
        let marker = self.output_dir.join(INCOMPLETE_MARKER);
        warn!("Marking {:?} as incomplete: {}", self.output_dir, reason);
        fs::write(&marker, format!("{}\n", reason)).map_err(|source| {
            FileOperationError::FileWriteFailed {
                path: marker.clone(),
                source,
            }
        })?;
        Ok(marker)
    }
}

fn hash_file(path: &Path) -> ConverterResult<String> {
    let bytes = fs::read(path).map_err(|source| FileOperationError::FileReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// Sidecar location for a content file: `.<file name>.blake3` in the same directory
pub fn checksum_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let sidecar = format!(".{}.{}", name, CHECKSUM_EXTENSION);
    match path.parent() {
        Some(parent) => parent.join(sidecar),
        None => PathBuf::from(sidecar),
    }
}

/// `getting-started` -> `Getting Started`
pub fn humanize(stem: &str) -> String {
    stem.split('-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn with_single_trailing_newline(content: &str) -> String {
    let mut text = content.trim_end().to_string();
    text.push('\n');
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_duplicate_titles_get_suffixes() {
        let temp_dir = TempDir::new().unwrap();
        let logger = ConversionLogger::new();
        let assembler = OutputAssembler::new(temp_dir.path(), &logger).unwrap();

        let output = assembler
            .write_sections(vec![("Notes", "# Notes\nfirst"), ("Notes", "# Notes\nsecond")])
            .unwrap();

        assert_eq!(file_names(&output.files), vec!["notes.md", "notes-1.md"]);
        assert_eq!(fs::read_to_string(&output.files[0]).unwrap(), "# Notes\nfirst\n");
        assert_eq!(fs::read_to_string(&output.files[1]).unwrap(), "# Notes\nsecond\n");
    }

    #[test]
    fn test_content_ends_with_exactly_one_newline() {
        let temp_dir = TempDir::new().unwrap();
        let logger = ConversionLogger::new();
        let assembler = OutputAssembler::new(temp_dir.path(), &logger).unwrap();

        let path = assembler.write_file("Trailing", "text\n\n\n").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "text\n");
    }

    #[test]
    fn test_toc_sorted_by_file_name() {
        let temp_dir = TempDir::new().unwrap();
        let logger = ConversionLogger::new();
        let assembler = OutputAssembler::new(temp_dir.path(), &logger).unwrap();

        let output = assembler
            .write_sections(vec![
                ("Zebra Facts", "# Zebra Facts"),
                ("Getting Started", "# Getting Started"),
                ("API", "# API"),
            ])
            .unwrap();

        let toc_path = output.toc.expect("toc for multiple files");
        assert_eq!(toc_path, temp_dir.path().join(TOC_FILE_NAME));
        assert_eq!(
            fs::read_to_string(toc_path).unwrap(),
            "# Table of Contents\n\n\
             - [Api](api.md)\n\
             - [Getting Started](getting-started.md)\n\
             - [Zebra Facts](zebra-facts.md)\n"
        );
        assert_eq!(
            file_names(&output.files),
            vec!["zebra-facts.md", "getting-started.md", "api.md"]
        );
    }

    #[test]
    fn test_single_file_has_no_toc() {
        let temp_dir = TempDir::new().unwrap();
        let logger = ConversionLogger::new();
        let assembler = OutputAssembler::new(temp_dir.path(), &logger).unwrap();

        let output = assembler.write_sections(vec![("Only", "# Only")]).unwrap();
        assert!(output.toc.is_none());
        assert!(!temp_dir.path().join(TOC_FILE_NAME).exists());
    }

    #[test]
    fn test_checksum_round_trip_and_mutation() {
        let temp_dir = TempDir::new().unwrap();
        let logger = ConversionLogger::new();
        let assembler = OutputAssembler::new(temp_dir.path(), &logger).unwrap();

        let path = assembler.write_file("Data", "# Data\nvalue").unwrap();
        assert!(checksum_path(&path).exists());
        assert!(assembler.verify_checksum(&path).unwrap());

        fs::write(&path, "# Data\nchanged\n").unwrap();
        assert!(!assembler.verify_checksum(&path).unwrap());
        assert_eq!(logger.get_stats().warnings_count, 1);

        assembler.write_checksum(&path).unwrap();
        assert!(assembler.verify_checksum(&path).unwrap());
    }

    #[test]
    fn test_missing_sidecar_is_a_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let logger = ConversionLogger::new();
        let assembler = OutputAssembler::new(temp_dir.path(), &logger).unwrap();

        let path = temp_dir.path().join("manual.md");
        fs::write(&path, "hand written\n").unwrap();
        assert!(!assembler.verify_checksum(&path).unwrap());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let logger = ConversionLogger::new();
        let assembler = OutputAssembler::new(temp_dir.path(), &logger).unwrap();

        assert!(assembler.verify_checksum(&temp_dir.path().join("absent.md")).is_err());
    }

    #[test]
    fn test_checksum_path() {
        assert_eq!(
            checksum_path(Path::new("out/notes.md")),
            Path::new("out").join(".notes.md.blake3")
        );
    }

    #[test]
    fn test_humanize() {
        assert_eq!(humanize("getting-started"), "Getting Started");
        assert_eq!(humanize("api"), "Api");
        assert_eq!(humanize("notes-1"), "Notes 1");
        assert_eq!(humanize("snake_case"), "Snake_case");
        assert_eq!(humanize("über-uns"), "Über Uns");
    }

    #[test]
    fn test_creates_missing_output_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("docs").join("2024-01-01");
        let logger = ConversionLogger::new();
        let assembler = OutputAssembler::new(&nested, &logger).unwrap();
        assert!(nested.is_dir());
        assert_eq!(assembler.output_dir(), nested.as_path());
    }

    #[test]
    fn test_mark_incomplete() {
        let temp_dir = TempDir::new().unwrap();
        let logger = ConversionLogger::new();
        let assembler = OutputAssembler::new(temp_dir.path(), &logger).unwrap();

        let marker = assembler.mark_incomplete("write failed").unwrap();
        assert_eq!(marker, temp_dir.path().join(INCOMPLETE_MARKER));
        assert_eq!(fs::read_to_string(marker).unwrap(), "write failed\n");
    }
}
