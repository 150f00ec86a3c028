//! Orchestration: fetch a page, split it, convert each section and write the
//! output set.
//!
//! Fetching is the only suspension point. Everything after the HTML is in hand
//! runs synchronously in [`PageConverter::segment_and_convert`].

use crate::converter::config::ConverterConfig;
use crate::converter::dom::parse_document_with;
use crate::converter::domain_path::build_domain_path;
use crate::converter::elements::MarkdownConverter;
use crate::converter::errors::{ConverterResult, ElementError, FileOperationError, InputError};
use crate::converter::formatter::MarkdownFormatter;
use crate::converter::html_fetcher::PageFetcher;
use crate::converter::logging::ConversionLogger;
use crate::converter::markdown_normalizer;
use crate::converter::markdown_splitter::{count_top_level_headings, split_flat_markdown};
use crate::converter::output::{checksum_path, OutputAssembler};
use crate::converter::section_splitter;
use chrono::Local;
use futures::future::join_all;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Outcome of one successful conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionReport {
    pub output_dir: PathBuf,
    /// Section files in document order
    pub files: Vec<PathBuf>,
    pub toc: Option<PathBuf>,
    /// Elements that were passed through because their rule failed
    pub fallbacks: usize,
}

pub struct PageConverter<F: PageFetcher> {
    config: ConverterConfig,
    fetcher: F,
    converter: MarkdownConverter,
    logger: Arc<ConversionLogger>,
}

impl<F: PageFetcher> PageConverter<F> {
    pub fn new(config: ConverterConfig, fetcher: F) -> Self {
        Self::with_logger(config, fetcher, Arc::new(ConversionLogger::new()))
    }

    pub fn with_logger(config: ConverterConfig, fetcher: F, logger: Arc<ConversionLogger>) -> Self {
        let converter = MarkdownConverter::new().with_table_style(config.tables.style);
        Self {
            config,
            fetcher,
            converter,
            logger,
        }
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn logger(&self) -> &ConversionLogger {
        &self.logger
    }

    /// Fetch the raw HTML for `url` through the configured fetcher
    pub async fn fetch_raw(&self, url: &str) -> ConverterResult<String> {
        let span = self.logger.start_operation("fetch");
        let timeout = Duration::from_secs(self.config.timeout_seconds);
        let wait = Duration::from_secs(self.config.wait_seconds);

        match self.fetcher.fetch(url, timeout, wait).await {
            Ok(html) => {
                self.logger.log_fetch(url, html.len(), true, None);
                span.finish(true);
                Ok(html)
            }
            Err(e) => {
                self.logger.log_fetch(url, 0, false, Some(&e.to_string()));
                span.finish(false);
                Err(e)
            }
        }
    }

    /// Run directory for `url`: a domain path when domain folders are enabled,
    /// otherwise today's date
    pub fn output_dir_for(&self, url: &str) -> PathBuf {
        let base = self.config.get_output_path();
        let structure = &self.config.output.structure;
        if structure.domain_folders {
            let options = &structure.domain_options;
            base.join(build_domain_path(
                url,
                options.include_subdomains,
                &options.fallback_folder,
            ))
        } else {
            base.join(Local::now().format("%Y-%m-%d").to_string())
        }
    }

    /// Split `html` into sections, convert them and write the output set into
    /// `output_dir`. A failed write leaves an incomplete marker behind.
    pub fn segment_and_convert(&self, html: &str, output_dir: &Path) -> ConverterResult<ConversionReport> {
        let span = self.logger.start_operation("segment_and_convert");
        let (sections, fallbacks) = self.convert_sections(html);

        if sections.is_empty() {
            span.finish(false);
            return Err(InputError::EmptyContent.into());
        }

        match self.write_output(&sections, output_dir) {
            Ok((files, toc)) => {
                span.finish(true);
                Ok(ConversionReport {
                    output_dir: output_dir.to_path_buf(),
                    files,
                    toc,
                    fallbacks,
                })
            }
            Err(e) => {
                span.finish(false);
                if output_dir.is_dir() {
                    if let Err(mark_err) = OutputAssembler::new(output_dir, &self.logger)
                        .and_then(|assembler| assembler.mark_incomplete(&e.to_string()))
                    {
                        warn!("Could not mark {:?} as incomplete: {}", output_dir, mark_err);
                    }
                }
                Err(e)
            }
        }
    }

    /// Fetch, convert and write one URL
    pub async fn convert_url(&self, url: &str) -> ConverterResult<ConversionReport> {
        info!("Converting {}", url);
        let html = self.fetch_raw(url).await?;
        let output_dir = self.output_dir_for(url);
        self.segment_and_convert(&html, &output_dir)
    }

    /// Convert several URLs concurrently. Every URL gets its own result; one
    /// failure does not affect the others.
    pub async fn convert_batch(&self, urls: &[String]) -> Vec<(String, ConverterResult<ConversionReport>)> {
        let conversions = urls.iter().map(|url| async move {
            let result = self.convert_url(url).await;
            if let Err(e) = &result {
                self.logger.log_url_failure(url, e);
            }
            (url.clone(), result)
        });
        join_all(conversions).await
    }

    /// Titled, normalized Markdown for every non-empty section, plus the number
    /// of element fallbacks seen on the way
    fn convert_sections(&self, html: &str) -> (Vec<(String, String)>, usize) {
        let document = parse_document_with(html, &self.config.content.remove_selectors);
        let mut converted = Vec::new();
        let mut fallbacks = 0;

        for section in section_splitter::split(document) {
            let conversion = self.converter.convert(&section.body);
            for ElementError::MalformedElement { tag, reason } in &conversion.fallbacks {
                self.logger.log_element_fallback(tag, reason);
            }
            fallbacks += conversion.fallbacks.len();

            let markdown = markdown_normalizer::normalize(&conversion.markdown);
            self.logger
                .log_section_conversion(&section.title, section.body.node_count(), markdown.len());

            if markdown.is_empty() {
                debug!("Section '{}' converted to nothing, skipping", section.title);
                continue;
            }

            if count_top_level_headings(&markdown) > 1 {
                debug!("Section '{}' still holds several top-level headings, re-splitting", section.title);
                match split_flat_markdown(&markdown) {
                    Ok(parts) => {
                        converted.extend(
                            parts
                                .into_iter()
                                .map(|part| (part.title, markdown_normalizer::normalize(&part.content))),
                        );
                        continue;
                    }
                    Err(e) => warn!("Re-splitting '{}' failed, keeping it whole: {}", section.title, e),
                }
            }
            converted.push((section.title, markdown));
        }

        (converted, fallbacks)
    }

    fn write_output(
        &self,
        sections: &[(String, String)],
        output_dir: &Path,
    ) -> ConverterResult<(Vec<PathBuf>, Option<PathBuf>)> {
        let assembler = OutputAssembler::new(output_dir, &self.logger)?;
        let written = assembler.write_sections(sections.iter().map(|(title, content)| (title, content)))?;
        verify_written(&assembler, &written.files)?;

        if self.config.format_markdown {
            let formatter = MarkdownFormatter::new(self.config.formatting.clone());
            let changed = formatter.format_directory(output_dir)?;
            for file in &changed {
                self.logger
                    .log_file_operation("format", &file.to_string_lossy(), true, None);
                if checksum_path(file).exists() {
                    assembler.write_checksum(file)?;
                }
            }
            debug!("Re-checksummed {} formatted file(s)", changed.len());
        }

        Ok((written.files, written.toc))
    }
}

/// Every freshly written file must match its recorded checksum
fn verify_written(assembler: &OutputAssembler<'_>, files: &[PathBuf]) -> ConverterResult<()> {
    for file in files {
        if !assembler.verify_checksum(file)? {
            return Err(FileOperationError::ChecksumMismatch(file.clone()).into());
        }
    }
    Ok(())
}
