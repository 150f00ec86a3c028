use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Structured logging for one conversion session.
///
/// Constructed by the caller and handed to the pipeline; nothing here touches
/// process-wide state beyond the `log` facade itself. Counters sit behind a
/// mutex so concurrent URL conversions can share one logger.
pub struct ConversionLogger {
    start_time: Instant,
    stats: Mutex<LoggingStats>,
}

/// Statistics for logging operations
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoggingStats {
    pub total_operations: usize,
    pub successful_operations: usize,
    pub failed_operations: usize,
    pub warnings_count: usize,
    pub errors_count: usize,
}

/// Log levels for structured entries
#[derive(Debug, Clone, Copy)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Context information for structured logging
#[derive(Debug, Clone)]
pub struct LogContext {
    pub operation: String,
    pub url: Option<String>,
    pub file_path: Option<String>,
    pub additional_data: BTreeMap<String, String>,
}

impl LogContext {
    fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            url: None,
            file_path: None,
            additional_data: BTreeMap::new(),
        }
    }

    fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    fn with_file(mut self, path: &str) -> Self {
        self.file_path = Some(path.to_string());
        self
    }

    fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.additional_data.insert(key.to_string(), value.to_string());
        self
    }
}

/// A timed operation started with [`ConversionLogger::start_operation`].
#[must_use = "finish the operation to record its outcome"]
pub struct OperationSpan<'a> {
    logger: &'a ConversionLogger,
    name: String,
    started: Instant,
}

impl OperationSpan<'_> {
    /// Record the outcome and duration of the operation
    pub fn finish(self, success: bool) -> Duration {
        let duration = self.started.elapsed();
        let status = if success { "SUCCESS" } else { "FAILED" };
        info!("{} operation '{}' completed in {:?}", status, self.name, duration);

        let mut stats = self.logger.stats.lock();
        stats.total_operations += 1;
        if success {
            stats.successful_operations += 1;
        } else {
            stats.failed_operations += 1;
        }
        duration
    }
}

impl ConversionLogger {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            stats: Mutex::new(LoggingStats::default()),
        }
    }

    /// Start timing an operation
    pub fn start_operation(&self, operation_name: &str) -> OperationSpan<'_> {
        info!("Starting operation: {}", operation_name);
        OperationSpan {
            logger: self,
            name: operation_name.to_string(),
            started: Instant::now(),
        }
    }

    /// Log a page fetch
    pub fn log_fetch(&self, url: &str, bytes: usize, success: bool, details: Option<&str>) {
        let mut context = LogContext::new("fetch")
            .with_url(url)
            .with("bytes", bytes)
            .with("success", success);
        if let Some(detail) = details {
            context = context.with("details", detail);
        }

        if success {
            info!("Fetched {} ({} bytes)", url, bytes);
            self.log_structured(LogLevel::Info, "Fetch completed", &context);
        } else {
            warn!("Fetch failed: {} - {}", url, details.unwrap_or("no details"));
            self.stats.lock().warnings_count += 1;
            self.log_structured(LogLevel::Warn, "Fetch failed", &context);
        }
    }

    /// Log conversion of one section to Markdown
    pub fn log_section_conversion(&self, title: &str, input_nodes: usize, output_size: usize) {
        let context = LogContext::new("section_conversion")
            .with("title", title)
            .with("input_nodes", input_nodes)
            .with("output_bytes", output_size);
        debug!(
            "Converted section '{}' ({} nodes -> {} bytes)",
            title, input_nodes, output_size
        );
        self.log_structured(LogLevel::Trace, "Section converted", &context);
    }

    /// Log an element that fell back to pass-through conversion
    pub fn log_element_fallback(&self, tag: &str, reason: &str) {
        warn!("Element <{}> fell back to pass-through: {}", tag, reason);
        self.stats.lock().warnings_count += 1;
    }

    /// Log file operation activity
    pub fn log_file_operation(
        &self,
        operation: &str,
        file_path: &str,
        success: bool,
        error_msg: Option<&str>,
    ) {
        let mut context = LogContext::new(format!("file_{}", operation))
            .with_file(file_path)
            .with("success", success);
        if let Some(error) = error_msg {
            context = context.with("error_message", error);
        }

        if success {
            info!("File {}: {}", operation, file_path);
            self.log_structured(LogLevel::Debug, &format!("File {} completed", operation), &context);
        } else {
            error!(
                "File {} failed: {} - {}",
                operation,
                file_path,
                error_msg.unwrap_or("Unknown error")
            );
            self.stats.lock().errors_count += 1;
            self.log_structured(LogLevel::Error, &format!("File {} failed", operation), &context);
        }
    }

    /// Log a checksum verification outcome. A mismatch is a warning, not an error.
    pub fn log_checksum(&self, file_path: &str, matched: bool) {
        if matched {
            debug!("Checksum verified: {}", file_path);
        } else {
            warn!("Checksum mismatch: {}", file_path);
            self.stats.lock().warnings_count += 1;
        }
    }

    /// Log the failure of one URL in a batch
    pub fn log_url_failure(&self, url: &str, error: &crate::converter::errors::ConverterError) {
        error!("Conversion of {} failed: {}", url, error);
        self.stats.lock().errors_count += 1;
    }

    /// Snapshot of the current logging statistics
    pub fn get_stats(&self) -> LoggingStats {
        self.stats.lock().clone()
    }

    /// Total elapsed time since logger creation
    pub fn get_total_elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn log_final_summary(&self) {
        let stats = self.get_stats();
        info!("Conversion session completed in {:?}", self.get_total_elapsed());
        info!("   Total operations: {}", stats.total_operations);
        info!("   Successful: {}", stats.successful_operations);
        info!("   Failed: {}", stats.failed_operations);
        info!("   Warnings: {}", stats.warnings_count);
        info!("   Errors: {}", stats.errors_count);

        let success_rate = if stats.total_operations > 0 {
            (stats.successful_operations as f64 / stats.total_operations as f64) * 100.0
        } else {
            0.0
        };
        info!("   Success rate: {:.1}%", success_rate);
    }

    fn log_structured(&self, level: LogLevel, message: &str, context: &LogContext) {
        let log_entry = format!(
            "[{}] {} | URL: {} | File: {} | Data: {:?}",
            context.operation,
            message,
            context.url.as_deref().unwrap_or("N/A"),
            context.file_path.as_deref().unwrap_or("N/A"),
            context.additional_data
        );

        match level {
            LogLevel::Trace => trace!("{}", log_entry),
            LogLevel::Debug => debug!("{}", log_entry),
            LogLevel::Info => info!("{}", log_entry),
            LogLevel::Warn => warn!("{}", log_entry),
            LogLevel::Error => error!("{}", log_entry),
        }
    }
}

impl Default for ConversionLogger {
    fn default() -> Self {
        Self::new()
    }
}
