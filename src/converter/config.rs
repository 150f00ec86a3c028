use crate::converter::errors::{ConfigurationError, ConverterResult};
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure for the converter.
/// Every section has defaults, so a partial YAML file is valid.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ConverterConfig {
    /// Root directory for conversion output
    pub output_directory: String,
    /// Fetch timeout in seconds
    pub timeout_seconds: u64,
    /// Pause after each page load, in seconds
    pub wait_seconds: u64,
    /// User agent string for requests
    pub user_agent: String,
    pub logging: LoggingConfig,
    pub content: ContentConfig,
    pub js_render: JsRenderConfig,
    pub tables: TableConfig,
    pub output: OutputConfig,
    /// Run the Markdown formatter over the output directory after conversion
    pub format_markdown: bool,
    pub formatting: FormattingConfig,
}

/// Configuration for logging behavior
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

/// Content filtering applied before sections are split
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ContentConfig {
    /// CSS selectors whose matching nodes are dropped
    pub remove_selectors: Vec<String>,
}

/// Options handed to the page fetcher
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct JsRenderConfig {
    pub render_js: bool,
    pub scroll: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TableStyle {
    /// Pipe table unless a cell embeds a list, then bullets
    #[default]
    Auto,
    Pipe,
    Bullets,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct TableConfig {
    pub style: TableStyle,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct OutputConfig {
    pub structure: StructureConfig,
}

/// Selects between the date layout and the domain layout
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct StructureConfig {
    pub domain_folders: bool,
    pub domain_options: DomainOptions,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct DomainOptions {
    pub include_subdomains: bool,
    pub fallback_folder: String,
}

/// Paragraph wrapping mode for the formatter
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(untagged)]
pub enum WrapMode {
    Width(usize),
    Keyword(WrapKeyword),
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WrapKeyword {
    /// Leave line breaks as they are
    Keep,
    /// Join each paragraph onto one line
    No,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EndOfLine {
    Lf,
    Crlf,
    Keep,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CodeStyle {
    Consistent,
    Keep,
}

/// Options for the Markdown formatter
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct FormattingConfig {
    pub wrap: WrapMode,
    pub end_of_line: EndOfLine,
    pub code_style: CodeStyle,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            output_directory: "docs".to_string(),
            timeout_seconds: 30,
            wait_seconds: 0,
            user_agent: "url2md/0.1".to_string(),
            logging: LoggingConfig::default(),
            content: ContentConfig::default(),
            js_render: JsRenderConfig::default(),
            tables: TableConfig::default(),
            output: OutputConfig::default(),
            format_markdown: false,
            formatting: FormattingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for JsRenderConfig {
    fn default() -> Self {
        Self {
            render_js: true,
            scroll: false,
        }
    }
}

impl Default for DomainOptions {
    fn default() -> Self {
        Self {
            include_subdomains: true,
            fallback_folder: "unknown_domain".to_string(),
        }
    }
}

impl Default for FormattingConfig {
    fn default() -> Self {
        Self {
            wrap: WrapMode::Keyword(WrapKeyword::Keep),
            end_of_line: EndOfLine::Lf,
            code_style: CodeStyle::Consistent,
        }
    }
}

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl ConverterConfig {
    /// Load configuration from a YAML file
    pub fn load_from_yaml(file_path: &str) -> ConverterResult<Self> {
        let config_content = std::fs::read_to_string(file_path)
            .map_err(|_| ConfigurationError::FileNotFound(file_path.to_string()))?;
        let config: ConverterConfig = serde_yaml::from_str(&config_content)?;
        Ok(config)
    }

    /// Load configuration with fallback to default if the file is missing or invalid
    pub fn load_or_default(file_path: &str) -> Self {
        match Self::load_from_yaml(file_path) {
            Ok(config) => {
                log::info!("Loaded configuration from {}", file_path);
                config
            }
            Err(e) => {
                log::warn!(
                    "Failed to load configuration from {}: {}. Using default configuration.",
                    file_path,
                    e
                );
                Self::default()
            }
        }
    }

    /// Save configuration to a YAML file
    pub fn save_to_yaml(&self, file_path: &str) -> ConverterResult<()> {
        let yaml_content = serde_yaml::to_string(self)?;

        if let Some(parent) = PathBuf::from(file_path).parent() {
            std::fs::create_dir_all(parent).map_err(|source| {
                crate::converter::errors::FileOperationError::DirectoryCreationFailed {
                    path: parent.to_path_buf(),
                    source,
                }
            })?;
        }

        std::fs::write(file_path, yaml_content).map_err(|source| {
            crate::converter::errors::FileOperationError::FileWriteFailed {
                path: PathBuf::from(file_path),
                source,
            }
        })?;
        Ok(())
    }

    pub fn get_output_path(&self) -> PathBuf {
        PathBuf::from(&self.output_directory)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.output_directory.trim().is_empty() {
            return Err(ConfigurationError::ValidationFailed(
                "Output directory cannot be empty".to_string(),
            ));
        }

        if self.timeout_seconds == 0 {
            return Err(ConfigurationError::ValidationFailed(
                "Timeout must be greater than 0 seconds".to_string(),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigurationError::InvalidLogLevel(format!(
                "'{}' (expected one of {:?})",
                self.logging.level, VALID_LOG_LEVELS
            )));
        }

        for selector in &self.content.remove_selectors {
            if Selector::parse(selector).is_err() {
                return Err(ConfigurationError::ValidationFailed(format!(
                    "Invalid CSS selector in content.remove_selectors: '{}'",
                    selector
                )));
            }
        }

        if self.output.structure.domain_options.fallback_folder.trim().is_empty() {
            return Err(ConfigurationError::ValidationFailed(
                "Domain fallback folder cannot be empty".to_string(),
            ));
        }

        if self.formatting.wrap == WrapMode::Width(0) {
            return Err(ConfigurationError::ValidationFailed(
                "Wrap width must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self) -> Result<(), ConfigurationError> {
        use log::LevelFilter;

        let log_level = match self.logging.level.as_str() {
            "trace" => LevelFilter::Trace,
            "debug" => LevelFilter::Debug,
            "info" => LevelFilter::Info,
            "warn" => LevelFilter::Warn,
            "error" => LevelFilter::Error,
            other => return Err(ConfigurationError::InvalidLogLevel(other.to_string())),
        };

        env_logger::Builder::from_default_env()
            .filter_level(log_level)
            .try_init()
            .map_err(|e| ConfigurationError::ValidationFailed(e.to_string()))
    }
}
