#![recursion_limit = "256"]

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use url2md::converter::html_fetcher::SpiderFetcher;
use url2md::{ConverterConfig, PageConverter};

#[derive(Parser)]
#[command(name = "url2md")]
#[command(about = "Convert web pages into per-section Markdown files", long_about = None)]
struct Args {
    /// Pages to convert
    #[arg(value_name = "URL", required = true)]
    urls: Vec<String>,

    /// Output root directory (overrides output_directory)
    #[arg(long, short = 'o', value_name = "DIR")]
    output: Option<PathBuf>,

    /// YAML configuration file
    #[arg(long, short = 'c', value_name = "FILE", default_value = "url2md.yaml")]
    config: String,

    /// Debug logging
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Fetch timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Pause after page load in seconds
    #[arg(long, value_name = "SECONDS")]
    wait: Option<u64>,
}

fn load_config(args: &Args) -> Result<ConverterConfig, String> {
    let mut config = if Path::new(&args.config).exists() {
        ConverterConfig::load_from_yaml(&args.config).map_err(|e| e.to_string())?
    } else {
        ConverterConfig::default()
    };

    if let Some(output) = &args.output {
        config.output_directory = output.to_string_lossy().into_owned();
    }
    if let Some(timeout) = args.timeout {
        config.timeout_seconds = timeout;
    }
    if let Some(wait) = args.wait {
        config.wait_seconds = wait;
    }
    if args.verbose {
        config.logging.level = "debug".to_string();
    }

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::from(2);
        }
    };
    if let Err(e) = config.init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let fetcher = SpiderFetcher::from_config(&config);
    let converter = PageConverter::new(config, fetcher);
    let results = converter.convert_batch(&args.urls).await;

    let mut failures = 0;
    for (url, result) in &results {
        match result {
            Ok(report) => println!(
                "✓ {} -> {} file(s) in {}",
                url,
                report.files.len(),
                report.output_dir.display()
            ),
            Err(e) => {
                failures += 1;
                eprintln!("✗ {}: {}", url, e);
            }
        }
    }
    converter.logger().log_final_summary();

    if failures > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
