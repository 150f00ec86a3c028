use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

use url2md::converter::config::{ConverterConfig, TableStyle};
use url2md::converter::dom::parse_document;
use url2md::converter::elements::MarkdownConverter;
use url2md::converter::errors::{ConverterError, ConverterResult, FetchError, InputError};
use url2md::converter::html_fetcher::PageFetcher;
use url2md::converter::logging::ConversionLogger;
use url2md::converter::markdown_splitter::split_flat_markdown;
use url2md::converter::output::{checksum_path, OutputAssembler, TOC_FILE_NAME};
use url2md::PageConverter;

/// Serves canned HTML instead of touching the network
struct StaticFetcher {
    pages: HashMap<String, String>,
}

impl StaticFetcher {
    fn with_page(url: &str, html: &str) -> Self {
        let mut pages = HashMap::new();
        pages.insert(url.to_string(), html.to_string());
        Self { pages }
    }
}

impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration, _wait: Duration) -> ConverterResult<String> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::RequestFailed(url.to_string()).into())
    }
}

const DOCS_PAGE: &str = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <title>Docs</title>
    <script>console.log('test');</script>
</head>
<body>
    <nav class="menu">Home | About</nav>
    <h1>Notes</h1>
    <p>First <em>note</em>.</p>
    <img alt="Test" src="test.jpg" title="Test Image">
    <h1>API Reference</h1>
    <pre><code class="language-bash">curl https://api.example.com</code></pre>
    <table>
        <thead><tr><th>Field</th><th>Required</th></tr></thead>
        <tbody><tr><td><code>id</code></td><td>yes</td></tr></tbody>
    </table>
    <h1>Notes</h1>
    <p>Second note.</p>
</body>
</html>
"#;

fn docs_config(root: &Path) -> ConverterConfig {
    let mut config = ConverterConfig::default();
    config.output_directory = root.to_string_lossy().into_owned();
    config.content.remove_selectors = vec![".menu".to_string()];
    config.output.structure.domain_folders = true;
    config
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

/// Integration test for the complete fetch -> split -> convert -> write pipeline
#[tokio::test]
async fn test_complete_pipeline() {
    let _ = env_logger::try_init();
    let temp_dir = TempDir::new().unwrap();
    let url = "https://docs.example.com/guide";
    let converter = PageConverter::new(
        docs_config(temp_dir.path()),
        StaticFetcher::with_page(url, DOCS_PAGE),
    );

    let report = converter.convert_url(url).await.expect("conversion should succeed");

    let expected_dir = temp_dir.path().join("docs").join("example.com");
    assert_eq!(report.output_dir, expected_dir);

    let names: Vec<String> = report.files.iter().map(|p| file_name(p)).collect();
    assert_eq!(names, vec!["notes.md", "api-reference.md", "notes-1.md"]);
    assert!(!expected_dir.join("index.md").exists(), "removed nav must not form a section");

    assert_eq!(
        fs::read_to_string(expected_dir.join("notes.md")).unwrap(),
        "# Notes\n\nFirst *note*.\n\n![Test](test.jpg \"Test Image\")\n"
    );
    assert_eq!(
        fs::read_to_string(expected_dir.join("api-reference.md")).unwrap(),
        "# API Reference\n\n\
         ```bash\ncurl https://api.example.com\n```\n\n\
         | Field | Required |\n| ---: | :---: |\n| `id` | yes |\n"
    );
    assert_eq!(
        fs::read_to_string(expected_dir.join("notes-1.md")).unwrap(),
        "# Notes\n\nSecond note.\n"
    );

    println!("✅ Complete pipeline test passed");
}

/// The table of contents is sorted by file name and links every section file
#[tokio::test]
async fn test_table_of_contents() {
    let temp_dir = TempDir::new().unwrap();
    let url = "https://docs.example.com/guide";
    let converter = PageConverter::new(
        docs_config(temp_dir.path()),
        StaticFetcher::with_page(url, DOCS_PAGE),
    );

    let report = converter.convert_url(url).await.unwrap();
    let toc_path = report.toc.expect("several files produce a table of contents");
    assert_eq!(file_name(&toc_path), TOC_FILE_NAME);
    assert_eq!(
        fs::read_to_string(toc_path).unwrap(),
        "# Table of Contents\n\n\
         - [Api Reference](api-reference.md)\n\
         - [Notes 1](notes-1.md)\n\
         - [Notes](notes.md)\n"
    );
}

/// Every written file carries a checksum that detects later edits
#[tokio::test]
async fn test_checksums_detect_modification() {
    let temp_dir = TempDir::new().unwrap();
    let url = "https://docs.example.com/guide";
    let converter = PageConverter::new(
        docs_config(temp_dir.path()),
        StaticFetcher::with_page(url, DOCS_PAGE),
    );
    let report = converter.convert_url(url).await.unwrap();

    let logger = ConversionLogger::new();
    let assembler = OutputAssembler::new(&report.output_dir, &logger).unwrap();
    for file in &report.files {
        assert!(checksum_path(file).exists());
        assert!(assembler.verify_checksum(file).unwrap(), "fresh file {:?} must verify", file);
    }

    let tampered = &report.files[0];
    let mut content = fs::read_to_string(tampered).unwrap();
    content.push_str("edited\n");
    fs::write(tampered, content).unwrap();
    assert!(!assembler.verify_checksum(tampered).unwrap());
    assert!(assembler.verify_checksum(&report.files[1]).unwrap());
}

/// Fetch failures surface unchanged and leave nothing on disk
#[tokio::test]
async fn test_fetch_failure_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let converter = PageConverter::new(
        docs_config(temp_dir.path()),
        StaticFetcher::with_page("https://docs.example.com/guide", DOCS_PAGE),
    );

    let result = converter.convert_url("https://other.example.org/").await;
    assert!(matches!(result, Err(ConverterError::Fetch(FetchError::RequestFailed(_)))));
    assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

/// A page without top-level headings becomes a single index file, no TOC
#[test]
fn test_page_without_headings() {
    let temp_dir = TempDir::new().unwrap();
    let converter = PageConverter::new(
        docs_config(temp_dir.path()),
        StaticFetcher::with_page("unused", ""),
    );

    let report = converter
        .segment_and_convert("<p>Just one paragraph.</p>", temp_dir.path())
        .unwrap();
    assert_eq!(report.files.len(), 1);
    assert_eq!(file_name(&report.files[0]), "index.md");
    assert!(report.toc.is_none());
    assert_eq!(
        fs::read_to_string(&report.files[0]).unwrap(),
        "Just one paragraph.\n"
    );
}

/// Image element scenario
#[test]
fn test_image_conversion() {
    let body = parse_document(r#"<img alt="Test" src="test.jpg" title="Test Image">"#).into_body();
    let img = body.find_descendant("img").unwrap();
    let conversion = MarkdownConverter::new().convert(img);
    assert_eq!(conversion.markdown, r#"![Test](test.jpg "Test Image")"#);
    assert!(conversion.fallbacks.is_empty());
}

/// Flat Markdown re-splitting scenario
#[test]
fn test_secondary_split() {
    let sections = split_flat_markdown("# First\nA\n\n# Second\nB").unwrap();
    let pairs: Vec<(&str, &str)> = sections
        .iter()
        .map(|s| (s.file_name.as_str(), s.content.as_str()))
        .collect();
    assert_eq!(pairs, vec![("first.md", "# First\nA"), ("second.md", "# Second\nB")]);

    assert!(matches!(
        split_flat_markdown("  \n "),
        Err(ConverterError::Input(InputError::EmptyContent))
    ));
    assert!(matches!(
        split_flat_markdown("no headings here"),
        Err(ConverterError::Input(InputError::NoSections))
    ));
}

/// Tables whose cells carry lists render as labelled bullets
#[test]
fn test_list_tables_render_as_bullets() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = docs_config(temp_dir.path());
    config.tables.style = TableStyle::Auto;
    let converter = PageConverter::new(config, StaticFetcher::with_page("unused", ""));

    let html = "<h1>Options</h1><table>\
        <tr><th>Name</th><th>Values</th></tr>\
        <tr><td>mode</td><td><ul><li>fast</li><li>safe</li></ul></td></tr>\
        </table>";
    let report = converter.segment_and_convert(html, temp_dir.path()).unwrap();
    let content = fs::read_to_string(&report.files[0]).unwrap();
    assert!(content.contains("- **Name**: mode"));
    assert!(content.contains("- **Values**:"));
    assert!(content.contains("  - fast"));
    assert!(!content.contains("| Name |"));
}

/// Configuration survives a YAML round trip and partial files use defaults
#[test]
fn test_configuration_yaml() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config").join("url2md.yaml");
    let path_str = path.to_string_lossy().into_owned();

    let mut config = ConverterConfig::default();
    config.timeout_seconds = 5;
    config.tables.style = TableStyle::Bullets;
    config.save_to_yaml(&path_str).unwrap();

    let loaded = ConverterConfig::load_from_yaml(&path_str).unwrap();
    assert_eq!(loaded, config);
    assert!(loaded.validate().is_ok());

    fs::write(&path, "wait_seconds: 3\n").unwrap();
    let partial = ConverterConfig::load_from_yaml(&path_str).unwrap();
    assert_eq!(partial.wait_seconds, 3);
    assert_eq!(partial.timeout_seconds, ConverterConfig::default().timeout_seconds);
}
