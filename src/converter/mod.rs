// Page to Markdown conversion: splitting, element rules, output assembly
pub mod config;
pub mod dom;
pub mod domain_path;
pub mod elements;
pub mod errors;
pub mod filename;
pub mod formatter;
pub mod html_fetcher;
pub mod logging;
pub mod markdown_normalizer;
pub mod markdown_splitter;
pub mod output;
pub mod pipeline;
pub mod section_splitter;
pub mod tables;
