pub mod converter;

pub use converter::config::ConverterConfig;
pub use converter::errors::{ConverterError, ConverterResult};
pub use converter::pipeline::{ConversionReport, PageConverter};
