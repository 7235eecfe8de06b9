//! # Citation Anchor Main Driver
//!
//! ## Purpose
//! Command-line entry point for the citation matching engine. Reads one raw
//! model response, the retrieval reference list, and the per-file sentence
//! indexes from JSON files, runs the pipeline, and prints the enhanced answer
//! as JSON on stdout. Useful for batch evaluation of citation quality and for
//! debugging matching behavior outside the chat service.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration file, response/reference/index JSON files
//! - **Output**: Enhanced answer JSON on stdout
//! - **Exit codes**: Non-zero only for I/O, config, or structurally corrupt
//!   inputs; data-quality degradation is reported inside the output

use clap::{Arg, Command};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use citation_anchor::{
    config::Config,
    errors::{CitationError, Result},
    CitationPipeline, RetrievalReference, SentenceIndexSet,
};

fn main() -> Result<()> {
    let matches = Command::new("citation-anchor")
        .version("0.1.0")
        .author("Course Assistant Team")
        .about("Sentence-level citation matching and bbox anchoring for RAG chat answers")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("response")
                .short('r')
                .long("response")
                .value_name("FILE")
                .help("File containing the raw model response text")
                .required(true),
        )
        .arg(
            Arg::new("references")
                .long("references")
                .value_name("FILE")
                .help("JSON array of retrieval references")
                .required(true),
        )
        .arg(
            Arg::new("indexes")
                .long("indexes")
                .value_name("FILE")
                .help("JSON object mapping file_uuid to sentence-mapping documents"),
        )
        .arg(
            Arg::new("threshold")
                .long("threshold")
                .value_name("RATIO")
                .help("Override the similarity threshold")
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new("pretty")
                .long("pretty")
                .help("Pretty-print the output JSON")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").expect("has default");
    let mut config = Config::from_file(config_path)?;

    if let Some(threshold) = matches.get_one::<f64>("threshold") {
        config.matching.similarity_threshold = *threshold;
        config.validate()?;
    }

    init_logging(&config)?;
    info!("Configuration loaded from: {}", config_path);

    let raw_response =
        std::fs::read_to_string(matches.get_one::<String>("response").expect("required"))?;

    let references_path = matches.get_one::<String>("references").expect("required");
    let references: Vec<RetrievalReference> =
        serde_json::from_str(&std::fs::read_to_string(references_path)?)?;

    let indexes = match matches.get_one::<String>("indexes") {
        Some(path) => {
            let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
            SentenceIndexSet::from_json_map(&value)?
        }
        None => SentenceIndexSet::new(),
    };

    info!(
        "Matching {} references against {} sentence indexes",
        references.len(),
        indexes.len()
    );

    let pipeline = CitationPipeline::from_config(&config)?;
    let enhanced = pipeline.run(&raw_response, &references, &indexes);

    info!(
        mode = ?enhanced.mode,
        diagnostics = enhanced.diagnostics.len(),
        "citation matching finished"
    );

    let output = if matches.get_flag("pretty") {
        serde_json::to_string_pretty(&enhanced)?
    } else {
        serde_json::to_string(&enhanced)?
    };
    println!("{}", output);

    Ok(())
}

/// Initialize logging and tracing
fn init_logging(config: &Config) -> Result<()> {
    let log_level: tracing::Level =
        config
            .logging
            .level
            .parse()
            .map_err(|_| CitationError::Config {
                message: format!("Invalid log level: {}", config.logging.level),
            })?;

    let filter = tracing_subscriber::filter::LevelFilter::from_level(log_level);
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr);

    if config.logging.json_format {
        tracing_subscriber::registry()
            .with(fmt_layer.json().with_filter(filter))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt_layer.with_filter(filter))
            .init();
    }

    Ok(())
}
