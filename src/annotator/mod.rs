pub mod audit;
pub mod category;
pub mod change_detector;
pub mod chunk_reader;
pub mod cleaner;
pub mod config;
pub mod orchestrator;
pub mod paths;
pub mod persist;
pub mod prompt;
pub mod provider;
pub mod resume;
pub mod rotor;
pub mod segment;
pub mod tag_parser;
pub mod util;
pub mod warn;
