pub mod cli;
pub mod db;
pub mod discover;
pub mod error;
pub mod index;
pub mod ingest;
pub mod model;
pub mod parsers;
pub mod pipeline;
pub mod resolve;
