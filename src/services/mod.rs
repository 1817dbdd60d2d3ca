pub mod ingest;
pub mod pipeline;
pub mod registry;
pub mod transcoder;
