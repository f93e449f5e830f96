// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod http_sources;
pub mod jpeg_decoder;
pub mod mavlink_transport;
pub mod ndjson_stream;
