// Application layer - Producers, pure transforms and orchestration
pub mod frame_demuxer;
pub mod instrument_state;
pub mod orchestrator;
pub mod ranging_stream;
pub mod telemetry_link;
pub mod telemetry_transport;
pub mod video_ingest;
pub mod worker;
