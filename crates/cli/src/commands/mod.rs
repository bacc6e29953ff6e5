pub mod ask;
pub mod collections;
pub mod ingest;
pub mod onboard;
pub mod serve;
pub mod sessions;
