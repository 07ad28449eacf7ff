pub mod ingest;
pub mod table;

pub use ingest::EventIngestor;
pub use table::AggregationTable;
