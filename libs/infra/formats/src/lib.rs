//! External-format parsers needed by the core's own build and index
//! tooling: CDB64, the SQL loader-file splitter, and the ETF
//! sync-buckets blob.

pub mod cdb64;
pub mod etf;
pub mod sql_loader;
