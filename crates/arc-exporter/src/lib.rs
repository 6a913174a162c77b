//! Exporter that converts OTLP telemetry into Arc's columnar write format.
//!
//! Arc is a columnar time-series store whose write API accepts one
//! measurement (table) at a time: a msgpack-encoded `{m, columns}` document,
//! gzip-compressed, POSTed to `/api/v1/write/msgpack`. This crate takes OTLP
//! export requests (traces, metrics, logs), flattens the
//! resource → scope → record hierarchy into rows, transposes the rows into
//! column arrays, and ships the encoded payload.
//!
//! The pipeline is stateless: every push builds its batches from scratch and
//! retains nothing afterwards, so concurrent pushes need no coordination.
//!
//! ```text
//!   OTLP request
//!        │
//!        v
//!   ┌───────────────┐
//!   │ Signal encoder │  (rows: fixed fields + merged attributes)
//!   └──────┬────────┘
//!          v
//!   ┌───────────────┐
//!   │ BatchBuilder   │  (column discovery + transposition)
//!   └──────┬────────┘
//!          v
//!   ┌───────────────┐
//!   │ msgpack + gzip │
//!   └──────┬────────┘
//!          v
//!   ┌───────────────┐
//!   │  HTTP write    │
//!   └───────────────┘
//! ```

pub mod attributes;
pub mod columnar;
pub mod config;
pub mod error;
pub mod flusher;
pub mod logs;
pub mod metrics;
pub mod payload;
pub mod traces;
mod util;

pub use config::Config;
pub use error::{ExportError, Signal, TransportError};
pub use logs::LogsExporter;
pub use metrics::MetricsExporter;
pub use traces::TracesExporter;
