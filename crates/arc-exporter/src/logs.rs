//! Log export: log records to the configured logs measurement.
//!
//! One row per record. String bodies pass through verbatim; any other body
//! kind is stringified rather than dropped. Resource attributes merge under
//! record attributes into the dynamic column set, `service.name` excluded
//! once promoted to the fixed `service_name` column.

use std::sync::Arc;

use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::common::v1::{any_value, AnyValue};
use opentelemetry_proto::tonic::logs::v1::LogRecord;
use tracing::debug;

use crate::attributes::{any_value_to_attr, attributes_to_map, merge, AttrMap};
use crate::columnar::{BatchBuilder, Row};
use crate::config::Config;
use crate::error::{ExportError, Signal};
use crate::flusher::ArcClient;
use crate::payload;
use crate::util::{hex_id, service_name, unix_millis, SERVICE_NAME_KEY};

pub struct LogsExporter {
    config: Arc<Config>,
    client: ArcClient,
}

impl LogsExporter {
    pub fn new(config: Arc<Config>) -> Self {
        let client = ArcClient::new(&config);
        LogsExporter { config, client }
    }

    /// Converts one OTLP logs export into a columnar batch and ships it.
    pub async fn push_logs(&self, request: ExportLogsServiceRequest) -> Result<(), ExportError> {
        let mut builder =
            BatchBuilder::new(self.config.logs_measurement.clone()).exclude_key(SERVICE_NAME_KEY);

        for resource_logs in &request.resource_logs {
            let resource_attrs = resource_logs
                .resource
                .as_ref()
                .map_or_else(AttrMap::new, |r| attributes_to_map(&r.attributes));
            let service = service_name(&resource_attrs);

            for scope_logs in &resource_logs.scope_logs {
                for record in &scope_logs.log_records {
                    builder.push(log_row(record, &service, &resource_attrs));
                }
            }
        }

        if builder.is_empty() {
            return Ok(());
        }
        let batch = builder.build();
        debug!(records = batch.row_count(), "Flushing log batch");

        let body = payload::encode_compressed(&batch).map_err(|source| ExportError::Encode {
            signal: Signal::Logs,
            source,
        })?;
        self.client
            .write(self.config.database_for(Signal::Logs), body)
            .await
            .map_err(|source| ExportError::Transport {
                signal: Signal::Logs,
                source,
            })
    }
}

fn log_row(record: &LogRecord, service: &str, resource_attrs: &AttrMap) -> Row {
    let attrs = merge(resource_attrs, &attributes_to_map(&record.attributes));

    Row::new()
        .fixed("time", unix_millis(record.time_unix_nano))
        .fixed("severity", record.severity_text.clone())
        .fixed("severity_number", record.severity_number)
        .fixed("body", body_string(record.body.as_ref()))
        .fixed("trace_id", hex_id(&record.trace_id))
        .fixed("span_id", hex_id(&record.span_id))
        .fixed("trace_flags", record.flags)
        .fixed("service_name", service)
        .attributes(attrs)
}

/// String bodies pass through; every other kind gets a readable rendering
/// (scalars via display, structured bodies as JSON). A missing body is the
/// empty string.
fn body_string(body: Option<&AnyValue>) -> String {
    let Some(body) = body else {
        return String::new();
    };
    match &body.value {
        Some(any_value::Value::StringValue(s)) => s.clone(),
        Some(any_value::Value::IntValue(i)) => i.to_string(),
        Some(any_value::Value::DoubleValue(d)) => d.to_string(),
        Some(any_value::Value::BoolValue(b)) => b.to_string(),
        Some(_) => serde_json::to_string(&any_value_to_attr(body)).unwrap_or_default(),
        None => String::new(),
    }
}
