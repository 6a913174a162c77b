//! Trace export: spans to the `distributed_traces` measurement.
//!
//! One row per span. The fixed columns carry the span identity and status;
//! span attributes merged over resource attributes become the dynamic
//! columns, with `service.name` excluded since it is promoted to the fixed
//! `service_name` column.

use std::sync::Arc;

use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::trace::v1::span::SpanKind;
use opentelemetry_proto::tonic::trace::v1::Span;
use tracing::debug;

use crate::attributes::{attributes_to_map, merge, AttrMap};
use crate::columnar::{BatchBuilder, Row};
use crate::config::Config;
use crate::error::{ExportError, Signal};
use crate::flusher::ArcClient;
use crate::payload;
use crate::util::{hex_id, service_name, unix_millis, SERVICE_NAME_KEY};

pub struct TracesExporter {
    config: Arc<Config>,
    client: ArcClient,
}

impl TracesExporter {
    pub fn new(config: Arc<Config>) -> Self {
        let client = ArcClient::new(&config);
        TracesExporter { config, client }
    }

    /// Converts one OTLP trace export into a columnar batch and ships it.
    pub async fn push_traces(
        &self,
        request: ExportTraceServiceRequest,
    ) -> Result<(), ExportError> {
        let mut builder =
            BatchBuilder::new(self.config.traces_measurement.clone()).exclude_key(SERVICE_NAME_KEY);

        for resource_spans in &request.resource_spans {
            let resource_attrs = resource_spans
                .resource
                .as_ref()
                .map_or_else(AttrMap::new, |r| attributes_to_map(&r.attributes));
            let service = service_name(&resource_attrs);

            for scope_spans in &resource_spans.scope_spans {
                for span in &scope_spans.spans {
                    builder.push(span_row(span, &service, &resource_attrs));
                }
            }
        }

        if builder.is_empty() {
            return Ok(());
        }
        let batch = builder.build();
        debug!(spans = batch.row_count(), "Flushing trace batch");

        let body = payload::encode_compressed(&batch).map_err(|source| ExportError::Encode {
            signal: Signal::Traces,
            source,
        })?;
        self.client
            .write(self.config.database_for(Signal::Traces), body)
            .await
            .map_err(|source| ExportError::Transport {
                signal: Signal::Traces,
                source,
            })
    }
}

fn span_row(span: &Span, service: &str, resource_attrs: &AttrMap) -> Row {
    let status = span.status.clone().unwrap_or_default();
    // Negative and zero durations pass through unmodified.
    let duration_ns = span.end_time_unix_nano as i64 - span.start_time_unix_nano as i64;
    let attrs = merge(resource_attrs, &attributes_to_map(&span.attributes));

    Row::new()
        .fixed("time", unix_millis(span.start_time_unix_nano))
        .fixed("trace_id", hex_id(&span.trace_id))
        .fixed("span_id", hex_id(&span.span_id))
        .fixed("parent_span_id", hex_id(&span.parent_span_id))
        .fixed("service_name", service)
        .fixed("operation_name", span.name.clone())
        .fixed("span_kind", span_kind_str(span.kind))
        .fixed("duration_ns", duration_ns)
        .fixed("status_code", status.code)
        .fixed("status_message", status.message)
        .attributes(attrs)
}

fn span_kind_str(kind: i32) -> &'static str {
    match SpanKind::try_from(kind) {
        Ok(SpanKind::Server) => "server",
        Ok(SpanKind::Client) => "client",
        Ok(SpanKind::Producer) => "producer",
        Ok(SpanKind::Consumer) => "consumer",
        Ok(SpanKind::Internal) => "internal",
        Ok(SpanKind::Unspecified) | Err(_) => "unspecified",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttrValue;
    use opentelemetry_proto::tonic::common::v1::{any_value, AnyValue, KeyValue};
    use opentelemetry_proto::tonic::trace::v1::Status;

    fn string_kv(key: &str, value: &str) -> KeyValue {
        KeyValue {
            key: key.to_string(),
            value: Some(AnyValue {
                value: Some(any_value::Value::StringValue(value.to_string())),
            }),
        }
    }

    fn sample_span() -> Span {
        Span {
            trace_id: vec![1; 16],
            span_id: vec![2; 8],
            parent_span_id: vec![0; 8],
            name: "GET /users".to_string(),
            kind: SpanKind::Server as i32,
            start_time_unix_nano: 1_700_000_000_000_000_000,
            end_time_unix_nano: 1_700_000_000_250_000_000,
            attributes: vec![string_kv("http.method", "GET")],
            status: Some(Status {
                message: "ok".to_string(),
                code: 1,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_span_row_fixed_fields() {
        let mut resource = AttrMap::new();
        resource.insert("host".to_string(), AttrValue::from("web-1"));
        let row = span_row(&sample_span(), "api", &resource);

        let mut builder = BatchBuilder::new("distributed_traces");
        builder.push(row);
        let batch = builder.build();

        assert_eq!(
            batch.columns["time"],
            vec![AttrValue::Int(1_700_000_000_000)]
        );
        assert_eq!(
            batch.columns["trace_id"],
            vec![AttrValue::from("01010101010101010101010101010101")]
        );
        assert_eq!(
            batch.columns["span_id"],
            vec![AttrValue::from("0202020202020202")]
        );
        // All-zero parent id means a root span: empty string, not null.
        assert_eq!(batch.columns["parent_span_id"], vec![AttrValue::from("")]);
        assert_eq!(batch.columns["service_name"], vec![AttrValue::from("api")]);
        assert_eq!(
            batch.columns["operation_name"],
            vec![AttrValue::from("GET /users")]
        );
        assert_eq!(batch.columns["span_kind"], vec![AttrValue::from("server")]);
        assert_eq!(
            batch.columns["duration_ns"],
            vec![AttrValue::Int(250_000_000)]
        );
        assert_eq!(batch.columns["status_code"], vec![AttrValue::Int(1)]);
        assert_eq!(batch.columns["status_message"], vec![AttrValue::from("ok")]);
        // Merged attributes become dynamic columns.
        assert_eq!(
            batch.columns["http.method"],
            vec![AttrValue::from("GET")]
        );
        assert_eq!(batch.columns["host"], vec![AttrValue::from("web-1")]);
    }

    #[test]
    fn test_span_attributes_override_resource() {
        let mut resource = AttrMap::new();
        resource.insert("env".to_string(), AttrValue::from("resource-env"));
        let mut span = sample_span();
        span.attributes = vec![string_kv("env", "span-env")];
        let row = span_row(&span, "", &resource);
        assert_eq!(row.attribute("env"), Some(&AttrValue::from("span-env")));
    }

    #[test]
    fn test_negative_duration_passes_through() {
        let mut span = sample_span();
        span.start_time_unix_nano = 2_000;
        span.end_time_unix_nano = 1_000;
        let row = span_row(&span, "", &AttrMap::new());
        let mut builder = BatchBuilder::new("m");
        builder.push(row);
        let batch = builder.build();
        assert_eq!(batch.columns["duration_ns"], vec![AttrValue::Int(-1_000)]);
    }

    #[test]
    fn test_missing_status_defaults() {
        let mut span = sample_span();
        span.status = None;
        let row = span_row(&span, "", &AttrMap::new());
        let mut builder = BatchBuilder::new("m");
        builder.push(row);
        let batch = builder.build();
        assert_eq!(batch.columns["status_code"], vec![AttrValue::Int(0)]);
        assert_eq!(batch.columns["status_message"], vec![AttrValue::from("")]);
    }

    #[test]
    fn test_span_kind_mapping() {
        assert_eq!(span_kind_str(SpanKind::Server as i32), "server");
        assert_eq!(span_kind_str(SpanKind::Client as i32), "client");
        assert_eq!(span_kind_str(SpanKind::Producer as i32), "producer");
        assert_eq!(span_kind_str(SpanKind::Consumer as i32), "consumer");
        assert_eq!(span_kind_str(SpanKind::Internal as i32), "internal");
        assert_eq!(span_kind_str(0), "unspecified");
        assert_eq!(span_kind_str(99), "unspecified");
    }
}
