//! Metric export: data-point explosion into per-metric measurements.
//!
//! Arc measurements are flat (one numeric `value` column), so multi-field
//! points must be decomposed into independently labeled rows:
//!
//! - gauge/sum: one row per point;
//! - histogram: count, sum, min/max when reported, one row per bucket;
//! - summary: count, sum, one row per quantile.
//!
//! Sibling rows share the point's timestamp and merged attributes and are
//! told apart by a field-role label (`histogram_field` / `summary_field`).
//! Every metric routes to its own measurement named by its sanitized metric
//! name, and each measurement group is flushed independently so a caller
//! can retry exactly the groups that failed.

use std::collections::BTreeMap;
use std::sync::Arc;

use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::metrics::v1::{
    metric::Data, number_data_point, AggregationTemporality, HistogramDataPoint, NumberDataPoint,
    SummaryDataPoint,
};
use tracing::debug;

use crate::attributes::{attributes_to_map, merge, with_label, AttrMap, AttrValue};
use crate::columnar::{BatchBuilder, Row};
use crate::config::Config;
use crate::error::{ExportError, MeasurementFailure, Signal};
use crate::flusher::ArcClient;
use crate::payload;
use crate::util::unix_millis;

pub struct MetricsExporter {
    config: Arc<Config>,
    client: ArcClient,
}

impl MetricsExporter {
    pub fn new(config: Arc<Config>) -> Self {
        let client = ArcClient::new(&config);
        MetricsExporter { config, client }
    }

    /// Explodes one OTLP metrics export into per-measurement groups and
    /// flushes each group independently.
    ///
    /// Groups that fail are reported in
    /// [`ExportError::PartialMetricsFlush`]; groups that succeeded are done
    /// and must not be resent.
    pub async fn push_metrics(
        &self,
        request: ExportMetricsServiceRequest,
    ) -> Result<(), ExportError> {
        let groups = explode_request(&request, self.config.include_metric_metadata);
        let database = self.config.database_for(Signal::Metrics);

        let mut failures = Vec::new();
        for (measurement, rows) in groups {
            let mut builder = BatchBuilder::new(measurement.clone());
            for row in rows {
                builder.push(row);
            }
            let batch = builder.build();
            debug!(
                measurement = %measurement,
                rows = batch.row_count(),
                "Flushing metric measurement group"
            );

            let body = match payload::encode_compressed(&batch) {
                Ok(body) => body,
                Err(source) => {
                    failures.push(MeasurementFailure {
                        measurement,
                        error: ExportError::Encode {
                            signal: Signal::Metrics,
                            source,
                        },
                    });
                    continue;
                }
            };
            if let Err(source) = self.client.write(database, body).await {
                failures.push(MeasurementFailure {
                    measurement,
                    error: ExportError::Transport {
                        signal: Signal::Metrics,
                        source,
                    },
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ExportError::PartialMetricsFlush { failures })
        }
    }
}

/// Measurement (table) name from a metric name: `[a-zA-Z0-9_]` pass
/// through, every other character becomes `_`. Total and idempotent, so
/// "system.cpu.usage" and "system_cpu_usage" land in the same measurement.
pub fn sanitize_metric_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Walks the resource → scope → metric hierarchy and groups exploded rows
/// by sanitized metric name. Grouping is a `BTreeMap` so measurement groups
/// flush in a deterministic order.
fn explode_request(
    request: &ExportMetricsServiceRequest,
    include_metadata: bool,
) -> BTreeMap<String, Vec<Row>> {
    let mut groups: BTreeMap<String, Vec<Row>> = BTreeMap::new();

    for resource_metrics in &request.resource_metrics {
        let resource_attrs = resource_metrics
            .resource
            .as_ref()
            .map_or_else(AttrMap::new, |r| attributes_to_map(&r.attributes));

        for scope_metrics in &resource_metrics.scope_metrics {
            for metric in &scope_metrics.metrics {
                let rows = groups
                    .entry(sanitize_metric_name(&metric.name))
                    .or_default();

                match &metric.data {
                    Some(Data::Gauge(gauge)) => {
                        for dp in &gauge.data_points {
                            rows.push(number_row(dp, merged_labels(&resource_attrs, dp)));
                        }
                    }
                    Some(Data::Sum(sum)) => {
                        for dp in &sum.data_points {
                            let mut labels = merged_labels(&resource_attrs, dp);
                            if include_metadata {
                                labels.insert(
                                    "_monotonic".to_string(),
                                    AttrValue::Bool(sum.is_monotonic),
                                );
                                labels.insert(
                                    "_aggregation_temporality".to_string(),
                                    AttrValue::from(temporality_str(sum.aggregation_temporality)),
                                );
                            }
                            rows.push(number_row(dp, labels));
                        }
                    }
                    Some(Data::Histogram(histogram)) => {
                        let role_key = histogram_role_key(include_metadata);
                        for dp in &histogram.data_points {
                            let attrs = merge(&resource_attrs, &attributes_to_map(&dp.attributes));
                            explode_histogram(dp, &attrs, role_key, rows);
                        }
                    }
                    Some(Data::Summary(summary)) => {
                        let role_key = summary_role_key(include_metadata);
                        for dp in &summary.data_points {
                            let attrs = merge(&resource_attrs, &attributes_to_map(&dp.attributes));
                            explode_summary(dp, &attrs, role_key, rows);
                        }
                    }
                    // Exponential histograms and unset data degrade to
                    // nothing rather than failing the push.
                    _ => {}
                }
            }
        }
    }

    groups.retain(|_, rows| !rows.is_empty());
    groups
}

fn merged_labels(resource_attrs: &AttrMap, dp: &NumberDataPoint) -> AttrMap {
    merge(resource_attrs, &attributes_to_map(&dp.attributes))
}

/// One row for a gauge or sum point; int and double values both coerce to
/// f64, matching the single numeric value column.
fn number_row(dp: &NumberDataPoint, labels: AttrMap) -> Row {
    let value = match dp.value {
        Some(number_data_point::Value::AsDouble(d)) => d,
        Some(number_data_point::Value::AsInt(i)) => i as f64,
        None => 0.0,
    };
    point_row(dp.time_unix_nano, value, labels)
}

/// Histogram explosion order: count, sum, min (if reported), max (if
/// reported), then one row per bucket. Bucket rows carry `le` = the
/// explicit upper bound, or the string "+Inf" for the overflow bucket.
fn explode_histogram(
    dp: &HistogramDataPoint,
    attrs: &AttrMap,
    role_key: &'static str,
    rows: &mut Vec<Row>,
) {
    let time = dp.time_unix_nano;

    rows.push(point_row(
        time,
        dp.count as f64,
        with_label(attrs, role_key, AttrValue::from("count")),
    ));
    rows.push(point_row(
        time,
        dp.sum.unwrap_or(0.0),
        with_label(attrs, role_key, AttrValue::from("sum")),
    ));
    if let Some(min) = dp.min {
        rows.push(point_row(
            time,
            min,
            with_label(attrs, role_key, AttrValue::from("min")),
        ));
    }
    if let Some(max) = dp.max {
        rows.push(point_row(
            time,
            max,
            with_label(attrs, role_key, AttrValue::from("max")),
        ));
    }
    for (index, bucket_count) in dp.bucket_counts.iter().enumerate() {
        let le = dp
            .explicit_bounds
            .get(index)
            .map_or_else(|| AttrValue::from("+Inf"), |bound| AttrValue::Double(*bound));
        let labels = with_label(
            &with_label(attrs, role_key, AttrValue::from("bucket")),
            "le",
            le,
        );
        rows.push(point_row(time, *bucket_count as f64, labels));
    }
}

/// Summary explosion order: count, sum, then one row per quantile with the
/// quantile fraction as a label.
fn explode_summary(
    dp: &SummaryDataPoint,
    attrs: &AttrMap,
    role_key: &'static str,
    rows: &mut Vec<Row>,
) {
    let time = dp.time_unix_nano;

    rows.push(point_row(
        time,
        dp.count as f64,
        with_label(attrs, role_key, AttrValue::from("count")),
    ));
    rows.push(point_row(
        time,
        dp.sum,
        with_label(attrs, role_key, AttrValue::from("sum")),
    ));
    for quantile in &dp.quantile_values {
        let labels = with_label(
            &with_label(attrs, role_key, AttrValue::from("quantile")),
            "quantile",
            AttrValue::Double(quantile.quantile),
        );
        rows.push(point_row(time, quantile.value, labels));
    }
}

fn point_row(time_unix_nano: u64, value: f64, labels: AttrMap) -> Row {
    Row::new()
        .fixed("time", unix_millis(time_unix_nano))
        .fixed("value", value)
        .attributes(labels)
}

fn histogram_role_key(include_metadata: bool) -> &'static str {
    if include_metadata {
        "_histogram_field"
    } else {
        "histogram_field"
    }
}

fn summary_role_key(include_metadata: bool) -> &'static str {
    if include_metadata {
        "_summary_field"
    } else {
        "summary_field"
    }
}

fn temporality_str(value: i32) -> &'static str {
    match AggregationTemporality::try_from(value) {
        Ok(AggregationTemporality::Delta) => "delta",
        Ok(AggregationTemporality::Cumulative) => "cumulative",
        _ => "unspecified",
    }
}
