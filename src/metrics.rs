use metrics::{counter, histogram};
use std::time::Duration;

/// Metric names emitted by the library
///
/// No recorder is installed here; the facade is a no-op unless the host
/// application installs one.
pub mod names {
    /// Store queries executed, labelled by `operation` and `status`
    pub const STORE_QUERIES_TOTAL: &str = "txt_insight_store_queries_total";
    /// Store query latency in seconds, labelled by `operation`
    pub const STORE_QUERY_DURATION: &str = "txt_insight_store_query_duration_seconds";
    /// Rows returned by store queries, labelled by `operation`
    pub const STORE_ROWS_TOTAL: &str = "txt_insight_store_rows_total";
    /// Rows normalized into message records
    pub const RECORDS_MAPPED: &str = "txt_insight_records_mapped_total";
    /// Rows whose text fell back to the placeholder
    pub const TEXT_UNAVAILABLE: &str = "txt_insight_text_unavailable_total";
    /// Analytics sub-metrics that were omitted after a query failure
    pub const ANALYTICS_METRIC_OMITTED: &str = "txt_insight_analytics_metric_omitted_total";
    /// Follow-up items emitted, labelled by `category`
    pub const FOLLOWUP_ITEMS_TOTAL: &str = "txt_insight_followup_items_total";
}

/// Record the outcome of one store query.
pub fn record_store_query(operation: &'static str, duration: Duration, rows: usize, success: bool) {
    let status = if success { "success" } else { "error" };
    counter!(names::STORE_QUERIES_TOTAL, "operation" => operation, "status" => status).increment(1);
    histogram!(names::STORE_QUERY_DURATION, "operation" => operation)
        .record(duration.as_secs_f64());
    if success {
        counter!(names::STORE_ROWS_TOTAL, "operation" => operation).increment(rows as u64);
    }
}

/// Record an analytics field dropped because its sub-query failed.
pub fn record_metric_omitted(metric: &'static str) {
    counter!(names::ANALYTICS_METRIC_OMITTED, "metric" => metric).increment(1);
}

/// Record follow-up items emitted for a category.
pub fn record_followup_items(category: &'static str, count: usize) {
    counter!(names::FOLLOWUP_ITEMS_TOTAL, "category" => category).increment(count as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_store_query("recent", Duration::from_millis(3), 10, true);
        record_store_query("recent", Duration::from_millis(3), 0, false);
        record_metric_omitted("busiest_hour");
        record_followup_items("time_sensitive", 2);
    }

    #[test]
    fn test_metric_names_are_prefixed() {
        for name in [
            names::STORE_QUERIES_TOTAL,
            names::STORE_QUERY_DURATION,
            names::RECORDS_MAPPED,
            names::FOLLOWUP_ITEMS_TOTAL,
        ] {
            assert!(name.starts_with("txt_insight_"));
        }
    }
}
