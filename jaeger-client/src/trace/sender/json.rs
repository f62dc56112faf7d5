use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use super::SpanEncoder;
use crate::error::{TraceError, TraceResult};
use crate::trace::{FinishedSpan, Process, ReferenceType, Tag};

/// Encodes spans as JSON documents.
///
/// Ids are lowercase hex strings, timestamps and durations are microseconds.
/// A batch is `{"process":{..},"spans":[..]}`.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonSpanEncoder;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonProcess<'a> {
    service_name: &'a str,
    tags: &'a [Tag],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReference {
    ref_type: &'static str,
    trace_id: String,
    span_id: String,
}

#[derive(Serialize)]
struct JsonLog<'a> {
    timestamp: u64,
    fields: &'a [Tag],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonSpan<'a> {
    trace_id: String,
    span_id: String,
    parent_span_id: String,
    flags: u8,
    operation_name: &'a str,
    references: Vec<JsonReference>,
    start_time: u64,
    duration: u64,
    tags: &'a [Tag],
    logs: Vec<JsonLog<'a>>,
}

fn micros_since_epoch(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_micros() as u64)
        .unwrap_or(0)
}

impl SpanEncoder for JsonSpanEncoder {
    fn encode_process(&self, process: &Process) -> TraceResult<Vec<u8>> {
        serde_json::to_vec(&JsonProcess {
            service_name: &process.service_name,
            tags: &process.tags,
        })
        .map_err(|err| TraceError::Other(err.into()))
    }

    fn encode_span(&self, span: &FinishedSpan) -> TraceResult<Vec<u8>> {
        let context = &span.context;
        let references = span
            .references
            .iter()
            .map(|reference| JsonReference {
                ref_type: match reference.kind {
                    ReferenceType::FollowsFrom => "FOLLOWS_FROM",
                    _ => "CHILD_OF",
                },
                trace_id: reference.context.trace_id().to_string(),
                span_id: format!("{:016x}", reference.context.span_id()),
            })
            .collect();
        let logs = span
            .logs
            .iter()
            .map(|log| JsonLog {
                timestamp: micros_since_epoch(log.timestamp),
                fields: &log.fields,
            })
            .collect();

        serde_json::to_vec(&JsonSpan {
            trace_id: context.trace_id().to_string(),
            span_id: format!("{:016x}", context.span_id()),
            parent_span_id: format!("{:016x}", context.parent_id()),
            flags: context.flags().to_u8(),
            operation_name: &span.operation_name,
            references,
            start_time: micros_since_epoch(span.start_time),
            duration: span.duration.as_micros() as u64,
            tags: &span.tags,
            logs,
        })
        .map_err(|err| TraceError::Other(err.into()))
    }

    fn encode_batch(&self, process: &[u8], spans: &[Vec<u8>]) -> Vec<u8> {
        let spans_len = spans.iter().map(|span| span.len() + 1).sum::<usize>();
        let mut batch = Vec::with_capacity(process.len() + spans_len + 24);
        batch.extend_from_slice(b"{\"process\":");
        batch.extend_from_slice(process);
        batch.extend_from_slice(b",\"spans\":[");
        for (i, span) in spans.iter().enumerate() {
            if i > 0 {
                batch.push(b',');
            }
            batch.extend_from_slice(span);
        }
        batch.extend_from_slice(b"]}");
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{finished_span, LogRecord, Reference, SpanContext, TraceFlags, TraceId};
    use serde_json::Value;
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn encodes_span_fields() {
        let mut span = finished_span("GET /");
        span.context = SpanContext::new(TraceId::new(0, 0xabc), 0x10, 0x20, TraceFlags::SAMPLED, HashMap::new());
        span.start_time = UNIX_EPOCH + Duration::from_micros(1_500);
        span.duration = Duration::from_micros(42);
        span.tags.push(Tag::new("http.status_code", 200));
        span.logs.push(LogRecord::new(UNIX_EPOCH + Duration::from_micros(7), vec![Tag::new("event", "x")]));
        span.references.push(Reference::follows_from(SpanContext::new(
            TraceId::new(0, 0xabc),
            0x30,
            0,
            TraceFlags::SAMPLED,
            HashMap::new(),
        )));

        let value: Value = serde_json::from_slice(&JsonSpanEncoder.encode_span(&span).unwrap()).unwrap();
        assert_eq!(value["traceId"], "0000000000000abc");
        assert_eq!(value["spanId"], "0000000000000010");
        assert_eq!(value["parentSpanId"], "0000000000000020");
        assert_eq!(value["flags"], 1);
        assert_eq!(value["operationName"], "GET /");
        assert_eq!(value["startTime"], 1_500);
        assert_eq!(value["duration"], 42);
        assert_eq!(value["tags"][0]["key"], "http.status_code");
        assert_eq!(value["tags"][0]["value"], 200);
        assert_eq!(value["logs"][0]["timestamp"], 7);
        assert_eq!(value["references"][0]["refType"], "FOLLOWS_FROM");
    }

    #[test]
    fn batch_is_valid_json() {
        let span = finished_span("op");
        let encoder = JsonSpanEncoder;
        let process = encoder.encode_process(&span.process).unwrap();
        let spans = vec![encoder.encode_span(&span).unwrap(), encoder.encode_span(&span).unwrap()];

        let value: Value = serde_json::from_slice(&encoder.encode_batch(&process, &spans)).unwrap();
        assert_eq!(value["process"]["serviceName"], "svc");
        assert_eq!(value["spans"].as_array().unwrap().len(), 2);
    }
}
