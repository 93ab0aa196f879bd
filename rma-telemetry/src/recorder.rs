//! In-memory span capture.
//!
//! [`SpanRecorder`] is a cheap, cloneable handle over shared storage. Its
//! [`layer`](SpanRecorder::layer) records every span when it closes, keeping
//! the order in which spans were opened, their fields and their parent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::span::{Attributes, Id, Record};
use tracing::{Subscriber, field::Field};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

/// A span captured by a [`SpanRecorderLayer`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedSpan {
    /// Span name, e.g. `rag.retrieve`.
    pub name: String,
    /// Module path target of the span.
    pub target: String,
    /// Name of the enclosing span, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Position in opening order, starting at zero.
    pub sequence: usize,
    /// Fields recorded at creation or later via `Span::record`.
    pub fields: HashMap<String, serde_json::Value>,
}

impl RecordedSpan {
    /// A field value as a string, if it was recorded as one.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(serde_json::Value::as_str)
    }
}

#[derive(Debug, Default)]
struct Storage {
    next_sequence: AtomicUsize,
    closed: Mutex<Vec<RecordedSpan>>,
}

/// Shared storage for captured spans.
#[derive(Debug, Clone, Default)]
pub struct SpanRecorder {
    storage: Arc<Storage>,
}

impl SpanRecorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// A layer feeding this recorder.
    pub fn layer(&self) -> SpanRecorderLayer {
        SpanRecorderLayer { storage: Arc::clone(&self.storage) }
    }

    /// All closed spans, in the order they were opened.
    pub fn spans(&self) -> Vec<RecordedSpan> {
        let mut spans = match self.storage.closed.lock() {
            Ok(closed) => closed.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        spans.sort_by_key(|span| span.sequence);
        spans
    }

    /// Names of closed spans, in the order they were opened.
    pub fn span_names(&self) -> Vec<String> {
        self.spans().into_iter().map(|span| span.name).collect()
    }

    /// The first closed span called `name`.
    pub fn find(&self, name: &str) -> Option<RecordedSpan> {
        self.spans().into_iter().find(|span| span.name == name)
    }

    /// Drop everything captured so far.
    pub fn clear(&self) {
        match self.storage.closed.lock() {
            Ok(mut closed) => closed.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

/// The [`Layer`] half of a [`SpanRecorder`].
pub struct SpanRecorderLayer {
    storage: Arc<Storage>,
}

/// Per-span state kept in the registry's extensions until close.
struct Pending {
    sequence: usize,
    fields: HashMap<String, serde_json::Value>,
}

impl<S> Layer<S> for SpanRecorderLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut visitor = JsonVisitor::default();
        attrs.record(&mut visitor);
        let sequence = self.storage.next_sequence.fetch_add(1, Ordering::SeqCst);
        span.extensions_mut().insert(Pending { sequence, fields: visitor.0 });
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut extensions = span.extensions_mut();
        if let Some(pending) = extensions.get_mut::<Pending>() {
            let mut visitor = JsonVisitor::default();
            values.record(&mut visitor);
            pending.fields.extend(visitor.0);
        }
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(&id) else { return };
        let Some(pending) = span.extensions_mut().remove::<Pending>() else { return };
        let metadata = span.metadata();
        let recorded = RecordedSpan {
            name: metadata.name().to_string(),
            target: metadata.target().to_string(),
            parent: span.parent().map(|parent| parent.name().to_string()),
            sequence: pending.sequence,
            fields: pending.fields,
        };
        match self.storage.closed.lock() {
            Ok(mut closed) => closed.push(recorded),
            Err(poisoned) => poisoned.into_inner().push(recorded),
        }
    }
}

#[derive(Default)]
struct JsonVisitor(HashMap<String, serde_json::Value>);

impl tracing::field::Visit for JsonVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().to_string(), serde_json::Value::Bool(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }
}
