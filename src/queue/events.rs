use std::sync::Arc;

/// Optional diagnostic callback receiving formatted `"[tag] message"` lines.
///
/// Lines are forwarded synchronously; the queue does not buffer, retry, or
/// catch panics raised by the sink.
pub type EventSink = Arc<dyn Fn(&str) + Send + Sync>;

pub(crate) fn emit(sink: &Option<EventSink>, tag: &str, message: &str) {
    if let Some(sink) = sink {
        sink(&format!("[{tag}] {message}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_emit_formats_tag_prefix() {
        let lines: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&lines);
        let sink: EventSink =
            Arc::new(move |line: &str| captured.lock().unwrap().push(line.to_string()));

        emit(&Some(sink), "jobs", "queue started");
        assert_eq!(lines.lock().unwrap().as_slice(), ["[jobs] queue started"]);
    }

    #[test]
    fn test_emit_without_sink_is_a_noop() {
        emit(&None, "jobs", "ignored");
    }
}
