use super::{Record, RecordValue, Recorder, TIMESTAMP_KEY};
use log::info;

/// Writes records through the [`log`] facade at info level.
///
/// Keys are printed in alphabetical order, the timestamp is omitted since
/// loggers attach their own.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRecorder;

impl LogRecorder {
    fn format(record: &Record) -> String {
        let mut kvs = record
            .iter()
            .filter(|(k, _)| k.as_str() != TIMESTAMP_KEY)
            .map(|(k, v)| match v {
                RecordValue::Scalar(v) => format!("{}={:.6}", k, v),
                RecordValue::DateTime(t) => format!("{}={}", k, t.to_rfc3339()),
                RecordValue::Array1(v) => format!("{}={:?}", k, v),
                RecordValue::String(s) => format!("{}={}", k, s),
            })
            .collect::<Vec<_>>();
        kvs.sort();
        kvs.join(", ")
    }
}

impl Recorder for LogRecorder {
    fn write(&mut self, record: Record) {
        info!("{}", Self::format(&record));
    }
}
