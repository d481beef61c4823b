use super::{Record, Recorder};
use std::sync::{Arc, Mutex};

/// Keeps records in memory.
///
/// Clones share the same buffer, so a clone kept by the caller can inspect
/// the records written through one moved into a [`Trainer`](crate::Trainer).
#[derive(Debug, Default, Clone)]
pub struct BufferedRecorder {
    buf: Arc<Mutex<Vec<Record>>>,
}

impl BufferedRecorder {
    /// Constructs the recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the records written so far.
    pub fn records(&self) -> Vec<Record> {
        match self.buf.lock() {
            Ok(buf) => buf.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Returns a copy of the records having key `k`.
    pub fn records_with(&self, k: &str) -> Vec<Record> {
        self.records()
            .into_iter()
            .filter(|r| r.contains_key(k))
            .collect()
    }

    /// Number of records written so far.
    pub fn len(&self) -> usize {
        match self.buf.lock() {
            Ok(buf) => buf.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Returns `true` if no record was written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Recorder for BufferedRecorder {
    fn write(&mut self, record: Record) {
        match self.buf.lock() {
            Ok(mut buf) => buf.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_records() {
        let recorder = BufferedRecorder::new();
        let mut writer: Box<dyn Recorder> = Box::new(recorder.clone());
        writer.write(Record::from_scalar("loss", 1.0));
        writer.write(Record::from_scalar("epsilon", 0.5));

        assert_eq!(recorder.len(), 2);
        let losses = recorder.records_with("loss");
        assert_eq!(losses.len(), 1);
        assert_eq!(losses[0].get_scalar("loss"), Ok(1.0));
    }
}
