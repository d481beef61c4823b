use super::Record;

/// Sink of [`Record`]s emitted during training.
///
/// The [`Trainer`](crate::Trainer) writes one record per environment step,
/// one per optimization step and one per finished episode, each with a
/// timestamp. Where the records end up (memory, console, files) is up to
/// the implementation.
pub trait Recorder {
    /// Writes a record.
    fn write(&mut self, record: Record);

    /// Flushes buffered output, if any.
    fn flush(&mut self) {}
}

impl<T: Recorder + ?Sized> Recorder for Box<T> {
    fn write(&mut self, record: Record) {
        (**self).write(record)
    }

    fn flush(&mut self) {
        (**self).flush()
    }
}
