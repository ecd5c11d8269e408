/// Receives `(label, current, total)` between the chunks of a transfer.
///
/// Called synchronously on the transferring thread, so implementations should return
/// quickly. Any `FnMut(&str, usize, usize)` closure is a `Progress`.
pub trait Progress {
    fn progress(&mut self, label: &str, current: usize, total: usize);
}

impl<F> Progress for F
where
    F: FnMut(&str, usize, usize),
{
    fn progress(&mut self, label: &str, current: usize, total: usize) {
        self(label, current, total)
    }
}

/// Discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn progress(&mut self, _label: &str, _current: usize, _total: usize) {}
}
