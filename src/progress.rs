// Progress notification sinks
use std::io::Write;

/// Receives the number of completed pages. `done` strictly increases from 1
/// to `total`; page content is never passed through.
pub trait ProgressSink: Send + Sync {
    fn completed(&self, done: usize, total: usize);
}

impl<F> ProgressSink for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn completed(&self, done: usize, total: usize) {
        self(done, total)
    }
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn completed(&self, _done: usize, _total: usize) {}
}

/// Rewrites one "Processing page X of Y..." line on stderr.
pub struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn completed(&self, done: usize, total: usize) {
        let mut err = std::io::stderr().lock();
        let _ = write!(err, "\rProcessing page {} of {}...", done, total);
        if done == total {
            let _ = writeln!(err);
        }
        let _ = err.flush();
    }
}
