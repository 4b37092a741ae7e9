use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    lines_read: AtomicU64,
    lines_skipped: AtomicU64,
    kills_recorded: AtomicU64,
    kills_duplicate: AtomicU64,
    kills_rejected: AtomicU64,
    store_failures: AtomicU64,
    status_polls_ok: AtomicU64,
    status_polls_failed: AtomicU64,
    feed_messages_sent: AtomicU64,
    feed_messages_failed: AtomicU64,
    kills_dispatched: AtomicU64,
    batch_imports_completed: AtomicU64,
    batch_imports_failed: AtomicU64,
}

impl Metrics {
    pub fn record_lines(&self, read: u64, skipped: u64) {
        self.lines_read.fetch_add(read, Ordering::Relaxed);
        self.lines_skipped.fetch_add(skipped, Ordering::Relaxed);
    }

    pub fn record_kill_recorded(&self) {
        self.kills_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_kill_duplicate(&self) {
        self.kills_duplicate.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_kill_rejected(&self) {
        self.kills_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_failure(&self) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_status_poll(&self, ok: bool) {
        if ok {
            self.status_polls_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.status_polls_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_feed_sent(&self, kills: usize) {
        self.feed_messages_sent.fetch_add(1, Ordering::Relaxed);
        self.kills_dispatched
            .fetch_add(kills as u64, Ordering::Relaxed);
    }

    pub fn record_feed_failed(&self) {
        self.feed_messages_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch_import(&self, ok: bool) {
        if ok {
            self.batch_imports_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.batch_imports_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn kills_recorded(&self) -> u64 {
        self.kills_recorded.load(Ordering::Relaxed)
    }

    pub fn kills_duplicate(&self) -> u64 {
        self.kills_duplicate.load(Ordering::Relaxed)
    }

    pub fn feed_messages_sent(&self) -> u64 {
        self.feed_messages_sent.load(Ordering::Relaxed)
    }

    pub fn render_prometheus(&self) -> String {
        let counters = [
            ("deadwatch_lines_read_total", &self.lines_read),
            ("deadwatch_lines_skipped_total", &self.lines_skipped),
            ("deadwatch_kills_recorded_total", &self.kills_recorded),
            ("deadwatch_kills_duplicate_total", &self.kills_duplicate),
            ("deadwatch_kills_rejected_total", &self.kills_rejected),
            ("deadwatch_store_failures_total", &self.store_failures),
            ("deadwatch_status_polls_ok_total", &self.status_polls_ok),
            ("deadwatch_status_polls_failed_total", &self.status_polls_failed),
            ("deadwatch_feed_messages_sent_total", &self.feed_messages_sent),
            ("deadwatch_feed_messages_failed_total", &self.feed_messages_failed),
            ("deadwatch_kills_dispatched_total", &self.kills_dispatched),
            ("deadwatch_batch_imports_completed_total", &self.batch_imports_completed),
            ("deadwatch_batch_imports_failed_total", &self.batch_imports_failed),
        ];

        let mut out = String::new();
        for (name, counter) in counters {
            out.push_str(&format!(
                "# TYPE {name} counter\n{name} {}\n",
                counter.load(Ordering::Relaxed)
            ));
        }
        out
    }
}
