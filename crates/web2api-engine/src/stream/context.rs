//! Snapshot diffing state for one reply.

/// What one snapshot meant for the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// New text past the emitted boundary.
    Emit(String),
    /// Small shrink; treated as rendering noise.
    Jitter,
    /// Shrink beyond tolerance; the site is re-rendering.
    Rerender,
    /// No net change; carries the updated stable count.
    Stable(u32),
}

/// Per-request diff state.
///
/// All lengths count `char`s. The emitted boundary is
/// `baseline_len + sent_content_len` and only ever moves forward.
#[derive(Debug, Clone)]
pub struct StreamContext {
    max_seen_text: String,
    sent_content_len: usize,
    active_turn_baseline_len: usize,
    stable_text_count: u32,
    last_stable_text: String,
    shrink_tolerance: usize,
}

impl StreamContext {
    pub fn new(baseline_len: usize, shrink_tolerance: usize) -> Self {
        Self {
            max_seen_text: String::new(),
            sent_content_len: 0,
            active_turn_baseline_len: baseline_len,
            stable_text_count: 0,
            last_stable_text: String::new(),
            shrink_tolerance,
        }
    }

    fn boundary(&self) -> usize {
        self.active_turn_baseline_len + self.sent_content_len
    }

    /// Record text seen outside `observe`, e.g. during confirmation.
    pub fn remember(&mut self, text: &str) {
        if text.chars().count() > self.max_seen_text.chars().count() {
            self.max_seen_text = text.to_string();
        }
    }

    /// Seed the state with the confirmed user turn.
    pub fn for_turn(turn_text: &str, shrink_tolerance: usize) -> Self {
        let mut ctx = Self::new(turn_text.chars().count(), shrink_tolerance);
        ctx.max_seen_text = turn_text.to_string();
        ctx.last_stable_text = turn_text.to_string();
        ctx
    }

    /// Classify a snapshot and advance the state.
    ///
    /// "No net change" is measured against the previous snapshot: a shrunk
    /// snapshot that stays put counts toward stability like one sitting on
    /// the boundary.
    pub fn observe(&mut self, snapshot: &str) -> Observation {
        let len = snapshot.chars().count();
        let boundary = self.boundary();
        let unchanged = snapshot == self.last_stable_text;
        self.last_stable_text = snapshot.to_string();
        self.remember(snapshot);

        if len > boundary {
            let delta: String = snapshot.chars().skip(boundary).collect();
            self.sent_content_len = len - self.active_turn_baseline_len;
            self.stable_text_count = 0;
            return Observation::Emit(delta);
        }

        if len < boundary && !unchanged {
            if boundary - len <= self.shrink_tolerance {
                return Observation::Jitter;
            }
            self.stable_text_count = 0;
            return Observation::Rerender;
        }

        self.stable_text_count += 1;

        // The live DOM sits below text captured earlier.
        let max_len = self.max_seen_text.chars().count();
        if max_len > boundary {
            let delta: String = self.max_seen_text.chars().skip(boundary).collect();
            self.sent_content_len = max_len - self.active_turn_baseline_len;
            self.stable_text_count = 0;
            return Observation::Emit(delta);
        }

        Observation::Stable(self.stable_text_count)
    }

    /// A tick with no readable content counts toward stability.
    pub fn idle_tick(&mut self) -> u32 {
        self.stable_text_count += 1;
        self.stable_text_count
    }

    pub fn sent_content_len(&self) -> usize {
        self.sent_content_len
    }

    pub fn stable_text_count(&self) -> u32 {
        self.stable_text_count
    }

    pub fn baseline_len(&self) -> usize {
        self.active_turn_baseline_len
    }

    pub fn max_seen_text(&self) -> &str {
        &self.max_seen_text
    }

    pub fn last_stable_text(&self) -> &str {
        &self.last_stable_text
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
