/// Characters per "word" in words-per-minute.
pub const CHARS_PER_WORD: f64 = 5.0;

const MS_PER_MINUTE: f64 = 60_000.0;

/// Live speed, accuracy and score for a session.
///
/// Always derived from the raw counters; nothing here is patched
/// incrementally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Metrics {
    pub speed: u32,
    pub accuracy: u32,
    pub score: u32,
}

impl Metrics {
    /// `None` until at least one keystroke has been counted. A zero elapsed
    /// time yields a speed of 0.
    pub fn compute(keystrokes: u32, errors: u32, elapsed_ms: u64) -> Option<Metrics> {
        let speed = speed(keystrokes, elapsed_ms);
        let accuracy = accuracy(keystrokes, errors)?;
        Some(Metrics {
            speed,
            accuracy,
            score: score(speed, accuracy),
        })
    }
}

pub fn speed(keystrokes: u32, elapsed_ms: u64) -> u32 {
    if elapsed_ms == 0 {
        return 0;
    }
    let minutes = elapsed_ms as f64 / MS_PER_MINUTE;
    ((keystrokes as f64 / CHARS_PER_WORD) / minutes).round() as u32
}

pub fn accuracy(keystrokes: u32, errors: u32) -> Option<u32> {
    if keystrokes == 0 {
        return None;
    }
    let correct = keystrokes.saturating_sub(errors) as f64;
    Some(((correct / keystrokes as f64) * 100.0).round() as u32)
}

pub fn score(speed: u32, accuracy: u32) -> u32 {
    (speed as f64 * accuracy as f64 / 100.0).round() as u32
}
