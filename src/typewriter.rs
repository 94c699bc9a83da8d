//! Character-by-character text reveal.
//!
//! A reveal clears its surface, then appends one character per step, sleeping
//! between steps so the runtime can service other work (closing the panel,
//! another surface's reveal). Longer texts get a shorter per-character delay:
//!
//! ```text
//! delay = clamp(base - floor(chars / 220), 6, 22) ms
//! ```
//!
//! A reveal cannot be cancelled. Callers await it before touching the same
//! surface again.

use std::time::Duration;

use tracing::trace;

/// Default base pace for assistant messages.
pub const DEFAULT_PACE_MS: u64 = 14;
/// Range accepted for the caller-supplied base pace.
pub const BASE_PACE_RANGE_MS: (u64, u64) = (6, 30);
/// Range of the effective per-character delay.
pub const EFFECTIVE_PACE_RANGE_MS: (u64, u64) = (6, 22);
/// Characters per 1 ms of speed-up.
const CHARS_PER_SPEEDUP: usize = 220;

/// Something a reveal can write into.
pub trait RevealSurface: Send {
    /// Drop everything currently displayed.
    fn clear(&mut self);
    /// Append one character to the displayed content.
    fn push_char(&mut self, ch: char);
    /// Bring the surface into view (scroll the containing log to its end).
    fn scroll_into_view(&mut self);
}

/// Clamp a caller-supplied base pace to [`BASE_PACE_RANGE_MS`].
pub fn clamp_base_pace(base_ms: u64) -> u64 {
    base_ms.clamp(BASE_PACE_RANGE_MS.0, BASE_PACE_RANGE_MS.1)
}

/// Effective per-character delay for `text` at `base_ms`.
pub fn effective_pace(text: &str, base_ms: u64) -> Duration {
    let chars = text.chars().count().max(1);
    let speedup = (chars / CHARS_PER_SPEEDUP) as u64;
    let ms = base_ms
        .saturating_sub(speedup)
        .clamp(EFFECTIVE_PACE_RANGE_MS.0, EFFECTIVE_PACE_RANGE_MS.1);
    Duration::from_millis(ms)
}

/// Reveal `text` into `surface`, completing once every character is shown.
///
/// Returns the per-character delay that was used.
pub async fn reveal<S>(surface: &mut S, text: &str, base_ms: u64) -> Duration
where
    S: RevealSurface + ?Sized,
{
    surface.clear();
    let pace = effective_pace(text, base_ms);
    trace!(target: "typewriter", chars = text.chars().count(), pace_ms = pace.as_millis() as u64, "reveal started");

    for (i, ch) in text.chars().enumerate() {
        surface.push_char(ch);
        if i % 2 == 0 {
            surface.scroll_into_view();
        }
        tokio::time::sleep(pace).await;
    }
    surface.scroll_into_view();
    pace
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        shown: String,
        pushes: usize,
        scrolls: usize,
        clears: usize,
    }

    impl RevealSurface for Recorder {
        fn clear(&mut self) {
            self.shown.clear();
            self.clears += 1;
        }
        fn push_char(&mut self, ch: char) {
            self.shown.push(ch);
            self.pushes += 1;
        }
        fn scroll_into_view(&mut self) {
            self.scrolls += 1;
        }
    }

    #[test]
    fn pace_shrinks_with_length_and_stays_in_range() {
        assert_eq!(effective_pace("hi", 14), Duration::from_millis(14));
        assert_eq!(effective_pace(&"a".repeat(219), 14), Duration::from_millis(14));
        assert_eq!(effective_pace(&"a".repeat(220), 14), Duration::from_millis(13));
        assert_eq!(effective_pace(&"a".repeat(2200), 14), Duration::from_millis(6));
        assert_eq!(effective_pace(&"a".repeat(100_000), 30), Duration::from_millis(6));
        assert_eq!(effective_pace("short", 30), Duration::from_millis(22));
        assert_eq!(effective_pace("", 14), Duration::from_millis(14));
    }

    #[test]
    fn pace_counts_characters_not_bytes() {
        // 220 Arabic letters are 440 bytes but one speed-up step.
        let arabic = "ب".repeat(220);
        assert_eq!(effective_pace(&arabic, 14), Duration::from_millis(13));
    }

    #[test]
    fn base_pace_is_clamped() {
        assert_eq!(clamp_base_pace(0), 6);
        assert_eq!(clamp_base_pace(14), 14);
        assert_eq!(clamp_base_pace(500), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn reveal_shows_full_text_and_scrolls() {
        let mut surface = Recorder {
            shown: "stale".into(),
            ..Recorder::default()
        };
        let start = tokio::time::Instant::now();

        let pace = reveal(&mut surface, "hello", 14).await;

        assert_eq!(surface.shown, "hello");
        assert_eq!(surface.clears, 1);
        assert_eq!(surface.pushes, 5);
        // indices 0, 2, 4 plus the final scroll
        assert_eq!(surface.scrolls, 4);
        assert_eq!(pace, Duration::from_millis(14));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(70), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(80), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn reveal_of_empty_text_still_scrolls_once() {
        let mut surface = Recorder::default();
        reveal(&mut surface, "", 14).await;
        assert_eq!(surface.shown, "");
        assert_eq!(surface.scrolls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reveal_yields_between_characters() {
        let mut surface = Recorder::default();
        {
            let reveal_task = reveal(&mut surface, "abcdef", 20);
            tokio::pin!(reveal_task);

            tokio::select! {
                _ = &mut reveal_task => panic!("reveal should still be running"),
                _ = tokio::time::sleep(Duration::from_millis(50)) => {}
            }
            reveal_task.await;
        }
        assert_eq!(surface.shown, "abcdef");
    }
}
