//! Hardware acceleration fallback tracking (Chromium-aligned)
//!
//! Process-wide tracking of hardware codec failures, keyed by codec string
//! and direction, with automatic fallback to software after repeated
//! failures:
//!
//! - After GLOBAL_FAILURE_THRESHOLD (3) failures of a key, `no-preference`
//!   configures for that key silently choose software
//! - After FORGIVENESS_INTERVAL (60s), the hardware path is re-enabled
//! - A success resets the failure count
//!
//! `prefer-hardware` ignores the registry and reports failures to the
//! caller; `prefer-software` bypasses hardware entirely.
//!
//! The state can be reset via `reset_hardware_fallback_state()` for testing
//! or error recovery scenarios.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::backend::CodecDirection;

const GLOBAL_FAILURE_THRESHOLD: u32 = 3;
const FORGIVENESS_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FallbackKey {
  codec: String,
  direction: CodecDirection,
}

#[derive(Default)]
struct FallbackEntry {
  failure_count: u32,
  disabled_at: Option<Instant>,
}

static HW_STATE: Mutex<Option<HashMap<FallbackKey, FallbackEntry>>> = Mutex::new(None);

fn with_state<R>(f: impl FnOnce(&mut HashMap<FallbackKey, FallbackEntry>) -> R) -> R {
  let mut guard = HW_STATE.lock().expect("hardware fallback state poisoned");
  f(guard.get_or_insert_with(HashMap::new))
}

/// Reset all hardware fallback state.
///
/// This clears all failure counts and re-enables hardware acceleration.
/// Useful for:
/// - Test isolation (call between tests)
/// - Error recovery after fixing hardware issues
/// - Manual reset by users
pub fn reset_hardware_fallback_state() {
  with_state(|state| state.clear());
}

/// Check if the hardware path for this codec and direction is currently
/// disabled due to failures. Also handles time-based forgiveness.
pub(crate) fn is_hw_disabled(codec: &str, direction: CodecDirection) -> bool {
  with_state(|state| {
    let key = FallbackKey {
      codec: codec.to_string(),
      direction,
    };
    match state.get_mut(&key) {
      None => false,
      Some(entry) => {
        if entry.failure_count < GLOBAL_FAILURE_THRESHOLD {
          return false;
        }
        // Forgiveness interval, measured from when the key was disabled
        if let Some(disabled_at) = entry.disabled_at {
          if disabled_at.elapsed() >= FORGIVENESS_INTERVAL {
            state.remove(&key);
            return false;
          }
        }
        true
      }
    }
  })
}

/// Record a hardware failure for this codec and direction.
/// After GLOBAL_FAILURE_THRESHOLD failures, the hardware path is disabled.
pub(crate) fn record_hw_failure(codec: &str, direction: CodecDirection) {
  with_state(|state| {
    let entry = state
      .entry(FallbackKey {
        codec: codec.to_string(),
        direction,
      })
      .or_default();
    entry.failure_count = entry.failure_count.saturating_add(1);

    // Only stamp disabled_at when FIRST crossing the threshold, so later
    // failures do not restart the forgiveness timer
    if entry.failure_count >= GLOBAL_FAILURE_THRESHOLD && entry.disabled_at.is_none() {
      entry.disabled_at = Some(Instant::now());
    }
  });
}

/// Record a successful hardware operation for this codec and direction.
/// Resets the failure count.
pub(crate) fn record_hw_success(codec: &str, direction: CodecDirection) {
  with_state(|state| {
    state.remove(&FallbackKey {
      codec: codec.to_string(),
      direction,
    });
  });
}
