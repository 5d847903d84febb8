// tests/property/main.rs

use std::collections::HashMap;
use std::time::Duration;

use devwatch::watch::{DebounceTable, GlobSpec};
use proptest::prelude::*;
use tokio::time::Instant;

const QUIET_MS: u64 = 30;

// (path index, milliseconds since the previous event)
fn event_stream() -> impl Strategy<Value = Vec<(u8, u64)>> {
    proptest::collection::vec((0u8..4, 0u64..60), 1..40)
}

/// Replay `events`, polling for due entries before every new event the way
/// the watch loop does, then once more long after the last event.
fn replay(events: &[(u8, u64)]) -> Vec<(u8, usize)> {
    let base = Instant::now();
    let quiet = Duration::from_millis(QUIET_MS);
    let mut table: DebounceTable<u8, usize> = DebounceTable::new(quiet);
    let mut fired = Vec::new();
    let mut t = 0u64;

    for (idx, (key, gap)) in events.iter().enumerate() {
        t += gap;
        let now = base + Duration::from_millis(t);
        fired.extend(table.take_due(now));
        table.schedule(*key, idx, now);
    }
    fired.extend(table.take_due(base + Duration::from_millis(t + 10 * QUIET_MS)));
    assert!(table.is_empty());
    fired
}

proptest! {
    #[test]
    fn each_path_fires_once_per_quiet_burst(events in event_stream()) {
        let fired = replay(&events);

        // Expected: per key, a burst ends when the next event for that key
        // arrives at least one quiet window later, or at the end.
        let mut last_seen: HashMap<u8, (u64, usize)> = HashMap::new();
        let mut expected: Vec<(u8, usize)> = Vec::new();
        let mut t = 0u64;
        for (idx, (key, gap)) in events.iter().enumerate() {
            t += gap;
            if let Some((prev_t, prev_idx)) = last_seen.get(key) {
                if t - prev_t >= QUIET_MS {
                    expected.push((*key, *prev_idx));
                }
            }
            last_seen.insert(*key, (t, idx));
        }
        for (key, (_, idx)) in &last_seen {
            expected.push((*key, *idx));
        }

        let mut fired_sorted = fired.clone();
        fired_sorted.sort();
        expected.sort();
        prop_assert_eq!(fired_sorted, expected);
    }

    #[test]
    fn last_event_wins_for_every_path(events in event_stream()) {
        let fired = replay(&events);

        let mut last_value: HashMap<u8, usize> = HashMap::new();
        for (idx, (key, _)) in events.iter().enumerate() {
            last_value.insert(*key, idx);
        }
        let mut last_fired: HashMap<u8, usize> = HashMap::new();
        for (key, idx) in fired {
            let entry = last_fired.entry(key).or_insert(idx);
            *entry = (*entry).max(idx);
        }
        prop_assert_eq!(last_fired, last_value);
    }

    #[test]
    fn exclude_always_beats_include(
        dir in prop::sample::select(vec!["views", "views/partials", "public", "public/img", "lib", "routes"]),
        stem in "[a-z]{1,8}",
        ext in prop::sample::select(vec!["ejs", "ts", "mts", "css", "js"]),
    ) {
        let globs = GlobSpec::new(
            &["views/**/*.ejs".to_string(), "public/**/*".to_string()],
            &["**/*.ts".to_string(), "**/*.mts".to_string()],
        ).unwrap();
        let path = format!("{dir}/{stem}.{ext}");

        let included = (dir.starts_with("views") && ext == "ejs") || dir.starts_with("public");
        let excluded = ext == "ts" || ext == "mts";
        prop_assert_eq!(globs.matches(&path), included && !excluded, "path {}", path);
    }
}
