use std::time::Duration;

const UNITS: [(u64, &str); 5] = [
    (7 * 24 * 60 * 60, "week"),
    (24 * 60 * 60, "day"),
    (60 * 60, "hour"),
    (60, "minute"),
    (1, "second"),
];

/// Formats an elapsed duration as its two largest non-zero units, e.g. `2 weeks 3 days`.
/// Anything below a second is dropped.
pub fn human_duration(elapsed: Duration) -> String {
    human_seconds(elapsed.as_secs())
}

pub fn human_seconds(mut seconds: u64) -> String {
    let mut parts = Vec::with_capacity(2);
    for (size, name) in UNITS {
        let count = seconds / size;
        seconds %= size;
        if count == 0 {
            continue;
        }
        parts.push(plural(count, name));
        if parts.len() == 2 {
            break;
        }
    }
    if parts.is_empty() {
        return plural(0, "second");
    }
    parts.join(" ")
}

fn plural(count: u64, name: &str) -> String {
    if count == 1 {
        format!("{count} {name}")
    } else {
        format!("{count} {name}s")
    }
}

#[cfg(test)]
mod test {
    use super::{human_duration, human_seconds};
    use std::time::Duration;

    #[test]
    fn zero_is_zero_seconds() {
        assert_eq!(human_seconds(0), "0 seconds");
    }

    #[test]
    fn keeps_two_largest_units() {
        assert_eq!(human_seconds(90_000), "1 day 1 hour");
        assert_eq!(human_seconds(2 * 604_800 + 3 * 86_400 + 17), "2 weeks 3 days");
        assert_eq!(human_seconds(3_723), "1 hour 2 minutes");
    }

    #[test]
    fn skips_zero_units_between() {
        assert_eq!(human_seconds(3_601), "1 hour 1 second");
    }

    #[test]
    fn single_unit() {
        assert_eq!(human_seconds(604_800), "1 week");
        assert_eq!(human_seconds(45), "45 seconds");
        assert_eq!(human_seconds(60), "1 minute");
    }

    #[test]
    fn drops_sub_second_precision() {
        assert_eq!(human_duration(Duration::from_millis(999)), "0 seconds");
        assert_eq!(human_duration(Duration::from_millis(61_500)), "1 minute 1 second");
    }
}
