use crate::constants::THRESHOLD_EVENT_PREFIX;

/// A decoded threshold callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdSignal {
    /// "Cumulative usage reached checkpoint N today"
    Index(u32),
    /// Name did not carry a positive index
    Malformed,
}

impl ThresholdSignal {
    /// Accepts `block_N` as registered by the schedule, or a bare `N`.
    pub fn parse(event_name: &str) -> Self {
        let trimmed = event_name.trim();
        let digits = trimmed
            .strip_prefix(THRESHOLD_EVENT_PREFIX)
            .unwrap_or(trimmed);
        match digits.parse::<u32>() {
            Ok(index) if index > 0 => ThresholdSignal::Index(index),
            _ => ThresholdSignal::Malformed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(ThresholdSignal::parse("block_5"), ThresholdSignal::Index(5));
        assert_eq!(ThresholdSignal::parse("12"), ThresholdSignal::Index(12));
        assert_eq!(ThresholdSignal::parse("block_0"), ThresholdSignal::Malformed);
        assert_eq!(ThresholdSignal::parse("block_x"), ThresholdSignal::Malformed);
        assert_eq!(ThresholdSignal::parse("block_-3"), ThresholdSignal::Malformed);
        assert_eq!(ThresholdSignal::parse(""), ThresholdSignal::Malformed);
    }
}
