//! Sample sequencing.
//!
//! Rebases device timestamps onto a session-relative clock and filters
//! repeated or out-of-order readings. The band's clock can stall between
//! notification intervals, so the same tick value may arrive more than once.

use super::sample::Sample;

/// Reason a reading was not emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    /// The device timestamp did not advance past the last accepted one.
    Duplicate {
        /// Device timestamp of the rejected reading (ms).
        device_timestamp_ms: u32,
        /// Device timestamp of the last accepted reading (ms).
        last_accepted_ms: u32,
    },
}

/// Per-session sequencer state.
#[derive(Debug, Clone)]
pub struct SampleSequencer {
    device_id: String,
    /// First device timestamp seen this session; the session's zero point.
    start_timestamp_raw: Option<u32>,
    /// Device timestamp of the last accepted reading.
    last_timestamp_raw: Option<u32>,
}

impl SampleSequencer {
    /// Create a sequencer for readings from `device_id`.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            start_timestamp_raw: None,
            last_timestamp_raw: None,
        }
    }

    /// Accept a reading.
    ///
    /// Readings whose device timestamp is not strictly greater than the last
    /// accepted device timestamp are rejected and leave the state untouched.
    /// The comparison is raw-to-raw; rebasing happens only on acceptance.
    pub fn accept(
        &mut self,
        device_timestamp_ms: u32,
        x: i16,
        y: i16,
        z: i16,
    ) -> Result<Sample, Rejected> {
        let start = *self.start_timestamp_raw.get_or_insert(device_timestamp_ms);

        if let Some(last) = self.last_timestamp_raw {
            if device_timestamp_ms <= last {
                return Err(Rejected::Duplicate {
                    device_timestamp_ms,
                    last_accepted_ms: last,
                });
            }
        }

        self.last_timestamp_raw = Some(device_timestamp_ms);
        let relative = u64::from(device_timestamp_ms - start);

        Ok(Sample::new(self.device_id.clone(), x, y, z, relative))
    }

    /// Clear the zero point and last-seen marker.
    pub fn reset(&mut self) {
        self.start_timestamp_raw = None;
        self.last_timestamp_raw = None;
    }

    /// The session's zero point, if a reading has been seen.
    pub fn start_timestamp_raw(&self) -> Option<u32> {
        self.start_timestamp_raw
    }

    /// The last accepted device timestamp.
    pub fn last_timestamp_raw(&self) -> Option<u32> {
        self.last_timestamp_raw
    }

    /// The device this sequencer stamps samples with.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn accept_all(seq: &mut SampleSequencer, stamps: &[u32]) -> Vec<u64> {
        stamps
            .iter()
            .filter_map(|&t| seq.accept(t, 0, 0, 0).ok())
            .map(|s| s.timestamp_ms)
            .collect()
    }

    #[test]
    fn test_first_sample_is_zero() {
        let mut seq = SampleSequencer::new("07");
        let sample = seq.accept(5_000, 1, 2, 3).unwrap();
        assert_eq!(sample.timestamp_ms, 0);
        assert_eq!(sample.device_id, "07");
        assert_eq!((sample.x, sample.y, sample.z), (1, 2, 3));
        assert_eq!(seq.start_timestamp_raw(), Some(5_000));
    }

    #[test]
    fn test_rebases_on_first_sample() {
        let mut seq = SampleSequencer::new("07");
        assert_eq!(accept_all(&mut seq, &[0, 1000, 2000]), vec![0, 1000, 2000]);

        let mut seq = SampleSequencer::new("07");
        assert_eq!(accept_all(&mut seq, &[700, 1700, 2700]), vec![0, 1000, 2000]);
    }

    #[test]
    fn test_repeated_timestamp_is_rejected() {
        let mut seq = SampleSequencer::new("07");
        assert!(seq.accept(1000, 0, 0, 0).is_ok());
        assert_eq!(
            seq.accept(1000, 9, 9, 9),
            Err(Rejected::Duplicate {
                device_timestamp_ms: 1000,
                last_accepted_ms: 1000,
            })
        );
        assert_eq!(seq.last_timestamp_raw(), Some(1000));
    }

    #[test]
    fn test_out_of_order_does_not_advance_state() {
        let mut seq = SampleSequencer::new("07");
        assert_eq!(accept_all(&mut seq, &[100, 300, 200, 300, 400]), vec![0, 200, 300]);
        assert_eq!(seq.last_timestamp_raw(), Some(400));
    }

    /// Duplicate filtering compares raw device time against the last raw
    /// accepted value, never against the rebased one.
    #[test]
    fn test_duplicate_check_is_raw_to_raw() {
        let mut seq = SampleSequencer::new("07");
        assert_eq!(seq.accept(500, 0, 0, 0).unwrap().timestamp_ms, 0);
        assert_eq!(seq.accept(600, 0, 0, 0).unwrap().timestamp_ms, 100);
        // Raw 550 is behind raw 600 even though it is ahead of relative 100.
        assert!(seq.accept(550, 0, 0, 0).is_err());
        assert_eq!(seq.accept(601, 0, 0, 0).unwrap().timestamp_ms, 101);
    }

    #[test]
    fn test_reset_starts_new_zero_point() {
        let mut seq = SampleSequencer::new("07");
        accept_all(&mut seq, &[100, 200]);
        seq.reset();
        assert_eq!(seq.start_timestamp_raw(), None);
        assert_eq!(seq.last_timestamp_raw(), None);
        assert_eq!(seq.accept(50, 0, 0, 0).unwrap().timestamp_ms, 0);
    }

    proptest! {
        #[test]
        fn prop_emits_strictly_increasing_subsequence(stamps in proptest::collection::vec(0u32..10_000, 1..64)) {
            let mut seq = SampleSequencer::new("07");
            let emitted = accept_all(&mut seq, &stamps);

            let t0 = stamps[0];
            let mut expected = Vec::new();
            let mut last: Option<u32> = None;
            for &t in &stamps {
                if last.map_or(true, |l| t > l) {
                    expected.push(u64::from(t - t0));
                    last = Some(t);
                }
            }

            prop_assert_eq!(&emitted, &expected);
            prop_assert!(emitted.windows(2).all(|w| w[0] < w[1]));
            prop_assert_eq!(emitted[0], 0);
        }

        #[test]
        fn prop_same_timestamp_twice_rejects_second(t: u32) {
            let mut seq = SampleSequencer::new("07");
            prop_assert!(seq.accept(t, 0, 0, 0).is_ok());
            prop_assert!(seq.accept(t, 0, 0, 0).is_err());
        }
    }
}
