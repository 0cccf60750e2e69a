//! Merged time axis over the two inertial streams.

use crate::error::{FitError, FitResult};
use crate::types::ImuSample;

/// One merged event: the indices of the rotation and acceleration samples
/// in effect at this instant.
#[derive(Clone, Copy, Debug)]
struct MergedEvent {
    time_usec: i64,
    rotation_idx: usize,
    acceleration_idx: usize,
}

/// Union of the rotation and acceleration streams on a single strictly
/// increasing time axis.
///
/// Every index resolves to exactly one timestamp, one rotation sample and
/// one acceleration sample (the latest of each stream at or before that
/// instant). The first event is the first instant at which both streams
/// have produced a sample, so every lookup is backed by real data. Built
/// once and read-only afterward; windows share it across worker threads.
pub struct MergedTimeline {
    rotations: Vec<ImuSample>,
    accelerations: Vec<ImuSample>,
    events: Vec<MergedEvent>,
}

impl MergedTimeline {
    pub fn new(rotations: Vec<ImuSample>, accelerations: Vec<ImuSample>) -> FitResult<Self> {
        check_stream(&rotations, "rotations")?;
        check_stream(&accelerations, "accelerations")?;

        // Distinct timestamps of the union, in order. Duplicates within a
        // stream collapse so that event times strictly increase.
        let mut times = Vec::with_capacity(rotations.len() + accelerations.len());
        let mut ri = 0;
        let mut ai = 0;
        while ri < rotations.len() || ai < accelerations.len() {
            let next_rotation = rotations.get(ri).map(|s| s.timestamp_usec);
            let next_acceleration = accelerations.get(ai).map(|s| s.timestamp_usec);
            let t = match (next_rotation, next_acceleration) {
                (Some(r), Some(a)) => r.min(a),
                (Some(r), None) => r,
                (None, Some(a)) => a,
                (None, None) => break,
            };
            while ri < rotations.len() && rotations[ri].timestamp_usec == t {
                ri += 1;
            }
            while ai < accelerations.len() && accelerations[ai].timestamp_usec == t {
                ai += 1;
            }
            times.push(t);
        }

        // Events before one of the streams has started have nothing to
        // resolve to and are skipped.
        let start = rotations[0]
            .timestamp_usec
            .max(accelerations[0].timestamp_usec);

        let mut events = Vec::with_capacity(times.len());
        let mut rotation_idx = 0;
        let mut acceleration_idx = 0;
        for &time_usec in &times {
            if time_usec < start {
                continue;
            }
            while rotation_idx + 1 < rotations.len()
                && rotations[rotation_idx + 1].timestamp_usec <= time_usec
            {
                rotation_idx += 1;
            }
            while acceleration_idx + 1 < accelerations.len()
                && accelerations[acceleration_idx + 1].timestamp_usec <= time_usec
            {
                acceleration_idx += 1;
            }
            events.push(MergedEvent {
                time_usec,
                rotation_idx,
                acceleration_idx,
            });
        }

        log::debug!(
            "merged {} rotation and {} acceleration samples into {} events",
            rotations.len(),
            accelerations.len(),
            events.len()
        );
        Ok(MergedTimeline {
            rotations,
            accelerations,
            events,
        })
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn time_usec(&self, idx: usize) -> i64 {
        self.events[idx].time_usec
    }

    pub fn rotation(&self, idx: usize) -> &ImuSample {
        &self.rotations[self.events[idx].rotation_idx]
    }

    pub fn acceleration(&self, idx: usize) -> &ImuSample {
        &self.accelerations[self.events[idx].acceleration_idx]
    }

    /// Latest event index at or before `time_usec`, if any.
    pub fn last_index_at_or_before(&self, time_usec: i64) -> Option<usize> {
        let n = self.events.partition_point(|e| e.time_usec <= time_usec);
        n.checked_sub(1)
    }

    /// Indices of all events with timestamps in `[from_usec, to_usec]`.
    pub fn index_range_within(&self, from_usec: i64, to_usec: i64) -> std::ops::Range<usize> {
        let lo = self.events.partition_point(|e| e.time_usec < from_usec);
        let hi = self.events.partition_point(|e| e.time_usec <= to_usec);
        lo..hi.max(lo)
    }
}

fn check_stream(samples: &[ImuSample], name: &str) -> FitResult<()> {
    if samples.is_empty() {
        return Err(FitError::Data(format!("{name} stream is empty")));
    }
    for pair in samples.windows(2) {
        if pair[1].timestamp_usec < pair[0].timestamp_usec {
            return Err(FitError::Data(format!(
                "{name} timestamps decrease: {} -> {}",
                pair[0].timestamp_usec, pair[1].timestamp_usec
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(value: f64, timestamp_usec: i64) -> ImuSample {
        ImuSample {
            x: value,
            y: 0.0,
            z: 0.0,
            timestamp_usec,
        }
    }

    #[test]
    fn test_interleaved_streams_merge_in_order() {
        let rotations = vec![sample(1.0, 0), sample(2.0, 20), sample(3.0, 40)];
        let accelerations = vec![sample(10.0, 10), sample(20.0, 30)];
        let timeline = MergedTimeline::new(rotations, accelerations).unwrap();

        // Events start at 10, once both streams have begun.
        assert_eq!(timeline.len(), 4);
        let times: Vec<i64> = (0..timeline.len()).map(|i| timeline.time_usec(i)).collect();
        assert_eq!(times, vec![10, 20, 30, 40]);

        // Each event resolves to the latest sample at or before it.
        assert_eq!(timeline.rotation(0).x, 1.0);
        assert_eq!(timeline.acceleration(0).x, 10.0);
        assert_eq!(timeline.rotation(1).x, 2.0);
        assert_eq!(timeline.acceleration(1).x, 10.0);
        assert_eq!(timeline.rotation(3).x, 3.0);
        assert_eq!(timeline.acceleration(3).x, 20.0);
    }

    #[test]
    fn test_identical_timestamps_pair_directly() {
        let rotations = vec![sample(1.0, 0), sample(2.0, 20)];
        let accelerations = vec![sample(10.0, 0), sample(20.0, 20)];
        let timeline = MergedTimeline::new(rotations, accelerations).unwrap();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.rotation(1).x, 2.0);
        assert_eq!(timeline.acceleration(1).x, 20.0);
    }

    #[test]
    fn test_duplicate_timestamps_resolve_to_later_sample() {
        let rotations = vec![sample(1.0, 0), sample(2.0, 10), sample(3.0, 10)];
        let accelerations = vec![sample(10.0, 0)];
        let timeline = MergedTimeline::new(rotations, accelerations).unwrap();
        let times: Vec<i64> = (0..timeline.len()).map(|i| timeline.time_usec(i)).collect();
        assert_eq!(times, vec![0, 10]);
        assert_eq!(timeline.rotation(1).x, 3.0);
    }

    #[test]
    fn test_event_times_strictly_increase() {
        let rotations = vec![sample(1.0, 5), sample(2.0, 5), sample(3.0, 25)];
        let accelerations = vec![sample(10.0, 5), sample(20.0, 15), sample(30.0, 15)];
        let timeline = MergedTimeline::new(rotations, accelerations).unwrap();
        for i in 1..timeline.len() {
            assert!(timeline.time_usec(i) > timeline.time_usec(i - 1));
        }
    }

    #[test]
    fn test_empty_stream_rejected() {
        let rotations = vec![sample(1.0, 0)];
        assert!(MergedTimeline::new(rotations, vec![]).is_err());
        assert!(MergedTimeline::new(vec![], vec![sample(1.0, 0)]).is_err());
    }

    #[test]
    fn test_misordered_stream_rejected() {
        let rotations = vec![sample(1.0, 100), sample(2.0, 50)];
        let accelerations = vec![sample(10.0, 0)];
        assert!(MergedTimeline::new(rotations, accelerations).is_err());
    }

    #[test]
    fn test_index_range_within_bounds_inclusive() {
        let rotations = vec![sample(1.0, 0), sample(2.0, 10), sample(3.0, 20), sample(4.0, 30)];
        let accelerations = vec![sample(10.0, 0)];
        let timeline = MergedTimeline::new(rotations, accelerations).unwrap();

        assert_eq!(timeline.index_range_within(10, 20), 1..3);
        assert_eq!(timeline.index_range_within(5, 25), 1..3);
        assert_eq!(timeline.index_range_within(0, 30), 0..4);
        assert!(timeline.index_range_within(31, 50).is_empty());
        assert!(timeline.index_range_within(11, 19).is_empty());
    }

    #[test]
    fn test_last_index_at_or_before() {
        let rotations = vec![sample(1.0, 10), sample(2.0, 20), sample(3.0, 30)];
        let accelerations = vec![sample(10.0, 10)];
        let timeline = MergedTimeline::new(rotations, accelerations).unwrap();

        assert_eq!(timeline.last_index_at_or_before(5), None);
        assert_eq!(timeline.last_index_at_or_before(10), Some(0));
        assert_eq!(timeline.last_index_at_or_before(25), Some(1));
        assert_eq!(timeline.last_index_at_or_before(100), Some(2));
    }
}
