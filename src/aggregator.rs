//! The aggregation primitive consumed by the heavy hitters search.

use tracing::trace;

use crate::{AggregationParam, Error, Report};

/// Counts, for each candidate prefix, how many reports have a measurement beginning with it.
pub trait PrefixAggregator {
    /// Return one count per prefix in `param`, in the same order.
    ///
    /// Implementations that protect privacy may refuse to aggregate the same level twice; callers
    /// must not retry a level whose aggregation failed.
    fn aggregate(&mut self, param: &AggregationParam, reports: &[Report])
    -> Result<Vec<u64>, Error>;
}

/// Plaintext prefix counting over the measurements themselves.
///
/// This offers no privacy whatsoever. It is useful as a reference for
/// [`MasticAggregator`](crate::MasticAggregator).
#[derive(Clone, Debug)]
pub struct ClearAggregator {
    bits: u16,
    last_level: Option<usize>,
}

impl ClearAggregator {
    /// Construct a new instance of [`ClearAggregator`] for `bits`-bit measurements.
    pub fn new(bits: u16) -> Self {
        Self {
            bits,
            last_level: None,
        }
    }
}

impl PrefixAggregator for ClearAggregator {
    fn aggregate(
        &mut self,
        param: &AggregationParam,
        reports: &[Report],
    ) -> Result<Vec<u64>, Error> {
        let level = param.level();
        if level >= usize::from(self.bits) {
            return Err(Error::LevelOutOfRange {
                level,
                bits: self.bits,
            });
        }
        if self.last_level.is_some_and(|last| level <= last) {
            return Err(Error::LevelReused(level));
        }

        let shift = usize::from(self.bits) - 1 - level;
        let prefixes = param.prefixes().as_slice();
        let mut counts = vec![0; prefixes.len()];
        for report in reports {
            let prefix = report.measurement() >> shift;
            if let Ok(i) = prefixes.binary_search(&prefix) {
                counts[i] += 1;
            }
        }
        trace!(level, ?counts, "counted prefixes");

        self.last_level = Some(level);
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CandidatePrefixes;
    use assert_matches::assert_matches;

    fn reports(measurements: &[u128]) -> Vec<Report> {
        measurements.iter().copied().map(Report::new).collect()
    }

    #[test]
    fn counts_prefixes() {
        let mut agg = ClearAggregator::new(4);
        let reports = reports(&[0b1010, 0b1011, 0b0111, 0b1010]);

        let param: AggregationParam = CandidatePrefixes::root().into();
        assert_eq!(agg.aggregate(&param, &reports).unwrap(), vec![1, 3]);

        let param: AggregationParam = CandidatePrefixes::new(2, [0b011, 0b101, 0b110])
            .unwrap()
            .into();
        assert_eq!(agg.aggregate(&param, &reports).unwrap(), vec![1, 3, 0]);

        let param: AggregationParam = CandidatePrefixes::new(3, [0b1010, 0b1011]).unwrap().into();
        assert_eq!(agg.aggregate(&param, &reports).unwrap(), vec![2, 1]);
    }

    #[test]
    fn refuses_repeated_level() {
        let mut agg = ClearAggregator::new(4);
        let reports = reports(&[0b1010]);
        let param: AggregationParam = CandidatePrefixes::new(1, [0b10]).unwrap().into();
        agg.aggregate(&param, &reports).unwrap();
        assert_matches!(agg.aggregate(&param, &reports), Err(Error::LevelReused(1)));

        let param: AggregationParam = CandidatePrefixes::root().into();
        assert_matches!(agg.aggregate(&param, &reports), Err(Error::LevelReused(0)));
    }

    #[test]
    fn refuses_level_past_width() {
        let mut agg = ClearAggregator::new(4);
        let param: AggregationParam = CandidatePrefixes::new(4, [0]).unwrap().into();
        assert_matches!(
            agg.aggregate(&param, &[]),
            Err(Error::LevelOutOfRange { level: 4, bits: 4 })
        );
    }
}
