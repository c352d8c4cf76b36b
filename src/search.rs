//! Iterative heavy hitters search over the prefix tree.
//!
//! Each round submits the candidate prefixes of one level to a [`PrefixAggregator`]. Prefixes
//! whose count meets the [`Threshold`] are extended by one bit to form the candidates of the next
//! level; the rest are dropped along with all of their descendants. The search ends after the
//! last level, `bits - 1`, or as soon as no candidates remain.

use tracing::{debug, info};

use crate::{
    AggregationParam, CandidatePrefixes, Codec, Error, ErrorReport, PrefixAggregator, Report,
};

/// Minimum count for a prefix to survive a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Threshold(u64);

impl Threshold {
    /// Admit counts greater than or equal to `count`.
    pub fn at_least(count: u64) -> Self {
        Self(count)
    }

    /// Admit counts strictly greater than `count`.
    pub fn more_than(count: u64) -> Self {
        Self(count.saturating_add(1))
    }

    /// Whether a prefix with `count` reports survives.
    pub fn admits(&self, count: u64) -> bool {
        count >= self.0
    }
}

/// Where the search starts and when a prefix survives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchConfig {
    bits: u16,
    initial_prefixes: CandidatePrefixes,
    threshold: Threshold,
}

impl SearchConfig {
    /// Search bit by bit, starting from the prefixes `0` and `1`.
    pub fn bitwise(bits: u16, threshold: Threshold) -> Result<Self, Error> {
        Self::new(bits, CandidatePrefixes::root(), threshold)
    }

    /// Search starting from known high-order prefixes of `start_level + 1` bits.
    pub fn from_prefixes(
        bits: u16,
        start_level: usize,
        prefixes: impl IntoIterator<Item = u128>,
        threshold: Threshold,
    ) -> Result<Self, Error> {
        Self::new(
            bits,
            CandidatePrefixes::new(start_level, prefixes)?,
            threshold,
        )
    }

    fn new(
        bits: u16,
        initial_prefixes: CandidatePrefixes,
        threshold: Threshold,
    ) -> Result<Self, Error> {
        if bits == 0 || bits > 128 {
            return Err(Error::UnsupportedWidth(bits));
        }
        if initial_prefixes.level() >= usize::from(bits) {
            return Err(Error::LevelOutOfRange {
                level: initial_prefixes.level(),
                bits,
            });
        }
        Ok(Self {
            bits,
            initial_prefixes,
            threshold,
        })
    }

    /// The width of the measurements in bits.
    pub fn bits(&self) -> u16 {
        self.bits
    }

    /// The level of the first round.
    pub fn start_level(&self) -> usize {
        self.initial_prefixes.level()
    }

    /// The survival threshold.
    pub fn threshold(&self) -> Threshold {
        self.threshold
    }
}

/// One completed round: what was submitted and what came back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Round {
    pub param: AggregationParam,
    pub counts: Vec<u64>,
}

impl Round {
    /// The prefixes of this round paired with their counts.
    pub fn iter(&self) -> impl Iterator<Item = (u128, u64)> + '_ {
        self.param.prefixes().iter().zip(self.counts.iter().copied())
    }
}

/// Full-width values that met the threshold, in ascending order, with their counts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeavyHitters(Vec<(u128, u64)>);

impl HeavyHitters {
    /// The number of heavy hitters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no value met the threshold.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The heavy hitters and their counts, in ascending order of value.
    pub fn iter(&self) -> impl Iterator<Item = (u128, u64)> + '_ {
        self.0.iter().copied()
    }

    /// Decode each heavy hitter back into the byte string it encodes.
    pub fn decode(&self, codec: &Codec) -> Result<Vec<(Vec<u8>, u64)>, Error> {
        self.iter()
            .map(|(value, count)| Ok((codec.decode(value)?, count)))
            .collect()
    }

    /// Decode each heavy hitter as an [`ErrorReport`].
    pub fn decode_error_reports(&self, codec: &Codec) -> Result<Vec<(ErrorReport, u64)>, Error> {
        self.iter()
            .map(|(value, count)| Ok((ErrorReport::decode(codec, value)?, count)))
            .collect()
    }
}

/// Drives a [`PrefixAggregator`] through the levels of the prefix tree.
///
/// Levels are aggregated in increasing order and each one at most once. A caller may stop between
/// any two calls to [`Self::step`]; nothing is left half-applied.
pub struct HeavyHitterSearch<'a, A> {
    config: SearchConfig,
    aggregator: A,
    reports: &'a [Report],
    candidates: Option<CandidatePrefixes>,
    rounds: Vec<Round>,
}

impl<'a, A: PrefixAggregator> HeavyHitterSearch<'a, A> {
    /// Construct a new search over `reports`. Nothing is aggregated until [`Self::step`].
    pub fn new(config: SearchConfig, aggregator: A, reports: &'a [Report]) -> Self {
        let candidates = Some(config.initial_prefixes.clone());
        Self {
            config,
            aggregator,
            reports,
            candidates,
            rounds: Vec::new(),
        }
    }

    /// The candidates of the next round, or `None` once the search is over.
    pub fn candidates(&self) -> Option<&CandidatePrefixes> {
        self.candidates.as_ref()
    }

    /// Whether the last level has been aggregated or no candidates are left.
    pub fn is_finished(&self) -> bool {
        self.candidates.is_none()
    }

    /// Every round completed so far.
    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    /// Return a reference to the aggregator.
    pub fn aggregator(&self) -> &A {
        &self.aggregator
    }

    /// Run one round. Returns the round just completed, or `None` if the search is over.
    ///
    /// An error ends the search: the failed level is not retried.
    pub fn step(&mut self) -> Result<Option<&Round>, Error> {
        let Some(candidates) = self.candidates.take() else {
            return Ok(None);
        };
        if candidates.is_empty() {
            debug!(level = candidates.level(), "no candidates left");
            return Ok(None);
        }

        let level = candidates.level();
        let param = AggregationParam::new(candidates);
        let counts = self.aggregator.aggregate(&param, self.reports)?;
        if counts.len() != param.prefixes().len() {
            return Err(Error::AggregationMismatch {
                expected: param.prefixes().len(),
                got: counts.len(),
            });
        }

        let round = Round { param, counts };
        let threshold = self.config.threshold;
        if level + 1 < usize::from(self.config.bits) {
            let next = CandidatePrefixes::children(
                level,
                round
                    .iter()
                    .filter(|(_prefix, count)| threshold.admits(*count))
                    .map(|(prefix, _count)| prefix),
            );
            debug!(
                level,
                num_candidates = round.counts.len(),
                num_survivors = next.len() / 2,
                "completed round"
            );
            self.candidates = Some(next);
        } else {
            debug!(level, num_candidates = round.counts.len(), "completed last round");
        }

        self.rounds.push(round);
        Ok(self.rounds.last())
    }

    /// Run the remaining rounds and return the heavy hitters.
    pub fn run(&mut self) -> Result<HeavyHitters, Error> {
        while self.step()?.is_some() {}

        let heavy_hitters = self.heavy_hitters();
        info!(
            rounds = self.rounds.len(),
            heavy_hitters = heavy_hitters.len(),
            "search finished"
        );
        Ok(heavy_hitters)
    }

    /// The heavy hitters found, empty unless the last level has been aggregated.
    pub fn heavy_hitters(&self) -> HeavyHitters {
        let last_level = usize::from(self.config.bits) - 1;
        match self.rounds.last() {
            Some(round) if round.param.level() == last_level => HeavyHitters(
                round
                    .iter()
                    .filter(|(_value, count)| self.config.threshold.admits(*count))
                    .collect(),
            ),
            _ => HeavyHitters::default(),
        }
    }
}
