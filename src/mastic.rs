//! Prefix counting with [`Mastic`].
//!
//! [`MasticAggregator`] plays the client, both aggregators and the collector in a single process.
//! Each report is sharded once, the first time it is seen. Every call to
//! [`PrefixAggregator::aggregate`] then runs preparation for each report at the requested level
//! and unshards the aggregate shares into one count per prefix.

use std::collections::{HashMap, HashSet};

use prio::{
    field::Field64,
    flp::types::Count,
    vdaf::{
        Aggregator, Client, Collector, PrepareTransition, Vdaf, VdafError,
        mastic::{Mastic, MasticAggregationParam},
    },
    vidpf::VidpfInput,
};
use rand::prelude::*;
use tracing::{debug, trace};

use crate::{AggregationParam, Error, NONCE_SIZE, PrefixAggregator, Report};

/// [`Mastic`] with a counter as the weight.
pub type MasticCount = Mastic<Count<Field64>>;

const VERIFY_KEY_SIZE: usize = 32;

struct Shard {
    measurement: u128,
    public_share: <MasticCount as Vdaf>::PublicShare,
    input_shares: Vec<<MasticCount as Vdaf>::InputShare>,
}

/// A [`PrefixAggregator`] backed by [`Mastic`].
pub struct MasticAggregator {
    vdaf: MasticCount,
    bits: u16,
    ctx: Vec<u8>,
    verify_key: [u8; VERIFY_KEY_SIZE],
    shards: HashMap<[u8; NONCE_SIZE], Shard>,
    prev_params: Vec<MasticAggregationParam>,
    last_level: Option<usize>,
}

impl MasticAggregator {
    /// Construct an aggregator for `bits`-bit measurements, using a random verification key.
    pub fn new(bits: u16, ctx: &[u8]) -> Result<Self, Error> {
        let mut verify_key = [0u8; VERIFY_KEY_SIZE];
        thread_rng().fill(&mut verify_key[..]);
        Self::with_verify_key(bits, ctx, verify_key)
    }

    /// Construct an aggregator with a caller-chosen verification key.
    pub fn with_verify_key(
        bits: u16,
        ctx: &[u8],
        verify_key: [u8; VERIFY_KEY_SIZE],
    ) -> Result<Self, Error> {
        // Private use codepoint.
        const ID: u32 = 0xfffffeee;

        Ok(Self {
            vdaf: Mastic::new(ID, Count::new(), usize::from(bits))?,
            bits,
            ctx: ctx.to_vec(),
            verify_key,
            shards: HashMap::new(),
            prev_params: Vec::new(),
            last_level: None,
        })
    }

    /// Return a reference to the underlying instance of [`Mastic`].
    pub fn vdaf(&self) -> &MasticCount {
        &self.vdaf
    }

    /// The number of reports sharded so far.
    pub fn num_reports(&self) -> usize {
        self.shards.len()
    }

    fn shard(&self, report: &Report) -> Result<Shard, Error> {
        let measurement = report.measurement();
        let bits: Vec<bool> = (0..self.bits)
            .rev()
            .map(|i| measurement >> i & 1 == 1)
            .collect();
        let (public_share, input_shares) = self.vdaf.shard(
            &self.ctx,
            &(VidpfInput::from_bools(&bits), true),
            report.nonce(),
        )?;
        trace!(nonce = ?report.nonce(), "sharded report");
        Ok(Shard {
            measurement,
            public_share,
            input_shares,
        })
    }

    fn prepare(
        &self,
        agg_param: &MasticAggregationParam,
        nonce: &[u8; NONCE_SIZE],
        shard: &Shard,
    ) -> Result<[<MasticCount as Vdaf>::OutputShare; 2], Error> {
        let (leader_state, leader_share) = self.vdaf.prepare_init(
            &self.verify_key,
            &self.ctx,
            0,
            agg_param,
            nonce,
            &shard.public_share,
            &shard.input_shares[0],
        )?;
        let (helper_state, helper_share) = self.vdaf.prepare_init(
            &self.verify_key,
            &self.ctx,
            1,
            agg_param,
            nonce,
            &shard.public_share,
            &shard.input_shares[1],
        )?;

        let prep_msg = self.vdaf.prepare_shares_to_prepare_message(
            &self.ctx,
            agg_param,
            [leader_share, helper_share],
        )?;

        let leader_out_share = finish(self.vdaf.prepare_next(
            &self.ctx,
            leader_state,
            prep_msg.clone(),
        )?)?;
        let helper_out_share = finish(self.vdaf.prepare_next(&self.ctx, helper_state, prep_msg)?)?;
        Ok([leader_out_share, helper_out_share])
    }
}

fn finish(
    transition: PrepareTransition<MasticCount, VERIFY_KEY_SIZE, NONCE_SIZE>,
) -> Result<<MasticCount as Vdaf>::OutputShare, Error> {
    match transition {
        PrepareTransition::Finish(out_share) => Ok(out_share),
        _ => Err(VdafError::Uncategorized("expected preparation to finish".into()).into()),
    }
}

impl PrefixAggregator for MasticAggregator {
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
        let prefixes = param.prefixes();
        if prefixes.is_empty() {
            return Ok(Vec::new());
        }
        if self.last_level.is_some_and(|last| level <= last) {
            return Err(Error::LevelReused(level));
        }

        // A nonce names one report, for every level.
        let mut nonces = HashSet::with_capacity(reports.len());
        for report in reports {
            if !nonces.insert(report.nonce()) {
                return Err(Error::DuplicateNonce(*report.nonce()));
            }
            if self
                .shards
                .get(report.nonce())
                .is_some_and(|shard| shard.measurement != report.measurement())
            {
                return Err(Error::NonceConflict(*report.nonce()));
            }
        }

        // The weight is checked only the first time the reports are aggregated.
        let agg_param = MasticAggregationParam::new(
            prefixes
                .iter()
                .map(|prefix| VidpfInput::from_bools(&prefixes.to_bools(prefix)))
                .collect(),
            self.prev_params.is_empty(),
        )?;
        if !<MasticCount as Aggregator<VERIFY_KEY_SIZE, NONCE_SIZE>>::is_agg_param_valid(
            &agg_param,
            &self.prev_params,
        ) {
            return Err(Error::PrefixNotExtension { level });
        }

        for report in reports {
            if !self.shards.contains_key(report.nonce()) {
                let shard = self.shard(report)?;
                self.shards.insert(*report.nonce(), shard);
            }
        }

        let mut leader_out_shares = Vec::with_capacity(reports.len());
        let mut helper_out_shares = Vec::with_capacity(reports.len());
        for report in reports {
            let [leader_out_share, helper_out_share] =
                self.prepare(&agg_param, report.nonce(), &self.shards[report.nonce()])?;
            leader_out_shares.push(leader_out_share);
            helper_out_shares.push(helper_out_share);
        }

        let leader_agg_share = self.vdaf.aggregate(&agg_param, leader_out_shares)?;
        let helper_agg_share = self.vdaf.aggregate(&agg_param, helper_out_shares)?;
        let counts = self.vdaf.unshard(
            &agg_param,
            [leader_agg_share, helper_agg_share],
            reports.len(),
        )?;
        debug!(level, num_prefixes = prefixes.len(), "aggregated level");

        self.prev_params.push(agg_param);
        self.last_level = Some(level);
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CandidatePrefixes, ClearAggregator, Codec, encode_error};
    use assert_matches::assert_matches;

    #[test]
    fn matches_clear_counts() {
        let bits = 8;
        let measurements = [0b1010_0000, 0b1010_1111, 0b0111_0000, 0b1010_0000, 0b1011_0001];
        let reports: Vec<Report> = measurements.into_iter().map(Report::new).collect();

        let mut mastic = MasticAggregator::new(bits, b"mastic test").unwrap();
        let mut clear = ClearAggregator::new(bits);
        let rounds = [
            CandidatePrefixes::root(),
            CandidatePrefixes::new(3, [0b0111, 0b1010, 0b1011]).unwrap(),
            CandidatePrefixes::new(7, [0b1010_0000, 0b1010_1111, 0b1011_0001]).unwrap(),
        ];
        for prefixes in rounds {
            let param = AggregationParam::new(prefixes);
            assert_eq!(
                mastic.aggregate(&param, &reports).unwrap(),
                clear.aggregate(&param, &reports).unwrap()
            );
        }
        assert_eq!(mastic.num_reports(), reports.len());
    }

    #[test]
    fn error_type_prefixes() {
        let codec = Codec::new(41).unwrap();
        let reports: Vec<Report> = [
            encode_error(&codec, 0x00, 0x10, 0x20, "A").unwrap(),
            encode_error(&codec, 0x00, 0x10, 0x20, "A").unwrap(),
            encode_error(&codec, 0x02, 0x10, 0x20, "C").unwrap(),
        ]
        .into_iter()
        .map(Report::new)
        .collect();

        let mut mastic = MasticAggregator::new(41, b"mastic test").unwrap();
        let param = AggregationParam::new(CandidatePrefixes::new(7, [0x00, 0x01, 0x02]).unwrap());
        assert_eq!(mastic.aggregate(&param, &reports).unwrap(), vec![2, 0, 1]);
    }

    #[test]
    fn refuses_repeated_level() {
        let reports = vec![Report::new(0b1010)];
        let mut mastic = MasticAggregator::new(4, b"mastic test").unwrap();

        let param = AggregationParam::new(CandidatePrefixes::new(1, [0b10, 0b11]).unwrap());
        assert_eq!(mastic.aggregate(&param, &reports).unwrap(), vec![1, 0]);
        assert_matches!(mastic.aggregate(&param, &reports), Err(Error::LevelReused(1)));

        let param = AggregationParam::new(CandidatePrefixes::root());
        assert_matches!(mastic.aggregate(&param, &reports), Err(Error::LevelReused(0)));
    }

    #[test]
    fn refuses_prefixes_outside_previous_level() {
        let reports: Vec<Report> = [0b1010_0000, 0b1100_0001]
            .into_iter()
            .map(Report::new)
            .collect();
        let mut mastic = MasticAggregator::new(8, b"mastic test").unwrap();

        let param = AggregationParam::new(CandidatePrefixes::new(3, [0b1010, 0b1011]).unwrap());
        assert_eq!(mastic.aggregate(&param, &reports).unwrap(), vec![1, 0]);

        // 0b1100 was not a candidate at level 3.
        let param = AggregationParam::new(CandidatePrefixes::new(7, [0b1100_0001]).unwrap());
        assert_matches!(
            mastic.aggregate(&param, &reports),
            Err(Error::PrefixNotExtension { level: 7 })
        );

        // The refused level was not consumed.
        let param = AggregationParam::new(CandidatePrefixes::new(7, [0b1010_0000]).unwrap());
        assert_eq!(mastic.aggregate(&param, &reports).unwrap(), vec![1]);
    }

    #[test]
    fn refuses_duplicate_nonce() {
        let nonce = [7; NONCE_SIZE];
        let reports = [
            Report::with_nonce(0b1000, nonce),
            Report::with_nonce(0b0000, nonce),
        ];
        let mut mastic = MasticAggregator::new(4, b"mastic test").unwrap();

        let param = AggregationParam::new(CandidatePrefixes::root());
        assert_matches!(
            mastic.aggregate(&param, &reports),
            Err(Error::DuplicateNonce(n)) if n == nonce
        );
        assert_eq!(mastic.num_reports(), 0);

        // Nothing was aggregated, so level 0 is still available.
        assert_eq!(mastic.aggregate(&param, &reports[..1]).unwrap(), vec![0, 1]);
    }

    #[test]
    fn refuses_nonce_with_new_measurement() {
        let nonce = [9; NONCE_SIZE];
        let mut mastic = MasticAggregator::new(4, b"mastic test").unwrap();

        let param = AggregationParam::new(CandidatePrefixes::root());
        let reports = [Report::with_nonce(0b1000, nonce)];
        assert_eq!(mastic.aggregate(&param, &reports).unwrap(), vec![0, 1]);

        let param =
            AggregationParam::new(CandidatePrefixes::new(1, [0b00, 0b01, 0b10, 0b11]).unwrap());
        let reports = [Report::with_nonce(0b0100, nonce)];
        assert_matches!(
            mastic.aggregate(&param, &reports),
            Err(Error::NonceConflict(n)) if n == nonce
        );
    }

    #[test]
    fn empty_candidates() {
        let mut mastic = MasticAggregator::new(4, b"mastic test").unwrap();
        let param = AggregationParam::new(CandidatePrefixes::new(2, []).unwrap());
        assert_eq!(mastic.aggregate(&param, &[Report::new(0)]).unwrap(), Vec::<u64>::new());
        assert_eq!(mastic.num_reports(), 0);
    }
}
