//! Heavy hitters over a prefix tree, in the style of [[BBCGI21]] and
//! [[draft-mouris-cfrg-mastic-01]].
//!
//! This crate finds the values reported by at least some threshold number of clients using a
//! VDAF that counts how many measurements begin with each of a set of candidate prefixes. The
//! collector never sees individual measurements, only the count for each prefix it asks about.
//!
//! Measurements are fixed-width bit strings. A [`Codec`] maps variable-length byte strings, such
//! as an [`ErrorReport`], to integers of the configured width by marking the end of the payload
//! with a sentinel bit.
//!
//! The search, driven by [`HeavyHitterSearch`], walks down the binary prefix tree one level at a
//! time. At each level every candidate prefix whose count meets the [`Threshold`] is extended by
//! one bit; the others are dropped. After the last level the surviving prefixes are the heavy
//! hitters. The search may also start further down the tree from a set of known prefixes, for
//! instance one per error type.
//!
//! Counting is done by a [`PrefixAggregator`]:
//!
//! * [`MasticAggregator`] runs [`Mastic`](prio::vdaf::mastic::Mastic) with a counter weight,
//!   playing both aggregators and the collector in one process.
//!
//! * [`ClearAggregator`] counts measurements in the clear and offers no privacy.
//!
//! Note that each level of the tree may be aggregated at most once. Aggregating a level twice,
//! for instance to retry after a failure, would let the collector learn more than the heavy
//! hitters. Both aggregators refuse to do so and [`HeavyHitterSearch`] never asks.
//!
//! ```
//! use mastic_heavy_hitters::{
//!     ClearAggregator, Codec, HeavyHitterSearch, Report, SearchConfig, Threshold,
//! };
//!
//! let codec = Codec::new(32).unwrap();
//! let reports: Vec<Report> = ["foo", "foo", "bar"]
//!     .into_iter()
//!     .map(|value| Report::new(codec.encode(value.as_bytes()).unwrap()))
//!     .collect();
//!
//! let config = SearchConfig::bitwise(32, Threshold::at_least(2)).unwrap();
//! let heavy_hitters = HeavyHitterSearch::new(config, ClearAggregator::new(32), &reports)
//!     .run()
//!     .unwrap();
//! assert_eq!(heavy_hitters.decode(&codec).unwrap(), vec![(b"foo".to_vec(), 2)]);
//! ```
//!
//! [BBCGI21]: https://eprint.iacr.org/2021/017
//! [draft-mouris-cfrg-mastic-01]: https://www.ietf.org/archive/id/draft-mouris-cfrg-mastic-01.html

mod aggregator;
mod codec;
mod error;
mod mastic;
mod prefix;
mod report;
mod search;

pub use aggregator::{ClearAggregator, PrefixAggregator};
pub use codec::Codec;
pub use error::Error;
pub use mastic::{MasticAggregator, MasticCount};
pub use prefix::{AggregationParam, CandidatePrefixes};
pub use report::{ErrorReport, NONCE_SIZE, Report, decode_error, encode_error};
pub use search::{HeavyHitterSearch, HeavyHitters, Round, SearchConfig, Threshold};
