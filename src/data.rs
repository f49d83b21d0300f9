use std::cmp::Ordering;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use thiserror::Error;

/// Maximum number of jets stored per event
pub const MAX_JETS: usize = 100;

/// A reconstructed jet as stored in the event record
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(PartialEq, Debug, Copy, Clone, Default)]
pub struct Jet {
    /// Transverse momentum in GeV
    pub pt: f64,
    /// Pseudorapidity
    pub eta: f64,
    /// Azimuthal angle in (-π, π]
    pub phi: f64,
    /// Active catchment area
    pub area: f64,
}

/// Jets of a single event, ordered by descending transverse momentum
///
/// The number of jets never exceeds [MAX_JETS].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(PartialEq, Debug, Clone, Default)]
pub struct JetRecord {
    jets: Vec<Jet>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("{0} jets exceed the capacity of {MAX_JETS} jets per event")]
    CapacityExceeded(usize),
    #[error("jet {0} has larger transverse momentum than its predecessor")]
    Unsorted(usize),
}

impl JetRecord {
    /// Record for an event without jets
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a record from jets that are already in descending pt order
    pub fn from_sorted(jets: Vec<Jet>) -> Result<Self, RecordError> {
        if jets.len() > MAX_JETS {
            return Err(RecordError::CapacityExceeded(jets.len()));
        }
        if let Some(pos) = jets.windows(2).position(|w| w[0].pt < w[1].pt) {
            return Err(RecordError::Unsorted(pos + 1));
        }
        Ok(Self { jets })
    }

    /// Sort jets by descending pt and keep at most [MAX_JETS] of them
    ///
    /// Returns the record together with the number of discarded jets.
    pub fn leading(mut jets: Vec<Jet>) -> (Self, usize) {
        jets.sort_by(|a, b| descending_pt(a, b));
        let dropped = jets.len().saturating_sub(MAX_JETS);
        jets.truncate(MAX_JETS);
        (Self { jets }, dropped)
    }

    pub fn n_jets(&self) -> usize {
        self.jets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jets.is_empty()
    }

    pub fn jets(&self) -> &[Jet] {
        &self.jets
    }

    /// The two leading jets, if the event has exactly two jets
    pub fn dijet(&self) -> Option<(&Jet, &Jet)> {
        match self.jets.as_slice() {
            [leading, subleading] => Some((leading, subleading)),
            _ => None,
        }
    }
}

// NaN sorts last so that it can never displace a proper leading jet
fn descending_pt(a: &Jet, b: &Jet) -> Ordering {
    match (a.pt.is_nan(), b.pt.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.pt.total_cmp(&a.pt),
    }
}

/// Generator run information
///
/// Written once per run, after the last event has been produced.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(PartialEq, Debug, Clone, Default)]
pub struct RunSummary {
    /// Number of requested event generation attempts
    pub n_events: u64,
    /// Generated cross section in mb
    pub sigma_gen_mb: f64,
    /// Statistical uncertainty of the generated cross section in mb
    pub sigma_err_mb: f64,
    /// Lower bound of the hard-process transverse momentum window in GeV
    pub pt_hat_min: f64,
    /// Upper bound of the hard-process transverse momentum window in GeV
    pub pt_hat_max: Option<f64>,
    /// Number of events written to the record
    pub n_accepted: u64,
    /// Number of attempts where the generator did not produce an event
    pub n_skipped: u64,
    /// Number of jets discarded because an event exceeded [MAX_JETS]
    pub n_jets_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jet(pt: f64) -> Jet {
        Jet { pt, ..Default::default() }
    }

    #[test]
    fn leading_sorts_descending() {
        let (record, dropped) = JetRecord::leading(vec![jet(5.), jet(40.), jet(12.)]);
        assert_eq!(dropped, 0);
        let pts: Vec<_> = record.jets().iter().map(|j| j.pt).collect();
        assert_eq!(pts, [40., 12., 5.]);
    }

    #[test]
    fn leading_truncates_to_capacity() {
        let jets = (0..150).map(|i| jet(3. + i as f64)).collect();
        let (record, dropped) = JetRecord::leading(jets);
        assert_eq!(record.n_jets(), MAX_JETS);
        assert_eq!(dropped, 50);
        assert_eq!(record.jets()[0].pt, 152.);
        assert_eq!(record.jets()[MAX_JETS - 1].pt, 53.);
        assert!(record.jets().windows(2).all(|w| w[0].pt >= w[1].pt));
    }

    #[test]
    fn from_sorted_validates() {
        assert!(JetRecord::from_sorted(vec![jet(40.), jet(40.), jet(3.)]).is_ok());
        assert_eq!(
            JetRecord::from_sorted(vec![jet(4.), jet(40.)]),
            Err(RecordError::Unsorted(1))
        );
        let too_many = vec![jet(1.); MAX_JETS + 1];
        assert_eq!(
            JetRecord::from_sorted(too_many),
            Err(RecordError::CapacityExceeded(MAX_JETS + 1))
        );
    }

    #[test]
    fn dijet_needs_exactly_two_jets() {
        assert!(JetRecord::empty().dijet().is_none());
        let (one, _) = JetRecord::leading(vec![jet(10.)]);
        assert!(one.dijet().is_none());
        let (two, _) = JetRecord::leading(vec![jet(10.), jet(20.)]);
        let (j0, j1) = two.dijet().unwrap();
        assert_eq!((j0.pt, j1.pt), (20., 10.));
        let (three, _) = JetRecord::leading(vec![jet(10.), jet(20.), jet(5.)]);
        assert!(three.dijet().is_none());
    }
}
