//! Event, jet and dijet observables
use std::f64::consts::PI;
use std::io::BufRead;
use std::path::Path;

use tracing::{debug, info, trace};

use crate::data::JetRecord;
use crate::error::Error;
use crate::histogram::{write_histograms, Hist1D, HistogramError};
use crate::reader::Reader;
use crate::store::open_records;

/// Default input of the aggregator
pub const DEFAULT_INPUT: &str = "jets_ptHat_30_50_jetR0.4.jets";
/// Default histogram output file
pub const DEFAULT_OUTPUT: &str = "jet_histograms.xml";

/// Observables of a dijet event
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Dijet {
    /// `(pt0 - pt1) / (pt0 + pt1)`
    pub asymmetry: f64,
    /// `|phi0 - phi1|`, ranging up to 2π
    pub delta_phi: f64,
}

/// Dijet observables if the record contains exactly two jets
///
/// A vanishing pt sum results in a NaN asymmetry.
pub fn dijet_observables(record: &JetRecord) -> Option<Dijet> {
    let (leading, subleading) = record.dijet()?;
    Some(Dijet {
        asymmetry: (leading.pt - subleading.pt) / (leading.pt + subleading.pt),
        delta_phi: (leading.phi - subleading.phi).abs(),
    })
}

/// Histograms of all observables
#[derive(Debug, Clone, PartialEq)]
pub struct JetObservables {
    n_jets: Hist1D,
    pt: Hist1D,
    eta: Hist1D,
    phi: Hist1D,
    area: Hist1D,
    asymmetry: Hist1D,
    delta_phi: Hist1D,
    n_records: u64,
}

impl JetObservables {
    pub fn new() -> Result<Self, HistogramError> {
        Ok(Self {
            n_jets: Hist1D::new(
                "hNJetsPerEvent",
                "Number of jets per event;N_{jets};Counts",
                12,
                0.,
                12.,
            )?,
            pt: Hist1D::new("hJetPt", ";jet p_{T} (GeV/c);Counts", 100, 0., 100.)?,
            eta: Hist1D::new("hJetEta", ";jet #eta;Counts", 60, -3., 3.)?,
            phi: Hist1D::new("hJetPhi", ";jet #phi;Counts", 64, -PI, PI)?,
            area: Hist1D::new("hJetArea", ";jet area;Counts", 50, 0., 1.)?,
            asymmetry: Hist1D::new("hAsymmetry", ";Dijet asymmetry A_{J};Counts", 50, 0., 1.)?,
            delta_phi: Hist1D::new("hDeltaPhi", ";#Delta#phi;Counts", 200, 0., 2. * PI)?,
            n_records: 0,
        })
    }

    pub fn fill(&mut self, record: &JetRecord) {
        self.n_records += 1;
        self.n_jets.fill(record.n_jets() as f64);
        for jet in record.jets() {
            trace!("{jet:?}");
            self.pt.fill(jet.pt);
            self.eta.fill(jet.eta);
            self.phi.fill(jet.phi);
            self.area.fill(jet.area);
        }
        if let Some(dijet) = dijet_observables(record) {
            debug!("{dijet:?}");
            self.asymmetry.fill(dijet.asymmetry);
            self.delta_phi.fill(dijet.delta_phi);
        }
    }

    /// Number of records filled so far
    pub fn n_records(&self) -> u64 {
        self.n_records
    }

    pub fn n_jets(&self) -> &Hist1D {
        &self.n_jets
    }

    pub fn pt(&self) -> &Hist1D {
        &self.pt
    }

    pub fn eta(&self) -> &Hist1D {
        &self.eta
    }

    pub fn phi(&self) -> &Hist1D {
        &self.phi
    }

    pub fn area(&self) -> &Hist1D {
        &self.area
    }

    pub fn asymmetry(&self) -> &Hist1D {
        &self.asymmetry
    }

    pub fn delta_phi(&self) -> &Hist1D {
        &self.delta_phi
    }

    /// All histograms, in the order in which they are written
    pub fn histograms(&self) -> [&Hist1D; 7] {
        [
            &self.n_jets,
            &self.pt,
            &self.eta,
            &self.phi,
            &self.area,
            &self.asymmetry,
            &self.delta_phi,
        ]
    }
}

/// Fill the observables of all remaining records of `reader`
pub fn analyse<R: BufRead>(reader: &mut Reader<R>) -> Result<JetObservables, Error> {
    let mut observables = JetObservables::new()?;
    while let Some(record) = reader.record()? {
        observables.fill(&record);
    }
    Ok(observables)
}

/// Analyse a jet record file and write the histograms to `output`
///
/// If anything goes wrong, `output` is left untouched.
pub fn analyse_file<P, Q>(input: P, output: Q) -> Result<JetObservables, Error>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let mut reader = open_records(input)?;
    info!(
        "Total number of analyzed events: {}",
        reader.run_summary().n_events
    );
    let observables = analyse(&mut reader)?;
    info!("Read {} jet records", observables.n_records());
    let histograms: Vec<_> = observables.histograms().into_iter().cloned().collect();
    write_histograms(output, &histograms)?;
    Ok(observables)
}
