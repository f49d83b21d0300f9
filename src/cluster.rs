//! Jet clustering with active area estimation
use std::f64::consts::PI;
use std::fmt::{self, Display};
use std::str::FromStr;

use jetty::{anti_kt_f, cambridge_aachen_f, cluster_if, kt_f, PseudoJet};
use noisy_float::prelude::n64;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::data::Jet;
use crate::particle::{normalise_phi, FourMomentum};

/// Jet clustering algorithms
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub enum JetAlgorithm {
    /// The [anti-kt](https://arxiv.org/abs/0802.1189) algorithm
    #[default]
    AntiKt,
    /// The [Cambridge](https://arxiv.org/abs/hep-ph/9707323)/[Aachen](https://arxiv.org/abs/hep-ph/9907280) algorithm
    CambridgeAachen,
    /// The [kt](https://arxiv.org/abs/hep-ph/9305266) algorithm
    Kt,
}

#[derive(Debug, Clone, Error)]
#[error("Unknown jet algorithm: {0}")]
pub struct UnknownJetAlgorithm(String);

impl FromStr for JetAlgorithm {
    type Err = UnknownJetAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "anti_kt" | "antikt" | "anti-kt" => Ok(Self::AntiKt),
            "kt" => Ok(Self::Kt),
            "cambridge/aachen" | "cambridge-aachen" | "cambridge_aachen" | "ca" => {
                Ok(Self::CambridgeAachen)
            }
            _ => Err(UnknownJetAlgorithm(s.to_string())),
        }
    }
}

impl Display for JetAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AntiKt => "anti-kt",
            Self::CambridgeAachen => "Cambridge/Aachen",
            Self::Kt => "kt",
        };
        write!(f, "{name}")
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct JetDefinition {
    pub algorithm: JetAlgorithm,
    /// Jet radius parameter
    pub radius: f64,
}

impl Default for JetDefinition {
    fn default() -> Self {
        Self {
            algorithm: JetAlgorithm::AntiKt,
            radius: 0.4,
        }
    }
}

/// Active area from ghost particles
///
/// Ghosts are placed on a randomly jittered grid in rapidity and
/// azimuth, covering rapidities up to `ghost_max_rap`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AreaDefinition {
    /// Maximum absolute ghost rapidity
    pub ghost_max_rap: f64,
    /// Nominal area per ghost
    pub ghost_area: f64,
    /// Seed for the grid jitter
    pub seed: u64,
}

impl Default for AreaDefinition {
    fn default() -> Self {
        Self {
            ghost_max_rap: 2.5,
            ghost_area: 0.01,
            seed: 0,
        }
    }
}

/// Post-clustering jet selection
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct JetSelector {
    /// Minimum transverse momentum in GeV
    pub pt_min: f64,
    /// Maximum absolute pseudorapidity
    pub abs_eta_max: f64,
}

impl JetSelector {
    pub fn accepts(&self, jet: &ReconstructedJet) -> bool {
        jet.pt >= self.pt_min && jet.eta.abs() <= self.abs_eta_max
    }
}

/// Particle passed to the clustering
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ClusterInput {
    pub p: FourMomentum,
    /// Position in the full event record
    pub index: usize,
}

/// Jet returned by the clustering
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReconstructedJet {
    pub p: FourMomentum,
    pub pt: f64,
    pub eta: f64,
    /// Azimuthal angle in (-π, π]
    pub phi: f64,
    pub area: f64,
}

impl ReconstructedJet {
    pub fn new(p: FourMomentum, area: f64) -> Self {
        Self {
            p,
            pt: p.pt(),
            eta: p.eta(),
            phi: p.phi(),
            area,
        }
    }
}

impl From<&ReconstructedJet> for Jet {
    fn from(jet: &ReconstructedJet) -> Self {
        Self {
            pt: jet.pt,
            eta: jet.eta,
            phi: jet.phi,
            area: jet.area,
        }
    }
}

/// Interface to a jet clustering library
pub trait Clusterer {
    /// Cluster all `particles` into inclusive jets
    fn cluster(
        &self,
        particles: &[ClusterInput],
        jet_def: &JetDefinition,
        area_def: &AreaDefinition,
    ) -> Vec<ReconstructedJet>;
}

/// Energy of each ghost in GeV
const GHOST_ENERGY: f64 = 1e-8;
/// Fraction of a grid cell by which ghosts are displaced at random
const GRID_SCATTER: f64 = 1e-4;
/// Maximum distance between the same jet clustered with and without ghosts
const MATCH_DELTA_R: f64 = 1e-3;

/// Clustering with the `jetty` crate
///
/// The area of a jet is the number of ghosts it absorbs times the area
/// per ghost. Every ghost carries the same energy, so the ghost count
/// is the energy difference between the jet clustered with and without
/// ghosts.
#[derive(Copy, Clone, Debug, Default)]
pub struct JettyClusterer {}

impl JettyClusterer {
    pub fn new() -> Self {
        Self::default()
    }
}

fn to_pseudojet(p: &FourMomentum) -> PseudoJet {
    [p.e, p.px, p.py, p.pz].into()
}

fn to_momentum(jet: &PseudoJet) -> FourMomentum {
    FourMomentum::new(
        jet.px().raw(),
        jet.py().raw(),
        jet.pz().raw(),
        jet.e().raw(),
    )
}

fn cluster_with(
    partons: Vec<PseudoJet>,
    jet_def: &JetDefinition,
    min_e: f64,
) -> Vec<FourMomentum> {
    let min_e = n64(min_e);
    let cut = |jet: PseudoJet| jet.e() > min_e;
    let r = jet_def.radius;
    let jets = match jet_def.algorithm {
        JetAlgorithm::AntiKt => cluster_if(partons, &anti_kt_f(r), cut),
        JetAlgorithm::Kt => cluster_if(partons, &kt_f(r), cut),
        JetAlgorithm::CambridgeAachen => {
            cluster_if(partons, &cambridge_aachen_f(r), cut)
        }
    };
    jets.iter().map(to_momentum).collect()
}

/// Ghosts that can reach a jet together with the area covered by each of them
///
/// A ghost further than twice the jet radius from every particle ends up
/// in a pure ghost jet, so only cells near a particle are populated.
fn ghosts(
    particles: &[FourMomentum],
    jet_def: &JetDefinition,
    area_def: &AreaDefinition,
) -> (Vec<PseudoJet>, f64) {
    let cell = area_def.ghost_area.sqrt();
    let n_rap = ((2. * area_def.ghost_max_rap / cell).ceil() as usize).max(1);
    let n_phi = ((2. * PI / cell).ceil() as usize).max(1);
    let drap = 2. * area_def.ghost_max_rap / n_rap as f64;
    let dphi = 2. * PI / n_phi as f64;
    let reach = 2. * jet_def.radius + drap.hypot(dphi);
    let directions: Vec<_> = particles.iter().map(|p| (p.rap(), p.phi())).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(area_def.seed);
    let mut ghosts = Vec::new();
    for i in 0..n_rap {
        for j in 0..n_phi {
            let y = -area_def.ghost_max_rap
                + (i as f64 + 0.5 + GRID_SCATTER * rng.gen_range(-0.5..0.5)) * drap;
            let phi = (j as f64 + 0.5 + GRID_SCATTER * rng.gen_range(-0.5..0.5)) * dphi;
            let reachable = directions.iter().any(|(py, pphi)| {
                let dphi = normalise_phi(phi - pphi);
                (y - py).hypot(dphi) < reach
            });
            if !reachable {
                continue;
            }
            let pt = GHOST_ENERGY / y.cosh();
            let p = FourMomentum::from_pt_y_phi_m(pt, y, phi, 0.);
            ghosts.push(to_pseudojet(&p));
        }
    }
    (ghosts, drap * dphi)
}

fn delta_r2(a: &FourMomentum, b: &FourMomentum) -> f64 {
    let drap = a.rap() - b.rap();
    let dphi = normalise_phi(a.phi() - b.phi());
    drap * drap + dphi * dphi
}

impl Clusterer for JettyClusterer {
    fn cluster(
        &self,
        particles: &[ClusterInput],
        jet_def: &JetDefinition,
        area_def: &AreaDefinition,
    ) -> Vec<ReconstructedJet> {
        if particles.is_empty() {
            return Vec::new();
        }
        let momenta: Vec<_> = particles.iter().map(|p| p.p).collect();
        let partons: Vec<PseudoJet> = momenta.iter().map(to_pseudojet).collect();
        let (ghosts, cell_area) = ghosts(&momenta, jet_def, area_def);
        // pure ghost jets never exceed the total ghost energy
        let min_e = GHOST_ENERGY * (ghosts.len() + 1) as f64;

        let jets = cluster_with(partons.clone(), jet_def, min_e);
        let mut with_ghosts = partons;
        with_ghosts.extend(ghosts);
        let ghosted = cluster_with(with_ghosts, jet_def, min_e);

        jets.into_iter()
            .map(|p| {
                let matched = ghosted
                    .iter()
                    .map(|g| (g, delta_r2(&p, g)))
                    .filter(|(_, dr2)| *dr2 < MATCH_DELTA_R * MATCH_DELTA_R)
                    .min_by(|a, b| a.1.total_cmp(&b.1));
                let area = match matched {
                    Some((g, _)) => {
                        let n_ghosts = ((g.e - p.e) / GHOST_ENERGY).round();
                        n_ghosts.max(0.) * cell_area
                    }
                    None => 0.,
                };
                ReconstructedJet::new(p, area)
            })
            .collect()
    }
}
