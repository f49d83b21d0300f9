//! Run configuration for event production
use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use thiserror::Error;

use crate::cluster::{AreaDefinition, JetDefinition, JetSelector};

/// Proton PDG ID
pub const PROTON: i32 = 2212;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("pTHatMax = {max} is smaller than pTHatMin = {min}")]
    InvertedPtHatWindow { min: f64, max: f64 },
    #[error("invalid value for pTHat: '{0}'")]
    InvalidPtHat(String),
}

/// Window in the transverse momentum of the hard process
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(PartialEq, Debug, Copy, Clone)]
pub struct PtHatWindow {
    min: f64,
    max: Option<f64>,
}

impl PtHatWindow {
    /// A window from `min` to `max`, unbounded if `max` is `None`
    pub fn new(min: f64, max: Option<f64>) -> Result<Self, ConfigError> {
        if !min.is_finite() {
            return Err(ConfigError::InvalidPtHat(min.to_string()));
        }
        if let Some(max) = max {
            if max.is_nan() {
                return Err(ConfigError::InvalidPtHat(max.to_string()));
            }
            if max < min {
                return Err(ConfigError::InvertedPtHatWindow { min, max });
            }
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }
}

impl Default for PtHatWindow {
    fn default() -> Self {
        Self { min: 30., max: Some(50.) }
    }
}

/// Parse the upper end of a pTHat window
///
/// `inf` in any capitalisation and negative values denote an open upper bound.
pub fn parse_pt_hat_max(s: &str) -> Result<Option<f64>, ConfigError> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("inf") {
        return Ok(None);
    }
    let max: f64 = fast_float::parse(s)
        .map_err(|_| ConfigError::InvalidPtHat(s.to_owned()))?;
    if max.is_nan() {
        return Err(ConfigError::InvalidPtHat(s.to_owned()));
    }
    if max < 0. || max.is_infinite() {
        Ok(None)
    } else {
        Ok(Some(max))
    }
}

/// Settings passed to the collision simulator
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(PartialEq, Debug, Copy, Clone)]
pub struct SimulatorConfig {
    /// PDG IDs of the two beams
    pub beams: [i32; 2],
    /// Centre-of-mass energy in GeV
    pub e_cm: f64,
    /// Enable all hard QCD 2 -> 2 processes
    pub hard_qcd: bool,
    pub pt_hat: PtHatWindow,
    /// Random number seed
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            beams: [PROTON, PROTON],
            e_cm: 200.,
            hard_qcd: true,
            pt_hat: PtHatWindow::default(),
            seed: 0,
        }
    }
}

/// Cuts on particles entering the jet clustering
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(PartialEq, Debug, Copy, Clone)]
pub struct ParticleSelector {
    /// Minimum transverse momentum in GeV
    pub pt_min: f64,
    /// Maximum absolute pseudorapidity
    pub abs_eta_max: f64,
}

impl Default for ParticleSelector {
    fn default() -> Self {
        Self { pt_min: 0.15, abs_eta_max: 1.5 }
    }
}

/// Everything needed to turn the particles of one event into a jet record
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(PartialEq, Debug, Copy, Clone)]
pub struct ProducerConfig {
    pub particles: ParticleSelector,
    pub jet_def: JetDefinition,
    pub area_def: AreaDefinition,
    /// Minimum jet transverse momentum in GeV
    pub jet_pt_min: f64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            particles: ParticleSelector::default(),
            jet_def: JetDefinition::default(),
            area_def: AreaDefinition::default(),
            jet_pt_min: 3.,
        }
    }
}

impl ProducerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum absolute jet pseudorapidity
    ///
    /// The full jet cone has to lie inside the particle acceptance.
    pub fn jet_eta_max(&self) -> f64 {
        self.particles.abs_eta_max - self.jet_def.radius
    }

    pub fn jet_selector(&self) -> JetSelector {
        JetSelector {
            pt_min: self.jet_pt_min,
            abs_eta_max: self.jet_eta_max(),
        }
    }
}

/// Name of the record file for a production run
///
/// An open pTHat window is written as 999.
pub fn output_file_name(pt_hat: &PtHatWindow, jet_radius: f64) -> PathBuf {
    let max = pt_hat.max().unwrap_or(999.);
    PathBuf::from(format!(
        "jets_ptHat_{:.0}_{:.0}_jetR{:.1}.jets",
        pt_hat.min(),
        max,
        jet_radius
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pt_hat_max() {
        assert_eq!(parse_pt_hat_max("inf"), Ok(None));
        assert_eq!(parse_pt_hat_max("Inf"), Ok(None));
        assert_eq!(parse_pt_hat_max("INF"), Ok(None));
        assert_eq!(parse_pt_hat_max("iNf"), Ok(None));
        assert_eq!(parse_pt_hat_max("-1"), Ok(None));
        assert_eq!(parse_pt_hat_max("50"), Ok(Some(50.)));
        assert_eq!(parse_pt_hat_max("42.5"), Ok(Some(42.5)));
        assert!(parse_pt_hat_max("fifty").is_err());
        assert!(parse_pt_hat_max("50GeV").is_err());
        assert!(parse_pt_hat_max("nan").is_err());
    }

    #[test]
    fn window() {
        assert!(PtHatWindow::new(30., Some(50.)).is_ok());
        assert!(PtHatWindow::new(30., None).is_ok());
        assert!(PtHatWindow::new(30., Some(30.)).is_ok());
        assert_eq!(
            PtHatWindow::new(50., Some(30.)),
            Err(ConfigError::InvertedPtHatWindow { min: 50., max: 30. })
        );
        assert!(PtHatWindow::new(f64::NAN, None).is_err());
    }

    #[test]
    fn file_name() {
        let r = ProducerConfig::new().jet_def.radius;
        let window = PtHatWindow::new(30., Some(50.)).unwrap();
        assert_eq!(
            output_file_name(&window, r),
            PathBuf::from("jets_ptHat_30_50_jetR0.4.jets")
        );
        let open = PtHatWindow::new(60., None).unwrap();
        assert_eq!(
            output_file_name(&open, r),
            PathBuf::from("jets_ptHat_60_999_jetR0.4.jets")
        );
    }

    #[test]
    fn default_cuts() {
        let config = ProducerConfig::new();
        assert_eq!(config.particles.pt_min, 0.15);
        assert_eq!(config.particles.abs_eta_max, 1.5);
        assert_eq!(config.jet_pt_min, 3.);
        let selector = config.jet_selector();
        assert!((selector.abs_eta_max - 1.1).abs() < 1e-12);
    }
}
