//! Interface to collision event generators
use std::f64::consts::PI;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::config::{SimulatorConfig, PROTON};
use crate::error::Error;
use crate::particle::{FourMomentum, SimulatedParticle};

/// A collision event generator
pub trait Simulator {
    /// Prepare the generator for event production
    fn init(&mut self) -> Result<(), Error>;

    /// Generate the next event
    ///
    /// Returns `false` if no event could be generated. Such an attempt
    /// should be skipped.
    fn next(&mut self) -> bool;

    /// Particles of the most recently generated event
    fn particles(&self) -> &[SimulatedParticle];

    /// Estimated cross section of the generated events in mb
    fn sigma_gen(&self) -> f64;

    /// Statistical uncertainty of the cross section estimate in mb
    fn sigma_err(&self) -> f64;
}

const GLUON: i32 = 21;
const PI_PLUS: i32 = 211;
const PHOTON: i32 = 22;
const NU_E: i32 = 12;
const PION_MASS: f64 = 0.13957;

/// Normalisation of the toy pTHat spectrum in mb GeV^4
const SPECTRUM_NORM: f64 = 40.;
/// Power of the falling pTHat spectrum
const SPECTRUM_POWER: i32 = 5;
/// Power of the (1 - x_T) suppression used for unweighting
const X_T_POWER: i32 = 6;
/// Smallest supported lower pTHat bound in GeV
const MIN_PT_HAT: f64 = 1.;

/// Toy dijet generator
///
/// Produces back-to-back partons with a steeply falling transverse
/// momentum spectrum, fragments them into collimated sprays of pions
/// and photons, and adds a soft underlying event. Attempts are
/// accepted with a probability that falls towards the kinematic limit,
/// so some attempts fail.
#[derive(Debug, Clone)]
pub struct ToyGenerator {
    config: SimulatorConfig,
    rng: ChaCha8Rng,
    pt_hat_max: f64,
    spectrum_integral: f64,
    particles: Vec<SimulatedParticle>,
    n_tried: u64,
    n_accepted: u64,
}

impl ToyGenerator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            pt_hat_max: 0.,
            spectrum_integral: 0.,
            particles: Vec::new(),
            n_tried: 0,
            n_accepted: 0,
        }
    }

    fn sample_pt_hat(&mut self) -> f64 {
        // inverse transform of pt^-n between the window bounds
        let k = 1 - SPECTRUM_POWER;
        let lo = self.config.pt_hat.min().powi(k);
        let hi = self.pt_hat_max.powi(k);
        let u: f64 = self.rng.gen();
        (lo + u * (hi - lo)).powf(1. / k as f64)
    }

    fn fragment(&mut self, parton: FourMomentum) {
        let total_pt = parton.pt();
        let y0 = parton.rap();
        let phi0 = parton.phi();
        let n_hadrons = 2 + (total_pt / 3.).sqrt().ceil() as usize + self.rng.gen_range(0..3);
        let weights: Vec<f64> = (0..n_hadrons).map(|_| self.rng.gen::<f64>() + 0.05).collect();
        let norm: f64 = weights.iter().sum();
        for z in weights.into_iter().map(|w| w / norm) {
            let spread = 0.25 * self.rng.gen::<f64>().sqrt();
            let angle = self.rng.gen_range(0. ..2. * PI);
            let y = y0 + spread * angle.cos();
            let phi = phi0 + spread * angle.sin();
            let pt = z * total_pt;
            let kind: f64 = self.rng.gen();
            let particle = if kind < 0.65 {
                let charge = if self.rng.gen_bool(0.5) { 1. } else { -1. };
                SimulatedParticle {
                    id: charge as i32 * PI_PLUS,
                    p: FourMomentum::from_pt_y_phi_m(pt, y, phi, PION_MASS),
                    charge,
                    final_state: true,
                    visible: true,
                }
            } else if kind < 0.97 {
                SimulatedParticle {
                    id: PHOTON,
                    p: FourMomentum::from_pt_y_phi_m(pt, y, phi, 0.),
                    charge: 0.,
                    final_state: true,
                    visible: true,
                }
            } else {
                SimulatedParticle {
                    id: NU_E,
                    p: FourMomentum::from_pt_y_phi_m(pt, y, phi, 0.),
                    charge: 0.,
                    final_state: true,
                    visible: false,
                }
            };
            self.particles.push(particle);
        }
    }

    fn underlying_event(&mut self) {
        let n = self.rng.gen_range(10..40);
        for _ in 0..n {
            let pt = -0.4 * (1. - self.rng.gen::<f64>()).ln();
            let y = self.rng.gen_range(-4. ..4.);
            let phi = self.rng.gen_range(-PI..PI);
            let charge = match self.rng.gen_range(0..3) {
                0 => 1.,
                1 => -1.,
                _ => 0.,
            };
            let (id, m) = if charge == 0. {
                (PHOTON, 0.)
            } else {
                (charge as i32 * PI_PLUS, PION_MASS)
            };
            self.particles.push(SimulatedParticle {
                id,
                p: FourMomentum::from_pt_y_phi_m(pt, y, phi, m),
                charge,
                final_state: true,
                visible: true,
            });
        }
    }

    fn beams(&mut self) {
        let e = 0.5 * self.config.e_cm;
        for (beam, pz) in self.config.beams.iter().zip([e, -e]) {
            self.particles.push(SimulatedParticle {
                id: *beam,
                p: FourMomentum::new(0., 0., pz, e),
                charge: 1.,
                final_state: false,
                visible: true,
            });
        }
    }
}

impl Simulator for ToyGenerator {
    fn init(&mut self) -> Result<(), Error> {
        use crate::error::Error::SimulatorInit;
        let config = &self.config;
        if config.beams != [PROTON, PROTON] {
            return Err(SimulatorInit(format!(
                "unsupported beams {} {}",
                config.beams[0], config.beams[1]
            )));
        }
        if !config.hard_qcd {
            return Err(SimulatorInit("no processes switched on".to_owned()));
        }
        let kinematic_limit = 0.5 * config.e_cm;
        let min = config.pt_hat.min();
        if min < MIN_PT_HAT {
            return Err(SimulatorInit(format!(
                "pTHatMin = {min} GeV is below {MIN_PT_HAT} GeV"
            )));
        }
        if min >= kinematic_limit {
            return Err(SimulatorInit(format!(
                "pTHatMin = {min} GeV is beyond the kinematic limit of {kinematic_limit} GeV"
            )));
        }
        self.pt_hat_max = config.pt_hat.max().unwrap_or(kinematic_limit).min(kinematic_limit);
        let k = (SPECTRUM_POWER - 1) as f64;
        self.spectrum_integral = SPECTRUM_NORM / k * (min.powf(-k) - self.pt_hat_max.powf(-k));
        self.rng = ChaCha8Rng::seed_from_u64(config.seed);
        self.n_tried = 0;
        self.n_accepted = 0;
        info!(
            "Toy generator: {} on {} at {} GeV, {} < pTHat < {} GeV",
            self.config.beams[0], self.config.beams[1], self.config.e_cm, min, self.pt_hat_max
        );
        Ok(())
    }

    fn next(&mut self) -> bool {
        self.particles.clear();
        self.n_tried += 1;
        let pt_hat = self.sample_pt_hat();
        let x_t = 2. * pt_hat / self.config.e_cm;
        let acceptance = (1. - x_t).max(0.).powi(X_T_POWER);
        if !self.rng.gen_bool(acceptance) {
            debug!("Rejected attempt {} with pTHat = {pt_hat}", self.n_tried);
            return false;
        }
        self.n_accepted += 1;

        self.beams();
        let phi = self.rng.gen_range(-PI..PI);
        let rapidities = [self.rng.gen_range(-2. ..2.), self.rng.gen_range(-2. ..2.)];
        for (y, phi) in rapidities.into_iter().zip([phi, phi + PI]) {
            let parton = FourMomentum::from_pt_y_phi_m(pt_hat, y, phi, 0.);
            self.particles.push(SimulatedParticle {
                id: GLUON,
                p: parton,
                charge: 0.,
                final_state: false,
                visible: true,
            });
            self.fragment(parton);
        }
        self.underlying_event();
        true
    }

    fn particles(&self) -> &[SimulatedParticle] {
        &self.particles
    }

    fn sigma_gen(&self) -> f64 {
        if self.n_tried == 0 {
            return 0.;
        }
        self.spectrum_integral * self.n_accepted as f64 / self.n_tried as f64
    }

    fn sigma_err(&self) -> f64 {
        if self.n_tried == 0 {
            return 0.;
        }
        let n = self.n_tried as f64;
        let p = self.n_accepted as f64 / n;
        self.spectrum_integral * (p * (1. - p) / n).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PtHatWindow;

    fn config(min: f64, max: Option<f64>) -> SimulatorConfig {
        SimulatorConfig {
            pt_hat: PtHatWindow::new(min, max).unwrap(),
            seed: 17,
            ..Default::default()
        }
    }

    #[test]
    fn init_failures() {
        assert!(ToyGenerator::new(config(30., Some(50.))).init().is_ok());
        assert!(ToyGenerator::new(config(30., None)).init().is_ok());
        assert!(ToyGenerator::new(config(0., Some(50.))).init().is_err());
        assert!(ToyGenerator::new(config(100., None)).init().is_err());
        let mut no_qcd = config(30., Some(50.));
        no_qcd.hard_qcd = false;
        assert!(ToyGenerator::new(no_qcd).init().is_err());
    }

    #[test]
    fn events() {
        let mut generator = ToyGenerator::new(config(10., Some(20.)));
        generator.init().unwrap();
        let mut produced = 0;
        for _ in 0..200 {
            if !generator.next() {
                assert!(generator.particles().is_empty());
                continue;
            }
            produced += 1;
            let particles = generator.particles();
            assert!(particles.iter().any(|p| !p.final_state));
            assert!(particles.iter().any(|p| p.final_state && p.is_charged()));
            for p in particles {
                let p2 = p.p.pt2() + p.p.pz * p.p.pz;
                assert!(p.p.e * p.p.e >= p2 * (1. - 1e-12));
            }
            let partons: Vec<_> = particles.iter().filter(|p| p.id == GLUON).collect();
            assert_eq!(partons.len(), 2);
            for parton in partons {
                assert!(parton.pt() >= 10. - 1e-9 && parton.pt() <= 20. + 1e-9);
            }
        }
        assert!(produced > 0 && produced < 200);
        assert!(generator.sigma_gen() > 0.);
        assert!(generator.sigma_err() > 0.);
        assert!(generator.sigma_err() < generator.sigma_gen());
    }

    #[test]
    fn reproducible() {
        let mut a = ToyGenerator::new(config(30., Some(50.)));
        let mut b = ToyGenerator::new(config(30., Some(50.)));
        a.init().unwrap();
        b.init().unwrap();
        for _ in 0..20 {
            assert_eq!(a.next(), b.next());
            assert_eq!(a.particles(), b.particles());
        }
        assert_eq!(a.sigma_gen(), b.sigma_gen());
    }
}
