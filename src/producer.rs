//! From simulated particles to jet records
use tracing::{debug, info, trace, warn};

use crate::cluster::{ClusterInput, Clusterer};
use crate::config::{ParticleSelector, ProducerConfig, PtHatWindow};
use crate::data::{Jet, JetRecord, RunSummary, MAX_JETS};
use crate::error::Error;
use crate::particle::{normalise_phi, SimulatedParticle};
use crate::simulator::Simulator;

/// Result of a single event generation attempt
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Produced(JetRecord),
    /// The simulator did not produce an event
    Skipped,
}

/// Event counts of a production run
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Counters {
    pub n_attempts: u64,
    pub n_accepted: u64,
    pub n_skipped: u64,
    /// Jets discarded beyond [MAX_JETS]
    pub n_jets_dropped: u64,
}

/// Visible charged final-state particles inside the acceptance
pub fn select_particles(
    particles: &[SimulatedParticle],
    selector: &ParticleSelector,
) -> Vec<ClusterInput> {
    particles
        .iter()
        .enumerate()
        .filter(|(_, p)| p.final_state && p.visible && p.is_charged())
        .filter(|(_, p)| p.eta().abs() <= selector.abs_eta_max && p.pt() >= selector.pt_min)
        .map(|(index, p)| ClusterInput { p: p.p, index })
        .collect()
}

/// Turns simulated events into jet records
#[derive(Debug, Clone)]
pub struct EventProducer<C> {
    config: ProducerConfig,
    clusterer: C,
    counters: Counters,
}

impl<C: Clusterer> EventProducer<C> {
    pub fn new(config: ProducerConfig, clusterer: C) -> Self {
        Self {
            config,
            clusterer,
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Comment describing the jet reconstruction
    pub fn description(&self) -> String {
        let ProducerConfig {
            particles,
            jet_def,
            area_def,
            jet_pt_min,
        } = &self.config;
        format!(
            "{} jets with R = {}, active area with ghost area {} up to |y| = {}\n\
             charged particles with pT >= {} GeV and |eta| <= {}\n\
             jets with pT >= {} GeV and |eta| <= {}",
            jet_def.algorithm,
            jet_def.radius,
            area_def.ghost_area,
            area_def.ghost_max_rap,
            particles.pt_min,
            particles.abs_eta_max,
            jet_pt_min,
            self.config.jet_eta_max()
        )
    }

    /// Cluster the particles of one event into a record of accepted jets
    pub fn jets(&mut self, particles: &[SimulatedParticle]) -> JetRecord {
        let inputs = select_particles(particles, &self.config.particles);
        trace!("{} of {} particles selected", inputs.len(), particles.len());
        let selector = self.config.jet_selector();
        let jets: Vec<_> = self
            .clusterer
            .cluster(&inputs, &self.config.jet_def, &self.config.area_def)
            .iter()
            .filter(|jet| selector.accepts(jet))
            .map(|jet| Jet {
                phi: normalise_phi(jet.phi),
                ..Jet::from(jet)
            })
            .collect();
        let (record, dropped) = JetRecord::leading(jets);
        if dropped > 0 {
            warn!("Discarding {dropped} jets beyond the first {MAX_JETS}");
            self.counters.n_jets_dropped += dropped as u64;
        }
        for jet in record.jets() {
            trace!("{jet:?}");
        }
        record
    }

    /// Attempt to generate the next event
    pub fn produce_next<S: Simulator>(&mut self, simulator: &mut S) -> EventOutcome {
        self.counters.n_attempts += 1;
        if !simulator.next() {
            self.counters.n_skipped += 1;
            debug!("Skipping attempt {}", self.counters.n_attempts);
            return EventOutcome::Skipped;
        }
        let record = self.jets(simulator.particles());
        self.counters.n_accepted += 1;
        debug!(
            "Event {}: {} jets",
            self.counters.n_attempts,
            record.n_jets()
        );
        EventOutcome::Produced(record)
    }

    /// Make `n_events` attempts, passing each record to `emit`
    pub fn run<S, F>(&mut self, simulator: &mut S, n_events: u64, mut emit: F) -> Result<(), Error>
    where
        S: Simulator,
        F: FnMut(&JetRecord) -> Result<(), Error>,
    {
        for _ in 0..n_events {
            if let EventOutcome::Produced(record) = self.produce_next(simulator) {
                emit(&record)?;
            }
        }
        info!(
            "{} attempts, {} events, {} skipped",
            self.counters.n_attempts, self.counters.n_accepted, self.counters.n_skipped
        );
        Ok(())
    }

    /// Statistics of the run so far
    pub fn summary<S: Simulator>(&self, simulator: &S, pt_hat: &PtHatWindow) -> RunSummary {
        let summary = RunSummary {
            n_events: self.counters.n_attempts,
            sigma_gen_mb: simulator.sigma_gen(),
            sigma_err_mb: simulator.sigma_err(),
            pt_hat_min: pt_hat.min(),
            pt_hat_max: pt_hat.max(),
            n_accepted: self.counters.n_accepted,
            n_skipped: self.counters.n_skipped,
            n_jets_dropped: self.counters.n_jets_dropped,
        };
        info!(
            "sigmaGen = {} +- {} mb",
            summary.sigma_gen_mb, summary.sigma_err_mb
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::f64::consts::PI;

    use super::*;
    use crate::cluster::{AreaDefinition, JetDefinition, JettyClusterer, ReconstructedJet};
    use crate::config::SimulatorConfig;
    use crate::particle::FourMomentum;
    use crate::simulator::ToyGenerator;

    /// Replays a fixed list of events, `None` marks a failed attempt
    struct Replay {
        events: VecDeque<Option<Vec<SimulatedParticle>>>,
        current: Vec<SimulatedParticle>,
    }

    impl Replay {
        fn new(events: Vec<Option<Vec<SimulatedParticle>>>) -> Self {
            Self {
                events: events.into(),
                current: Vec::new(),
            }
        }
    }

    impl Simulator for Replay {
        fn init(&mut self) -> Result<(), Error> {
            Ok(())
        }

        fn next(&mut self) -> bool {
            match self.events.pop_front().flatten() {
                Some(event) => {
                    self.current = event;
                    true
                }
                None => {
                    self.current.clear();
                    false
                }
            }
        }

        fn particles(&self) -> &[SimulatedParticle] {
            &self.current
        }

        fn sigma_gen(&self) -> f64 {
            0.5
        }

        fn sigma_err(&self) -> f64 {
            0.05
        }
    }

    /// Turns every particle into its own jet
    struct OneJetPerParticle;

    impl Clusterer for OneJetPerParticle {
        fn cluster(
            &self,
            particles: &[ClusterInput],
            _jet_def: &JetDefinition,
            _area_def: &AreaDefinition,
        ) -> Vec<ReconstructedJet> {
            particles
                .iter()
                .map(|p| ReconstructedJet::new(p.p, 0.5))
                .collect()
        }
    }

    fn pion(pt: f64, eta: f64, phi: f64) -> SimulatedParticle {
        SimulatedParticle {
            id: 211,
            p: FourMomentum::from_pt_y_phi_m(pt, eta, phi, 0.),
            charge: 1.,
            final_state: true,
            visible: true,
        }
    }

    fn producer() -> EventProducer<OneJetPerParticle> {
        EventProducer::new(ProducerConfig::default(), OneJetPerParticle)
    }

    #[test]
    fn particle_selection() {
        let neutral = SimulatedParticle {
            charge: 0.,
            ..pion(5., 0., 0.)
        };
        let invisible = SimulatedParticle {
            visible: false,
            ..pion(5., 0., 0.)
        };
        let beam = SimulatedParticle {
            final_state: false,
            ..pion(5., 0., 0.)
        };
        let particles = [
            pion(5., 0., 0.),
            neutral,
            invisible,
            beam,
            pion(0.1, 0., 0.),
            pion(5., 1.6, 0.),
            pion(5., -1.4, 0.),
        ];
        let selected = select_particles(&particles, &ParticleSelector::default());
        let indices: Vec<_> = selected.iter().map(|p| p.index).collect();
        assert_eq!(indices, [0, 6]);
    }

    #[test]
    fn sorted_fiducial_jets() {
        let particles = [
            pion(5., 0.2, 1.),
            pion(30., -0.5, 3.),
            // outside the jet acceptance |eta| <= 1.1
            pion(50., 1.2, 0.),
            // below the jet pt cut
            pion(2., 0., 0.),
            pion(12., 1.05, -3.),
        ];
        let record = producer().jets(&particles);
        let pts: Vec<_> = record.jets().iter().map(|j| j.pt).collect();
        assert_eq!(pts.len(), 3);
        assert!(pts.windows(2).all(|w| w[0] >= w[1]));
        for jet in record.jets() {
            assert!(jet.eta.abs() <= 1.1 + 1e-12);
            assert!(jet.phi > -PI && jet.phi <= PI);
        }
    }

    #[test]
    fn truncation() {
        let particles: Vec<_> = (0..150)
            .map(|i| pion(4. + i as f64, 0., -3. + 0.04 * i as f64))
            .collect();
        let mut producer = producer();
        let record = producer.jets(&particles);
        assert_eq!(record.n_jets(), MAX_JETS);
        assert!((record.jets()[0].pt - 153.).abs() < 1e-9);
        assert!((record.jets()[99].pt - 54.).abs() < 1e-9);
        assert_eq!(producer.counters().n_jets_dropped, 50);
    }

    #[test]
    fn skipped_events() {
        let events = vec![
            Some(vec![pion(10., 0., 0.), pion(8., 0.5, 2.)]),
            None,
            Some(vec![]),
            None,
        ];
        let mut simulator = Replay::new(events);
        let mut producer = producer();
        let mut records = Vec::new();
        producer
            .run(&mut simulator, 5, |record| {
                records.push(record.clone());
                Ok(())
            })
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].n_jets(), 2);
        assert!(records[1].is_empty());

        let window = PtHatWindow::new(30., None).unwrap();
        let summary = producer.summary(&simulator, &window);
        assert_eq!(summary.n_events, 5);
        assert_eq!(summary.n_accepted, 2);
        assert_eq!(summary.n_skipped, 3);
        assert_eq!(summary.pt_hat_max, None);
        assert_eq!(summary.sigma_gen_mb, 0.5);
    }

    #[test]
    fn emit_errors_abort() {
        let mut simulator = Replay::new(vec![Some(vec![]), Some(vec![])]);
        let mut producer = producer();
        let res = producer.run(&mut simulator, 2, |_| Err(Error::Xml("full".to_owned())));
        assert!(res.is_err());
        assert_eq!(producer.counters().n_attempts, 1);
    }

    #[test]
    fn toy_events() {
        let mut config = ProducerConfig::default();
        // coarse ghosts keep the test fast
        config.area_def.ghost_area = 0.1;
        let mut producer = EventProducer::new(config, JettyClusterer::new());
        let mut simulator = ToyGenerator::new(SimulatorConfig {
            pt_hat: PtHatWindow::new(10., Some(20.)).unwrap(),
            seed: 3,
            ..Default::default()
        });
        simulator.init().unwrap();
        let mut records = Vec::new();
        producer
            .run(&mut simulator, 40, |record| {
                records.push(record.clone());
                Ok(())
            })
            .unwrap();
        assert_eq!(records.len() as u64, producer.counters().n_accepted);
        assert!(!records.is_empty());
        let eta_max = producer.config().jet_eta_max();
        for record in &records {
            assert!(record.n_jets() <= MAX_JETS);
            assert!(record.jets().windows(2).all(|w| w[0].pt >= w[1].pt));
            for jet in record.jets() {
                assert!(jet.pt >= 3.);
                assert!(jet.eta.abs() <= eta_max + 1e-12);
                assert!(jet.phi > -PI && jet.phi <= PI);
                assert!(jet.area >= 0.);
            }
        }
    }
}
