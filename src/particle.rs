use std::f64::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Four-momentum in GeV
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(PartialEq, Debug, Copy, Clone, Default)]
pub struct FourMomentum {
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub e: f64,
}

impl FourMomentum {
    pub fn new(px: f64, py: f64, pz: f64, e: f64) -> Self {
        Self { px, py, pz, e }
    }

    /// Momentum of a particle with mass `m` from transverse momentum,
    /// rapidity and azimuthal angle
    pub fn from_pt_y_phi_m(pt: f64, y: f64, phi: f64, m: f64) -> Self {
        let mt = (pt * pt + m * m).sqrt();
        Self {
            px: pt * phi.cos(),
            py: pt * phi.sin(),
            pz: mt * y.sinh(),
            e: mt * y.cosh(),
        }
    }

    pub fn pt2(&self) -> f64 {
        self.px * self.px + self.py * self.py
    }

    /// Transverse momentum
    pub fn pt(&self) -> f64 {
        self.pt2().sqrt()
    }

    /// Pseudorapidity
    ///
    /// Infinite for momenta along the beam axis.
    pub fn eta(&self) -> f64 {
        let pt = self.pt();
        if pt == 0. {
            return match self.pz.partial_cmp(&0.) {
                Some(std::cmp::Ordering::Less) => f64::NEG_INFINITY,
                Some(std::cmp::Ordering::Greater) => f64::INFINITY,
                _ => 0.,
            };
        }
        (self.pz / pt).asinh()
    }

    /// Rapidity
    pub fn rap(&self) -> f64 {
        0.5 * ((self.e + self.pz) / (self.e - self.pz)).ln()
    }

    /// Azimuthal angle in (-π, π]
    pub fn phi(&self) -> f64 {
        normalise_phi(self.py.atan2(self.px))
    }
}

impl std::ops::Add for FourMomentum {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            px: self.px + rhs.px,
            py: self.py + rhs.py,
            pz: self.pz + rhs.pz,
            e: self.e + rhs.e,
        }
    }
}

/// Map an angle into (-π, π]
pub fn normalise_phi(phi: f64) -> f64 {
    if !phi.is_finite() {
        return phi;
    }
    let mut phi = phi % (2. * PI);
    if phi > PI {
        phi -= 2. * PI;
    } else if phi <= -PI {
        phi += 2. * PI;
    }
    phi
}

/// Particle produced by the collision simulator
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(PartialEq, Debug, Copy, Clone, Default)]
pub struct SimulatedParticle {
    /// Particle ID in the PDG numbering scheme
    pub id: i32,
    pub p: FourMomentum,
    /// Electric charge in units of the elementary charge
    pub charge: f64,
    /// Whether the particle is part of the final state
    pub final_state: bool,
    /// Whether the particle can interact with a detector
    pub visible: bool,
}

impl SimulatedParticle {
    pub fn pt(&self) -> f64 {
        self.p.pt()
    }

    pub fn eta(&self) -> f64 {
        self.p.eta()
    }

    pub fn is_charged(&self) -> bool {
        self.charge != 0.
    }
}
