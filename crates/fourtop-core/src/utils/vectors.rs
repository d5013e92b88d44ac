use std::{
    f64::consts::{PI, TAU},
    fmt::Display,
    iter::Sum,
};

use auto_ops::impl_op_ex;
use serde::{Deserialize, Serialize};

/// A three-vector with Cartesian components.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    /// The $`x`$-component.
    pub x: f64,
    /// The $`y`$-component.
    pub y: f64,
    /// The $`z`$-component.
    pub z: f64,
}

impl Vec3 {
    /// Create a new [`Vec3`] from its components.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Convert this three-momentum into a four-momentum with the given mass.
    pub fn with_mass(&self, mass: f64) -> Vec4 {
        let e = f64::sqrt(mass.powi(2) + self.mag2());
        Vec4::new(self.x, self.y, self.z, e)
    }

    /// The dot product with another [`Vec3`].
    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// The squared magnitude.
    pub fn mag2(&self) -> f64 {
        self.dot(self)
    }

    /// The magnitude of the transverse ($`xy`$-plane) projection.
    pub fn pt(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// The azimuthal angle in $`(-\pi, \pi]`$.
    pub fn phi(&self) -> f64 {
        self.y.atan2(self.x)
    }

    /// The pseudorapidity $`\eta = \sinh^{-1}(p_z / p_T)`$.
    ///
    /// Vectors along the beam axis have infinite pseudorapidity; the null vector is assigned
    /// $`\eta = 0`$.
    pub fn eta(&self) -> f64 {
        let pt = self.pt();
        if pt == 0.0 {
            if self.z == 0.0 {
                return 0.0;
            }
            return self.z.signum() * f64::INFINITY;
        }
        (self.z / pt).asinh()
    }
}

/// A four-vector $`(p_x, p_y, p_z, E)`$ with the energy stored last.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec4 {
    /// The $`x`$-component.
    pub x: f64,
    /// The $`y`$-component.
    pub y: f64,
    /// The $`z`$-component.
    pub z: f64,
    /// The time-like component.
    pub t: f64,
}

impl Vec4 {
    /// Create a new [`Vec4`] from its components.
    pub const fn new(px: f64, py: f64, pz: f64, e: f64) -> Self {
        Self {
            x: px,
            y: py,
            z: pz,
            t: e,
        }
    }

    /// Build a four-momentum from collider coordinates: transverse momentum, pseudorapidity,
    /// azimuth and mass.
    pub fn from_pt_eta_phi_m(pt: f64, eta: f64, phi: f64, mass: f64) -> Self {
        Vec3::new(pt * phi.cos(), pt * phi.sin(), pt * eta.sinh()).with_mass(mass)
    }

    /// The $`x`$ momentum component.
    pub fn px(&self) -> f64 {
        self.x
    }
    /// The $`y`$ momentum component.
    pub fn py(&self) -> f64 {
        self.y
    }
    /// The $`z`$ momentum component.
    pub fn pz(&self) -> f64 {
        self.z
    }
    /// The energy.
    pub fn e(&self) -> f64 {
        self.t
    }

    /// The spatial part of the four-vector.
    pub fn vec3(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// The transverse momentum.
    pub fn pt(&self) -> f64 {
        self.vec3().pt()
    }

    /// The pseudorapidity of the spatial part.
    pub fn eta(&self) -> f64 {
        self.vec3().eta()
    }

    /// The azimuthal angle of the spatial part.
    pub fn phi(&self) -> f64 {
        self.vec3().phi()
    }

    /// The squared invariant mass.
    pub fn m2(&self) -> f64 {
        self.t.powi(2) - self.vec3().mag2()
    }

    /// The invariant mass. Space-like vectors return a negative mass.
    pub fn m(&self) -> f64 {
        let m2 = self.m2();
        m2.signum() * m2.abs().sqrt()
    }

    /// A compact string of the form `[e, px, py, pz]`.
    pub fn to_p4_string(&self) -> String {
        format!("[e = {:.5}; p = ({:.5}, {:.5}, {:.5})]", self.t, self.x, self.y, self.z)
    }

    fn add(&self, other: &Self) -> Self {
        Self::new(
            self.x + other.x,
            self.y + other.y,
            self.z + other.z,
            self.t + other.t,
        )
    }
}

impl_op_ex!(+ |a: &Vec4, b: &Vec4| -> Vec4 { a.add(b) });

impl Sum for Vec4 {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |a, b| a + b)
    }
}

impl<'a> Sum<&'a Vec4> for Vec4 {
    fn sum<I: Iterator<Item = &'a Vec4>>(iter: I) -> Self {
        iter.fold(Self::default(), |a, b| a + b)
    }
}

impl Display for Vec4 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_p4_string())
    }
}

/// Wrap an azimuthal difference into $`[-\pi, \pi]`$.
pub fn wrap_phi(delta_phi: f64) -> f64 {
    let wrapped = delta_phi % TAU;
    if wrapped > PI {
        wrapped - TAU
    } else if wrapped < -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Anything with a direction in the detector's $`(\eta, \phi)`$ plane.
///
/// This is the only thing the jet-parton matcher needs to know about either side of the
/// assignment.
pub trait AngularPosition {
    /// Pseudorapidity.
    fn eta(&self) -> f64;
    /// Azimuthal angle.
    fn phi(&self) -> f64;

    /// The angular distance
    /// ```math
    /// \Delta R = \sqrt{\Delta\eta^2 + \Delta\phi^2}
    /// ```
    /// with $`\Delta\phi`$ wrapped into $`[-\pi, \pi]`$.
    fn delta_r<T: AngularPosition + ?Sized>(&self, other: &T) -> f64 {
        let deta = self.eta() - other.eta();
        let dphi = wrap_phi(self.phi() - other.phi());
        deta.hypot(dphi)
    }
}

impl<T: AngularPosition + ?Sized> AngularPosition for &T {
    fn eta(&self) -> f64 {
        (**self).eta()
    }
    fn phi(&self) -> f64 {
        (**self).phi()
    }
}

impl AngularPosition for Vec4 {
    fn eta(&self) -> f64 {
        Vec4::eta(self)
    }
    fn phi(&self) -> f64 {
        Vec4::phi(self)
    }
}

impl AngularPosition for Vec3 {
    fn eta(&self) -> f64 {
        Vec3::eta(self)
    }
    fn phi(&self) -> f64 {
        Vec3::phi(self)
    }
}

impl AngularPosition for (f64, f64) {
    fn eta(&self) -> f64 {
        self.0
    }
    fn phi(&self) -> f64 {
        self.1
    }
}
