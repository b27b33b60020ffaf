use super::WorkGenerator;
use primserve_core::{Error, Result, config::ParamStore, protocol::Primary};
use rand::{Rng, rngs::StdRng};

/// Box gun settings, read from the `BoxGun.*` parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxGunParams {
    /// PDG code of every particle (`BoxGun.pdg`).
    pub pdg: i32,
    /// Particles per event (`BoxGun.number`).
    pub number: u32,
    /// Momentum range in GeV (`BoxGun.p.min`, `BoxGun.p.max`).
    pub p: (f64, f64),
    /// Pseudorapidity range (`BoxGun.eta.min`, `BoxGun.eta.max`).
    pub eta: (f64, f64),
    /// Azimuth range in degrees (`BoxGun.phi.min`, `BoxGun.phi.max`).
    pub phi: (f64, f64),
}

impl Default for BoxGunParams {
    fn default() -> Self {
        Self {
            pdg: 211,
            number: 10,
            p: (0.1, 5.0),
            eta: (-1.0, 1.0),
            phi: (0.0, 360.0),
        }
    }
}

impl BoxGunParams {
    /// Reads the parameters, keeping defaults for keys that are not set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for unparsable values, inverted or
    /// non-finite ranges, negative momenta and unknown particle codes.
    pub fn from_params(params: &ParamStore) -> Result<Self> {
        let d = Self::default();
        let parsed = Self {
            pdg: params.get_or("BoxGun.pdg", d.pdg)?,
            number: params.get_or("BoxGun.number", d.number)?,
            p: range(params, "BoxGun.p", d.p)?,
            eta: range(params, "BoxGun.eta", d.eta)?,
            phi: range(params, "BoxGun.phi", d.phi)?,
        };
        if parsed.p.0 < 0.0 {
            return Err(Error::InvalidConfig {
                reason: format!("BoxGun.p.min must not be negative, got {}", parsed.p.0),
            });
        }
        mass_of(parsed.pdg)?;
        Ok(parsed)
    }
}

fn range(params: &ParamStore, prefix: &str, default: (f64, f64)) -> Result<(f64, f64)> {
    let min = params.get_or(&format!("{prefix}.min"), default.0)?;
    let max = params.get_or(&format!("{prefix}.max"), default.1)?;
    if !(min.is_finite() && max.is_finite()) || min > max {
        return Err(Error::InvalidConfig {
            reason: format!("{prefix} range [{min}, {max}] is invalid"),
        });
    }
    Ok((min, max))
}

/// Rest mass in GeV of the particles the box gun can shoot.
fn mass_of(pdg: i32) -> Result<f64> {
    let mass = match pdg.abs() {
        11 => 0.000_510_999,
        13 => 0.105_658,
        22 => 0.0,
        111 => 0.134_977,
        211 => 0.139_570,
        321 => 0.493_677,
        2112 => 0.939_565,
        2212 => 0.938_272,
        _ => {
            return Err(Error::InvalidConfig {
                reason: format!("BoxGun.pdg {pdg} is not a supported particle"),
            });
        }
    };
    Ok(mass)
}

/// Shoots a fixed number of identical particles per event, uniform in
/// momentum, pseudorapidity and azimuth, from the origin at `t = 0`.
#[derive(Debug, Clone)]
pub struct BoxGun {
    params: BoxGunParams,
    mass: f64,
}

impl BoxGun {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for unsupported particle codes.
    pub fn new(params: BoxGunParams) -> Result<Self> {
        Ok(Self {
            mass: mass_of(params.pdg)?,
            params,
        })
    }

    pub fn params(&self) -> &BoxGunParams {
        &self.params
    }

    fn shoot(&self, rng: &mut StdRng) -> Primary {
        let BoxGunParams { p, eta, phi, .. } = self.params;
        let p = rng.random_range(p.0..=p.1);
        let eta = rng.random_range(eta.0..=eta.1);
        let phi = rng.random_range(phi.0..=phi.1).to_radians();

        let theta = 2.0 * (-eta).exp().atan();
        let pt = p * theta.sin();
        Primary {
            pdg: self.params.pdg,
            px: pt * phi.cos(),
            py: pt * phi.sin(),
            pz: p * theta.cos(),
            e: p.hypot(self.mass),
            ..Primary::default()
        }
    }
}

impl WorkGenerator for BoxGun {
    fn generate(&mut self, rng: &mut StdRng) -> Result<Vec<Primary>> {
        Ok((0..self.params.number).map(|_| self.shoot(rng)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn reads_overrides_and_keeps_defaults() {
        let mut params = ParamStore::new();
        params
            .update_from_string("BoxGun.pdg=13;BoxGun.number=3;BoxGun.eta.min=-0.5")
            .unwrap();
        let parsed = BoxGunParams::from_params(&params).unwrap();
        assert_eq!(parsed.pdg, 13);
        assert_eq!(parsed.number, 3);
        assert_eq!(parsed.eta, (-0.5, 1.0));
        assert_eq!(parsed.p, BoxGunParams::default().p);
    }

    #[test]
    fn rejects_bad_settings() {
        for overrides in [
            "BoxGun.pdg=99999",
            "BoxGun.eta.min=2;BoxGun.eta.max=1",
            "BoxGun.p.min=-1",
            "BoxGun.number=-4",
        ] {
            let mut params = ParamStore::new();
            params.update_from_string(overrides).unwrap();
            assert!(
                BoxGunParams::from_params(&params).is_err(),
                "{overrides} should be rejected"
            );
        }
    }

    #[test]
    fn particles_stay_inside_the_box() {
        let params = BoxGunParams {
            number: 200,
            p: (1.0, 2.0),
            eta: (-0.8, 0.8),
            ..BoxGunParams::default()
        };
        let mut generator = BoxGun::new(params).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let primaries = generator.generate(&mut rng).unwrap();

        assert_eq!(primaries.len(), 200);
        for p in &primaries {
            assert_eq!(p.pdg, 211);
            assert!((1.0 - 1e-9..=2.0 + 1e-9).contains(&p.p()));
            let eta = (p.pz / p.pt()).asinh();
            assert!((-0.8 - 1e-9..=0.8 + 1e-9).contains(&eta));
            assert!(p.e > p.p());
        }
    }

    #[test]
    fn same_seed_same_event() {
        let mut generator = BoxGun::new(BoxGunParams::default()).unwrap();
        let a = generator.generate(&mut StdRng::seed_from_u64(9)).unwrap();
        let b = generator.generate(&mut StdRng::seed_from_u64(9)).unwrap();
        let c = generator.generate(&mut StdRng::seed_from_u64(10)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
