//! Superposition of profiles.

use nalgebra::Vector2;
use rustfft::num_complex::Complex64;

use super::{Profile, SurfaceBrightness};
use crate::error::{require_finite, ProfileError, Result};
use crate::params::GsParams;
use crate::photon::PhotonArray;
use crate::random::{BaseDeviate, BinomialDeviate};

#[derive(Debug, Clone)]
pub struct Sum {
    items: Vec<Profile>,
    flux: f64,
    step_k: f64,
    max_k: f64,
    centroid: Vector2<f64>,
    gsparams: GsParams,
}

impl Sum {
    /// Nested sums are flattened into one list.
    pub fn new(items: Vec<Profile>) -> Result<Self> {
        if items.is_empty() {
            return Err(ProfileError::invalid("items", "a sum needs at least one profile"));
        }
        let mut flat = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Profile::Sum(inner) => flat.extend(inner.items.iter().cloned()),
                other => flat.push(other),
            }
        }
        Ok(Self::from_flat(flat))
    }

    /// Components rescaled so that component `i` carries
    /// `total_flux * w_i / Σw` of the flux. Without an explicit total the
    /// components' own fluxes are summed and redistributed.
    pub fn weighted(parts: &[(f64, Profile)], total_flux: Option<f64>) -> Result<Self> {
        let total_flux = match total_flux {
            Some(total) => require_finite("total_flux", total)?,
            None => parts.iter().map(|(_, p)| p.flux()).sum(),
        };
        let mut weight_sum = 0.0;
        for (w, _) in parts {
            weight_sum += require_finite("weight", *w)?;
        }
        if weight_sum == 0.0 {
            return Err(ProfileError::invalid("weight", "weights must not sum to zero"));
        }
        let items = parts
            .iter()
            .map(|(w, p)| p.with_flux(total_flux * w / weight_sum))
            .collect::<Result<Vec<_>>>()?;
        Self::new(items)
    }

    pub(crate) fn from_pair(a: Profile, b: Profile) -> Self {
        let mut flat = Vec::with_capacity(2);
        for item in [a, b] {
            match item {
                Profile::Sum(inner) => flat.extend(inner.items.iter().cloned()),
                other => flat.push(other),
            }
        }
        Self::from_flat(flat)
    }

    fn from_flat(items: Vec<Profile>) -> Self {
        let flux: f64 = items.iter().map(Profile::flux).sum();
        let step_k = items.iter().map(Profile::step_k).fold(f64::INFINITY, f64::min);
        let max_k = items.iter().map(Profile::max_k).fold(0.0, f64::max);
        let centroid = if flux != 0.0 {
            items.iter().map(|p| p.flux() * p.centroid()).sum::<Vector2<f64>>() / flux
        } else {
            Vector2::zeros()
        };
        let gsparams = items
            .iter()
            .skip(1)
            .fold(items[0].gsparams().clone(), |acc, p| acc.strictest(p.gsparams()));
        Self {
            items,
            flux,
            step_k,
            max_k,
            centroid,
            gsparams,
        }
    }

    pub fn items(&self) -> &[Profile] {
        &self.items
    }
}

impl SurfaceBrightness for Sum {
    fn kind(&self) -> &'static str {
        "Sum"
    }

    fn x_value(&self, pos: &Vector2<f64>) -> f64 {
        self.items.iter().map(|p| p.xval(pos)).sum()
    }

    fn k_value(&self, k: &Vector2<f64>) -> Complex64 {
        self.items.iter().map(|p| p.kval(k)).sum()
    }

    fn flux(&self) -> f64 {
        self.flux
    }

    fn step_k(&self) -> f64 {
        self.step_k
    }

    fn max_k(&self) -> f64 {
        self.max_k
    }

    fn centroid(&self) -> Vector2<f64> {
        self.centroid
    }

    fn is_axisymmetric(&self) -> bool {
        self.items.iter().all(Profile::is_axisymmetric)
    }

    fn has_hard_edges(&self) -> bool {
        self.items.iter().any(Profile::has_hard_edges)
    }

    fn is_analytic_x(&self) -> bool {
        self.items.iter().all(Profile::is_analytic_x)
    }

    fn is_analytic_k(&self) -> bool {
        self.items.iter().all(Profile::is_analytic_k)
    }

    fn max_sb(&self) -> f64 {
        self.items.iter().map(|p| p.max_sb().abs()).sum()
    }

    /// Photons are split between the items by successive binomial draws
    /// weighted by `|flux|`, and every photon carries `±Σ|flux| / n`.
    fn shoot(&self, n: usize, rng: &mut BaseDeviate) -> Result<PhotonArray> {
        let mut photons = PhotonArray::with_capacity(n);
        let abs_total: f64 = self.items.iter().map(|p| p.flux().abs()).sum();
        if n == 0 || abs_total == 0.0 {
            return Ok(PhotonArray::new(n));
        }
        let each = abs_total / n as f64;
        let mut remaining = n as u64;
        let mut remaining_weight = abs_total;
        for (idx, item) in self.items.iter().enumerate() {
            let weight = item.flux().abs();
            let count = if idx + 1 == self.items.len() {
                remaining
            } else if remaining_weight > 0.0 && remaining > 0 {
                let p = (weight / remaining_weight).min(1.0);
                BinomialDeviate::new(remaining, p)?.sample(rng)
            } else {
                0
            };
            remaining -= count;
            remaining_weight -= weight;
            if count == 0 || weight == 0.0 {
                continue;
            }
            let mut part = item.shoot(count as usize, rng)?;
            part.scale_flux(count as f64 * each / weight);
            photons.append(&part);
        }
        photons.set_correlated(true);
        Ok(photons)
    }

    fn gsparams(&self) -> &GsParams {
        &self.gsparams
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Exponential, Gaussian};
    use approx::assert_relative_eq;

    fn parts() -> (Profile, Profile, Profile) {
        let a: Profile = Gaussian::with_sigma(1.0, 1.0).unwrap().into();
        let b: Profile = Gaussian::with_sigma(2.0, 0.5).unwrap().into();
        let c: Profile = Profile::from(Exponential::with_scale_radius(0.7, 2.0).unwrap()).shift(0.3, 0.0).unwrap();
        (a, b, c)
    }

    #[test]
    fn test_flattening() {
        let (a, b, c) = parts();
        let nested = Sum::new(vec![Sum::from_pair(a.clone(), b.clone()).into(), c.clone()]).unwrap();
        assert_eq!(nested.items().len(), 3);
        assert!(Sum::new(Vec::new()).is_err());
    }

    #[test]
    fn test_aggregates() {
        let (a, b, c) = parts();
        let sum = Sum::new(vec![a.clone(), b.clone(), c.clone()]).unwrap();
        assert_relative_eq!(sum.flux(), 3.5, epsilon = 1e-12);
        assert_relative_eq!(sum.step_k(), b.step_k().min(c.step_k()));
        assert_relative_eq!(sum.max_k(), a.max_k().max(c.max_k()));
        assert_relative_eq!(sum.centroid().x, 2.0 * 0.3 / 3.5, epsilon = 1e-12);
        let p = Vector2::new(0.2, -0.4);
        assert_relative_eq!(sum.x_value(&p), a.xval(&p) + b.xval(&p) + c.xval(&p), epsilon = 1e-15);
        assert!(!sum.is_axisymmetric());
    }

    #[test]
    fn test_weighted_components() {
        let (a, b, _) = parts();
        let sum = Sum::weighted(&[(3.0, a), (1.0, b)], Some(2.0)).unwrap();
        assert_relative_eq!(sum.items()[0].flux(), 1.5, epsilon = 1e-14);
        assert_relative_eq!(sum.items()[1].flux(), 0.5, epsilon = 1e-14);
        let (c, d, _) = parts();
        assert!(Sum::weighted(&[(1.0, c), (-1.0, d)], Some(1.0)).is_err());
    }

    #[test]
    fn test_weighted_keeps_natural_total() {
        // fluxes 1 and 0.5 are shared out 3:1
        let (a, b, _) = parts();
        let sum = Sum::weighted(&[(3.0, a), (1.0, b)], None).unwrap();
        assert_relative_eq!(sum.flux(), 1.5, epsilon = 1e-14);
        assert_relative_eq!(sum.items()[0].flux(), 1.125, epsilon = 1e-14);
        assert_relative_eq!(sum.items()[1].flux(), 0.375, epsilon = 1e-14);
    }

    #[test]
    fn test_shoot_splits_flux() {
        let (a, b, _) = parts();
        let negative = b.with_flux(-0.5).unwrap();
        let sum = Sum::new(vec![a, negative]).unwrap();
        let photons = sum.shoot(30_000, &mut BaseDeviate::new(2)).unwrap();
        assert!(photons.is_correlated());
        assert_eq!(photons.len(), 30_000);
        let pos = photons.flux().iter().filter(|f| **f > 0.0).count() as f64;
        // two thirds of |flux| is in the positive component
        assert_relative_eq!(pos / 30_000.0, 2.0 / 3.0, epsilon = 0.01);
        assert_relative_eq!(photons.total_flux(), 0.5, epsilon = 0.03);
    }
}
