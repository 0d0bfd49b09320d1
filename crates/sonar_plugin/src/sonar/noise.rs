//! Sensor noise models.

use rand::Rng;
use rand_distr::{Exp1, StandardNormal};

/// Zero-mean scalar Gaussian noise. A zero sigma is exactly noiseless and
/// draws nothing from the generator.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GaussianNoise {
  sigma: f64,
}

impl GaussianNoise {
  pub fn from_sigma(sigma: f64) -> Self {
    Self { sigma }
  }

  /// Build from the `*Sigma` / `*Cov` settings pair. Covariance wins when both
  /// are given.
  pub fn from_settings(sigma: Option<f64>, cov: Option<f64>) -> Self {
    match (sigma, cov) {
      (_, Some(cov)) => Self::from_sigma(cov.sqrt()),
      (Some(sigma), None) => Self::from_sigma(sigma),
      (None, None) => Self::default(),
    }
  }

  #[inline]
  pub fn sigma(&self) -> f64 {
    self.sigma
  }

  #[inline]
  pub fn is_enabled(&self) -> bool {
    self.sigma > 0.0
  }

  pub fn sample(&self, rng: &mut impl Rng) -> f64 {
    if !self.is_enabled() {
      return 0.0;
    }
    let z: f64 = rng.sample(StandardNormal);
    self.sigma * z
  }

  /// Magnitude of two independent samples.
  pub fn rayleigh(&self, rng: &mut impl Rng) -> f64 {
    if !self.is_enabled() {
      return 0.0;
    }
    let x = self.sample(rng);
    let y = self.sample(rng);
    x.hypot(y)
  }
}

/// Exponentially distributed range error: returns can only arrive late.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RangeNoise {
  scale: f64,
}

impl RangeNoise {
  pub fn new(scale: f64) -> Self {
    Self { scale }
  }

  #[inline]
  pub fn is_enabled(&self) -> bool {
    self.scale > 0.0
  }

  pub fn sample(&self, rng: &mut impl Rng) -> f64 {
    if !self.is_enabled() {
      return 0.0;
    }
    let e: f64 = rng.sample(Exp1);
    e * self.scale
  }

  /// Unnormalized density at `noise`: 1 at zero delay, falling off with scale.
  pub fn scaled_pdf(&self, noise: f64) -> f64 {
    if !self.is_enabled() {
      return 1.0;
    }
    (-noise / self.scale).exp()
  }
}

#[cfg(test)]
mod tests {
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  use super::*;

  #[test]
  fn test_disabled_noise_is_zero_and_draws_nothing() {
    let mut a = StdRng::seed_from_u64(7);
    let mut b = StdRng::seed_from_u64(7);

    let none = GaussianNoise::default();
    assert_eq!(none.sample(&mut a), 0.0);
    assert_eq!(none.rayleigh(&mut a), 0.0);
    assert_eq!(RangeNoise::default().sample(&mut a), 0.0);
    assert_eq!(RangeNoise::default().scaled_pdf(3.0), 1.0);

    assert_eq!(a.random::<u64>(), b.random::<u64>(), "generator must be untouched");
  }

  #[test]
  fn test_cov_overrides_sigma() {
    let noise = GaussianNoise::from_settings(Some(3.0), Some(4.0));
    assert_eq!(noise.sigma(), 2.0);
    assert_eq!(GaussianNoise::from_settings(Some(0.5), None).sigma(), 0.5);
    assert!(!GaussianNoise::from_settings(None, None).is_enabled());
  }

  #[test]
  fn test_gaussian_statistics() {
    let mut rng = StdRng::seed_from_u64(1);
    let noise = GaussianNoise::from_sigma(2.0);
    let n = 20_000;
    let samples: Vec<f64> = (0..n).map(|_| noise.sample(&mut rng)).collect();
    let mean = samples.iter().sum::<f64>() / n as f64;
    let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n as f64;
    assert!(mean.abs() < 0.1, "mean {mean}");
    assert!((var.sqrt() - 2.0).abs() < 0.1, "std {}", var.sqrt());
  }

  #[test]
  fn test_range_noise_is_non_negative_with_matching_mean() {
    let mut rng = StdRng::seed_from_u64(2);
    let noise = RangeNoise::new(0.05);
    let n = 20_000;
    let mut sum = 0.0;
    for _ in 0..n {
      let s = noise.sample(&mut rng);
      assert!(s >= 0.0);
      sum += s;
    }
    assert!((sum / n as f64 - 0.05).abs() < 0.005);
    assert!((noise.scaled_pdf(0.05) - (-1f64).exp()).abs() < 1e-12);
  }
}
