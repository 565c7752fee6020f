//! Numerical accuracy settings shared by profiles and renderers.

use serde::{Deserialize, Serialize};

use crate::error::{ProfileError, Result};

/// Accuracy and sizing knobs for profile evaluation and rendering.
///
/// Every atomic profile carries its own copy; composites combine their
/// children's settings with [`GsParams::strictest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GsParams {
    /// Fraction of flux allowed to fold back into the image from outside
    /// the real-space period `2π/stepK`
    pub folding_threshold: f64,
    /// Relative |kValue| below which Fourier power is treated as negligible
    pub maxk_threshold: f64,
    /// Real-space period always spans at least this many half-light radii
    pub stepk_minimum_hlr: f64,
    /// Target accuracy of tabulated kValues, relative to flux
    pub kvalue_accuracy: f64,
    /// Target accuracy of tabulated xValues, relative to peak
    pub xvalue_accuracy: f64,
    /// Relative tolerance of real-space convolution quadrature
    pub realspace_relerr: f64,
    /// Absolute tolerance of real-space convolution quadrature, relative to flux
    pub realspace_abserr: f64,
    /// Flux fraction a photon sampler may lose beyond its outer radius
    pub shoot_accuracy: f64,
    /// Smallest FFT grid the renderer allocates
    pub minimum_fft_size: usize,
    /// Largest FFT grid before the renderer clamps (and warns)
    pub maximum_fft_size: usize,
    /// Promote accuracy shortfalls from warnings to errors
    pub strict: bool,
}

impl Default for GsParams {
    fn default() -> Self {
        Self {
            folding_threshold: 5e-3,
            maxk_threshold: 1e-3,
            stepk_minimum_hlr: 5.0,
            kvalue_accuracy: 1e-5,
            xvalue_accuracy: 1e-5,
            realspace_relerr: 1e-4,
            realspace_abserr: 1e-6,
            shoot_accuracy: 1e-5,
            minimum_fft_size: 128,
            maximum_fft_size: 8192,
            strict: false,
        }
    }
}

impl GsParams {
    /// Parse settings from JSON; missing fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let params: GsParams = serde_json::from_str(text)?;
        params.validate()?;
        Ok(params)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        let fractions = [
            ("folding_threshold", self.folding_threshold),
            ("maxk_threshold", self.maxk_threshold),
            ("kvalue_accuracy", self.kvalue_accuracy),
            ("xvalue_accuracy", self.xvalue_accuracy),
            ("realspace_relerr", self.realspace_relerr),
            ("realspace_abserr", self.realspace_abserr),
            ("shoot_accuracy", self.shoot_accuracy),
        ];
        for (name, value) in fractions {
            if !(value > 0.0 && value < 1.0) {
                return Err(ProfileError::invalid(name, format!("must lie in (0, 1), got {value}")));
            }
        }
        if !(self.stepk_minimum_hlr > 0.0) {
            return Err(ProfileError::invalid(
                "stepk_minimum_hlr",
                format!("must be positive, got {}", self.stepk_minimum_hlr),
            ));
        }
        if self.minimum_fft_size < 2 || self.minimum_fft_size > self.maximum_fft_size {
            return Err(ProfileError::invalid(
                "minimum_fft_size",
                format!(
                    "need 2 <= minimum ({}) <= maximum ({})",
                    self.minimum_fft_size, self.maximum_fft_size
                ),
            ));
        }
        Ok(())
    }

    /// Bit-exact key for caching tables built under these settings.
    pub(crate) fn cache_key(&self) -> Vec<u64> {
        vec![
            self.folding_threshold.to_bits(),
            self.maxk_threshold.to_bits(),
            self.stepk_minimum_hlr.to_bits(),
            self.kvalue_accuracy.to_bits(),
            self.xvalue_accuracy.to_bits(),
            self.shoot_accuracy.to_bits(),
        ]
    }

    /// Combine two settings, taking the tighter value of each knob.
    pub fn strictest(&self, other: &GsParams) -> GsParams {
        GsParams {
            folding_threshold: self.folding_threshold.min(other.folding_threshold),
            maxk_threshold: self.maxk_threshold.min(other.maxk_threshold),
            stepk_minimum_hlr: self.stepk_minimum_hlr.max(other.stepk_minimum_hlr),
            kvalue_accuracy: self.kvalue_accuracy.min(other.kvalue_accuracy),
            xvalue_accuracy: self.xvalue_accuracy.min(other.xvalue_accuracy),
            realspace_relerr: self.realspace_relerr.min(other.realspace_relerr),
            realspace_abserr: self.realspace_abserr.min(other.realspace_abserr),
            shoot_accuracy: self.shoot_accuracy.min(other.shoot_accuracy),
            minimum_fft_size: self.minimum_fft_size.max(other.minimum_fft_size),
            maximum_fft_size: self.maximum_fft_size.max(other.maximum_fft_size),
            strict: self.strict || other.strict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        GsParams::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let params = GsParams::from_json(r#"{ "maxk_threshold": 5e-4, "strict": true }"#).unwrap();
        assert_eq!(params.maxk_threshold, 5e-4);
        assert!(params.strict);
        assert_eq!(params.folding_threshold, GsParams::default().folding_threshold);
    }

    #[test]
    fn test_json_round_trip() {
        let params = GsParams {
            shoot_accuracy: 1e-4,
            ..GsParams::default()
        };
        let text = params.to_json().unwrap();
        assert_eq!(GsParams::from_json(&text).unwrap(), params);
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let err = GsParams::from_json(r#"{ "folding_threshold": 0.0 }"#).unwrap_err();
        assert!(matches!(err, ProfileError::InvalidParameter { name: "folding_threshold", .. }));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = GsParams::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ProfileError::Config(_)));
    }

    #[test]
    fn test_strictest_takes_tighter_values() {
        let loose = GsParams {
            folding_threshold: 1e-2,
            ..GsParams::default()
        };
        let tight = GsParams {
            maxk_threshold: 1e-4,
            strict: true,
            ..GsParams::default()
        };
        let merged = loose.strictest(&tight);
        assert_eq!(merged.folding_threshold, 5e-3);
        assert_eq!(merged.maxk_threshold, 1e-4);
        assert!(merged.strict);
    }
}
