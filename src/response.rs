//! Cascaded instrument-response evaluation.
//!
//! A channel's complex frequency response is evaluated from its analog
//! pole-zero stage, converted to the requested ground-motion units, and
//! scaled by the cascaded stage gains.
//!
//! # Conventions
//!
//! ```text
//! H(f) = A0 * prod(s - z_k) / prod(s - p_k)
//! s = j*2*pi*f   for transfer type 'A' (rad/s)
//! s = j*f        for transfer type 'B' (Hz)
//! ```
//!
//! Unit conversion multiplies by `(j*s*f)^n` (differentiation) or
//! `(-j/(s*f))^|n|` (integration) per bin, where `n` is the difference
//! of the unit codes and `s` collapses to `2*pi` ('A') or `1` ('B').

use num_complex::Complex64;
use tracing::warn;

use crate::error::{QcError, Result};
use crate::station::{ChannelMeta, StageKind};

/// Requested output units for a frequency response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputUnits {
    /// Whatever the stage-1 input units are; no conversion
    Native,
    Displacement,
    Velocity,
    Acceleration,
}

impl OutputUnits {
    fn code(self) -> Option<i32> {
        match self {
            OutputUnits::Native => None,
            OutputUnits::Displacement => Some(1),
            OutputUnits::Velocity => Some(2),
            OutputUnits::Acceleration => Some(3),
        }
    }
}

/// Fractional disagreement between the overall sensitivity and the
/// stage-gain product above which the overall sensitivity wins.
const SENSITIVITY_MISMATCH_LIMIT: f64 = 0.10;

impl ChannelMeta {
    /// Evaluate the channel's complex response at `freqs`, in
    /// `out_units`. The DC bin (index 0) is always zero.
    pub fn response(&self, freqs: &[f64], out_units: OutputUnits) -> Result<Vec<Complex64>> {
        if !self.has_valid_response() {
            return Err(QcError::InvalidResponse(format!(
                "{} {}: seismic channel lacks stages 0..=2 with positive gain",
                self.station, self.key
            )));
        }
        let stage1 = self.stage(1).ok_or_else(|| {
            QcError::InvalidResponse(format!("{} {}: no stage 1", self.station, self.key))
        })?;
        let (transfer, normalization, poles, zeros) = match &stage1.kind {
            Some(StageKind::PoleZero {
                transfer,
                normalization,
                poles,
                zeros,
            }) => (*transfer, *normalization, poles, zeros),
            Some(StageKind::Polynomial { .. }) => return Err(QcError::UnsupportedForPolynomial),
            _ => {
                return Err(QcError::InvalidResponse(format!(
                    "{} {}: stage 1 is not an analog stage",
                    self.station, self.key
                )));
            }
        };
        let s_scale = match transfer {
            'A' => 2.0 * std::f64::consts::PI,
            'B' => 1.0,
            other => return Err(QcError::UnknownStageType(other)),
        };

        let mut resp: Vec<Complex64> = freqs
            .iter()
            .map(|&f| {
                let s = Complex64::new(0.0, s_scale * f);
                let num = zeros
                    .iter()
                    .fold(Complex64::new(1.0, 0.0), |acc, z| acc * (s - z));
                let den = poles
                    .iter()
                    .fold(Complex64::new(1.0, 0.0), |acc, p| acc * (s - p));
                normalization * num / den
            })
            .collect();

        if let Some(out_code) = out_units.code() {
            let in_code = stage1.input_units.code().ok_or_else(|| {
                QcError::InvalidResponse(format!(
                    "{} {}: stage 1 input units '{}' are not a ground-motion unit",
                    self.station, self.key, stage1.input_units
                ))
            })?;
            let n = out_code - in_code;
            if n != 0 {
                for (r, &f) in resp.iter_mut().zip(freqs) {
                    if f == 0.0 {
                        continue; // DC is zeroed below anyway
                    }
                    let factor = if n > 0 {
                        Complex64::new(0.0, s_scale * f).powi(n)
                    } else {
                        Complex64::new(0.0, -1.0 / (s_scale * f)).powi(-n)
                    };
                    *r *= factor;
                }
            }
        }

        let scale = self.sensitivity_scale();
        if scale <= 0.0 {
            warn!(
                station = %self.station,
                channel = %self.key,
                scale,
                "non-positive response scale"
            );
        }
        for r in resp.iter_mut() {
            *r *= scale;
        }
        if let Some(dc) = resp.first_mut() {
            *dc = Complex64::new(0.0, 0.0);
        }
        Ok(resp)
    }

    /// Sensitivity applied to the evaluated response: the product
    /// `G1 * G2`, unless it disagrees with the overall sensitivity `G0`
    /// by more than 10%, in which case `G0` wins.
    pub fn sensitivity_scale(&self) -> f64 {
        let g1 = self.stage(1).map_or(1.0, |s| s.gain);
        let g2 = self.stage(2).map_or(1.0, |s| s.gain);
        let product = g1 * g2;
        if let Some(stage0) = self.stage(0) {
            let g0 = stage0.gain;
            if g0 > 0.0 && ((g0 - product) / g0).abs() > SENSITIVITY_MISMATCH_LIMIT {
                warn!(
                    station = %self.station,
                    channel = %self.key,
                    g0,
                    product,
                    "stage gains disagree with overall sensitivity, using the overall value"
                );
                return g0;
            }
        }
        product
    }
}
