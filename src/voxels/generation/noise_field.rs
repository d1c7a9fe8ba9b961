//! # Noise Field Module
//!
//! Octave-accumulated Perlin noise, batched over coordinate slices, plus the
//! reshaping helpers the terrain generator applies to the raw samples.
//!
//! Every value is a pure function of the coordinates, the field's settings and the
//! world seed. Two processes configured alike sample identical values.

use noise::{NoiseFn, Perlin};

use crate::config::{DomainWarpSettings, NoiseSettings};

/// Coordinate shift between successive octaves so they do not share lattice points.
const OCTAVE_OFFSET: f64 = 17.318;

/// One configured noise field.
#[derive(Clone, Debug)]
pub struct NoiseField {
    settings: NoiseSettings,
    source: Perlin,
}

impl NoiseField {
    /// Creates a field whose permutation is seeded with `world_seed + settings.seed`.
    pub fn new(settings: NoiseSettings, world_seed: u32) -> Self {
        NoiseField {
            settings,
            source: Perlin::new(world_seed.wrapping_add(settings.seed)),
        }
    }

    pub fn settings(&self) -> &NoiseSettings {
        &self.settings
    }

    fn inverse_zoom(&self) -> f64 {
        if self.settings.zoom > 0.0 {
            1.0 / self.settings.zoom
        } else {
            1.0
        }
    }

    /// Runs the octave loop with `sample(frequency, octave_offset)` producing the raw
    /// value of one octave.
    ///
    /// The sum is divided by the accumulated amplitude so that every octave count lands
    /// in the same range as a single octave, then scaled by the configured amplitude.
    fn accumulate(&self, sample: impl Fn(f64, f64) -> f64) -> f64 {
        let mut total = 0.0;
        let mut frequency = 1.0;
        let mut amplitude = 1.0;
        let mut amplitude_sum = 0.0;

        for octave in 0..self.settings.octaves {
            total += sample(frequency, octave as f64 * OCTAVE_OFFSET) * amplitude;
            amplitude_sum += amplitude;
            amplitude *= self.settings.persistence;
            frequency *= 2.0;
        }

        if amplitude_sum == 0.0 {
            return 0.0;
        }
        total / amplitude_sum * self.settings.amplitude
    }

    /// Samples the field at one 2-D point. Roughly within `[-amplitude, amplitude]`.
    pub fn octave_2d(&self, x: f64, z: f64) -> f64 {
        let scale = self.inverse_zoom();
        self.accumulate(|frequency, offset| {
            self.source.get([
                x * scale * frequency + offset,
                z * scale * frequency + offset,
            ])
        })
    }

    /// Samples the field at one 3-D point.
    pub fn octave_3d(&self, x: f64, y: f64, z: f64) -> f64 {
        let scale = self.inverse_zoom();
        self.accumulate(|frequency, offset| {
            self.source.get([
                x * scale * frequency + offset,
                y * scale * frequency + offset,
                z * scale * frequency + offset,
            ])
        })
    }

    /// Samples every `(xs[i], zs[i])` pair in one call.
    ///
    /// Slices of different length are sampled over their common prefix.
    pub fn sample_2d(&self, xs: &[f64], zs: &[f64]) -> Vec<f64> {
        xs.iter()
            .zip(zs)
            .map(|(&x, &z)| self.octave_2d(x, z))
            .collect()
    }

    /// Samples every `(xs[i], ys[i], zs[i])` triple in one call.
    pub fn sample_3d(&self, xs: &[f64], ys: &[f64], zs: &[f64]) -> Vec<f64> {
        xs.iter()
            .zip(ys)
            .zip(zs)
            .map(|((&x, &y), &z)| self.octave_3d(x, y, z))
            .collect()
    }
}

/// Displaces 2-D coordinates by two independent fields before the target field is
/// sampled, breaking up grid-aligned features.
#[derive(Clone, Debug)]
pub struct DomainWarp {
    warp_x: NoiseField,
    warp_y: NoiseField,
    strength: f64,
}

impl DomainWarp {
    pub fn new(settings: &DomainWarpSettings, world_seed: u32) -> Self {
        DomainWarp {
            warp_x: NoiseField::new(settings.x, world_seed),
            warp_y: NoiseField::new(settings.y, world_seed),
            strength: settings.strength,
        }
    }

    /// Returns the warped coordinates `(x + strength * warpX, z + strength * warpY)`.
    pub fn warp_2d(&self, xs: &[f64], zs: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let offsets_x = self.warp_x.sample_2d(xs, zs);
        let offsets_y = self.warp_y.sample_2d(xs, zs);

        let warped_x = xs
            .iter()
            .zip(&offsets_x)
            .map(|(x, offset)| x + self.strength * offset)
            .collect();
        let warped_z = zs
            .iter()
            .zip(&offsets_y)
            .map(|(z, offset)| z + self.strength * offset)
            .collect();
        (warped_x, warped_z)
    }

    /// Samples `target` at the warped coordinates.
    pub fn sample_2d(&self, target: &NoiseField, xs: &[f64], zs: &[f64]) -> Vec<f64> {
        let (warped_x, warped_z) = self.warp_2d(xs, zs);
        target.sample_2d(&warped_x, &warped_z)
    }
}

/// Maps a signed Perlin sample into `[0, 1]`.
pub fn to_unit_interval(noise: f64) -> f64 {
    ((noise + 1.0) * 0.5).clamp(0.0, 1.0)
}

/// Reshapes a height sample: `(noise * modifier) ^ exponent`.
///
/// Integral exponents are applied as-is, so an even exponent folds negative bases onto
/// the positive side. A fractional exponent on a negative base has no real result; it
/// is given the sign-preserving value `-(|base| ^ exponent)` instead of NaN.
pub fn redistribution(noise: f64, modifier: f64, exponent: f64) -> f64 {
    let base = noise * modifier;
    if exponent.fract() == 0.0 && exponent.abs() <= i32::MAX as f64 {
        base.powi(exponent as i32)
    } else if base < 0.0 {
        -(base.abs().powf(exponent))
    } else {
        base.powf(exponent)
    }
}

/// Linearly maps a `[0, 1]` sample into `[output_min, output_max]`.
pub fn remap_value_01(value: f64, output_min: f64, output_max: f64) -> f64 {
    output_min + value * (output_max - output_min)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(octaves: u32) -> NoiseSettings {
        NoiseSettings {
            zoom: 32.0,
            octaves,
            persistence: 0.5,
            redistribution_modifier: 1.0,
            exponent: 1.0,
            seed: 3,
            amplitude: 2.0,
        }
    }

    fn coordinates() -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let xs = (0..64).map(|i| i as f64 * 3.7 - 40.0).collect();
        let ys = (0..64).map(|i| (i % 7) as f64 * 5.1).collect();
        let zs = (0..64).map(|i| i as f64 * -2.3 + 11.0).collect();
        (xs, ys, zs)
    }

    #[test]
    fn test_same_seed_reproduces_samples() {
        let (xs, ys, zs) = coordinates();
        let a = NoiseField::new(settings(4), 99);
        let b = NoiseField::new(settings(4), 99);
        assert_eq!(a.sample_2d(&xs, &zs), b.sample_2d(&xs, &zs));
        assert_eq!(a.sample_3d(&xs, &ys, &zs), b.sample_3d(&xs, &ys, &zs));
    }

    #[test]
    fn test_different_seeds_diverge() {
        let (xs, _, zs) = coordinates();
        let a = NoiseField::new(settings(4), 1).sample_2d(&xs, &zs);
        let b = NoiseField::new(settings(4), 2).sample_2d(&xs, &zs);
        assert_ne!(a, b);
    }

    #[test]
    fn test_batch_matches_pointwise() {
        let (xs, ys, zs) = coordinates();
        let field = NoiseField::new(settings(3), 5);
        let batch = field.sample_3d(&xs, &ys, &zs);
        for i in 0..xs.len() {
            assert_eq!(batch[i], field.octave_3d(xs[i], ys[i], zs[i]));
        }
    }

    #[test]
    fn test_normalized_sum_stays_within_amplitude() {
        let (xs, ys, zs) = coordinates();
        for octaves in [1, 2, 6] {
            let field = NoiseField::new(settings(octaves), 7);
            for value in field.sample_3d(&xs, &ys, &zs) {
                assert!(value.abs() <= 2.5, "{} octaves gave {}", octaves, value);
            }
        }
    }

    #[test]
    fn test_zero_octaves_is_flat() {
        let field = NoiseField::new(settings(0), 7);
        assert_eq!(field.octave_2d(12.5, -3.0), 0.0);
    }

    #[test]
    fn test_mismatched_lengths_use_common_prefix() {
        let field = NoiseField::new(settings(2), 7);
        assert_eq!(field.sample_2d(&[1.0, 2.0, 3.0], &[1.0]).len(), 1);
    }

    #[test]
    fn test_redistribution_policy() {
        assert!((redistribution(0.5, 2.0, 2.0) - 1.0).abs() < 1e-12);
        assert!((redistribution(-0.5, 1.0, 2.0) - 0.25).abs() < 1e-12);
        assert!((redistribution(-0.5, 1.0, 3.0) + 0.125).abs() < 1e-12);

        let fractional = redistribution(-0.25, 1.0, 0.5);
        assert!(!fractional.is_nan());
        assert!((fractional + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_remap_value_01() {
        assert_eq!(remap_value_01(0.0, 10.0, 20.0), 10.0);
        assert_eq!(remap_value_01(1.0, 10.0, 20.0), 20.0);
        assert_eq!(remap_value_01(0.25, -4.0, 4.0), -2.0);
        assert_eq!(to_unit_interval(-1.0), 0.0);
        assert_eq!(to_unit_interval(1.0), 1.0);
    }

    #[test]
    fn test_domain_warp_displaces_deterministically() {
        let (xs, _, zs) = coordinates();
        let warp = DomainWarp::new(&DomainWarpSettings::default(), 11);
        let (wx, wz) = warp.warp_2d(&xs, &zs);
        assert_eq!((wx.clone(), wz.clone()), warp.warp_2d(&xs, &zs));
        assert_ne!(wx, xs);
        assert_ne!(wz, zs);

        let target = NoiseField::new(settings(3), 11);
        assert_eq!(warp.sample_2d(&target, &xs, &zs), target.sample_2d(&wx, &wz));
    }
}
