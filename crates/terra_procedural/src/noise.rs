//! # Value Noise Implementation
//!
//! Deterministic lattice value noise with smoothstep interpolation.
//!
//! ## Why value noise?
//!
//! - Integer lattice hashing only: identical on every platform
//! - Cheap enough to evaluate per cell for caves (3-D, 3 octaves)
//! - Smoothstep blending hides the lattice at terrain frequencies
//!
//! ## Field Independence
//!
//! Every field (base height, detail height, caves, trees) hashes with its own
//! seed, derived by XOR-mixing the world seed with a per-field constant. The
//! fields are uncorrelated but fully determined by the world seed.
//!
//! ## Determinism Guarantee
//!
//! Given the same `WorldSeed`, this implementation will produce
//! **exactly** the same values on any platform, any time.

/// World seed for deterministic generation.
///
/// All procedural generation derives from this seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorldSeed(u64);

impl WorldSeed {
    /// Creates a new world seed.
    #[inline]
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Returns the raw seed value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Seed for an independent noise field.
    #[inline]
    #[must_use]
    pub const fn field(self, field: NoiseField) -> u64 {
        self.0 ^ field.constant()
    }
}

impl Default for WorldSeed {
    fn default() -> Self {
        Self(42)
    }
}

/// The independent noise fields sampled by the generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoiseField {
    /// Broad terrain elevation.
    Base,
    /// Fine terrain variation.
    Detail,
    /// 3-D cave density.
    Cave,
    /// Tree placement hash.
    Tree,
}

impl NoiseField {
    /// XOR constant mixed into the world seed.
    #[inline]
    #[must_use]
    pub const fn constant(self) -> u64 {
        match self {
            Self::Base => 0x9E37_79B1,
            Self::Detail => 0x85EB_CA6B,
            Self::Cave => 0xC2B2_AE35,
            Self::Tree => 0x27D4_EB2F,
        }
    }
}

/// Mixes lattice coordinates into a 64-bit hash.
#[inline]
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub const fn hash3(seed: u64, x: i32, y: i32, z: i32) -> u64 {
    let mut h = seed ^ 0x2545_F491_4F6C_DD1D;
    h ^= (x as u32 as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    h = h.rotate_left(27).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h ^= (y as u32 as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    h = h.rotate_left(31).wrapping_mul(0x94D0_49BB_1331_11EB);
    h ^= (z as u32 as u64).wrapping_mul(0x1656_67B1_9E37_79F9);
    // splitmix64 finalizer
    h ^= h >> 30;
    h = h.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h ^= h >> 27;
    h = h.wrapping_mul(0x94D0_49BB_1331_11EB);
    h ^ (h >> 31)
}

/// Lattice value in [-1, 1].
#[inline]
#[allow(clippy::cast_precision_loss)]
fn lattice(seed: u64, x: i32, y: i32, z: i32) -> f64 {
    // Top 53 bits give a uniform float in [0, 1).
    let unit = (hash3(seed, x, y, z) >> 11) as f64 / (1u64 << 53) as f64;
    unit * 2.0 - 1.0
}

#[inline]
fn smoothstep(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Smoothstep-interpolated lattice value noise.
#[derive(Clone, Copy, Debug)]
pub struct ValueNoise {
    seed: u64,
}

impl ValueNoise {
    /// Creates a noise field from an already-mixed field seed.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Creates the named field for a world seed.
    #[must_use]
    pub const fn for_field(world: WorldSeed, field: NoiseField) -> Self {
        Self::new(world.field(field))
    }

    /// Samples 2D noise at the given coordinates.
    ///
    /// Returns a value in [-1, 1].
    #[must_use]
    pub fn sample2(&self, x: f64, z: f64) -> f64 {
        let x0 = fast_floor(x);
        let z0 = fast_floor(z);
        let tx = smoothstep(x - f64::from(x0));
        let tz = smoothstep(z - f64::from(z0));

        let a = lattice(self.seed, x0, 0, z0);
        let b = lattice(self.seed, x0 + 1, 0, z0);
        let c = lattice(self.seed, x0, 0, z0 + 1);
        let d = lattice(self.seed, x0 + 1, 0, z0 + 1);

        lerp(lerp(a, b, tx), lerp(c, d, tx), tz)
    }

    /// Samples 3D noise at the given coordinates.
    ///
    /// Returns a value in [-1, 1].
    #[must_use]
    pub fn sample3(&self, x: f64, y: f64, z: f64) -> f64 {
        let x0 = fast_floor(x);
        let y0 = fast_floor(y);
        let z0 = fast_floor(z);
        let tx = smoothstep(x - f64::from(x0));
        let ty = smoothstep(y - f64::from(y0));
        let tz = smoothstep(z - f64::from(z0));

        let corner = |dx: i32, dy: i32, dz: i32| lattice(self.seed, x0 + dx, y0 + dy, z0 + dz);

        let bottom = lerp(
            lerp(corner(0, 0, 0), corner(1, 0, 0), tx),
            lerp(corner(0, 0, 1), corner(1, 0, 1), tx),
            tz,
        );
        let top = lerp(
            lerp(corner(0, 1, 0), corner(1, 1, 0), tx),
            lerp(corner(0, 1, 1), corner(1, 1, 1), tx),
            tz,
        );
        lerp(bottom, top, ty)
    }

    /// Generates 2D fractal (octaved) noise.
    ///
    /// Combines multiple noise samples at different frequencies
    /// for more natural-looking terrain.
    ///
    /// # Arguments
    ///
    /// * `x`, `z` - Coordinates
    /// * `octaves` - Number of noise layers
    /// * `persistence` - Amplitude decay per octave (typically 0.5)
    /// * `lacunarity` - Frequency increase per octave (typically 2.0)
    ///
    /// # Returns
    ///
    /// A value in the range [-1, 1].
    #[must_use]
    pub fn fractal2(&self, x: f64, z: f64, octaves: u32, persistence: f64, lacunarity: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut max_amplitude = 0.0;

        for _ in 0..octaves {
            total += self.sample2(x * frequency, z * frequency) * amplitude;
            max_amplitude += amplitude;
            amplitude *= persistence;
            frequency *= lacunarity;
        }

        if max_amplitude > 0.0 {
            total / max_amplitude
        } else {
            0.0
        }
    }

    /// Generates 3D fractal noise, normalized to [-1, 1].
    #[must_use]
    pub fn fractal3(&self, x: f64, y: f64, z: f64, octaves: u32) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut max_amplitude = 0.0;

        for _ in 0..octaves {
            total += self.sample3(x * frequency, y * frequency, z * frequency) * amplitude;
            max_amplitude += amplitude;
            amplitude *= 0.5;
            frequency *= 2.0;
        }

        if max_amplitude > 0.0 {
            total / max_amplitude
        } else {
            0.0
        }
    }
}

/// Fast floor function.
///
/// Faster than `f64::floor()` for our use case.
#[inline]
#[allow(clippy::cast_possible_truncation)]
fn fast_floor(x: f64) -> i32 {
    let xi = x as i32;
    if x < f64::from(xi) {
        xi - 1
    } else {
        xi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determinism() {
        let noise1 = ValueNoise::new(12345);
        let noise2 = ValueNoise::new(12345);

        // Same seed should produce identical results
        for i in 0..100 {
            let x = f64::from(i) * 0.1;
            let z = f64::from(i) * 0.17;
            assert_eq!(noise1.sample2(x, z), noise2.sample2(x, z), "Noise should be deterministic");
            assert_eq!(noise1.sample3(x, z, x), noise2.sample3(x, z, x));
        }
    }

    #[test]
    fn test_fields_are_independent() {
        let seed = WorldSeed::new(42);
        let base = ValueNoise::for_field(seed, NoiseField::Base);
        let detail = ValueNoise::for_field(seed, NoiseField::Detail);

        let differing = (0..50)
            .filter(|&i| {
                let x = f64::from(i) * 1.37 + 0.5;
                base.sample2(x, x) != detail.sample2(x, x)
            })
            .count();
        assert!(differing > 45);
    }

    #[test]
    fn test_range() {
        let noise = ValueNoise::new(42);

        for i in 0..10000 {
            let x = (f64::from(i) * 0.1) - 500.0;
            let z = (f64::from(i) * 0.13) - 650.0;
            let v2 = noise.sample2(x, z);
            let v3 = noise.fractal3(x, z * 0.5, z, 3);
            assert!((-1.0..=1.0).contains(&v2), "Value {v2} out of range at ({x}, {z})");
            assert!((-1.0..=1.0).contains(&v3));
        }
    }

    #[test]
    fn test_continuity() {
        let noise = ValueNoise::new(42);

        let x = 100.3;
        let z = 100.7;
        let delta = 0.001;

        let v1 = noise.sample2(x, z);
        let v2 = noise.sample2(x + delta, z);
        let v3 = noise.sample2(x, z + delta);

        assert!((v1 - v2).abs() < 0.01, "Noise should be continuous");
        assert!((v1 - v3).abs() < 0.01, "Noise should be continuous");
    }

    #[test]
    fn test_lattice_points_match_hash() {
        // At integer coordinates the interpolation weights collapse.
        let noise = ValueNoise::new(7);
        let at_lattice = noise.sample2(3.0, -4.0);
        assert!((at_lattice - lattice(7, 3, 0, -4)).abs() < 1e-12);
    }

    #[test]
    fn test_fractal_noise_in_range() {
        let noise = ValueNoise::new(42);
        let value = noise.fractal2(100.0, 100.0, 6, 0.5, 2.0);
        assert!((-1.0..=1.0).contains(&value), "Octaved value {value} out of expected range");
    }

    #[test]
    fn test_fast_floor_negative() {
        assert_eq!(fast_floor(-0.5), -1);
        assert_eq!(fast_floor(-1.0), -1);
        assert_eq!(fast_floor(2.9), 2);
    }
}
