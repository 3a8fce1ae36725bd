//! Seeded randomness for sketches.
//!
//! `Lcg` is the classic 32-bit linear congruential generator used by
//! browser-based creative-coding engines for `randomSeed`, so a given seed
//! reproduces the same sequence of `random()` values. `ValueNoise` is a
//! smooth lattice noise seeded from its own LCG.

const LCG_M: u64 = 1 << 32;
const LCG_A: u64 = 1_664_525;
const LCG_C: u64 = 1_013_904_223;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self {
            // Seeds are taken modulo 2^32.
            state: seed as u32,
        }
    }

    pub fn reseed(&mut self, seed: u64) {
        self.state = seed as u32;
    }

    /// Uniform in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.state = ((LCG_A * self.state as u64 + LCG_C) % LCG_M) as u32;
        self.state as f64 / LCG_M as f64
    }

    /// Uniform in [min, max).
    pub fn range(&mut self, min: f64, max: f64) -> f64 {
        min + self.next_f64() * (max - min)
    }
}

const NOISE_SIZE: usize = 256;

/// Smooth value noise over a 256-cell lattice, output in [0, 1).
#[derive(Debug, Clone)]
pub struct ValueNoise {
    lattice: Vec<f64>,
    perm: Vec<usize>,
}

impl ValueNoise {
    pub fn new(seed: u64) -> Self {
        let mut rng = Lcg::new(seed ^ 0x9E37_79B9);
        let lattice = (0..NOISE_SIZE).map(|_| rng.next_f64()).collect();
        let mut perm: Vec<usize> = (0..NOISE_SIZE).collect();
        // Fisher–Yates driven by the same generator.
        for i in (1..NOISE_SIZE).rev() {
            let j = (rng.next_f64() * (i + 1) as f64) as usize;
            perm.swap(i, j.min(i));
        }
        Self { lattice, perm }
    }

    fn lattice_at(&self, x: i64, y: i64, z: i64) -> f64 {
        let wrap = |v: i64| v.rem_euclid(NOISE_SIZE as i64) as usize;
        let h = self.perm[(self.perm[(self.perm[wrap(x)] + wrap(y)) % NOISE_SIZE] + wrap(z)) % NOISE_SIZE];
        self.lattice[h]
    }

    pub fn sample(&self, x: f64, y: f64, z: f64) -> f64 {
        let (xi, yi, zi) = (x.floor(), y.floor(), z.floor());
        let (tx, ty, tz) = (smooth(x - xi), smooth(y - yi), smooth(z - zi));
        let (x0, y0, z0) = (xi as i64, yi as i64, zi as i64);

        let corner = |dx: i64, dy: i64, dz: i64| self.lattice_at(x0 + dx, y0 + dy, z0 + dz);

        let x00 = lerp(corner(0, 0, 0), corner(1, 0, 0), tx);
        let x10 = lerp(corner(0, 1, 0), corner(1, 1, 0), tx);
        let x01 = lerp(corner(0, 0, 1), corner(1, 0, 1), tx);
        let x11 = lerp(corner(0, 1, 1), corner(1, 1, 1), tx);
        let y0 = lerp(x00, x10, ty);
        let y1 = lerp(x01, x11, ty);
        lerp(y0, y1, tz)
    }
}

fn smooth(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lcg_matches_reference_sequence() {
        // state' = (1664525 * 42 + 1013904223) mod 2^32
        let mut rng = Lcg::new(42);
        let first = rng.next_f64();
        let expected = ((1_664_525u64 * 42 + 1_013_904_223) % (1 << 32)) as f64 / 4_294_967_296.0;
        assert_eq!(first, expected);
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = Lcg::new(7);
        let mut b = Lcg::new(7);
        for _ in 0..100 {
            assert_eq!(a.next_f64(), b.next_f64());
        }
        let mut c = Lcg::new(8);
        assert_ne!(Lcg::new(7).next_f64(), c.next_f64());
    }

    #[test]
    fn values_stay_in_range() {
        let mut rng = Lcg::new(1);
        for _ in 0..1000 {
            let v = rng.range(-3.0, 5.0);
            assert!((-3.0..5.0).contains(&v));
        }
    }

    #[test]
    fn noise_is_deterministic_and_smooth() {
        let a = ValueNoise::new(3);
        let b = ValueNoise::new(3);
        assert_eq!(a.sample(1.25, 2.5, 0.0), b.sample(1.25, 2.5, 0.0));

        let v0 = a.sample(4.0, 0.0, 0.0);
        let v1 = a.sample(4.001, 0.0, 0.0);
        assert!((v0 - v1).abs() < 0.01);
        for i in 0..50 {
            let v = a.sample(i as f64 * 0.37, i as f64 * 0.11, -1.5);
            assert!((0.0..1.0).contains(&v));
        }
    }
}
