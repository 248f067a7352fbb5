use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// The root of all determinism. Everything procedural is a pure function of it.
pub(crate) type WorldSeed = i64;

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Integer position hash. Only wrapping integer ops, so the output is identical on every platform.
pub(crate) fn position_hash(seed: WorldSeed, x: i32, y: i32, salt: u32) -> u64 {
    let mut h = mix64((seed as u64).wrapping_add(GOLDEN_GAMMA));
    h = mix64(h ^ (x as u32 as u64).wrapping_mul(GOLDEN_GAMMA));
    h = mix64(h ^ ((y as u32 as u64) << 32 | salt as u64));
    h
}

/// Uniform value in `[0, 1)` keyed by seed, position and a per-decision salt.
pub(crate) fn seeded_random(seed: WorldSeed, x: i32, y: i32, salt: u32) -> f64 {
    (position_hash(seed, x, y, salt) >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
}

fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

fn grad(hash: u8, x: f64, y: f64) -> f64 {
    match hash & 3 {
        0 => x + y,
        1 => -x + y,
        2 => x - y,
        _ => -x - y,
    }
}

/// Classic corner-gradient Perlin noise over a seeded permutation table.
#[derive(Clone)]
pub(crate) struct Perlin {
    perm: [u8; 512],
}

impl Perlin {
    pub(crate) fn new(seed: WorldSeed) -> Self {
        let mut table: Vec<u8> = (0..=255).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed as u64);
        table.shuffle(&mut rng);
        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().enumerate() {
            *slot = table[i & 255];
        }
        Self { perm }
    }

    pub(crate) fn noise(&self, x: f64, y: f64) -> f64 {
        let x0 = x.floor();
        let y0 = y.floor();
        let xf = x - x0;
        let yf = y - y0;
        let xi = (x0 as i64 & 255) as usize;
        let yi = (y0 as i64 & 255) as usize;

        let u = fade(xf);
        let v = fade(yf);

        let p = &self.perm;
        let a = p[xi] as usize + yi;
        let b = p[xi + 1] as usize + yi;
        let aa = p[a];
        let ab = p[a + 1];
        let ba = p[b];
        let bb = p[b + 1];

        lerp(
            v,
            lerp(u, grad(aa, xf, yf), grad(ba, xf - 1.0, yf)),
            lerp(u, grad(ab, xf, yf - 1.0), grad(bb, xf - 1.0, yf - 1.0)),
        )
    }

    /// Sum of `octaves` layers, each `lacunarity` times the frequency and `persistence` times
    /// the amplitude of the previous one, normalised into `[-1, 1]`.
    pub(crate) fn octave(
        &self,
        x: f64,
        y: f64,
        octaves: u32,
        persistence: f64,
        lacunarity: f64,
    ) -> f64 {
        let mut total = 0.0;
        let mut frequency = 1.0;
        let mut amplitude = 1.0;
        let mut max = 0.0;
        for _ in 0..octaves.max(1) {
            total += self.noise(x * frequency, y * frequency) * amplitude;
            max += amplitude;
            amplitude *= persistence;
            frequency *= lacunarity;
        }
        (total / max).clamp(-1.0, 1.0)
    }

    /// Four fixed bands (continental, hills, bumps, grain) blended into a natural silhouette.
    pub(crate) fn terrain(&self, x: f64, y: f64) -> f64 {
        let large = self.octave(x * 0.003, y * 0.003, 4, 0.5, 2.0);
        let medium = self.octave(x * 0.012, y * 0.012, 3, 0.5, 2.0);
        let small = self.octave(x * 0.04, y * 0.04, 2, 0.5, 2.0);
        let tiny = self.noise(x * 0.15, y * 0.15);
        (large * 0.55 + medium * 0.28 + small * 0.12 + tiny * 0.05).clamp(-1.0, 1.0)
    }
}
