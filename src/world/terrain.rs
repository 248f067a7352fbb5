use crate::world::biome::{BiomeMap, BiomeTable};
use crate::world::noise::{seeded_random, Perlin, WorldSeed};
use crate::world::rules::Ruleset;

const SALT_PEAK_X: u32 = 0x9EA1;
const SALT_PEAK_WIDTH: u32 = 0x9EA2;
const SALT_PEAK_HEIGHT: u32 = 0x9EA3;
const SALT_VALLEY_X: u32 = 0x7A11;
const SALT_VALLEY_WIDTH: u32 = 0x7A12;
const SALT_VALLEY_DEPTH: u32 = 0x7A13;

/// Surface row per world column. Smaller values are higher terrain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct HeightField {
    heights: Vec<i32>,
}

impl HeightField {
    pub(crate) fn from_heights(heights: Vec<i32>) -> Self {
        Self { heights }
    }

    pub(crate) fn flat(height: i32, width: usize) -> Self {
        Self {
            heights: vec![height; width],
        }
    }

    pub(crate) fn generate(
        seed: WorldSeed,
        perlin: &Perlin,
        biomes: &BiomeMap,
        table: &BiomeTable,
        rules: &Ruleset,
    ) -> Self {
        let width = biomes.len();
        let base = rules.base_height();
        let mut heights: Vec<f64> = (0..width)
            .map(|x| {
                let biome = table.get(biomes.ids()[x]);
                let n = perlin.terrain(x as f64, 0.0);
                base - n * rules.terrain_amplitude * biome.amplitude - biome.height_modifier
            })
            .collect();

        for _ in 0..rules.smoothing_passes {
            heights = smooth(&heights, rules.smoothing_radius);
        }

        let width_f = width as f64;
        for i in 0..rules.mountain_count as i32 {
            let center = seeded_random(seed, i, 0, SALT_PEAK_X) * width_f;
            let half_width = 20.0 + seeded_random(seed, i, 0, SALT_PEAK_WIDTH) * 40.0;
            let amplitude = 15.0 + seeded_random(seed, i, 0, SALT_PEAK_HEIGHT) * 35.0;
            apply_feature(&mut heights, center, half_width, -amplitude);
        }
        for i in 0..rules.valley_count as i32 {
            let center = seeded_random(seed, i, 0, SALT_VALLEY_X) * width_f;
            let half_width = 10.0 + seeded_random(seed, i, 0, SALT_VALLEY_WIDTH) * 25.0;
            let depth = 6.0 + seeded_random(seed, i, 0, SALT_VALLEY_DEPTH) * 14.0;
            apply_feature(&mut heights, center, half_width, depth);
        }

        let (lo, hi) = (rules.min_surface(), rules.max_surface());
        Self {
            heights: heights
                .into_iter()
                .map(|h| (h.round() as i32).clamp(lo, hi))
                .collect(),
        }
    }

    pub(crate) fn get(&self, x: i32) -> Option<i32> {
        usize::try_from(x).ok().and_then(|x| self.heights.get(x).copied())
    }

    pub(crate) fn heights(&self) -> &[i32] {
        &self.heights
    }

    pub(crate) fn len(&self) -> usize {
        self.heights.len()
    }
}

/// Weighted moving average; weights fall off linearly with distance, edges use what exists.
fn smooth(heights: &[f64], radius: i32) -> Vec<f64> {
    let len = heights.len() as i64;
    (0..heights.len())
        .map(|x| {
            let mut sum = 0.0;
            let mut weights = 0.0;
            for d in -radius..=radius {
                let n = x as i64 + d as i64;
                if n < 0 || n >= len {
                    continue;
                }
                let w = (radius + 1 - d.abs()) as f64;
                sum += heights[n as usize] * w;
                weights += w;
            }
            sum / weights
        })
        .collect()
}

/// Triangular falloff around `center`. Negative `offset` raises terrain, positive lowers it.
fn apply_feature(heights: &mut [f64], center: f64, half_width: f64, offset: f64) {
    let start = (center - half_width).floor().max(0.0) as usize;
    let end = ((center + half_width).ceil() as usize).min(heights.len());
    for (x, h) in heights.iter_mut().enumerate().take(end).skip(start) {
        let falloff = 1.0 - (x as f64 - center).abs() / half_width;
        if falloff > 0.0 {
            *h += offset * falloff;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn generate(seed: WorldSeed) -> (HeightField, Ruleset) {
        let rules = Ruleset::server();
        let perlin = Perlin::new(seed);
        let table = BiomeTable::standard();
        let biomes = BiomeMap::generate(seed, &perlin, &table, &rules);
        (
            HeightField::generate(seed, &perlin, &biomes, &table, &rules),
            rules,
        )
    }

    #[test]
    fn deterministic_and_clamped() {
        let (a, rules) = generate(42);
        let (b, _) = generate(42);
        assert_eq!(a, b);
        assert_eq!(a.len(), rules.world_width as usize);
        for &h in a.heights() {
            assert!(h >= rules.min_surface() && h <= rules.max_surface());
        }
    }

    #[test]
    fn different_seeds_differ() {
        let (a, _) = generate(1);
        let (b, _) = generate(2);
        assert_ne!(a, b);
    }

    #[test]
    fn smoothing_removes_spikes() {
        let mut heights = vec![100.0; 11];
        heights[5] = 140.0;
        let smoothed = smooth(&heights, 3);
        assert!(smoothed[5] < 115.0);
        assert!(smoothed[5] > 100.0);
        assert_eq!(smoothed[0], 100.0);
    }

    #[test]
    fn features_fall_off_linearly() {
        let mut heights = vec![100.0; 41];
        apply_feature(&mut heights, 20.0, 10.0, -30.0);
        assert_eq!(heights[20], 70.0);
        assert_eq!(heights[15], 85.0);
        assert_eq!(heights[10], 100.0);
        assert_eq!(heights[35], 100.0);
    }

    #[test]
    fn lookups_outside_the_world_are_none() {
        let field = HeightField::flat(50, 8);
        assert_eq!(field.get(-1), None);
        assert_eq!(field.get(8), None);
        assert_eq!(field.get(3), Some(50));
    }
}
