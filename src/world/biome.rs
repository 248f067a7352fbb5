use crate::world::noise::{seeded_random, Perlin, WorldSeed};
use crate::world::rules::Ruleset;
use crate::world::tile::TileType;

pub(crate) type BiomeId = u8;

const SALT_BIOME_BLEND: u32 = 0xB10E;

/// Per-column chance of each surface decoration.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct FeatureFrequencies {
    pub(crate) tree: f64,
    pub(crate) bush: f64,
    pub(crate) flower: f64,
    pub(crate) tall_grass: f64,
    pub(crate) cactus: f64,
    pub(crate) mushroom: f64,
    pub(crate) snow: f64,
    pub(crate) water: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Biome {
    pub(crate) name: &'static str,
    /// Upper edge of this biome's band on the `[0, 1]` biome noise axis.
    pub(crate) max_noise: f64,
    /// Rows the surface is raised by (negative lowers it).
    pub(crate) height_modifier: f64,
    /// Multiplier on the terrain noise amplitude.
    pub(crate) amplitude: f64,
    /// `0..1`; dense soil means more dirt underground and fewer caves.
    pub(crate) soil_density: f64,
    /// Scales how often chambers are seeded.
    pub(crate) ant_friendliness: f64,
    pub(crate) tunnel_friendliness: f64,
    pub(crate) surface: TileType,
    pub(crate) crust: TileType,
    pub(crate) features: FeatureFrequencies,
}

/// The fixed biome catalog, ordered by ascending noise band.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct BiomeTable {
    biomes: Vec<Biome>,
}

impl BiomeTable {
    pub(crate) fn new(biomes: Vec<Biome>) -> Self {
        assert!(!biomes.is_empty(), "a biome table needs at least one biome");
        Self { biomes }
    }

    pub(crate) fn standard() -> Self {
        Self::new(vec![
            Biome {
                name: "desert",
                max_noise: 0.3,
                height_modifier: -4.0,
                amplitude: 0.6,
                soil_density: 0.3,
                ant_friendliness: 0.5,
                tunnel_friendliness: 0.7,
                surface: TileType::Sand,
                crust: TileType::Sand,
                features: FeatureFrequencies {
                    cactus: 0.06,
                    bush: 0.01,
                    ..Default::default()
                },
            },
            Biome {
                name: "plains",
                max_noise: 0.42,
                height_modifier: 0.0,
                amplitude: 0.5,
                soil_density: 0.6,
                ant_friendliness: 1.0,
                tunnel_friendliness: 1.0,
                surface: TileType::Grass,
                crust: TileType::Dirt,
                features: FeatureFrequencies {
                    tree: 0.02,
                    bush: 0.04,
                    flower: 0.06,
                    tall_grass: 0.15,
                    ..Default::default()
                },
            },
            Biome {
                name: "grassland",
                max_noise: 0.52,
                height_modifier: 1.0,
                amplitude: 0.45,
                soil_density: 0.65,
                ant_friendliness: 0.9,
                tunnel_friendliness: 0.9,
                surface: TileType::Grass,
                crust: TileType::Dirt,
                features: FeatureFrequencies {
                    tree: 0.01,
                    flower: 0.08,
                    tall_grass: 0.3,
                    ..Default::default()
                },
            },
            Biome {
                name: "forest",
                max_noise: 0.64,
                height_modifier: 3.0,
                amplitude: 0.8,
                soil_density: 0.55,
                ant_friendliness: 0.8,
                tunnel_friendliness: 0.8,
                surface: TileType::Grass,
                crust: TileType::Dirt,
                features: FeatureFrequencies {
                    tree: 0.16,
                    bush: 0.06,
                    flower: 0.02,
                    mushroom: 0.04,
                    ..Default::default()
                },
            },
            Biome {
                name: "wetland",
                max_noise: 0.74,
                height_modifier: -6.0,
                amplitude: 0.3,
                soil_density: 0.8,
                ant_friendliness: 0.6,
                tunnel_friendliness: 0.6,
                surface: TileType::Grass,
                crust: TileType::Dirt,
                features: FeatureFrequencies {
                    tree: 0.03,
                    tall_grass: 0.2,
                    mushroom: 0.05,
                    water: 0.18,
                    ..Default::default()
                },
            },
            Biome {
                name: "mountains",
                max_noise: 1.0,
                height_modifier: 18.0,
                amplitude: 2.0,
                soil_density: 0.2,
                ant_friendliness: 0.4,
                tunnel_friendliness: 1.2,
                surface: TileType::Grass,
                crust: TileType::Stone,
                features: FeatureFrequencies {
                    tree: 0.01,
                    snow: 0.25,
                    ..Default::default()
                },
            },
        ])
    }

    /// Falls back to the first biome for unknown ids so lookups stay total.
    pub(crate) fn get(&self, id: BiomeId) -> &Biome {
        self.biomes.get(id as usize).unwrap_or(&self.biomes[0])
    }

    pub(crate) fn id_of(&self, name: &str) -> Option<BiomeId> {
        self.biomes
            .iter()
            .position(|b| b.name == name)
            .map(|i| i as BiomeId)
    }

    pub(crate) fn len(&self) -> usize {
        self.biomes.len()
    }

    /// Maps a noise value to the first biome whose band contains it.
    pub(crate) fn classify(&self, value: f64) -> BiomeId {
        self.biomes
            .iter()
            .position(|b| value <= b.max_noise)
            .unwrap_or(self.biomes.len() - 1) as BiomeId
    }
}

/// One biome per world column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct BiomeMap {
    ids: Vec<BiomeId>,
}

impl BiomeMap {
    pub(crate) fn from_ids(ids: Vec<BiomeId>) -> Self {
        Self { ids }
    }

    #[cfg(test)]
    pub(crate) fn uniform(id: BiomeId, width: usize) -> Self {
        Self { ids: vec![id; width] }
    }

    pub(crate) fn generate(
        seed: WorldSeed,
        perlin: &Perlin,
        table: &BiomeTable,
        rules: &Ruleset,
    ) -> Self {
        let width = rules.world_width.max(0) as usize;
        let raw: Vec<BiomeId> = (0..width)
            .map(|x| table.classify(biome_noise(perlin, x as f64)))
            .collect();
        let mut map = Self { ids: raw };
        map.blend_transitions(seed, rules.biome_transition_radius);
        map.enforce_min_segment(rules.biome_min_segment);
        map
    }

    pub(crate) fn get(&self, x: i32) -> Option<BiomeId> {
        usize::try_from(x).ok().and_then(|x| self.ids.get(x).copied())
    }

    pub(crate) fn ids(&self) -> &[BiomeId] {
        &self.ids
    }

    pub(crate) fn len(&self) -> usize {
        self.ids.len()
    }

    /// Contiguous same-biome runs as `(start, length, biome)`.
    pub(crate) fn runs(&self) -> Vec<(usize, usize, BiomeId)> {
        let mut runs: Vec<(usize, usize, BiomeId)> = Vec::new();
        for (x, &id) in self.ids.iter().enumerate() {
            match runs.last_mut() {
                Some((_, len, last)) if *last == id => *len += 1,
                _ => runs.push((x, 1, id)),
            }
        }
        runs
    }

    /// Near a border, a column may take its neighbour's biome with a chance that falls off
    /// linearly with the distance to the border.
    fn blend_transitions(&mut self, seed: WorldSeed, radius: i32) {
        if radius <= 0 {
            return;
        }
        let original = self.ids.clone();
        let width = original.len() as i64;
        for x in 0..original.len() {
            let own = original[x];
            let neighbour = (1..=radius).find_map(|d| {
                [x as i64 - d as i64, x as i64 + d as i64]
                    .into_iter()
                    .filter(|&n| n >= 0 && n < width)
                    .map(|n| original[n as usize])
                    .find(|&b| b != own)
                    .map(|b| (d, b))
            });
            if let Some((distance, biome)) = neighbour {
                let chance = 0.5 * (1.0 - distance as f64 / (radius + 1) as f64);
                if seeded_random(seed, x as i32, 0, SALT_BIOME_BLEND) < chance {
                    self.ids[x] = biome;
                }
            }
        }
    }

    /// Absorbs every run shorter than `min_len` into its longer neighbour.
    fn enforce_min_segment(&mut self, min_len: usize) {
        loop {
            let runs = self.runs();
            if runs.len() <= 1 {
                return;
            }
            let shortest = runs
                .iter()
                .enumerate()
                .filter(|(_, (_, len, _))| *len < min_len)
                .min_by_key(|(i, (_, len, _))| (*len, *i));
            let Some((i, &(start, len, _))) = shortest else {
                return;
            };
            let left = i.checked_sub(1).map(|j| runs[j]);
            let right = runs.get(i + 1).copied();
            let target = match (left, right) {
                (Some(l), Some(r)) => {
                    if r.1 > l.1 {
                        r.2
                    } else {
                        l.2
                    }
                }
                (Some(l), None) => l.2,
                (None, Some(r)) => r.2,
                (None, None) => return,
            };
            for id in &mut self.ids[start..start + len] {
                *id = target;
            }
        }
    }
}

/// Blended three-band 1-D noise over the X axis, mapped into `[0, 1]`.
fn biome_noise(perlin: &Perlin, x: f64) -> f64 {
    let broad = perlin.octave(x * 0.0025, 0.5, 3, 0.5, 2.0);
    let mid = perlin.octave(x * 0.008, 10.5, 2, 0.5, 2.0);
    let fine = perlin.noise(x * 0.03, 20.5);
    let blended = broad * 0.6 + mid * 0.3 + fine * 0.1;
    ((blended * 1.6 + 1.0) / 2.0).clamp(0.0, 1.0)
}
