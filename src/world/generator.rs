use crate::world::biome::{Biome, BiomeMap, BiomeTable};
use crate::world::chunk::Chunk;
use crate::world::coords::ChunkPos;
use crate::world::noise::{seeded_random, Perlin, WorldSeed};
use crate::world::rules::Ruleset;
use crate::world::terrain::HeightField;
use crate::world::tile::TileType;
use crate::world::CHUNK_SIZE;

const SALT_WATER: u32 = 0x3A7E;
const SALT_CRUST: u32 = 0xC257;
const SALT_STONE: u32 = 0x5707;
const SALT_TREE: u32 = 0x7EE0;
const SALT_TREE_SHAPE: u32 = 0x7EE1;
const SALT_CACTUS: u32 = 0xCAC0;
const SALT_MUSHROOM: u32 = 0x3005;
const SALT_BUSH: u32 = 0xB054;
const SALT_FLOWER: u32 = 0xF10E;
const SALT_GRASS: u32 = 0x6A55;
const SALT_SNOW: u32 = 0x5E0E;
const SALT_SITE: u32 = 0xC4A0;
const SALT_SITE_X: u32 = 0xC4A1;
const SALT_SITE_Y: u32 = 0xC4A2;
const SALT_SITE_SHAPE: u32 = 0xC4A3;
const SALT_FLECK: u32 = 0xF1EC;

/// Widest tree canopy; decorations rooted this far outside a chunk can reach into it.
const MAX_CANOPY: i32 = 3;
const SNOW_LINE_OFFSET: f64 = 20.0;

struct OreBand {
    min_depth: f64,
    vein: f64,
    density: f64,
    tile: TileType,
    salt: u32,
}

/// Deepest first; the first band that hits wins.
const ORE_BANDS: [OreBand; 4] = [
    OreBand {
        min_depth: 0.75,
        vein: 0.5,
        density: 0.25,
        tile: TileType::Diamond,
        salt: 0x0D1A,
    },
    OreBand {
        min_depth: 0.5,
        vein: 0.45,
        density: 0.35,
        tile: TileType::Gold,
        salt: 0x0601,
    },
    OreBand {
        min_depth: 0.25,
        vein: 0.4,
        density: 0.45,
        tile: TileType::Iron,
        salt: 0x0140,
    },
    OreBand {
        min_depth: 0.03,
        vein: 0.35,
        density: 0.55,
        tile: TileType::Coal,
        salt: 0x0C0A,
    },
];

#[derive(Copy, Clone, Debug, PartialEq)]
enum Decoration {
    Tree,
    Cactus,
    Single(TileType),
}

/// An oval air pocket seeded on a coarse grid so it can span chunk borders.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct Chamber {
    pub(crate) x: i32,
    pub(crate) y: i32,
    pub(crate) radius_x: f64,
    pub(crate) radius_y: f64,
}

/// The immutable generation inputs of one world: everything derived from the seed.
pub(crate) struct WorldGen {
    seed: WorldSeed,
    rules: Ruleset,
    table: BiomeTable,
    biomes: BiomeMap,
    heights: HeightField,
    perlin: Perlin,
}

impl WorldGen {
    pub(crate) fn new(seed: WorldSeed, rules: Ruleset) -> Self {
        let perlin = Perlin::new(seed);
        let table = BiomeTable::standard();
        let biomes = BiomeMap::generate(seed, &perlin, &table, &rules);
        let heights = HeightField::generate(seed, &perlin, &biomes, &table, &rules);
        Self {
            seed,
            rules,
            table,
            biomes,
            heights,
            perlin,
        }
    }

    /// Builds a generator from explicit inputs, e.g. ones restored from a save.
    pub(crate) fn with_inputs(
        seed: WorldSeed,
        rules: Ruleset,
        table: BiomeTable,
        biomes: BiomeMap,
        heights: HeightField,
    ) -> Self {
        Self {
            seed,
            rules,
            table,
            biomes,
            heights,
            perlin: Perlin::new(seed),
        }
    }

    pub(crate) fn seed(&self) -> WorldSeed {
        self.seed
    }

    pub(crate) fn rules(&self) -> &Ruleset {
        &self.rules
    }

    pub(crate) fn table(&self) -> &BiomeTable {
        &self.table
    }

    pub(crate) fn biomes(&self) -> &BiomeMap {
        &self.biomes
    }

    pub(crate) fn heights(&self) -> &HeightField {
        &self.heights
    }

    /// True when any column of the chunk lies inside the world and the chunk is not wholly
    /// above the sky or below the floor.
    /// Checked in chunk space, so coordinates straight off the wire cannot overflow.
    pub(crate) fn chunk_in_world(&self, pos: ChunkPos) -> bool {
        (0..ChunkPos::span(self.rules.world_width)).contains(&pos.x)
            && (0..ChunkPos::span(self.rules.world_height)).contains(&pos.y)
    }

    pub(crate) fn generate_chunk(&self, pos: ChunkPos) -> Chunk {
        let mut chunk = Chunk::filled(TileType::Air);
        for ly in 0..CHUNK_SIZE {
            for lx in 0..CHUNK_SIZE {
                let world = pos.world_pos(lx, ly);
                chunk.put(lx, ly, self.base_tile(world.x, world.y));
            }
        }
        // outside the world only the bedrock and sky sentinels apply
        if !self.chunk_in_world(pos) {
            return chunk;
        }
        if self.rules.chambers {
            self.carve_chambers(pos, &mut chunk);
        }
        if self.rules.decorations {
            self.decorate(pos, &mut chunk);
        }
        chunk
    }

    /// Strata, ores, clouds and caves for one cell; everything except cross-cell stamping.
    pub(crate) fn base_tile(&self, x: i32, y: i32) -> TileType {
        if !self.rules.in_world_x(x) || y >= self.rules.floor_start() {
            return TileType::Bedrock;
        }
        if y < 0 {
            return TileType::Air;
        }
        let (Some(surface), Some(biome)) = (self.heights.get(x), self.biomes.get(x)) else {
            return TileType::Bedrock;
        };
        let biome = self.table.get(biome);
        if y < surface {
            return self.sky_tile(x, y);
        }

        let depth = y - surface;
        let tile = if depth == 0 {
            self.surface_tile(x, surface, biome)
        } else if depth <= self.rules.crust_depth {
            if seeded_random(self.seed, x, y, SALT_CRUST) < 0.08 {
                TileType::Stone
            } else {
                biome.crust
            }
        } else {
            self.deep_tile(x, y, surface, biome)
        };

        if depth >= self.rules.cave_min_depth && self.is_cave(x, y, surface, biome) {
            return TileType::Air;
        }
        tile
    }

    fn sky_tile(&self, x: i32, y: i32) -> TileType {
        if let Some(band) = &self.rules.clouds {
            if (band.top..=band.bottom).contains(&y) {
                let n = self.perlin.octave(
                    x as f64 * 0.04 + 700.0,
                    y as f64 * 0.12 + 700.0,
                    2,
                    0.5,
                    2.0,
                );
                if n > band.threshold {
                    return TileType::Cloud;
                }
            }
        }
        TileType::Air
    }

    fn surface_tile(&self, x: i32, surface: i32, biome: &Biome) -> TileType {
        if biome.features.water > 0.0
            && seeded_random(self.seed, x, surface, SALT_WATER) < biome.features.water
        {
            return TileType::Water;
        }
        let snow_line = self.rules.base_height() - SNOW_LINE_OFFSET;
        if biome.features.snow > 0.0 && (surface as f64) < snow_line {
            return TileType::Snow;
        }
        biome.surface
    }

    fn depth_ratio(&self, y: i32, surface: i32) -> f64 {
        let span = (self.rules.floor_start() - surface).max(1) as f64;
        ((y - surface) as f64 / span).clamp(0.0, 1.0)
    }

    fn deep_tile(&self, x: i32, y: i32, surface: i32, biome: &Biome) -> TileType {
        let depth = self.depth_ratio(y, surface);
        for band in &ORE_BANDS {
            if depth < band.min_depth {
                continue;
            }
            let offset = band.salt as f64 * 0.01;
            let vein = self
                .perlin
                .noise(x as f64 * 0.16 + offset, y as f64 * 0.16 + offset);
            if vein > band.vein && seeded_random(self.seed, x, y, band.salt) < band.density {
                return if self.rules.generic_ore {
                    TileType::Ore
                } else {
                    band.tile
                };
            }
        }
        let stone_chance =
            (0.55 + depth * 0.4 - (biome.soil_density - 0.5) * 0.3).clamp(0.05, 0.98);
        if seeded_random(self.seed, x, y, SALT_STONE) < stone_chance {
            TileType::Stone
        } else {
            TileType::Dirt
        }
    }

    fn is_cave(&self, x: i32, y: i32, surface: i32, biome: &Biome) -> bool {
        let (fx, fy) = (x as f64, y as f64);
        let p = &self.perlin;
        let broad = p.octave(fx * 0.03, fy * 0.03, 2, 0.5, 2.0);
        let medium = p.noise(fx * 0.07 + 100.0, fy * 0.07 + 100.0);
        let fine = p.noise(fx * 0.15 + 200.0, fy * 0.15 + 200.0);
        let horizontal = p.noise(fx * 0.015 + 300.0, fy * 0.06 + 300.0);
        let mut value = broad * 0.5 + medium * 0.3 + fine * 0.2 + horizontal * 0.25;

        let shaft = p.noise(fx * 0.09 + 400.0, 0.5);
        if shaft > 0.5 {
            value += (shaft - 0.5) * 0.8;
        }
        if p.noise(fx * 0.02 + 500.0, fy * 0.02 + 500.0) > 0.45 {
            value += 0.25;
        }

        let threshold = self.rules.cave_threshold + (biome.soil_density - 0.5) * 0.2
            - self.depth_ratio(y, surface) * 0.08;
        if value > threshold {
            return true;
        }
        self.rules.tunnels && self.is_tunnel(x, y, biome)
    }

    fn is_tunnel(&self, x: i32, y: i32, biome: &Biome) -> bool {
        let t = self
            .perlin
            .noise(x as f64 * 0.035 + 600.0, y as f64 * 0.05 + 600.0)
            .abs();
        t < self.rules.tunnel_width * biome.tunnel_friendliness
    }

    /// The chamber seeded in grid cell `site`, if any. Sites share the chunk grid, and a chamber
    /// is never wider than a chunk, so only the 3x3 neighbourhood can reach a given chunk.
    /// Ant-friendly biomes get proportionally more chambers.
    pub(crate) fn chamber_at(&self, site: ChunkPos) -> Option<Chamber> {
        let origin = site.origin();
        let size = CHUNK_SIZE as f64;
        let x = origin.x + (seeded_random(self.seed, site.x, site.y, SALT_SITE_X) * size) as i32;
        let y = origin.y + (seeded_random(self.seed, site.x, site.y, SALT_SITE_Y) * size) as i32;
        let surface = self.heights.get(x)?;
        let biome = self.table.get(self.biomes.get(x)?);
        let chance = self.rules.chamber_chance * biome.ant_friendliness;
        if seeded_random(self.seed, site.x, site.y, SALT_SITE) >= chance {
            return None;
        }

        let shape = seeded_random(self.seed, site.x, site.y, SALT_SITE_SHAPE);
        let radius_x = 3.0 + shape * 4.0;
        let radius_y = (radius_x * (0.5 + shape * 0.4)).max(2.0);
        let reach = radius_y.ceil() as i32;
        if y - reach < surface + self.rules.cave_min_depth
            || y + reach >= self.rules.floor_start()
            || !self.is_tunnel(x, y, biome)
        {
            return None;
        }
        Some(Chamber {
            x,
            y,
            radius_x,
            radius_y,
        })
    }

    fn carve_chambers(&self, pos: ChunkPos, chunk: &mut Chunk) {
        let origin = pos.origin();
        for sy in pos.y - 1..=pos.y + 1 {
            for sx in pos.x - 1..=pos.x + 1 {
                let Some(chamber) = self.chamber_at(ChunkPos::new(sx, sy)) else {
                    continue;
                };
                for ly in 0..CHUNK_SIZE {
                    for lx in 0..CHUNK_SIZE {
                        let (x, y) = (origin.x + lx as i32, origin.y + ly as i32);
                        let dx = (x - chamber.x) as f64 / chamber.radius_x;
                        let dy = (y - chamber.y) as f64 / chamber.radius_y;
                        if dx * dx + dy * dy > 1.0 || chunk.get(lx, ly) == TileType::Bedrock {
                            continue;
                        }
                        chunk.put(lx, ly, self.chamber_fill(x, y));
                    }
                }
            }
        }
    }

    fn chamber_fill(&self, x: i32, y: i32) -> TileType {
        let roll = seeded_random(self.seed, x, y, SALT_FLECK);
        if roll >= 0.06 {
            TileType::Air
        } else if roll < 0.01 {
            if self.rules.generic_ore {
                TileType::Ore
            } else {
                TileType::Iron
            }
        } else if roll < 0.035 {
            TileType::Stone
        } else {
            TileType::Dirt
        }
    }

    fn decoration(&self, x: i32, surface: i32, biome: &Biome) -> Option<Decoration> {
        let f = &biome.features;
        let rolls = [
            (f.tree, SALT_TREE, Decoration::Tree),
            (f.cactus, SALT_CACTUS, Decoration::Cactus),
            (f.mushroom, SALT_MUSHROOM, Decoration::Single(TileType::Mushroom)),
            (f.bush, SALT_BUSH, Decoration::Single(TileType::Bush)),
            (f.flower, SALT_FLOWER, Decoration::Single(TileType::Flower)),
            (f.tall_grass, SALT_GRASS, Decoration::Single(TileType::TallGrass)),
            (f.snow, SALT_SNOW, Decoration::Single(TileType::Snow)),
        ];
        rolls
            .into_iter()
            .find(|(chance, salt, _)| {
                *chance > 0.0 && seeded_random(self.seed, x, surface, *salt) < *chance
            })
            .map(|(_, _, decoration)| decoration)
    }

    fn decorate(&self, pos: ChunkPos, chunk: &mut Chunk) {
        let origin = pos.origin();
        let size = CHUNK_SIZE as i32;
        for x in origin.x - MAX_CANOPY..origin.x + size + MAX_CANOPY {
            let (Some(surface), Some(biome)) = (self.heights.get(x), self.biomes.get(x)) else {
                continue;
            };
            let biome = self.table.get(biome);
            if !self.base_tile(x, surface).is_solid() || !self.base_tile(x, surface - 1).is_air()
            {
                continue;
            }
            let Some(decoration) = self.decoration(x, surface, biome) else {
                continue;
            };
            let mut stamp = |wx: i32, wy: i32, tile: TileType| {
                let (lx, ly) = (wx - origin.x, wy - origin.y);
                if (0..size).contains(&lx)
                    && (0..size).contains(&ly)
                    && chunk.get(lx as usize, ly as usize).is_air()
                {
                    chunk.put(lx as usize, ly as usize, tile);
                }
            };
            match decoration {
                Decoration::Tree => {
                    let shape = seeded_random(self.seed, x, surface, SALT_TREE_SHAPE);
                    let trunk = 4 + (shape * 4.0) as i32;
                    let radius = 2 + ((shape * 8.0) as i32 % 2);
                    let top = surface - trunk;
                    for y in top..surface {
                        stamp(x, y, TileType::Wood);
                    }
                    for dy in -radius..=1 {
                        for dx in -radius..=radius {
                            if dx * dx + dy * dy <= radius * radius + 1 {
                                stamp(x + dx, top + dy, TileType::Leaves);
                            }
                        }
                    }
                }
                Decoration::Cactus => {
                    let height = 1 + (seeded_random(self.seed, x, surface, SALT_TREE_SHAPE) * 3.0)
                        as i32;
                    for y in surface - height..surface {
                        stamp(x, y, TileType::Cactus);
                    }
                }
                Decoration::Single(tile) => stamp(x, surface - 1, tile),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::world::biome::FeatureFrequencies;

    fn bare_biome(name: &'static str, features: FeatureFrequencies) -> Biome {
        Biome {
            name,
            max_noise: 1.0,
            height_modifier: 0.0,
            amplitude: 1.0,
            soil_density: 0.5,
            ant_friendliness: 1.0,
            tunnel_friendliness: 1.0,
            surface: TileType::Grass,
            crust: TileType::Dirt,
            features,
        }
    }

    fn flat_world(biomes: BiomeMap, table: BiomeTable) -> WorldGen {
        let rules = Ruleset {
            clouds: None,
            ..Ruleset::server()
        };
        let width = rules.world_width as usize;
        WorldGen::with_inputs(7, rules, table, biomes, HeightField::flat(50, width))
    }

    #[test]
    fn generation_is_idempotent() {
        let a = WorldGen::new(42, Ruleset::server());
        let b = WorldGen::new(42, Ruleset::server());
        for pos in [
            ChunkPos::new(0, 0),
            ChunkPos::new(10, 10),
            ChunkPos::new(57, 20),
            ChunkPos::new(-1, 3),
        ] {
            let first = a.generate_chunk(pos);
            assert_eq!(first, a.generate_chunk(pos));
            assert_eq!(first, b.generate_chunk(pos));
            assert!(!first.is_modified());
        }
    }

    #[test]
    fn flat_surface_splits_air_from_ground() {
        let table = BiomeTable::new(vec![bare_biome("bare", FeatureFrequencies::default())]);
        let world = flat_world(BiomeMap::uniform(0, 2000), table);

        let sky = world.generate_chunk(ChunkPos::new(0, 0));
        assert_eq!(sky, Chunk::filled(TileType::Air));

        // rows 48..64
        let chunk = world.generate_chunk(ChunkPos::new(0, 3));
        for lx in 0..CHUNK_SIZE {
            assert_eq!(chunk.get(lx, 0), TileType::Air);
            assert_eq!(chunk.get(lx, 1), TileType::Air);
            assert_ne!(chunk.get(lx, 2), TileType::Air);
            assert_eq!(chunk.get(lx, 2), TileType::Grass);
            // crust is never carved
            assert_ne!(chunk.get(lx, 3), TileType::Air);
        }
    }

    #[test]
    fn bedrock_floor_and_out_of_world_columns() {
        let world = WorldGen::new(3, Ruleset::server());
        let rules = world.rules().clone();
        let floor = ChunkPos::new(5, rules.world_height / CHUNK_SIZE as i32 - 1);
        let chunk = world.generate_chunk(floor);
        for lx in 0..CHUNK_SIZE {
            for ly in (CHUNK_SIZE - rules.floor_thickness as usize)..CHUNK_SIZE {
                assert_eq!(chunk.get(lx, ly), TileType::Bedrock);
            }
        }
        assert_eq!(world.base_tile(-1, 200), TileType::Bedrock);
        assert_eq!(world.base_tile(rules.world_width, 10), TileType::Bedrock);
        assert_eq!(world.base_tile(10, rules.world_height + 100), TileType::Bedrock);
        assert_eq!(world.base_tile(10, -5), TileType::Air);
        assert!(!world.chunk_in_world(ChunkPos::new(-1, 3)));
        assert!(world.chunk_in_world(ChunkPos::new(0, 3)));
    }

    #[test]
    fn canopy_crosses_chunk_borders() {
        let table = BiomeTable::new(vec![
            bare_biome("bare", FeatureFrequencies::default()),
            bare_biome(
                "grove",
                FeatureFrequencies {
                    tree: 1.0,
                    ..Default::default()
                },
            ),
        ]);
        let mut ids = vec![0; 2000];
        ids[15] = 1;
        let world = flat_world(BiomeMap::from_ids(ids), table);

        // rows 32..48 hold the whole tree above the surface at 50
        let left = world.generate_chunk(ChunkPos::new(0, 2));
        let right = world.generate_chunk(ChunkPos::new(1, 2));
        let trunk = (0..CHUNK_SIZE)
            .filter(|&ly| left.get(15, ly) == TileType::Wood)
            .count();
        assert!(trunk >= 2);
        assert!((0..CHUNK_SIZE).any(|ly| right.get(0, ly) == TileType::Leaves));
        assert!((0..CHUNK_SIZE).all(|ly| right.get(0, ly) != TileType::Wood));
    }

    #[test]
    fn decorations_use_fixed_priority() {
        let biome = bare_biome(
            "everything",
            FeatureFrequencies {
                tree: 1.0,
                cactus: 1.0,
                flower: 1.0,
                ..Default::default()
            },
        );
        let world = WorldGen::new(1, Ruleset::server());
        assert_eq!(world.decoration(10, 50, &biome), Some(Decoration::Tree));
        let none = bare_biome("none", FeatureFrequencies::default());
        assert_eq!(world.decoration(10, 50, &none), None);
    }

    #[test]
    fn chambers_are_deterministic_and_below_the_crust() {
        let world = WorldGen::new(11, Ruleset::server());
        let mut found = 0;
        for sx in 0..60 {
            for sy in 5..30 {
                let site = ChunkPos::new(sx, sy);
                let chamber = world.chamber_at(site);
                assert_eq!(chamber, world.chamber_at(site));
                if let Some(c) = chamber {
                    found += 1;
                    let surface = world.heights().get(c.x).unwrap();
                    assert!(c.y - c.radius_y.ceil() as i32 >= surface + world.rules().cave_min_depth);
                    assert!(c.radius_x <= CHUNK_SIZE as f64);
                }
            }
        }
        assert!(found > 0);
    }

    #[test]
    fn hostile_biomes_have_no_chambers() {
        let count = |ant_friendliness: f64| {
            let biome = Biome {
                ant_friendliness,
                ..bare_biome("soil", FeatureFrequencies::default())
            };
            let world = flat_world(BiomeMap::uniform(0, 2000), BiomeTable::new(vec![biome]));
            (0..60)
                .flat_map(|sx| (5..30).map(move |sy| ChunkPos::new(sx, sy)))
                .filter(|&site| world.chamber_at(site).is_some())
                .count()
        };
        assert_eq!(count(0.0), 0);
        assert!(count(1.0) > 0);
        assert!(count(0.3) <= count(1.0));
    }

    #[test]
    fn generic_ore_ruleset_uses_one_ore() {
        let world = WorldGen::new(5, Ruleset::ant_colony());
        let mut seen_ore = false;
        for cx in 0..20 {
            for cy in 8..19 {
                let chunk = world.generate_chunk(ChunkPos::new(cx, cy));
                for ly in 0..CHUNK_SIZE {
                    for lx in 0..CHUNK_SIZE {
                        let t = chunk.get(lx, ly);
                        assert!(!matches!(
                            t,
                            TileType::Coal | TileType::Iron | TileType::Gold | TileType::Diamond
                        ));
                        seen_ore |= t == TileType::Ore;
                    }
                }
            }
        }
        assert!(seen_ore);
    }
}
