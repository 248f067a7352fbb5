/// Altitude band where sparse clouds may appear above the terrain.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct CloudBand {
    pub(crate) top: i32,
    pub(crate) bottom: i32,
    pub(crate) threshold: f64,
}

/// Every constant the generator reads. The three presets replace what used to be three
/// separate generators; picking one is a configuration choice.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Ruleset {
    pub(crate) name: &'static str,
    pub(crate) world_width: i32,
    pub(crate) world_height: i32,

    pub(crate) base_height_ratio: f64,
    pub(crate) terrain_amplitude: f64,
    pub(crate) smoothing_passes: u32,
    pub(crate) smoothing_radius: i32,
    pub(crate) mountain_count: u32,
    pub(crate) valley_count: u32,
    /// Minimum rows of ground kept between the surface and the bedrock floor.
    pub(crate) min_ground: i32,

    pub(crate) floor_thickness: i32,
    /// Rows above this are air without touching chunk storage.
    pub(crate) sky_threshold: i32,
    pub(crate) clouds: Option<CloudBand>,
    pub(crate) crust_depth: i32,

    pub(crate) cave_threshold: f64,
    pub(crate) cave_min_depth: i32,
    pub(crate) tunnels: bool,
    pub(crate) tunnel_width: f64,
    pub(crate) chambers: bool,
    pub(crate) chamber_chance: f64,
    pub(crate) generic_ore: bool,

    pub(crate) biome_transition_radius: i32,
    pub(crate) biome_min_segment: usize,
    pub(crate) decorations: bool,
}

impl Ruleset {
    /// The authoritative multiplayer world.
    pub(crate) fn server() -> Self {
        Self {
            name: "server",
            world_width: 2000,
            world_height: 512,
            base_height_ratio: 0.32,
            terrain_amplitude: 26.0,
            smoothing_passes: 3,
            smoothing_radius: 3,
            mountain_count: 6,
            valley_count: 4,
            min_ground: 60,
            floor_thickness: 3,
            sky_threshold: 20,
            clouds: Some(CloudBand {
                top: 24,
                bottom: 56,
                threshold: 0.42,
            }),
            crust_depth: 3,
            cave_threshold: 0.36,
            cave_min_depth: 8,
            tunnels: true,
            tunnel_width: 0.035,
            chambers: true,
            chamber_chance: 0.45,
            generic_ore: false,
            biome_transition_radius: 12,
            biome_min_segment: 40,
            decorations: true,
        }
    }

    /// Single-player sandbox: wider caves, no ant tunnels or chambers.
    pub(crate) fn terraria() -> Self {
        Self {
            name: "terraria",
            world_width: 1600,
            world_height: 400,
            base_height_ratio: 0.35,
            mountain_count: 5,
            valley_count: 3,
            cave_threshold: 0.32,
            cave_min_depth: 6,
            tunnels: false,
            chambers: false,
            ..Self::server()
        }
    }

    /// The ant-colony world: shallow, tunnel-heavy, a single generic ore.
    pub(crate) fn ant_colony() -> Self {
        Self {
            name: "ant",
            world_width: 1000,
            world_height: 320,
            base_height_ratio: 0.3,
            terrain_amplitude: 16.0,
            mountain_count: 2,
            valley_count: 3,
            min_ground: 80,
            clouds: None,
            cave_threshold: 0.42,
            cave_min_depth: 5,
            tunnel_width: 0.05,
            chamber_chance: 0.6,
            generic_ore: true,
            biome_min_segment: 30,
            ..Self::server()
        }
    }

    pub(crate) fn by_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "server" => Some(Self::server()),
            "terraria" => Some(Self::terraria()),
            "ant" | "ant_colony" => Some(Self::ant_colony()),
            _ => None,
        }
    }

    pub(crate) fn base_height(&self) -> f64 {
        self.world_height as f64 * self.base_height_ratio
    }

    /// First row of the bedrock floor.
    pub(crate) fn floor_start(&self) -> i32 {
        self.world_height - self.floor_thickness
    }

    /// Highest allowed surface row (smallest y).
    pub(crate) fn min_surface(&self) -> i32 {
        let above = self.clouds.as_ref().map_or(self.sky_threshold, |c| c.bottom);
        above + 12
    }

    /// Lowest allowed surface row (largest y).
    pub(crate) fn max_surface(&self) -> i32 {
        self.floor_start() - self.min_ground
    }

    pub(crate) fn in_world_x(&self, x: i32) -> bool {
        (0..self.world_width).contains(&x)
    }
}

impl Default for Ruleset {
    fn default() -> Self {
        Self::server()
    }
}

#[cfg(test)]
mod test {
    use test_case::test_case;

    use super::*;

    #[test_case(Ruleset::server())]
    #[test_case(Ruleset::terraria())]
    #[test_case(Ruleset::ant_colony())]
    fn surface_band_is_sane(rules: Ruleset) {
        assert!(rules.min_surface() < rules.base_height() as i32);
        assert!((rules.base_height() as i32) < rules.max_surface());
        assert!(rules.max_surface() < rules.floor_start());
        assert!(rules.sky_threshold < rules.min_surface());
        assert_eq!(rules.world_height % crate::world::CHUNK_SIZE as i32, 0);
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(Ruleset::by_name("ANT").unwrap().name, "ant");
        assert_eq!(Ruleset::by_name("terraria").unwrap().name, "terraria");
        assert!(Ruleset::by_name("nether").is_none());
    }
}
