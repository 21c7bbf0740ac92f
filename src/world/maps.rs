//! Map data definitions for all areas NPCs walk through.
//!
//! Each map is a 2D grid of TileKind values plus the warps that link it to
//! its neighbours. Warp tiles come in pairs: the tile in this map and the
//! tile the walker lands on in the other one.

use crate::shared::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileKind {
    Grass,
    Dirt,
    Path,
    Sand,
    Stone,
    WoodFloor,
    Bridge,
    Water,
    Wall,
    Furniture,
    Void,
}

impl TileKind {
    pub fn is_walkable(self) -> bool {
        !matches!(
            self,
            TileKind::Water | TileKind::Wall | TileKind::Furniture | TileKind::Void
        )
    }
}

/// Complete definition of a map.
#[derive(Debug, Clone)]
pub struct MapDef {
    pub name: String,
    pub width: usize,
    pub height: usize,
    /// Row-major tile data: tiles[y * width + x]
    pub tiles: Vec<TileKind>,
    pub warps: Vec<Warp>,
    /// Gendered rooms (locker rooms). `None` means anyone may pass.
    pub restricted_to: Option<Gender>,
    /// Set on dressed-up copies of another map (festival layouts). Variants
    /// share the base map's warps and never show up in location routes.
    pub variant_of: Option<String>,
}

impl MapDef {
    fn new(name: &str, width: usize, height: usize, floor: TileKind) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            tiles: vec![floor; width * height],
            warps: Vec::new(),
            restricted_to: None,
            variant_of: None,
        }
    }

    pub fn get_tile(&self, x: i32, y: i32) -> TileKind {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            TileKind::Void
        } else {
            self.tiles[y as usize * self.width + x as usize]
        }
    }

    pub fn set_tile(&mut self, x: i32, y: i32, kind: TileKind) {
        if x >= 0 && y >= 0 && x < self.width as i32 && y < self.height as i32 {
            self.tiles[y as usize * self.width + x as usize] = kind;
        }
    }

    pub fn is_walkable(&self, tile: TilePos) -> bool {
        self.get_tile(tile.x, tile.y).is_walkable()
    }

    pub fn warp_to(&self, target_map: &str) -> Option<&Warp> {
        self.warps.iter().find(|w| w.target_map == target_map)
    }

    /// Whether a gendered restriction lets this walker through.
    pub fn admits(&self, gender: Gender) -> bool {
        match (self.restricted_to, gender) {
            (None, _) | (_, Gender::Undefined) => true,
            (Some(only), g) => only == g,
        }
    }

    fn fill_rect(&mut self, x0: i32, y0: i32, rw: i32, rh: i32, kind: TileKind) {
        for dy in 0..rh {
            for dx in 0..rw {
                self.set_tile(x0 + dx, y0 + dy, kind);
            }
        }
    }

    /// Wall ring around an interior.
    fn wall_border(&mut self) {
        let (w, h) = (self.width as i32, self.height as i32);
        self.fill_rect(0, 0, w, 1, TileKind::Wall);
        self.fill_rect(0, h - 1, w, 1, TileKind::Wall);
        self.fill_rect(0, 0, 1, h, TileKind::Wall);
        self.fill_rect(w - 1, 0, 1, h, TileKind::Wall);
    }

    /// Adds a warp and makes sure its tile can be stepped on.
    fn warp(&mut self, x: i32, y: i32, target_map: &str, tx: i32, ty: i32) {
        if !self.get_tile(x, y).is_walkable() {
            self.set_tile(x, y, TileKind::WoodFloor);
        }
        self.warps.push(Warp {
            tile: TilePos::new(x, y),
            target_map: target_map.to_string(),
            target_tile: TilePos::new(tx, ty),
        });
    }
}

// ═══════════════════════════════════════════════════════════════════════
// MAP GENERATORS
// ═══════════════════════════════════════════════════════════════════════

pub const MAP_NAMES: &[&str] = &[
    "FarmHouse",
    "Farm",
    "BusStop",
    "Town",
    "Town-Festival",
    "Saloon",
    "CommunityCenter",
    "Bakery",
    "MayorManor",
    "Beach",
    "Bathhouse_Entry",
    "Bathhouse_MensLocker",
    "Bathhouse_WomensLocker",
    "Bathhouse_Pool",
];

pub fn generate_map(name: &str) -> Option<MapDef> {
    let map = match name {
        "FarmHouse" => generate_farmhouse(),
        "Farm" => generate_farm(),
        "BusStop" => generate_bus_stop(),
        "Town" => generate_town(),
        "Town-Festival" => generate_town_festival(),
        "Saloon" => generate_saloon(),
        "CommunityCenter" => generate_community_center(),
        "Bakery" => generate_bakery(),
        "MayorManor" => generate_mayor_manor(),
        "Beach" => generate_beach(),
        "Bathhouse_Entry" => generate_bathhouse_entry(),
        "Bathhouse_MensLocker" => generate_locker("Bathhouse_MensLocker", Gender::Male),
        "Bathhouse_WomensLocker" => generate_locker("Bathhouse_WomensLocker", Gender::Female),
        "Bathhouse_Pool" => generate_pool(),
        _ => return None,
    };
    Some(map)
}

pub fn all_maps() -> Vec<MapDef> {
    MAP_NAMES.iter().filter_map(|name| generate_map(name)).collect()
}

// ---------------------------------------------------------------------------
// FarmHouse: 12x10 interior, door on the bottom wall
// ---------------------------------------------------------------------------
fn generate_farmhouse() -> MapDef {
    let mut map = MapDef::new("FarmHouse", 12, 10, TileKind::WoodFloor);
    map.wall_border();
    // Kitchen table
    map.fill_rect(2, 2, 3, 2, TileKind::Furniture);
    // Bed against the right wall
    map.fill_rect(9, 1, 2, 2, TileKind::Furniture);
    map.warp(5, 9, "Farm", 16, 7);
    map
}

// ---------------------------------------------------------------------------
// Farm: 32x24, house at top center, pond bottom right, path east to the bus stop
// ---------------------------------------------------------------------------
fn generate_farm() -> MapDef {
    let mut map = MapDef::new("Farm", 32, 24, TileKind::Grass);
    // House exterior
    map.fill_rect(13, 0, 7, 6, TileKind::Wall);
    // Field
    map.fill_rect(4, 14, 14, 6, TileKind::Dirt);
    // Pond
    map.fill_rect(24, 16, 5, 4, TileKind::Water);
    // Path from porch to the east exit
    map.fill_rect(16, 7, 1, 5, TileKind::Path);
    map.fill_rect(16, 12, 16, 1, TileKind::Path);
    map.warp(16, 6, "FarmHouse", 5, 8);
    map.warp(31, 12, "BusStop", 1, 6);
    map
}

// ---------------------------------------------------------------------------
// BusStop: 20x12, road across the middle
// ---------------------------------------------------------------------------
fn generate_bus_stop() -> MapDef {
    let mut map = MapDef::new("BusStop", 20, 12, TileKind::Grass);
    map.fill_rect(0, 5, 20, 3, TileKind::Path);
    // Bench shelter
    map.fill_rect(12, 1, 4, 2, TileKind::Wall);
    map.warp(0, 6, "Farm", 30, 12);
    map.warp(19, 6, "Town", 1, 15);
    map
}

// ---------------------------------------------------------------------------
// Town: 40x30, main street across the middle, buildings above and below
// ---------------------------------------------------------------------------
fn build_town(name: &str) -> MapDef {
    let mut map = MapDef::new(name, 40, 30, TileKind::Grass);
    // Main street
    map.fill_rect(0, 14, 40, 3, TileKind::Path);
    // Saloon
    map.fill_rect(17, 4, 8, 5, TileKind::Wall);
    // Community center
    map.fill_rect(26, 0, 10, 4, TileKind::Wall);
    // Bakery
    map.fill_rect(4, 4, 7, 5, TileKind::Wall);
    // Mayor's manor
    map.fill_rect(30, 21, 8, 5, TileKind::Wall);
    // Fountain
    map.fill_rect(20, 20, 3, 3, TileKind::Water);
    map.fill_rect(19, 17, 1, 12, TileKind::Stone);

    map.warp(0, 15, "BusStop", 18, 6);
    map.warp(20, 9, "Saloon", 8, 10);
    map.warp(30, 4, "CommunityCenter", 10, 14);
    map.warp(7, 9, "Bakery", 4, 6);
    map.warp(33, 20, "MayorManor", 6, 8);
    map.warp(20, 29, "Beach", 15, 1);
    map.warp(39, 15, "Bathhouse_Entry", 1, 4);
    map
}

fn generate_town() -> MapDef {
    build_town("Town")
}

/// Same layout as the town with the festival booths set up on the square.
fn generate_town_festival() -> MapDef {
    let mut map = build_town("Town-Festival");
    map.variant_of = Some("Town".into());
    map.fill_rect(14, 20, 4, 2, TileKind::Furniture);
    map.fill_rect(24, 20, 4, 2, TileKind::Furniture);
    map
}

// ---------------------------------------------------------------------------
// Interiors
// ---------------------------------------------------------------------------
fn generate_saloon() -> MapDef {
    let mut map = MapDef::new("Saloon", 16, 12, TileKind::WoodFloor);
    map.wall_border();
    // Bar counter
    map.fill_rect(3, 3, 10, 1, TileKind::Furniture);
    map.warp(8, 11, "Town", 20, 10);
    map
}

fn generate_community_center() -> MapDef {
    let mut map = MapDef::new("CommunityCenter", 20, 16, TileKind::Stone);
    map.wall_border();
    map.fill_rect(3, 3, 2, 4, TileKind::Furniture);
    map.warp(10, 15, "Town", 30, 5);
    map
}

fn generate_bakery() -> MapDef {
    let mut map = MapDef::new("Bakery", 10, 8, TileKind::WoodFloor);
    map.wall_border();
    // Oven and counter
    map.fill_rect(6, 2, 2, 2, TileKind::Furniture);
    map.warp(4, 7, "Town", 7, 10);
    map
}

fn generate_mayor_manor() -> MapDef {
    let mut map = MapDef::new("MayorManor", 14, 10, TileKind::WoodFloor);
    map.wall_border();
    // Desk
    map.fill_rect(9, 2, 3, 1, TileKind::Furniture);
    map.warp(6, 9, "Town", 33, 19);
    map
}

// ---------------------------------------------------------------------------
// Beach: 30x20, sand with the sea along the bottom and a pier
// ---------------------------------------------------------------------------
fn generate_beach() -> MapDef {
    let mut map = MapDef::new("Beach", 30, 20, TileKind::Sand);
    map.fill_rect(0, 14, 30, 6, TileKind::Water);
    map.fill_rect(20, 10, 2, 6, TileKind::Bridge);
    map.warp(15, 0, "Town", 20, 28);
    map
}

// ---------------------------------------------------------------------------
// Bathhouse: entry hall, one locker room per gender, shared pool
// ---------------------------------------------------------------------------
fn generate_bathhouse_entry() -> MapDef {
    let mut map = MapDef::new("Bathhouse_Entry", 12, 8, TileKind::Stone);
    map.wall_border();
    map.warp(0, 4, "Town", 38, 15);
    map.warp(3, 0, "Bathhouse_MensLocker", 3, 6);
    map.warp(8, 0, "Bathhouse_WomensLocker", 3, 6);
    map
}

fn generate_locker(name: &str, gender: Gender) -> MapDef {
    let mut map = MapDef::new(name, 8, 8, TileKind::Stone);
    map.wall_border();
    map.restricted_to = Some(gender);
    match gender {
        Gender::Male => {
            map.warp(3, 7, "Bathhouse_Entry", 3, 1);
            map.warp(7, 3, "Bathhouse_Pool", 1, 5);
        }
        _ => {
            map.warp(3, 7, "Bathhouse_Entry", 8, 1);
            map.warp(0, 3, "Bathhouse_Pool", 14, 5);
        }
    }
    map
}

fn generate_pool() -> MapDef {
    let mut map = MapDef::new("Bathhouse_Pool", 16, 10, TileKind::Stone);
    map.wall_border();
    map.fill_rect(4, 3, 8, 4, TileKind::Water);
    map.warp(0, 5, "Bathhouse_MensLocker", 6, 3);
    map.warp(15, 5, "Bathhouse_WomensLocker", 1, 3);
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_named_map_generates() {
        assert_eq!(all_maps().len(), MAP_NAMES.len());
        assert!(generate_map("Narnia").is_none());
    }

    #[test]
    fn test_warp_pairs_land_on_walkable_tiles() {
        let maps = all_maps();
        for map in &maps {
            for warp in &map.warps {
                assert!(map.is_walkable(warp.tile), "{} warp tile {}", map.name, warp.tile);
                let target = maps
                    .iter()
                    .find(|m| m.name == warp.target_map)
                    .unwrap_or_else(|| panic!("{} warps to unknown {}", map.name, warp.target_map));
                assert!(
                    target.is_walkable(warp.target_tile),
                    "{} -> {} lands on blocked {}",
                    map.name,
                    target.name,
                    warp.target_tile
                );
            }
        }
    }

    #[test]
    fn test_every_warp_has_a_way_back() {
        let maps = all_maps();
        // Festival variants reuse the base map's warps; the neighbours point at the base map.
        for map in maps.iter().filter(|m| m.variant_of.is_none()) {
            for warp in &map.warps {
                let target = maps.iter().find(|m| m.name == warp.target_map).unwrap();
                assert!(target.warp_to(&map.name).is_some(), "{} has no way back to {}", target.name, map.name);
            }
        }
    }

    #[test]
    fn test_festival_town_keeps_town_warps() {
        let town = generate_town();
        let festival = generate_town_festival();
        assert_eq!(town.warps, festival.warps);
        assert!(!festival.is_walkable(TilePos::new(15, 20)));
        assert!(town.is_walkable(TilePos::new(15, 20)));
    }

    #[test]
    fn test_locker_rooms_admit_by_gender() {
        let mens = generate_locker("Bathhouse_MensLocker", Gender::Male);
        assert!(mens.admits(Gender::Male));
        assert!(!mens.admits(Gender::Female));
        assert!(mens.admits(Gender::Undefined));
    }
}
