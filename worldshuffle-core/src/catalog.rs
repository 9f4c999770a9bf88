use std::fs;
use std::path::Path;

use crate::Result;

/// Blocks that break a structure when dropped in at random: fluids,
/// anything that needs a supporting block, multi-block parts and
/// technical blocks.
pub const DEFAULT_EXCLUSIONS: &[&str] = &[
    "bedrock", "trial_spawner", "spawner", "command_block", "water", "lava",
    // candles
    "white_candle", "light_gray_candle", "gray_candle", "black_candle", "brown_candle",
    "red_candle", "orange_candle", "yellow_candle", "lime_candle", "green_candle",
    "cyan_candle", "light_blue_candle", "blue_candle", "purple_candle", "magenta_candle",
    "pink_candle",
    // beds
    "white_bed", "light_gray_bed", "gray_bed", "black_bed", "brown_bed", "red_bed",
    "orange_bed", "yellow_bed", "lime_bed", "green_bed", "cyan_bed", "light_blue_bed",
    "blue_bed", "purple_bed", "magenta_bed", "pink_bed",
    // carpets
    "white_carpet", "light_gray_carpet", "gray_carpet", "black_carpet", "brown_carpet",
    "red_carpet", "orange_carpet", "yellow_carpet", "lime_carpet", "green_carpet",
    "cyan_carpet", "light_blue_carpet", "blue_carpet", "purple_carpet", "magenta_carpet",
    "pink_carpet", "moss_carpet", "pale_moss_carpet",
    // banners
    "white_banner", "light_gray_banner", "gray_banner", "black_banner", "brown_banner",
    "red_banner", "orange_banner", "yellow_banner", "lime_banner", "green_banner",
    "cyan_banner", "light_blue_banner", "blue_banner", "purple_banner", "magenta_banner",
    "pink_banner",
    // doors
    "iron_door", "copper_door", "exposed_copper_door", "weathered_copper_door",
    "oxidized_copper_door", "waxed_copper_door", "waxed_exposed_copper_door",
    "waxed_weathered_copper_door", "waxed_oxidized_copper_door", "oak_door", "birch_door",
    "spruce_door", "jungle_door", "acacia_door", "dark_oak_door", "mangrove_door",
    "cherry_door", "pale_oak_door", "bamboo_door", "crimson_door", "warped_door",
    // buttons
    "oak_button", "birch_button", "spruce_button", "jungle_button", "acacia_button",
    "dark_oak_button", "mangrove_button", "cherry_button", "pale_oak_button",
    "bamboo_button", "crimson_button", "warped_button", "stone_button",
    "polished_blackstone_button",
    // saplings, fungi, flowers and other plants
    "oak_sapling", "birch_sapling", "spruce_sapling", "jungle_sapling", "acacia_sapling",
    "dark_oak_sapling", "mangrove_propagule", "cherry_sapling", "pale_oak_sapling",
    "azalea", "flowering_azalea", "brown_mushroom", "red_mushroom", "crimson_fungus",
    "warped_fungus", "short_grass", "fern", "dead_bush", "dandelion", "poppy",
    "blue_orchid", "allium", "azure_bluet", "red_tulip", "orange_tulip", "white_tulip",
    "pink_tulip", "oxeye_daisy", "cornflower", "lily_of_the_valley", "torchflower",
    "closed_eyeblossom", "open_eyeblossom", "wither_rose", "pink_petals", "spore_blossom",
    "bamboo", "sugar_cane", "cactus", "crimson_roots", "warped_roots", "weeping_vines",
    "twisting_vines", "vine", "tall_grass", "large_fern", "sunflower", "lilac", "rose_bush",
    "peony", "pitcher_plant", "big_dripleaf", "small_dripleaf", "glow_lichen",
    "hanging_roots", "glow_berries", "sweet_berries", "nether_wart", "lily_pad", "snow",
    "pale_hanging_moss", "pointed_dripstone",
    // aquatic
    "seagrass", "sea_pickle", "kelp", "tube_coral", "brain_coral", "bubble_coral",
    "fire_coral", "horn_coral", "tube_coral_fan", "brain_coral_fan", "bubble_coral_fan",
    "fire_coral_fan", "horn_coral_fan", "dead_tube_coral", "dead_brain_coral",
    "dead_bubble_coral", "dead_fire_coral", "dead_horn_coral", "dead_tube_coral_fan",
    "dead_brain_coral_fan", "dead_bubble_coral_fan", "dead_fire_coral_fan",
    "dead_horn_coral_fan",
    // torches and signs
    "torch", "soul_torch", "redstone_torch", "oak_sign", "birch_sign", "spruce_sign",
    "jungle_sign", "acacia_sign", "dark_oak_sign", "mangrove_sign", "cherry_sign",
    "pale_oak_sign", "bamboo_sign",
    // redstone and rails
    "vault", "redstone", "repeater", "comparator", "lever", "oak_pressure_plate",
    "birch_pressure_plate", "spruce_pressure_plate", "jungle_pressure_plate",
    "acacia_pressure_plate", "dark_oak_pressure_plate", "mangrove_pressure_plate",
    "cherry_pressure_plate", "pale_oak_pressure_plate", "bamboo_pressure_plate",
    "light_weighted_pressure_plate", "heavy_weighted_pressure_plate", "tripwire_hook",
    "rail", "powered_rail", "detector_rail", "activator_rail",
];

/// Extra copies in the flattened catalog, raising an id's pick rate.
pub const DEFAULT_WEIGHTS: &[(&str, usize)] = &[("chest", 3)];

/// Values that are never overwritten wherever they appear.
pub const DEFAULT_SKIP_LIST: &[&str] = &[
    "minecraft:air",
    "minecraft:cave_air",
    "minecraft:void_air",
    "minecraft:water",
    "minecraft:lava",
    "minecraft:structure_void",
    "minecraft:jigsaw",
];

/// Keys the palette search never descends into. Structure files keep
/// their (large) block and entity lists under these.
pub const DEFAULT_OPAQUE_BRANCHES: &[&str] = &["blocks", "entities"];

/// Extracts the `id` column from CSV text with a header row. Rows that are
/// too short or carry an empty id are skipped; a `namespace:` prefix on an
/// id is dropped so the catalog only holds bare ids. A file without an `id`
/// column contributes nothing.
pub fn parse_catalog(text: &str, namespace: &str) -> Result<Vec<String>> {
    let text = text.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let Some(id_col) = reader.headers()?.iter().position(|h| h == "id") else {
        log::warn!("catalog has no `id` column");
        return Ok(Vec::new());
    };

    let prefix = format!("{namespace}:");
    let mut ids = Vec::new();
    for record in reader.records() {
        let record = record?;
        let Some(id) = record.get(id_col) else {
            continue;
        };
        let id = id.strip_prefix(&prefix).unwrap_or(id);
        if id.is_empty() {
            continue;
        }
        ids.push(id.to_string());
    }

    Ok(ids)
}

pub fn read_catalog(path: &Path, namespace: &str) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)?;
    let ids = parse_catalog(&text, namespace)?;
    log::debug!("read {} catalog rows from {}", ids.len(), path.display());
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ShuffleError;

    #[test]
    fn reads_id_column_from_any_position() {
        let text = "name,id,hardness\nStone,stone,1.5\nDirt,minecraft:dirt,0.5\n";
        let ids = parse_catalog(text, "minecraft").unwrap();
        assert_eq!(ids, vec!["stone", "dirt"]);
    }

    #[test]
    fn quoted_fields_may_contain_commas() {
        let text = "display,id\n\"Chest, large\",chest\n\"Say \"\"hi\"\"\",sign\n";
        let ids = parse_catalog(text, "minecraft").unwrap();
        assert_eq!(ids, vec!["chest", "sign"]);
    }

    #[test]
    fn quoted_fields_may_span_lines() {
        let text = "id,display\nchest,\"Chest\nlarge\"\nstone,Stone\n";
        let ids = parse_catalog(text, "minecraft").unwrap();
        assert_eq!(ids, vec!["chest", "stone"]);
    }

    #[test]
    fn short_rows_and_blank_ids_are_skipped() {
        let text = "label,id\r\nonly-label\r\nx,\r\ny,glass\r\n";
        let ids = parse_catalog(text, "minecraft").unwrap();
        assert_eq!(ids, vec!["glass"]);
    }

    #[test]
    fn missing_id_column_yields_no_ids() {
        let ids = parse_catalog("\u{feff}name\nstone\n", "minecraft").unwrap();
        assert!(ids.is_empty());
    }

    #[test]
    fn byte_order_mark_does_not_hide_the_header() {
        let ids = parse_catalog("\u{feff}id\nstone\n", "minecraft").unwrap();
        assert_eq!(ids, vec!["stone"]);
    }

    #[test]
    fn empty_file_yields_no_ids() {
        assert!(parse_catalog("", "minecraft").unwrap().is_empty());
    }

    #[test]
    fn read_catalog_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_catalog(&dir.path().join("nope.csv"), "minecraft").unwrap_err();
        assert!(matches!(err, ShuffleError::Io(_)));
    }
}
