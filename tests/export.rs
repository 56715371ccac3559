use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{Rgba, RgbaImage};
use mapexport::cache::{
    AreaDefinition, COMPOSITE_ARCHIVE, DETAILS_ARCHIVE, Location, ObjectDefinition, Position,
    Region, RegionId, SpriteDefinition, SpriteIndex, WORLDMAP_INDEX, WorldMapComposite,
    WorldMapDetail, XteaKey,
};
use mapexport::{
    CacheSource, ExportConfig, ExportError, ExportPipeline, KeyTable, MemoryStore, RenderOptions,
};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mapexport-it-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

fn config_for(out: &Path) -> ExportConfig {
    ExportConfig {
        version: "test_v".to_string(),
        out_dir: out.to_path_buf(),
        ..ExportConfig::default()
    }
}

fn place(region: &mut Region, object_id: u32, dx: i32, dy: i32) {
    let position = Position::new(region.base_x() + dx, region.base_y() + dy, 0);
    region.locations.push(Location {
        id: object_id,
        kind: 10,
        orientation: 0,
        position,
    });
}

/// Два региона (50,50) и (50,51), у каждого свой ключ.
/// Объект 1 — без области; объекты 2 и 3 — разные области с общим спрайтом 1452.
fn fixture() -> (MemoryStore, KeyTable) {
    let mut store = MemoryStore::new();
    let mut keys = KeyTable::new();

    let mut south = Region::new(50, 50);
    south.set_tile_color(0, 0, 0, 0x0044_8822);
    place(&mut south, 1, 5, 5);
    place(&mut south, 2, 10, 10);

    let mut north = Region::new(50, 51);
    north.set_tile_color(0, 63, 63, 0x0022_4488);
    // чёрный тайл на плоскости 1 — это тайл, а не пустота
    north.set_tile_color(1, 0, 63, 0);
    place(&mut north, 3, 20, 20);

    for (region, key) in [(south, [1, 2, 3, 4]), (north, [5, 6, 7, 8])] {
        keys.insert(region.id(), key);
        store.insert_region(region, Some(key));
    }

    store.insert_object(ObjectDefinition {
        id: 1,
        name: "Tree".to_string(),
        map_area_id: None,
    });
    for (object_id, area_id) in [(2, 20), (3, 30)] {
        store.insert_object(ObjectDefinition {
            id: object_id,
            name: String::new(),
            map_area_id: Some(area_id),
        });
        store.insert_area(AreaDefinition {
            id: area_id,
            sprite_id: 1452,
            name: None,
        });
    }
    store.insert_sprite(SpriteDefinition {
        id: 1452,
        frame: 0,
        image: RgbaImage::new(15, 15),
    });

    store.insert_archive_file(
        WORLDMAP_INDEX,
        DETAILS_ARCHIVE,
        0,
        br#"{"name": "Gielinor Surface", "position": {"x": 3232, "y": 3232, "plane": 0}}"#.to_vec(),
    );
    store.insert_archive_file(
        WORLDMAP_INDEX,
        COMPOSITE_ARCHIVE,
        0,
        br#"{"mapSquareDefinitions": [{"minLevel": 0, "levels": 4, "sourceSquareX": 50,
            "sourceSquareZ": 50, "displaySquareX": 50, "displaySquareZ": 50, "groupId": 0,
            "fileId": -1}], "zoneDefinitions": []}"#
            .to_vec(),
    );

    (store, keys)
}

fn file_names(dir: &Path) -> BTreeSet<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

#[test]
fn two_region_snapshot() {
    let out = scratch_dir("snapshot");
    let (store, keys) = fixture();
    let pipeline = ExportPipeline::new(&store, config_for(&out));
    let summary = pipeline.run(&keys).unwrap();
    let root = out.join("test_v");

    assert_eq!(summary.regions, 2);
    assert_eq!(summary.tiles, 8);

    let tiles = file_names(&root.join("tiles/base"));
    let expected: BTreeSet<String> = (0..4)
        .flat_map(|p| [format!("{p}_50_50.png"), format!("{p}_50_51.png")])
        .collect();
    assert_eq!(tiles, expected);
    let tile = image::open(root.join("tiles/base/0_50_50.png")).unwrap();
    assert_eq!((tile.width(), tile.height()), (256, 256));

    let plane = image::open(root.join("fullplanes/base/plane_0.png")).unwrap();
    assert_eq!((plane.width(), plane.height()), (256, 512));
    assert_eq!(file_names(&root.join("fullplanes/base")).len(), 4);
    assert_eq!(summary.composite_planes, 4);
    assert_eq!(file_names(&root.join("fullplanes/composites")).len(), 4);

    let coords = read_json(&root.join("coordinateData.json"));
    assert_eq!(coords["minSquareY"], 50);
    assert_eq!(coords["maxSquareY"], 51);
    assert_eq!(coords["minTileY"], 3200);
    assert_eq!(coords["maxTileY"], 3264);
    assert_eq!(coords["tilePixelLength"], 4);
    assert_eq!(coords["zoneTileLength"], 8);

    // объект без области не даёт иконки; общий спрайт пишется один раз
    let icons = read_json(&root.join("minimapIcons.json"));
    let icons = icons.as_array().unwrap();
    assert_eq!(icons.len(), 2);
    assert_eq!(icons[0]["position"]["x"], 50 * 64 + 10);
    assert_eq!(icons[0]["spriteId"], 1452);
    assert_eq!(icons[1]["position"]["y"], 51 * 64 + 20);
    assert_eq!(file_names(&root.join("icons")), BTreeSet::from(["1452.png".to_string()]));

    let maps = read_json(&root.join("wikiWorldMapDefinitions.json"));
    assert_eq!(maps.as_array().unwrap().len(), 1);
    assert_eq!(maps[0]["id"], 0);
    assert_eq!(maps[0]["name"], "Gielinor Surface");
    assert_eq!(maps[0]["mapSquareDefinitions"][0]["sourceSquareX"], 50);
    assert!(root
        .join("worldMapCompositeDefinitions/mapSquareDefinitions_0.json")
        .is_file());
    assert!(root
        .join("worldMapCompositeDefinitions/zoneDefinitions_0.json")
        .is_file());

    fs::remove_dir_all(&out).ok();
}

#[test]
fn rerun_is_idempotent() {
    let out = scratch_dir("rerun");
    let (store, keys) = fixture();
    let pipeline = ExportPipeline::new(&store, config_for(&out));
    let root = out.join("test_v");

    pipeline.run(&keys).unwrap();
    let first_icons = fs::read(root.join("minimapIcons.json")).unwrap();
    let first_coords = fs::read(root.join("coordinateData.json")).unwrap();

    pipeline.run(&keys).unwrap();
    assert_eq!(fs::read(root.join("minimapIcons.json")).unwrap(), first_icons);
    assert_eq!(fs::read(root.join("coordinateData.json")).unwrap(), first_coords);
    assert_eq!(file_names(&root.join("icons")).len(), 1);

    fs::remove_dir_all(&out).ok();
}

#[test]
fn undecryptable_region_is_left_out_everywhere() {
    let out = scratch_dir("badkey");
    let (store, mut keys) = fixture();
    keys.insert(RegionId::from_grid(50, 51), [0, 0, 0, 0]);

    let summary = ExportPipeline::new(&store, config_for(&out))
        .run(&keys)
        .unwrap();
    let root = out.join("test_v");

    assert_eq!(summary.regions, 1);
    assert_eq!(summary.tiles, 4);
    assert!(!root.join("tiles/base/0_50_51.png").exists());
    let coords = read_json(&root.join("coordinateData.json"));
    assert_eq!(coords["maxSquareY"], 50);
    let icons = read_json(&root.join("minimapIcons.json"));
    assert_eq!(icons.as_array().unwrap().len(), 1);

    fs::remove_dir_all(&out).ok();
}

#[test]
fn missing_composite_writes_no_world_map_file() {
    let out = scratch_dir("nocomposite");
    let (mut store, keys) = fixture();
    store.insert_archive_file(
        WORLDMAP_INDEX,
        DETAILS_ARCHIVE,
        5,
        br#"{"name": "Orphan", "position": {"x": 0, "y": 0, "plane": 0}}"#.to_vec(),
    );

    let result = ExportPipeline::new(&store, config_for(&out)).run(&keys);
    assert!(matches!(result, Err(ExportError::MissingComposite { map_id: 5 })));
    let root = out.join("test_v");
    assert!(!root.join("wikiWorldMapDefinitions.json").exists());
    assert!(!root.join("worldMapCompositeDefinitions").exists());

    fs::remove_dir_all(&out).ok();
}

#[test]
fn low_memory_mode_produces_the_same_artifacts() {
    let out = scratch_dir("lowmem");
    let (store, keys) = fixture();
    let mut config = config_for(&out);
    config.render = RenderOptions {
        low_memory: true,
        ..RenderOptions::default()
    };

    let summary = ExportPipeline::new(&store, config).run(&keys).unwrap();
    assert_eq!(summary.tiles, 8);
    assert_eq!(summary.full_planes, 4);
    assert_eq!(summary.icon_images, 1);

    fs::remove_dir_all(&out).ok();
}

#[test]
fn disabled_stages_write_nothing() {
    let out = scratch_dir("stages");
    let (store, keys) = fixture();
    let mut config = config_for(&out);
    config.stages.tiles = false;
    config.stages.full_planes = false;
    config.stages.composite_planes = false;
    config.stages.composite_definitions = false;

    let summary = ExportPipeline::new(&store, config).run(&keys).unwrap();
    let root = out.join("test_v");
    assert_eq!(summary.tiles, 0);
    assert!(!root.join("tiles").exists());
    assert!(!root.join("fullplanes").exists());
    assert!(!root.join("worldMapCompositeDefinitions").exists());
    assert!(root.join("wikiWorldMapDefinitions.json").is_file());

    fs::remove_dir_all(&out).ok();
}

#[test]
fn plane_composites_stack_upper_planes_over_lower() {
    let out = scratch_dir("composites");
    let (store, keys) = fixture();
    let mut config = config_for(&out);
    // наложение работает и без записи самих полных плоскостей
    config.stages.full_planes = false;

    let summary = ExportPipeline::new(&store, config).run(&keys).unwrap();
    let root = out.join("test_v");
    assert_eq!(summary.full_planes, 0);
    assert!(!root.join("fullplanes/base").exists());

    let composite = image::open(root.join("fullplanes/composites/plane_1.png"))
        .unwrap()
        .to_rgba8();
    assert_eq!(composite.dimensions(), (256, 512));
    // (50, 51) сверху: тайл (0, 63) плоскости 1 — чёрный, закрывает плоскость 0
    assert_eq!(*composite.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
    // тайл (63, 63) на плоскости 1 пуст — виден цвет плоскости 0
    assert_eq!(*composite.get_pixel(255, 0), Rgba([0x22, 0x44, 0x88, 255]));
    // юго-западный тайл (50, 50) есть только на плоскости 0
    assert_eq!(*composite.get_pixel(0, 511), Rgba([0x44, 0x88, 0x22, 255]));

    fs::remove_dir_all(&out).ok();
}

/// Считает обращения к рисованию тайлов, остальное отдаёт хранилищу
struct CountingSource {
    inner: MemoryStore,
    renders: AtomicUsize,
}

impl CacheSource for CountingSource {
    fn list_regions(&self) -> Vec<RegionId> {
        self.inner.list_regions()
    }

    fn load_region(&self, id: RegionId, key: &XteaKey) -> mapexport::Result<Region> {
        self.inner.load_region(id, key)
    }

    fn object_definitions(&self) -> mapexport::Result<HashMap<u32, ObjectDefinition>> {
        self.inner.object_definitions()
    }

    fn area_definitions(&self) -> mapexport::Result<HashMap<u32, AreaDefinition>> {
        self.inner.area_definitions()
    }

    fn sprite_definitions(&self) -> mapexport::Result<SpriteIndex> {
        self.inner.sprite_definitions()
    }

    fn render_region_tile(
        &self,
        region: &Region,
        plane: u8,
        options: &RenderOptions,
    ) -> mapexport::Result<RgbaImage> {
        self.renders.fetch_add(1, Ordering::Relaxed);
        self.inner.render_region_tile(region, plane, options)
    }

    fn load_archive_files(
        &self,
        index: &str,
        archive: &str,
    ) -> mapexport::Result<Vec<(u32, Vec<u8>)>> {
        self.inner.load_archive_files(index, archive)
    }

    fn decode_world_map_detail(
        &self,
        bytes: &[u8],
        file_id: u32,
    ) -> mapexport::Result<WorldMapDetail> {
        self.inner.decode_world_map_detail(bytes, file_id)
    }

    fn decode_world_map_composite(&self, bytes: &[u8]) -> mapexport::Result<WorldMapComposite> {
        self.inner.decode_world_map_composite(bytes)
    }
}

#[test]
fn each_tile_is_rendered_once_per_plane() {
    let out = scratch_dir("renders");
    let (store, keys) = fixture();
    let source = CountingSource {
        inner: store,
        renders: AtomicUsize::new(0),
    };

    let summary = ExportPipeline::new(&source, config_for(&out))
        .run(&keys)
        .unwrap();
    assert_eq!(summary.tiles, 8);
    assert_eq!(summary.full_planes, 4);
    assert_eq!(source.renders.load(Ordering::Relaxed), 8);

    fs::remove_dir_all(&out).ok();
}
