use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tallworld_common::{Result, TallWorldError};
use tallworld_logger::{log, systime, LogSeverity::*};
use tallworld_nbt::{NbtFile, Tag};
use uuid::Uuid;

/// World format version written into new level files.
pub const VERSION_ANVIL: i32 = 19133;

/// Player name used for the single-player entry stored inside level.dat.
pub const SINGLE_PLAYER: &str = "Player";

/// Persists world-level state next to the chunk data. The save sequence checks the
/// lock before writing anything and calls `save_metadata` after the last chunk.
pub trait MetadataStore {
    fn check_session_lock(&self) -> Result<()> {
        Ok(())
    }

    fn save_metadata(&mut self) -> Result<()>;
}

/// `level.dat` and friends in a world directory.
#[derive(Debug)]
pub struct LevelMetadata {
    world_dir: PathBuf,
    /// Children of the root tag other than `Data`.
    root: HashMap<String, Tag>,
    data: HashMap<String, Tag>,
    readonly: bool,
    init_time: i64,
    players_folder: Option<PathBuf>,
    players: Vec<String>,
}

fn load_gzip(path: &Path) -> Result<Tag> {
    let file = File::open(path)?;
    let nbt = NbtFile::read_gzip(&mut BufReader::new(file))?;
    if nbt.root.get("Data").and_then(Tag::as_compound).is_none() {
        return Err(TallWorldError::Metadata(format!(
            "{} has no Data compound",
            path.display()
        )));
    }
    Ok(nbt.root)
}

impl LevelMetadata {
    fn blank(world_dir: &Path) -> Self {
        Self {
            world_dir: world_dir.to_path_buf(),
            root: HashMap::new(),
            data: HashMap::new(),
            readonly: false,
            init_time: -1,
            players_folder: None,
            players: Vec::new(),
        }
    }

    fn set_root(&mut self, root: Tag) {
        let Tag::Compound(mut root) = root else {
            return;
        };
        if let Some(Tag::Compound(data)) = root.remove("Data") {
            self.data = data;
        }
        self.root = root;
    }

    pub fn file_path(&self, name: &str) -> PathBuf {
        self.world_dir.join(name)
    }

    /// Whether the directory holds a level file.
    pub fn exists_in(world_dir: &Path) -> bool {
        world_dir.join("level.dat").is_file()
    }

    /// Builds fresh metadata and writes it to disk.
    pub fn create(world_dir: &Path, seed: Option<i64>, last_played: Option<i64>) -> Result<Self> {
        let mut metadata = Self::blank(world_dir);
        metadata.init_defaults(seed, last_played);
        metadata.init_players()?;
        metadata.acquire_session_lock()?;
        metadata.save_metadata()?;
        Ok(metadata)
    }

    /// Reads `level.dat`, falling back to `level.dat_old` and then to defaults.
    pub fn load(world_dir: &Path) -> Result<Self> {
        let mut metadata = Self::blank(world_dir);
        match load_gzip(&metadata.file_path("level.dat")) {
            Ok(root) => metadata.set_root(root),
            Err(e) => {
                log(
                    format!("Error loading level.dat, trying level.dat_old ({})", e),
                    Info,
                );
                match load_gzip(&metadata.file_path("level.dat_old")) {
                    Ok(root) => {
                        metadata.set_root(root);
                        log("level.dat restored from backup.".to_owned(), Info);
                        metadata.write_level_dat()?;
                    }
                    Err(e) => {
                        log(
                            format!("Error loading level.dat_old ({}). Initializing with defaults.", e),
                            Warning,
                        );
                        metadata.init_defaults(None, None);
                    }
                }
            }
        }
        metadata.init_players()?;
        metadata.acquire_session_lock()?;
        Ok(metadata)
    }

    /// Loads without taking the session lock; saving is refused.
    pub fn load_readonly(world_dir: &Path) -> Result<Self> {
        let mut metadata = Self::blank(world_dir);
        let root = load_gzip(&metadata.file_path("level.dat"))?;
        metadata.set_root(root);
        metadata.readonly = true;
        metadata.init_players()?;
        Ok(metadata)
    }

    fn default_level_name(&self) -> String {
        self.world_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn init_defaults(&mut self, seed: Option<i64>, last_played: Option<i64>) {
        self.root.clear();
        self.data.clear();
        self.set("SpawnX", Tag::Int(0));
        self.set("SpawnY", Tag::Int(2));
        self.set("SpawnZ", Tag::Int(0));
        self.set("version", Tag::Int(VERSION_ANVIL));
        self.set_last_played(last_played.unwrap_or_else(systime::unix_millis));
        self.set_random_seed(seed.unwrap_or_else(rand::random::<i64>));
        self.set("SizeOnDisk", Tag::Long(0));
        self.set("Time", Tag::Long(1));
        self.set("LevelName", Tag::String(self.default_level_name()));
        self.set(SINGLE_PLAYER, Tag::compound());
    }

    /// The full level tag as it is written to disk.
    pub fn root(&self) -> Tag {
        let mut root = self.root.clone();
        root.insert("Data".to_owned(), Tag::Compound(self.data.clone()));
        Tag::Compound(root)
    }

    fn set(&mut self, key: &str, value: Tag) {
        self.data.insert(key.to_owned(), value);
    }

    // Readers store the default first when the property is missing or mistyped.

    fn long_property(&mut self, key: &str, default: i64) -> i64 {
        match self.data.get(key).and_then(Tag::as_i64) {
            Some(value) => value,
            None => {
                self.set(key, Tag::Long(default));
                default
            }
        }
    }

    fn int_property(&mut self, key: &str, default: i32) -> i32 {
        match self.data.get(key).and_then(Tag::as_i32) {
            Some(value) => value,
            None => {
                self.set(key, Tag::Int(default));
                default
            }
        }
    }

    fn byte_property(&mut self, key: &str, default: i8) -> i8 {
        match self.data.get(key).and_then(Tag::as_i8) {
            Some(value) => value,
            None => {
                self.set(key, Tag::Byte(default));
                default
            }
        }
    }

    fn string_property(&mut self, key: &str, default: String) -> String {
        match self.data.get(key).and_then(Tag::as_string) {
            Some(value) => value.clone(),
            None => {
                self.set(key, Tag::String(default.clone()));
                default
            }
        }
    }

    pub fn size_on_disk(&mut self) -> i64 {
        self.long_property("SizeOnDisk", 0)
    }

    pub fn random_seed(&mut self) -> i64 {
        self.long_property("RandomSeed", 0)
    }

    pub fn set_random_seed(&mut self, seed: i64) {
        self.set("RandomSeed", Tag::Long(seed));
    }

    /// Age of the world in ticks.
    pub fn time(&mut self) -> i64 {
        self.long_property("Time", 0)
    }

    pub fn set_time(&mut self, ticks: i64) {
        self.set("Time", Tag::Long(ticks));
    }

    pub fn last_played(&mut self) -> i64 {
        self.long_property("LastPlayed", systime::unix_millis())
    }

    pub fn set_last_played(&mut self, millis: i64) {
        self.set("LastPlayed", Tag::Long(millis));
    }

    pub fn level_name(&mut self) -> String {
        let default = self.default_level_name();
        self.string_property("LevelName", default)
    }

    pub fn set_level_name(&mut self, name: String) {
        self.set("LevelName", Tag::String(name));
    }

    pub fn generator_name(&mut self) -> String {
        self.string_property("generatorName", "default".to_owned())
    }

    pub fn map_features(&mut self) -> bool {
        self.byte_property("MapFeatures", 1) != 0
    }

    /// 0 for survival, 1 for creative.
    pub fn game_type(&mut self) -> i32 {
        self.int_property("GameType", 0)
    }

    pub fn set_game_type(&mut self, game_type: i32) {
        self.set("GameType", Tag::Int(game_type));
    }

    pub fn version(&mut self) -> i32 {
        self.int_property("version", VERSION_ANVIL)
    }

    pub fn spawn(&mut self) -> (i32, i32, i32) {
        (
            self.int_property("SpawnX", 0),
            self.int_property("SpawnY", 2),
            self.int_property("SpawnZ", 0),
        )
    }

    pub fn set_spawn(&mut self, (x, y, z): (i32, i32, i32)) {
        self.set("SpawnX", Tag::Int(x));
        self.set("SpawnY", Tag::Int(y));
        self.set("SpawnZ", Tag::Int(z));
    }

    /// Scans `playerdata/` (or the older `players/`) for `<uuid>.dat` files.
    fn init_players(&mut self) -> Result<()> {
        self.players.clear();
        self.players_folder = ["playerdata", "players"]
            .iter()
            .map(|dir| self.file_path(dir))
            .find(|dir| dir.is_dir());

        if let Some(folder) = &self.players_folder {
            for entry in fs::read_dir(folder)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("dat") {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                if Uuid::parse_str(stem).is_ok() {
                    self.players.push(stem.to_owned());
                } else {
                    log(format!("{} does not seem to be in a valid UUID format", stem), Warning);
                }
            }
            self.players.sort();
        }

        if self.data.contains_key(SINGLE_PLAYER) {
            self.players.push(SINGLE_PLAYER.to_owned());
        }
        Ok(())
    }

    pub fn players(&self) -> &[String] {
        &self.players
    }

    /// Forgets a player. Their file is deleted on the next save.
    pub fn remove_player(&mut self, name: &str) -> bool {
        let before = self.players.len();
        self.players.retain(|p| p != name);
        if name == SINGLE_PLAYER {
            self.data.remove(SINGLE_PLAYER);
        }
        self.players.len() != before
    }

    /// Writes the current time in milliseconds to `session.lock`.
    pub fn acquire_session_lock(&mut self) -> Result<()> {
        self.init_time = systime::unix_millis();
        let mut file = File::create(self.file_path("session.lock"))?;
        file.write_i64::<BigEndian>(self.init_time)?;
        file.flush()?;
        file.sync_all()?;
        log("Acquired session lock".to_owned(), Debug);
        Ok(())
    }

    fn write_level_dat(&self) -> Result<()> {
        let file = File::create(self.file_path("level.dat"))?;
        let mut writer = BufWriter::new(file);
        NbtFile::new(String::new(), self.root()).write_gzip(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

impl MetadataStore for LevelMetadata {
    /// Fails if the world is read-only or another program took the lock since.
    fn check_session_lock(&self) -> Result<()> {
        if self.readonly {
            return Err(TallWorldError::SessionLockLost(
                "World is opened read only.".to_owned(),
            ));
        }
        let lock = File::open(self.file_path("session.lock"))
            .and_then(|mut f| f.read_i64::<BigEndian>())
            .unwrap_or(-1);
        if lock != self.init_time {
            return Err(TallWorldError::SessionLockLost(
                "This world is being accessed from another location.".to_owned(),
            ));
        }
        Ok(())
    }

    fn save_metadata(&mut self) -> Result<()> {
        if self.readonly {
            return Err(TallWorldError::SessionLockLost(
                "World is opened read only.".to_owned(),
            ));
        }
        if let Some(folder) = &self.players_folder {
            for entry in fs::read_dir(folder)? {
                let path = entry?.path();
                let is_dat = path.extension().and_then(|e| e.to_str()) == Some("dat");
                let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
                if is_dat && Uuid::parse_str(stem).is_ok() && !self.players.iter().any(|p| p == stem) {
                    fs::remove_file(&path)?;
                }
            }
        }
        self.write_level_dat()
    }
}
