pub const APP_NAME: &str = "pile-ingest";

pub const CONFIG_FILE: &str = "pile-ingest.config";
pub const ERROR_LOG_FILE: &str = "error.log";
pub const DEBUG_LOG_FILE: &str = "debug.log";

pub const DEFAULT_DATASET_ROOT: &str = "Pile of food dataset";
pub const MANIFEST_FILE: &str = "manifest.csv";
pub const DEFAULT_FRAME_PREFIX: &str = "frame";
pub const DEFAULT_FPS: u32 = 2;
pub const DEFAULT_JPEG_QUALITY: u32 = 2;
pub const DEFAULT_FFMPEG: &str = "ffmpeg";

pub const FRAME_EXTENSION: &str = "jpg";
pub const FRAME_INDEX_WIDTH: usize = 4;
/// ffmpeg parses `-start_number` into a C int.
pub const MAX_START_INDEX: u64 = i32::MAX as u64;

pub const INTERVAL_SUFFIX: &str = "Interval";
pub const SUB_INTERVAL_SUFFIX: &str = "Pounds";
pub const LIGHT_SUFFIX: &str = "Light";

pub const INTERVAL_PATTERN: &str = r"^\d+(\.\d+)?-\d+(\.\d+)?$";
pub const SUB_INTERVAL_PATTERN: &str = r"^\d+(\.\d+)?$";

pub const MENU_LOGO: &[&str] = &[
    "       _ _            _                  _   ",
    "  _ __(_) | ___      (_)_ __   __ _  ___| |_ ",
    " | '_ \\ | |/ _ \\_____| | '_ \\ / _` |/ _ \\ __|",
    " | |_) || |  __/_____| | | | | (_| |  __/ |_ ",
    " | .__/_|_|\\___|     |_|_| |_|\\__, |\\___|\\__|",
    " |_|                          |___/          ",
];

pub const MENU_LIGHT_LABELS: &[&str] = &["Low light", "Medium light", "High light"];
