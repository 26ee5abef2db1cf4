pub const RENDER_WIDTH: i32 = 1280;             // Initial window width
pub const RENDER_HEIGHT: i32 = 720;             // Initial window height
pub const FPS: u32 = 60;                        // Frames per second

pub const REFRESH_INTERVAL_MS: u64 = 3000;      // Periodic poll of the default source
pub const REVEAL_DURATION_MS: u64 = 1500;       // Radar reveal, start to role swap
pub const FETCH_TIMEOUT_MS: u64 = 10_000;       // Whole-request budget for one fetch
pub const MAX_IMAGE_BYTES: u64 = 32 * 1024 * 1024;

pub const DEFAULT_SOURCE: &str = "https://picsum.photos/800/450";
pub const DEFAULT_PUSH_LISTEN: &str = "127.0.0.1:7878";

pub const FIT_RATIO: f32 = 0.9;                 // Images are scaled to fit 90% of the screen
pub const SWEEP_TURNS: f32 = 2.0;               // Radar sweep revolutions per reveal
