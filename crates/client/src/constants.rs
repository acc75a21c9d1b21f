pub const EXIT_INTERRUPTED: i32 = 130;
pub const UI_TICK_HZ: u64 = 4;
pub const UI_TICK_INTERVAL_MS: u64 = 1_000 / UI_TICK_HZ;
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
