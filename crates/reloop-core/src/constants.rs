pub struct RunnerConstants;

impl RunnerConstants {
    pub const THREAD_NAME_PREFIX: &'static str = "reloop-run";

    /// Upper bound for a single `sleep(ms)` call made by a script.
    pub const SLEEP_MAX_MS: u64 = 10_000;

    pub const DEFAULT_SLIDER_MIN: i64 = 0;
    pub const DEFAULT_SLIDER_MAX: i64 = 100;
}
