//! ESP32 time adapter.
//!
//! - **`target_os = "espidf"`**: wraps `esp_timer_get_time()` from the
//!   ESP-IDF high-resolution timer (microsecond precision, monotonic) and
//!   `settimeofday()` for the wall clock.
//! - **`not(target_os = "espidf")`**: uses `std::time::Instant` for
//!   host-side testing and simulation.
//!
//! TLS certificate validation needs a wall clock somewhere inside the
//! certificate validity window.  The sensor has no NTP client, so on the
//! first link up the clock is seeded with [`DEFAULT_EPOCH_SECS`] if it
//! has never been set.

/// 2015-10-01T00:00:00Z.
pub const DEFAULT_EPOCH_SECS: i64 = 1_443_657_600;

/// Time adapter for the ESP32-S3 platform.
pub struct Esp32TimeAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
    #[cfg(not(target_os = "espidf"))]
    wall_offset_secs: Option<i64>,
}

impl Default for Esp32TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
            #[cfg(not(target_os = "espidf"))]
            wall_offset_secs: None,
        }
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_ms(&self) -> u64 {
        // SAFETY: esp_timer_get_time reads a free-running hardware counter.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Wall-clock seconds since the Unix epoch.
    #[cfg(target_os = "espidf")]
    pub fn wall_secs(&self) -> i64 {
        let mut tv = esp_idf_svc::sys::timeval { tv_sec: 0, tv_usec: 0 };
        // SAFETY: tv is a valid out-pointer; a null timezone is allowed.
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return 0;
        }
        tv.tv_sec as i64
    }

    /// Wall-clock seconds since the Unix epoch.
    #[cfg(not(target_os = "espidf"))]
    pub fn wall_secs(&self) -> i64 {
        let up = self.start.elapsed().as_secs() as i64;
        self.wall_offset_secs.map_or(up, |off| off + up)
    }

    /// Seed the wall clock with [`DEFAULT_EPOCH_SECS`] unless it already
    /// reads later than that.  Returns `true` if the clock was changed.
    pub fn set_default_time(&mut self) -> bool {
        if self.wall_secs() >= DEFAULT_EPOCH_SECS {
            return false;
        }
        self.set_wall_secs(DEFAULT_EPOCH_SECS);
        log::info!("time: wall clock set to {}", DEFAULT_EPOCH_SECS);
        true
    }

    #[cfg(target_os = "espidf")]
    fn set_wall_secs(&mut self, secs: i64) {
        let tv = esp_idf_svc::sys::timeval { tv_sec: secs as _, tv_usec: 0 };
        // SAFETY: tv is a valid timeval; a null timezone is allowed.
        if unsafe { esp_idf_svc::sys::settimeofday(&tv, core::ptr::null()) } != 0 {
            log::warn!("time: settimeofday failed");
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn set_wall_secs(&mut self, secs: i64) {
        let up = self.start.elapsed().as_secs() as i64;
        self.wall_offset_secs = Some(secs - up);
    }
}
