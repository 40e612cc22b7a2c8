//! Configuration for the sync engine.

use crate::wake::WakeRequest;
use inksync_core::{DiffOptions, GalleryMapping, ScanOptions};
use inksync_protocol::DEFAULT_PAGE_LIMIT;
use std::time::Duration;

/// Default device host.
pub const DEFAULT_HOST: &str = "10.0.0.70";

/// Connection settings for one device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Use HTTPS instead of HTTP.
    pub https: bool,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Page size when listing gallery contents.
    pub page_limit: u32,
}

impl DeviceConfig {
    /// Creates a configuration for the given host with default settings.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 80,
            https: false,
            timeout: Duration::from_secs(10),
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Enables or disables HTTPS.
    pub fn with_https(mut self, https: bool) -> Self {
        self.https = https;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the gallery page size. Zero is raised to one.
    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit.max(1);
        self
    }

    /// Returns the base URL, e.g. `http://10.0.0.70`.
    ///
    /// The port is omitted when it is the scheme default.
    pub fn base_url(&self) -> String {
        let scheme = if self.https { "https" } else { "http" };
        let default_port = if self.https { 443 } else { 80 };
        if self.port == default_port {
            format!("{}://{}", scheme, self.host)
        } else {
            format!("{}://{}:{}", scheme, self.host, self.port)
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOST)
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.add_jitter = jitter;
        self
    }

    /// Calculates the delay for a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);

        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            // Add up to 25% jitter
            let jitter = delay_secs * 0.25 * rand_jitter();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Simple "jitter" without an external RNG dependency.
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

/// Which remote galleries take part in reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemoteScope {
    /// Every gallery on the device.
    All,
    /// Only galleries the mapping can produce. With a fixed mapping, mirror
    /// mode then only prunes that one gallery.
    #[default]
    Mapped,
}

/// Configuration of the orchestrator. One value per device.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Device connection.
    pub device: DeviceConfig,
    /// Retry policy for device requests.
    pub retry: RetryConfig,
    /// Local scan settings, including the gallery mapping.
    pub scan: ScanOptions,
    /// Change detection tuning.
    pub diff: DiffOptions,
    /// Wake handshake parameters.
    pub wake: WakeRequest,
    /// Timeout of the awake probe issued before waking.
    pub awake_probe_timeout: Duration,
    /// Which remote galleries are reconciled.
    pub remote_scope: RemoteScope,
    /// Put the device to sleep after the run.
    pub sleep_after: bool,
    /// Maximum uploads in flight.
    pub concurrency: usize,
}

impl SyncConfig {
    /// Creates a configuration for the given device.
    pub fn new(device: DeviceConfig) -> Self {
        Self {
            device,
            retry: RetryConfig::default(),
            scan: ScanOptions::default(),
            diff: DiffOptions::default(),
            wake: WakeRequest::default(),
            awake_probe_timeout: Duration::from_millis(500),
            remote_scope: RemoteScope::default(),
            sleep_after: true,
            concurrency: 1,
        }
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the scan options.
    pub fn with_scan(mut self, scan: ScanOptions) -> Self {
        self.scan = scan;
        self
    }

    /// Sets the gallery mapping.
    pub fn with_mapping(mut self, mapping: GalleryMapping) -> Self {
        self.scan.mapping = mapping;
        self
    }

    /// Sets the change detection options.
    pub fn with_diff(mut self, diff: DiffOptions) -> Self {
        self.diff = diff;
        self
    }

    /// Sets the wake handshake parameters.
    pub fn with_wake(mut self, wake: WakeRequest) -> Self {
        self.wake = wake;
        self
    }

    /// Sets the awake probe timeout.
    pub fn with_awake_probe_timeout(mut self, timeout: Duration) -> Self {
        self.awake_probe_timeout = timeout;
        self
    }

    /// Sets the remote scope.
    pub fn with_remote_scope(mut self, scope: RemoteScope) -> Self {
        self.remote_scope = scope;
        self
    }

    /// Sets whether the device is put to sleep after the run.
    pub fn with_sleep_after(mut self, sleep_after: bool) -> Self {
        self.sleep_after = sleep_after;
        self
    }

    /// Sets the upload concurrency. Zero is raised to one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(DeviceConfig::default())
    }
}

/// Per-run options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Delete remote content absent locally.
    pub mirror: bool,
    /// Skip the confirmation gate.
    pub force: bool,
    /// Attempt the wake handshake.
    pub wakeup: bool,
    /// Ask for confirmation of additive plans too.
    pub always_confirm: bool,
}

impl SyncOptions {
    /// Additive run with wake enabled.
    pub fn new() -> Self {
        Self {
            mirror: false,
            force: false,
            wakeup: true,
            always_confirm: false,
        }
    }

    /// Sets whether additive plans need confirmation as well.
    pub fn with_always_confirm(mut self, always: bool) -> Self {
        self.always_confirm = always;
        self
    }

    /// Sets mirror mode.
    pub fn with_mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    /// Sets the force flag.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Enables or disables the wake handshake.
    pub fn with_wakeup(mut self, wakeup: bool) -> Self {
        self.wakeup = wakeup;
        self
    }

    /// Returns the reconciliation mode.
    pub fn mode(&self) -> inksync_core::SyncMode {
        inksync_core::SyncMode {
            mirror: self.mirror,
            force: self.force,
        }
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_config_builder() {
        let config = DeviceConfig::new("frame.local")
            .with_port(8080)
            .with_timeout(Duration::from_secs(3))
            .with_page_limit(0);

        assert_eq!(config.base_url(), "http://frame.local:8080");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.page_limit, 1);
    }

    #[test]
    fn device_config_default_ports() {
        assert_eq!(DeviceConfig::default().base_url(), "http://10.0.0.70");
        let https = DeviceConfig::new("frame").with_https(true).with_port(443);
        assert_eq!(https.base_url(), "https://frame");
        let https_80 = DeviceConfig::new("frame").with_https(true);
        assert_eq!(https_80.base_url(), "https://frame:80");
    }

    #[test]
    fn sync_config_defaults() {
        let config = SyncConfig::default();
        assert!(config.sleep_after);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(500));
        assert_eq!(config.remote_scope, RemoteScope::Mapped);
        assert_eq!(config.with_concurrency(0).concurrency, 1);
    }

    #[test]
    fn sync_options_mode() {
        let options = SyncOptions::new().with_mirror(true).with_force(true);
        assert!(options.wakeup);
        let mode = options.mode();
        assert!(mode.mirror);
        assert!(mode.force);
    }

    #[test]
    fn retry_config_no_retry() {
        let config = RetryConfig::no_retry();
        assert_eq!(config.max_attempts, 1);
        assert_eq!(RetryConfig::new(0).max_attempts, 1);
    }

    #[test]
    fn retry_delay_calculation() {
        let config = RetryConfig::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0);

        // First attempt has no delay
        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);

        // Jitter makes exact values unpredictable, but bounds hold
        let delay1 = config.delay_for_attempt(1);
        assert!(delay1 >= Duration::from_millis(100));
        assert!(delay1 <= Duration::from_millis(150));

        let delay2 = config.delay_for_attempt(2);
        assert!(delay2 >= Duration::from_millis(200));
    }

    #[test]
    fn retry_delay_respects_max() {
        let config = RetryConfig::new(10)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(10.0)
            .with_jitter(false);

        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(5));
    }
}
