//! Wake handshake.
//!
//! The frame sleeps between sessions and only brings its Wi-Fi up after a
//! Bluetooth LE touch. Waking is best-effort: the outcome is recorded but
//! never stops a run.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Advertised name fragment of the frames.
pub const DEFAULT_DEVICE_NAME: &str = "BLOOMIN8";

/// GATT characteristic toggled to wake the device.
pub const WAKE_CHARACTERISTIC: &str = "0000f001-0000-1000-8000-00805f9b34fb";

/// Parameters of one wake attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeRequest {
    /// Case-insensitive fragment of the advertised name, if filtering.
    pub name_filter: Option<String>,
    /// Known peripheral address; skips name matching.
    pub known_address: Option<String>,
    /// How long to scan for the device.
    pub scan_timeout: Duration,
    /// Wait after the touch while the device brings its network up.
    pub settle: Duration,
}

impl WakeRequest {
    /// Creates a request with default timings.
    pub fn new() -> Self {
        Self {
            name_filter: Some(DEFAULT_DEVICE_NAME.to_string()),
            known_address: None,
            scan_timeout: Duration::from_secs(10),
            settle: Duration::from_secs(2),
        }
    }

    /// Sets the name filter.
    pub fn with_name_filter(mut self, filter: Option<String>) -> Self {
        self.name_filter = filter;
        self
    }

    /// Sets a known address.
    pub fn with_known_address(mut self, address: Option<String>) -> Self {
        self.known_address = address;
        self
    }

    /// Sets the scan timeout.
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Sets the settle interval.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Returns true if a peripheral with this name and address is the target.
    pub fn matches(&self, local_name: Option<&str>, address: &str) -> bool {
        if let Some(known) = &self.known_address {
            return known.eq_ignore_ascii_case(address);
        }
        match (&self.name_filter, local_name) {
            (Some(filter), Some(name)) => name
                .to_ascii_lowercase()
                .contains(&filter.to_ascii_lowercase()),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}

impl Default for WakeRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a wake attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WakeOutcome {
    /// The device answered the awake probe; no signal was sent.
    AlreadyAwake,
    /// The wake signal was delivered.
    Confirmed {
        /// Address of the peripheral that was touched.
        address: String,
    },
    /// The radio works but the device was not reached.
    NotConfirmed {
        /// What went wrong.
        reason: String,
    },
    /// No wake mechanism is available on this host.
    Unavailable {
        /// Why.
        reason: String,
    },
}

impl WakeOutcome {
    /// Returns true if the wake signal was delivered.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, WakeOutcome::Confirmed { .. })
    }
}

impl fmt::Display for WakeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WakeOutcome::AlreadyAwake => write!(f, "already awake"),
            WakeOutcome::Confirmed { address } => write!(f, "woken via {}", address),
            WakeOutcome::NotConfirmed { reason } => write!(f, "not confirmed: {}", reason),
            WakeOutcome::Unavailable { reason } => write!(f, "unavailable: {}", reason),
        }
    }
}

/// Something that can wake a device.
///
/// Implementations never panic and never fail; every problem is a
/// [`WakeOutcome`].
pub trait Waker: Send + Sync {
    /// Attempts to wake the device.
    fn wake(&self, request: &WakeRequest) -> WakeOutcome;
}

/// Waker used when no radio support is compiled in.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableWaker;

impl Waker for UnavailableWaker {
    fn wake(&self, _request: &WakeRequest) -> WakeOutcome {
        WakeOutcome::Unavailable {
            reason: "built without Bluetooth support".into(),
        }
    }
}

/// Waker that reports a fixed outcome. Useful with devices that never sleep
/// and in tests.
#[derive(Debug, Clone)]
pub struct NoopWaker {
    outcome: WakeOutcome,
}

impl NoopWaker {
    /// Always confirms.
    pub fn confirmed() -> Self {
        Self {
            outcome: WakeOutcome::Confirmed {
                address: "noop".into(),
            },
        }
    }

    /// Always returns the given outcome.
    pub fn with_outcome(outcome: WakeOutcome) -> Self {
        Self { outcome }
    }
}

impl Waker for NoopWaker {
    fn wake(&self, _request: &WakeRequest) -> WakeOutcome {
        self.outcome.clone()
    }
}

/// Returns the best waker this build supports.
pub fn default_waker() -> Box<dyn Waker> {
    #[cfg(feature = "bluetooth")]
    {
        Box::new(ble::BleWaker::new())
    }
    #[cfg(not(feature = "bluetooth"))]
    {
        Box::new(UnavailableWaker)
    }
}

#[cfg(feature = "bluetooth")]
pub use ble::BleWaker;

#[cfg(feature = "bluetooth")]
mod ble {
    use super::{WakeOutcome, WakeRequest, Waker, WAKE_CHARACTERISTIC};
    use btleplug::api::{Central, CharPropFlags, Manager as _, Peripheral as _, ScanFilter, WriteType};
    use btleplug::platform::{Adapter, Manager, Peripheral};
    use std::time::{Duration, Instant};
    use tracing::{debug, info, warn};
    use uuid::Uuid;

    const POLL_INTERVAL: Duration = Duration::from_millis(250);
    const TOUCH_HOLD: Duration = Duration::from_millis(100);

    /// Waker that touches the frame over Bluetooth LE.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct BleWaker;

    impl BleWaker {
        /// Creates a waker using the first Bluetooth adapter.
        pub fn new() -> Self {
            Self
        }
    }

    impl Waker for BleWaker {
        fn wake(&self, request: &WakeRequest) -> WakeOutcome {
            // A fresh thread never sits inside the caller's runtime context.
            std::thread::scope(|scope| {
                let worker = scope.spawn(|| {
                    match tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                    {
                        Ok(runtime) => runtime.block_on(wake_async(request)),
                        Err(e) => WakeOutcome::Unavailable {
                            reason: format!("cannot start runtime: {}", e),
                        },
                    }
                });
                worker.join().unwrap_or_else(|_| WakeOutcome::NotConfirmed {
                    reason: "Bluetooth worker panicked".into(),
                })
            })
        }
    }

    async fn wake_async(request: &WakeRequest) -> WakeOutcome {
        let adapter = match first_adapter().await {
            Ok(adapter) => adapter,
            Err(reason) => return WakeOutcome::Unavailable { reason },
        };

        let peripheral = match discover(&adapter, request).await {
            Ok(peripheral) => peripheral,
            Err(reason) => return WakeOutcome::NotConfirmed { reason },
        };
        let address = peripheral.address().to_string();
        info!("Found frame at {}", address);

        if let Err(reason) = touch(&peripheral).await {
            let _ = peripheral.disconnect().await;
            return WakeOutcome::NotConfirmed { reason };
        }
        if let Err(e) = peripheral.disconnect().await {
            debug!("Disconnect from {} failed: {}", address, e);
        }

        tokio::time::sleep(request.settle).await;
        WakeOutcome::Confirmed { address }
    }

    async fn first_adapter() -> Result<Adapter, String> {
        let manager = Manager::new()
            .await
            .map_err(|e| format!("no Bluetooth stack: {}", e))?;
        let adapters = manager
            .adapters()
            .await
            .map_err(|e| format!("cannot list adapters: {}", e))?;
        adapters
            .into_iter()
            .next()
            .ok_or_else(|| "no Bluetooth adapter".to_string())
    }

    async fn discover(adapter: &Adapter, request: &WakeRequest) -> Result<Peripheral, String> {
        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| format!("scan failed: {}", e))?;

        let deadline = Instant::now() + request.scan_timeout;
        let found = loop {
            if let Some(peripheral) = find_match(adapter, request).await {
                break Some(peripheral);
            }
            if Instant::now() >= deadline {
                break None;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        };

        if let Err(e) = adapter.stop_scan().await {
            debug!("Stopping scan failed: {}", e);
        }

        found.ok_or_else(|| format!("no matching device within {:?}", request.scan_timeout))
    }

    async fn find_match(adapter: &Adapter, request: &WakeRequest) -> Option<Peripheral> {
        let peripherals = adapter.peripherals().await.ok()?;
        for peripheral in peripherals {
            let name = match peripheral.properties().await {
                Ok(Some(properties)) => properties.local_name,
                _ => None,
            };
            let address = peripheral.address().to_string();
            if request.matches(name.as_deref(), &address) {
                return Some(peripheral);
            }
        }
        None
    }

    async fn touch(peripheral: &Peripheral) -> Result<(), String> {
        peripheral
            .connect()
            .await
            .map_err(|e| format!("connect failed: {}", e))?;
        peripheral
            .discover_services()
            .await
            .map_err(|e| format!("service discovery failed: {}", e))?;

        let target = Uuid::parse_str(WAKE_CHARACTERISTIC).map_err(|e| e.to_string())?;
        let characteristics = peripheral.characteristics();

        if let Some(wake) = characteristics.iter().find(|c| c.uuid == target) {
            peripheral
                .write(wake, &[0x01], WriteType::WithResponse)
                .await
                .map_err(|e| format!("wake write failed: {}", e))?;
            tokio::time::sleep(TOUCH_HOLD).await;
            peripheral
                .write(wake, &[0x00], WriteType::WithResponse)
                .await
                .map_err(|e| format!("wake write failed: {}", e))?;
            return Ok(());
        }

        // Older firmware wakes on any GATT read.
        warn!("Wake characteristic not found, falling back to a read");
        let readable = characteristics
            .iter()
            .find(|c| c.properties.contains(CharPropFlags::READ))
            .ok_or_else(|| "no readable characteristic".to_string())?;
        peripheral
            .read(readable)
            .await
            .map(|_| ())
            .map_err(|e| format!("read failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_filter_is_case_insensitive() {
        let request = WakeRequest::default();
        assert!(request.matches(Some("Bloomin8-7F2A"), "AA:BB"));
        assert!(!request.matches(Some("Speaker"), "AA:BB"));
        assert!(!request.matches(None, "AA:BB"));
    }

    #[test]
    fn known_address_wins() {
        let request = WakeRequest::default().with_known_address(Some("aa:bb:cc:dd:ee:ff".into()));
        assert!(request.matches(None, "AA:BB:CC:DD:EE:FF"));
        assert!(!request.matches(Some("BLOOMIN8"), "11:22:33:44:55:66"));
    }

    #[test]
    fn no_filter_matches_anything() {
        let request = WakeRequest::default().with_name_filter(None);
        assert!(request.matches(None, "x"));
    }

    #[test]
    fn outcomes() {
        assert!(NoopWaker::confirmed()
            .wake(&WakeRequest::default())
            .is_confirmed());
        let outcome = UnavailableWaker.wake(&WakeRequest::default());
        assert!(!outcome.is_confirmed());
        assert!(outcome.to_string().starts_with("unavailable"));
        assert!(!WakeOutcome::AlreadyAwake.is_confirmed());
        assert_eq!(WakeOutcome::AlreadyAwake.to_string(), "already awake");
    }
}
