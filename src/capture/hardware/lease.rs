use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Device ids currently held by some session in this process.
static HELD_DEVICES: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

fn held() -> MutexGuard<'static, HashSet<String>> {
    HELD_DEVICES.lock().unwrap_or_else(PoisonError::into_inner)
}

/// RAII claim on a camera device, process-wide. Dropping the lease frees the device.
#[derive(Debug)]
pub struct DeviceLease {
    device_id: String,
}

impl DeviceLease {
    /// Claims `device_id`, or returns `None` if another session holds it.
    pub fn claim(device_id: &str) -> Option<Self> {
        if !held().insert(device_id.to_string()) {
            tracing::debug!(target: "capture", "[HARDWARE] Device {} already leased", device_id);
            return None;
        }

        Some(Self {
            device_id: device_id.to_string(),
        })
    }

    pub fn is_held(device_id: &str) -> bool {
        held().contains(device_id)
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        held().remove(&self.device_id);
    }
}
