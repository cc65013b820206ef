use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::info;

static LIVE_PLATFORMS: AtomicUsize = AtomicUsize::new(0);

/// Process-level engine lifecycle. Creating one initializes the engine,
/// dropping the last one shuts it down; every execution context is created
/// against a live platform.
#[derive(Debug)]
pub struct Platform {
    _private: (),
}

impl Platform {
    pub fn initialize() -> Self {
        if LIVE_PLATFORMS.fetch_add(1, Ordering::SeqCst) == 0 {
            info!("engine platform initialized");
        }
        Self { _private: () }
    }

    pub fn is_initialized() -> bool {
        LIVE_PLATFORMS.load(Ordering::SeqCst) > 0
    }
}

impl Drop for Platform {
    fn drop(&mut self) {
        if LIVE_PLATFORMS.fetch_sub(1, Ordering::SeqCst) == 1 {
            info!("engine platform shut down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_is_live_while_held() {
        let platform = Platform::initialize();
        assert!(Platform::is_initialized());
        let nested = Platform::initialize();
        drop(platform);
        assert!(Platform::is_initialized());
        drop(nested);
    }
}
