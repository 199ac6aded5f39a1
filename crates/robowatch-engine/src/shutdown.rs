use std::sync::atomic::{
    AtomicBool,
    Ordering,
};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

const STEP: Duration = Duration::from_millis(500);

/// Cooperative stop flag shared by every background loop. Loops check it
/// during their inter-tick sleep, so a stop request takes effect within
/// half a second.
#[derive(Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Shutdown::default()
    }

    pub fn trip(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_tripped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleeps up to `target` in 0.5 s steps. Returns false when the flag
    /// tripped during the wait.
    pub async fn interruptible_sleep(&self, target: Duration) -> bool {
        let mut slept = Duration::ZERO;
        while slept < target {
            if self.is_tripped() {
                return false;
            }
            let remaining = target - slept;
            let step = remaining.min(STEP);
            sleep(step).await;
            slept += step;
        }
        !self.is_tripped()
    }
}
