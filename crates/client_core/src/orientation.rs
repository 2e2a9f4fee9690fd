use anyhow::{anyhow, Result};
use async_trait::async_trait;
use storage::Storage;
use tokio::sync::Mutex;

/// Preference key under which the board orientation is persisted.
pub const ORIENTATION_KEY: &str = "board.orientation_flipped";

#[async_trait]
pub trait OrientationStore: Send + Sync {
    async fn load(&self) -> Result<bool>;
    async fn save(&self, flipped: bool) -> Result<()>;
}

#[async_trait]
impl OrientationStore for Storage {
    async fn load(&self) -> Result<bool> {
        match self.get_preference(ORIENTATION_KEY).await?.as_deref() {
            None | Some("false") => Ok(false),
            Some("true") => Ok(true),
            Some(other) => Err(anyhow!(
                "invalid stored value for {ORIENTATION_KEY}: {other:?}"
            )),
        }
    }

    async fn save(&self, flipped: bool) -> Result<()> {
        self.set_preference(ORIENTATION_KEY, if flipped { "true" } else { "false" })
            .await
    }
}

/// Non-persistent store; the flag lives only as long as the value.
#[derive(Default)]
pub struct MemoryOrientationStore {
    flipped: Mutex<bool>,
}

impl MemoryOrientationStore {
    pub fn new(flipped: bool) -> Self {
        Self {
            flipped: Mutex::new(flipped),
        }
    }
}

#[async_trait]
impl OrientationStore for MemoryOrientationStore {
    async fn load(&self) -> Result<bool> {
        Ok(*self.flipped.lock().await)
    }

    async fn save(&self, flipped: bool) -> Result<()> {
        *self.flipped.lock().await = flipped;
        Ok(())
    }
}
