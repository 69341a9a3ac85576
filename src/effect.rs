use crate::error::{Error, Result};
use image::Rgb;
use std::sync::mpsc;
use std::sync::{Mutex, RwLock};

/// Background treatment applied by the compositor.
#[derive(Clone, Debug, PartialEq)]
pub enum EffectConfig {
    /// Replace the background with a flat fill.
    SolidColor { color: Rgb<u8> },
    /// Replace the background with the frame itself, blurred.
    Blur { radius_px: f32 },
}

impl EffectConfig {
    pub fn validate(&self) -> Result<()> {
        match self {
            EffectConfig::SolidColor { .. } => Ok(()),
            EffectConfig::Blur { radius_px } => {
                if !radius_px.is_finite() || *radius_px < 0.0 {
                    Err(Error::invalid_config(format!(
                        "blur radius must be a non-negative number, got {radius_px}"
                    )))
                } else {
                    Ok(())
                }
            }
        }
    }
}

impl Default for EffectConfig {
    fn default() -> Self {
        EffectConfig::Blur { radius_px: 10.0 }
    }
}

/// Shared holder for the current effect parameters.
///
/// The host writes through `set`, the pipeline snapshots through `current`
/// on every compositor invocation. Writes are whole-value assignments under
/// the lock, so a reader sees either the old or the new config, never a mix.
pub struct EffectStore {
    current: RwLock<EffectConfig>,
    subscribers: Mutex<Vec<mpsc::Sender<EffectConfig>>>,
}

impl EffectStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(EffectConfig::default()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Replace the current config. Invalid input fails without mutating
    /// state; subscribers only ever see values that were accepted.
    pub fn set(&self, config: EffectConfig) -> Result<()> {
        config.validate()?;
        match self.current.write() {
            Ok(mut guard) => *guard = config.clone(),
            Err(poisoned) => *poisoned.into_inner() = config.clone(),
        }
        let mut subscribers = match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        subscribers.retain(|tx| tx.send(config.clone()).is_ok());
        Ok(())
    }

    /// Snapshot of the config in effect right now.
    pub fn current(&self) -> EffectConfig {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Change-notification sequence; one value per accepted `set`.
    pub fn subscribe(&self) -> mpsc::Receiver<EffectConfig> {
        let (tx, rx) = mpsc::channel();
        let mut subscribers = match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        subscribers.push(tx);
        rx
    }
}

impl Default for EffectStore {
    fn default() -> Self {
        Self::new()
    }
}
