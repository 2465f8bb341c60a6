//! Scripted in-memory channel for end-to-end flow tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use ivr_engine_core::{Channel, DtmfEvent, EngineError, PlaybackHandle, Result};
use tokio::sync::mpsc;
use tokio::time;

/// One step of a caller script, executed in order once the engine
/// subscribes to DTMF.
pub enum ScriptStep {
    /// Let time pass.
    Wait(Duration),
    /// Press one key.
    Press(char),
    /// Drop the leg; every later step is unreachable.
    HangUp,
}

pub struct MockChannel {
    audio: Duration,
    script: Mutex<Vec<ScriptStep>>,
    channel_vars: Mutex<HashMap<String, String>>,
    play_failures: Mutex<Vec<String>>,
    pub played: Mutex<Vec<String>>,
    pub hung_up: Mutex<bool>,
    pub transfers: Mutex<Vec<(String, String, u32)>>,
}

impl MockChannel {
    /// Channel whose every playback takes `audio_secs` of (virtual) time.
    pub fn new(audio_secs: u64) -> Self {
        Self {
            audio: Duration::from_secs(audio_secs),
            script: Mutex::new(Vec::new()),
            channel_vars: Mutex::new(HashMap::new()),
            play_failures: Mutex::new(Vec::new()),
            played: Mutex::new(Vec::new()),
            hung_up: Mutex::new(false),
            transfers: Mutex::new(Vec::new()),
        }
    }

    pub fn with_script(self, steps: Vec<ScriptStep>) -> Self {
        *self.script.lock().unwrap() = steps;
        self
    }

    pub fn with_channel_var(self, name: &str, value: &str) -> Self {
        self.channel_vars
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
        self
    }

    /// Playing this resolved sound path fails instead of starting.
    pub fn with_play_failure(self, sound: &str) -> Self {
        self.play_failures.lock().unwrap().push(sound.to_string());
        self
    }

    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }

    pub fn hung_up(&self) -> bool {
        *self.hung_up.lock().unwrap()
    }
}

struct MockPlayback {
    duration: Duration,
}

#[async_trait]
impl PlaybackHandle for MockPlayback {
    async fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    async fn wait_finished(&mut self) -> Result<()> {
        time::sleep(self.duration).await;
        Ok(())
    }
}

#[async_trait]
impl Channel for MockChannel {
    fn id(&self) -> &str {
        "mock-channel-1"
    }

    fn caller_id(&self) -> Option<&str> {
        Some("1001")
    }

    async fn answer(&self) -> Result<()> {
        Ok(())
    }

    async fn play(&self, sound: &str) -> Result<Box<dyn PlaybackHandle>> {
        if self.play_failures.lock().unwrap().iter().any(|s| s == sound) {
            return Err(EngineError::Handler(format!("playback failed: {sound}")));
        }
        self.played.lock().unwrap().push(sound.to_string());
        Ok(Box::new(MockPlayback { duration: self.audio }))
    }

    fn subscribe_dtmf(&self) -> mpsc::Receiver<DtmfEvent> {
        let (tx, rx) = mpsc::channel(32);
        let steps = std::mem::take(&mut *self.script.lock().unwrap());
        tokio::spawn(async move {
            for step in steps {
                match step {
                    ScriptStep::Wait(duration) => time::sleep(duration).await,
                    ScriptStep::Press(digit) => {
                        if tx.send(DtmfEvent::new(digit)).await.is_err() {
                            return;
                        }
                    }
                    ScriptStep::HangUp => return,
                }
            }
            // a silent caller is still on the line; keep the sender alive
            std::future::pending::<()>().await;
        });
        rx
    }

    async fn hangup(&self) -> Result<()> {
        *self.hung_up.lock().unwrap() = true;
        Ok(())
    }

    async fn get_variable(&self, name: &str) -> Result<Option<String>> {
        Ok(self.channel_vars.lock().unwrap().get(name).cloned())
    }

    async fn set_variable(&self, name: &str, value: &str) -> Result<()> {
        self.channel_vars
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn continue_in_dialplan(
        &self,
        context: &str,
        extension: &str,
        priority: u32,
    ) -> Result<()> {
        self.transfers.lock().unwrap().push((
            context.to_string(),
            extension.to_string(),
            priority,
        ));
        Ok(())
    }
}
