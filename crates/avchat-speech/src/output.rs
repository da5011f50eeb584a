//! Audio output sinks for synthesized speech.
//!
//! The avatar renders its own video and audio remotely, so the local sink
//! mostly paces the queue: an utterance is "playing" for as long as its
//! audio lasts, and `stop` cuts it short.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::error::SpeechResult;

/// Output format requested from the TTS endpoint.
pub const OUTPUT_FORMAT: &str = "riff-24khz-16bit-mono-pcm";

/// Bytes per second of [`OUTPUT_FORMAT`] audio.
const BYTES_PER_SECOND: u64 = 24_000 * 2;

/// RIFF/WAVE header length.
const WAV_HEADER_LEN: usize = 44;

/// Destination for synthesized audio.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Play one utterance. Resolves when it has finished or was stopped.
    async fn play(&self, audio: Bytes) -> SpeechResult<()>;

    /// Halt the current utterance.
    fn stop(&self);
}

/// Playback length of a RIFF PCM buffer in [`OUTPUT_FORMAT`].
pub fn estimate_duration(audio: &[u8]) -> Duration {
    let pcm = audio.len().saturating_sub(WAV_HEADER_LEN) as u64;
    Duration::from_millis(pcm * 1000 / BYTES_PER_SECOND)
}

/// Drops audio immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardOutput;

#[async_trait]
impl AudioOutput for DiscardOutput {
    async fn play(&self, audio: Bytes) -> SpeechResult<()> {
        tracing::trace!(bytes = audio.len(), "Discarding synthesized audio");
        Ok(())
    }

    fn stop(&self) {}
}

/// Holds each utterance for its real duration.
#[derive(Debug, Default)]
pub struct PacedOutput {
    interrupt: Mutex<CancellationToken>,
    is_playing: AtomicBool,
}

impl PacedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::SeqCst)
    }

    fn current_interrupt(&self) -> CancellationToken {
        self.interrupt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AudioOutput for PacedOutput {
    async fn play(&self, audio: Bytes) -> SpeechResult<()> {
        let duration = estimate_duration(&audio);
        let interrupt = self.current_interrupt();

        self.is_playing.store(true, Ordering::SeqCst);
        tracing::debug!(
            bytes = audio.len(),
            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            "Audio playback started"
        );

        tokio::select! {
            () = tokio::time::sleep(duration) => {
                tracing::debug!("Audio playback finished");
            }
            () = interrupt.cancelled() => {
                tracing::debug!("Audio playback interrupted");
            }
        }

        self.is_playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        let mut interrupt = self.interrupt.lock().unwrap_or_else(PoisonError::into_inner);
        interrupt.cancel();
        *interrupt = CancellationToken::new();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn wav_of(duration_ms: u64) -> Bytes {
        let pcm_len = usize::try_from(duration_ms * BYTES_PER_SECOND / 1000).unwrap();
        Bytes::from(vec![0u8; WAV_HEADER_LEN + pcm_len])
    }

    #[test]
    fn test_estimate_duration() {
        assert_eq!(estimate_duration(&wav_of(1500)), Duration::from_millis(1500));
        assert_eq!(estimate_duration(&[0u8; 10]), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paced_output_waits_for_duration() {
        let output = PacedOutput::new();
        let start = tokio::time::Instant::now();
        output.play(wav_of(2000)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(2000));
        assert!(!output.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_paced_output_stop_interrupts() {
        let output = Arc::new(PacedOutput::new());
        let playing = {
            let output = Arc::clone(&output);
            tokio::spawn(async move { output.play(wav_of(60_000)).await })
        };
        while !output.is_playing() {
            tokio::task::yield_now().await;
        }

        let start = tokio::time::Instant::now();
        output.stop();
        playing.await.unwrap().unwrap();
        assert!(start.elapsed() < Duration::from_secs(60));
    }
}
