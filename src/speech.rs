//! Voice input capture behind an injected engine
//!
//! The recognition capability belongs to the host, not this crate: the app
//! only knows the `SpeechEngine` trait and a stream of `SpeechEvent`s arriving
//! on the main event channel. The shipped engine shells out to a recognizer
//! command named in the config; tests substitute a scripted fake.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// What a recognition session can report back
#[derive(Debug, Clone)]
pub enum SpeechEvent {
    /// One recognition pass: per-segment alternative lists, best-ranked first.
    /// Each event carries the full hypothesis so far, not a delta.
    Result { segments: Vec<Vec<String>> },
    /// The engine decided speech is over
    End,
    /// Engine-specific error code, surfaced to the user verbatim
    Error { code: String },
}

/// Concatenate the best-ranked alternative of every segment.
/// This is the text that overwrites the input field on each result event.
pub fn transcript(segments: &[Vec<String>]) -> String {
    segments
        .iter()
        .filter_map(|alternatives| alternatives.first())
        .cloned()
        .collect()
}

/// A recognition capability supplied by the host environment.
/// `start` opens one capture session; events arrive on the channel the engine
/// was built with. `stop` cancels the session early.
pub trait SpeechEngine: Send {
    fn start(&mut self, language_tag: &str) -> Result<()>;
    fn stop(&mut self);
}

/// Engine backed by an external recognizer command.
///
/// The command is spawned with the BCP-47 tag as its only argument. Each
/// stdout line is one recognition result, tab-separated alternatives with the
/// best ranked first. EOF with a clean exit is end-of-speech; a non-zero exit
/// is an engine error.
pub struct CommandEngine {
    command: String,
    events: mpsc::UnboundedSender<SpeechEvent>,
    stop_tx: Option<mpsc::UnboundedSender<()>>,
}

impl CommandEngine {
    pub fn new(command: &str, events: mpsc::UnboundedSender<SpeechEvent>) -> Self {
        Self {
            command: command.to_string(),
            events,
            stop_tx: None,
        }
    }
}

impl SpeechEngine for CommandEngine {
    fn start(&mut self, language_tag: &str) -> Result<()> {
        let mut child = Command::new(&self.command)
            .arg(language_tag)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to launch recognizer '{}'", self.command))?;

        let stdout = child
            .stdout
            .take()
            .context("recognizer child has no stdout")?;

        let (stop_tx, mut stop_rx) = mpsc::unbounded_channel();
        self.stop_tx = Some(stop_tx);

        let events = self.events.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                tokio::select! {
                    _ = stop_rx.recv() => {
                        // User toggle: tear the session down without events;
                        // the caller has already left the listening state.
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        return;
                    }
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            let alternatives: Vec<String> =
                                line.split('\t').map(str::to_string).collect();
                            let event = SpeechEvent::Result {
                                segments: vec![alternatives],
                            };
                            if events.send(event).is_err() {
                                return;
                            }
                        }
                        Ok(None) => break,
                        Err(err) => {
                            let _ = events.send(SpeechEvent::Error {
                                code: err.to_string(),
                            });
                            let _ = child.wait().await;
                            return;
                        }
                    },
                }
            }

            // EOF: clean exit (or a signal from a late stop) is end-of-speech,
            // anything else is an engine failure.
            let event = match child.wait().await {
                Ok(status) if status.success() => SpeechEvent::End,
                Ok(status) => match status.code() {
                    Some(code) => SpeechEvent::Error {
                        code: format!("exit status {}", code),
                    },
                    None => SpeechEvent::End,
                },
                Err(err) => SpeechEvent::Error {
                    code: err.to_string(),
                },
            };
            let _ = events.send(event);
        });

        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }
}

#[cfg(test)]
pub mod fake {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Scripted engine for controller tests: records calls, never spawns.
    /// The shared log lets a test observe calls after the engine is boxed.
    pub struct FakeEngine {
        pub calls: Arc<Mutex<Vec<String>>>,
        pub fail_start: bool,
    }

    impl FakeEngine {
        pub fn new() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                fail_start: false,
            }
        }

        pub fn call_log(&self) -> Arc<Mutex<Vec<String>>> {
            self.calls.clone()
        }
    }

    impl SpeechEngine for FakeEngine {
        fn start(&mut self, language_tag: &str) -> Result<()> {
            if self.fail_start {
                anyhow::bail!("no capture device");
            }
            self.calls.lock().unwrap().push(format!("start {}", language_tag));
            Ok(())
        }

        fn stop(&mut self) {
            self.calls.lock().unwrap().push("stop".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_concatenates_best_alternatives() {
        let segments = vec![
            vec!["hel".to_string(), "hello".to_string()],
            vec!["lo world".to_string()],
        ];
        assert_eq!(transcript(&segments), "hello world");
    }

    #[test]
    fn test_transcript_skips_empty_segments() {
        let segments = vec![vec![], vec!["ok".to_string()]];
        assert_eq!(transcript(&segments), "ok");
    }

    #[test]
    fn test_transcript_empty() {
        assert_eq!(transcript(&[]), "");
    }
}
