//! Device write pipeline
//!
//! `submit` queues a string and returns immediately. A single worker
//! thread drains the queue through one privileged session and closes it
//! after the idle timeout. A later `submit` starts a new worker, which
//! waits for the previous one to finish before opening its session, so
//! at most one session is open at a time.

use crate::config::DeviceConfig;
use crate::constants::{
    DEFAULT_CHARACTER_DELAY_MS, DEFAULT_DEVICE_PATH, DEFAULT_IDLE_TIMEOUT_MS, WRITER_THREAD_NAME,
};
use crate::device::session::{PrivilegedSession, SessionLauncher};
use crate::error::DeviceError;
use crate::keyboard::Encoder;
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use unicode_normalization::UnicodeNormalization;

/// Writer timing and target
#[derive(Debug, Clone, PartialEq)]
pub struct WriterSettings {
    /// Gadget device node written by the session
    pub device_path: String,
    /// Pause after every report
    pub character_delay: Duration,
    /// Session is closed after this long without a new string
    pub idle_timeout: Duration,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            device_path: DEFAULT_DEVICE_PATH.to_string(),
            character_delay: Duration::from_millis(DEFAULT_CHARACTER_DELAY_MS),
            idle_timeout: Duration::from_millis(DEFAULT_IDLE_TIMEOUT_MS),
        }
    }
}

impl WriterSettings {
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self {
            device_path: config.path.clone(),
            character_delay: config.character_delay(),
            idle_timeout: config.idle_timeout(),
        }
    }
}

/// Live worker bookkeeping, guarded by one mutex
#[derive(Default)]
struct WorkerSlot {
    /// Queue of the live worker; None once it retired
    sender: Option<UnboundedSender<String>>,
    /// Most recently spawned worker thread
    handle: Option<JoinHandle<()>>,
    /// Incremented per spawned worker
    generation: u64,
}

struct Shared<L> {
    encoder: Arc<Encoder>,
    launcher: L,
    settings: WriterSettings,
    slot: Mutex<WorkerSlot>,
}

impl<L> Shared<L> {
    fn lock_slot(&self) -> MutexGuard<'_, WorkerSlot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Retire the worker unless a string arrived meanwhile.
    ///
    /// Runs under the slot lock so `submit` either sees the live sender
    /// (and the string is picked up here) or spawns a new worker.
    fn retire_if_idle(&self, generation: u64, rx: &mut UnboundedReceiver<String>) -> Option<String> {
        let mut slot = self.lock_slot();
        if let Ok(text) = rx.try_recv() {
            return Some(text);
        }
        if slot.generation == generation {
            slot.sender = None;
        }
        None
    }

    /// Retire and drop whatever is still queued
    fn abandon(&self, generation: u64, rx: &mut UnboundedReceiver<String>) {
        let mut slot = self.lock_slot();
        if slot.generation == generation {
            slot.sender = None;
        }
        drop(slot);
        let mut dropped = 0;
        while rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!("Abandoned {} queued string(s)", dropped);
        }
    }
}

/// Fire-and-forget keystroke writer
pub struct DeviceWriter<L: SessionLauncher> {
    shared: Arc<Shared<L>>,
}

impl<L: SessionLauncher> DeviceWriter<L> {
    pub fn new(encoder: Arc<Encoder>, launcher: L, settings: WriterSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                encoder,
                launcher,
                settings,
                slot: Mutex::new(WorkerSlot::default()),
            }),
        }
    }

    pub fn encoder(&self) -> &Arc<Encoder> {
        &self.shared.encoder
    }

    pub fn settings(&self) -> &WriterSettings {
        &self.shared.settings
    }

    /// True while a worker accepts strings
    pub fn is_active(&self) -> bool {
        self.shared.lock_slot().sender.is_some()
    }

    /// Queue `text` for typing. Never blocks; failures are only logged.
    pub fn submit(&self, text: impl Into<String>) {
        let mut text = text.into();
        debug!("Submitting {} character(s)", text.chars().count());

        let mut slot = self.shared.lock_slot();
        if let Some(sender) = &slot.sender {
            match sender.send(text) {
                Ok(()) => return,
                // receiver gone without retiring; replace the worker
                Err(mpsc::error::SendError(returned)) => text = returned,
            }
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let _ = sender.send(text);
        slot.generation += 1;
        let generation = slot.generation;
        let previous = slot.handle.take();
        let shared = Arc::clone(&self.shared);

        let spawned = std::thread::Builder::new()
            .name(WRITER_THREAD_NAME.into())
            .spawn(move || writer_thread(shared, receiver, generation, previous));
        match spawned {
            Ok(handle) => {
                slot.sender = Some(sender);
                slot.handle = Some(handle);
            }
            Err(e) => error!("Failed to start writer thread: {}", e),
        }
    }

    /// Let the worker type everything queued, then wait for it to exit
    pub fn shutdown(self) {
        drop(self);
    }

    fn stop(&self) {
        let handle = {
            let mut slot = self.shared.lock_slot();
            slot.sender = None;
            slot.handle.take()
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("Writer thread panicked");
            }
        }
    }
}

impl<L: SessionLauncher> Drop for DeviceWriter<L> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Worker thread main function
fn writer_thread<L: SessionLauncher>(
    shared: Arc<Shared<L>>,
    mut receiver: UnboundedReceiver<String>,
    generation: u64,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous {
        if previous.join().is_err() {
            warn!("Previous writer thread panicked");
        }
    }

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            shared.abandon(generation, &mut receiver);
            return;
        }
    };

    rt.block_on(async move {
        match run_batch(&shared, receiver, generation).await {
            Ok(typed) => info!("Writer session closed, {} string(s) typed", typed),
            Err(e) => error!("Writer session failed: {}", e),
        }
    });
}

/// One session: type strings until idle, then exit the shell
async fn run_batch<L: SessionLauncher>(
    shared: &Shared<L>,
    mut receiver: UnboundedReceiver<String>,
    generation: u64,
) -> Result<usize, DeviceError> {
    let mut session = match shared.launcher.open().await {
        Ok(session) => session,
        Err(e) => {
            shared.abandon(generation, &mut receiver);
            return Err(e);
        }
    };

    let idle_timeout = shared.settings.idle_timeout;
    let mut typed = 0;
    loop {
        let text = match tokio::time::timeout(idle_timeout, receiver.recv()).await {
            Ok(Some(text)) => text,
            // writer dropped
            Ok(None) => break,
            Err(_) => match shared.retire_if_idle(generation, &mut receiver) {
                Some(text) => text,
                None => break,
            },
        };

        match type_text(shared, &mut session, &text).await {
            Ok(true) => typed += 1,
            Ok(false) => {}
            Err(e) => {
                shared.abandon(generation, &mut receiver);
                return Err(e.into());
            }
        }
    }

    debug!("Writer idle, closing session");
    session.send_line("exit").await?;
    session.flush().await?;
    let code = session.close().await?;
    if code != 0 {
        return Err(DeviceError::WriteFailure { code });
    }
    Ok(typed)
}

/// Type one string. Returns false if it was skipped.
///
/// Text is NFC-composed first so combining sequences reach the
/// precomposed keysyms layouts carry.
async fn type_text<L: SessionLauncher>(
    shared: &Shared<L>,
    session: &mut L::Session,
    text: &str,
) -> std::io::Result<bool> {
    let composed: String = text.nfc().collect();
    let reports = match shared.encoder.encode_str(&composed) {
        Ok(reports) => reports,
        Err(e) => {
            warn!("Skipping string: {}", e);
            return Ok(false);
        }
    };

    let settings = &shared.settings;
    let sleep = format!("sleep {:.3}", settings.character_delay.as_secs_f64());
    for report in &reports {
        session
            .send_line(&format!(
                "echo -n -e \"{}\" > {}",
                report.to_shell_escape(),
                settings.device_path
            ))
            .await?;
        session.send_line(&sleep).await?;
        session.flush().await?;
    }
    debug!("Typed {} report(s)", reports.len());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::tables::{Keycode, Keycodes, Keysym, Keysyms, Scancode, Scancodes};
    use crate::keyboard::KeyboardGraph;
    use pretty_assertions::assert_eq;
    use std::io;
    use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

    /// Records every session's lines instead of running a shell
    #[derive(Default)]
    struct Recorder {
        opens: AtomicUsize,
        open_now: AtomicUsize,
        max_open: AtomicUsize,
        exit_code: AtomicI32,
        fail_writes: AtomicUsize,
        sessions: Mutex<Vec<Vec<String>>>,
    }

    #[derive(Clone, Default)]
    struct MockLauncher(Arc<Recorder>);

    struct MockSession {
        recorder: Arc<Recorder>,
        lines: Vec<String>,
    }

    impl SessionLauncher for MockLauncher {
        type Session = MockSession;

        async fn open(&self) -> Result<MockSession, DeviceError> {
            let rec = &self.0;
            rec.opens.fetch_add(1, Ordering::SeqCst);
            let now = rec.open_now.fetch_add(1, Ordering::SeqCst) + 1;
            rec.max_open.fetch_max(now, Ordering::SeqCst);
            Ok(MockSession {
                recorder: Arc::clone(rec),
                lines: Vec::new(),
            })
        }
    }

    impl PrivilegedSession for MockSession {
        async fn send_line(&mut self, line: &str) -> io::Result<()> {
            if self.recorder.fail_writes.load(Ordering::SeqCst) > 0 {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "shell gone"));
            }
            self.lines.push(line.to_string());
            Ok(())
        }

        async fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }

        async fn close(self) -> io::Result<i32> {
            Ok(self.recorder.exit_code.load(Ordering::SeqCst))
        }
    }

    impl Drop for MockSession {
        fn drop(&mut self) {
            self.recorder.open_now.fetch_sub(1, Ordering::SeqCst);
            let lines = std::mem::take(&mut self.lines);
            self.recorder.sessions.lock().unwrap().push(lines);
        }
    }

    fn encoder() -> Arc<Encoder> {
        let keysyms = Keysyms::new(
            "default",
            vec![
                Keysym::new(0x61, "a").with_unicode('a', "LATIN SMALL LETTER A"),
                Keysym::new(0x41, "A").with_unicode('A', "LATIN CAPITAL LETTER A"),
                Keysym::new(0x62, "b").with_unicode('b', "LATIN SMALL LETTER B"),
                Keysym::new(0xe4, "adiaeresis").with_unicode('ä', "LATIN SMALL LETTER A WITH DIAERESIS"),
            ],
        );
        let graph = KeyboardGraph::resolve(
            Keycodes::new(
                "test",
                vec![
                    Keycode::new(38, vec![0x61, 0x41]),
                    Keycode::new(56, vec![0x62, 0x42, 0xe4]),
                ],
            ),
            keysyms,
            Scancodes::new("default", vec![Scancode::new(0x04, 38), Scancode::new(0x05, 56)]),
        )
        .unwrap();
        Arc::new(Encoder::with_graph(graph))
    }

    fn writer(launcher: &MockLauncher, idle_ms: u64) -> DeviceWriter<MockLauncher> {
        DeviceWriter::new(
            encoder(),
            launcher.clone(),
            WriterSettings {
                device_path: "/dev/hidg0".into(),
                character_delay: Duration::from_millis(20),
                idle_timeout: Duration::from_millis(idle_ms),
            },
        )
    }

    fn sessions(launcher: &MockLauncher) -> Vec<Vec<String>> {
        launcher.0.sessions.lock().unwrap().clone()
    }

    fn wait_until_idle(writer: &DeviceWriter<MockLauncher>) {
        for _ in 0..200 {
            if !writer.is_active() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("writer never went idle");
    }

    #[test]
    fn test_session_lines() {
        let launcher = MockLauncher::default();
        let w = writer(&launcher, 500);
        w.submit("aA");
        w.shutdown();

        let sessions = sessions(&launcher);
        assert_eq!(sessions.len(), 1);
        assert_eq!(
            sessions[0],
            vec![
                "echo -n -e \"\\x00\\x00\\x04\\x00\\x00\\x00\\x00\\x00\\x00\\x00\\x00\\x00\\x00\\x00\\x00\\x00\" > /dev/hidg0".to_string(),
                "sleep 0.020".to_string(),
                "echo -n -e \"\\x02\\x00\\x04\\x00\\x00\\x00\\x00\\x00\\x00\\x00\\x00\\x00\\x00\\x00\\x00\\x00\" > /dev/hidg0".to_string(),
                "sleep 0.020".to_string(),
                "exit".to_string(),
            ]
        );
    }

    #[test]
    fn test_one_session_serves_queued_strings() {
        let launcher = MockLauncher::default();
        let w = writer(&launcher, 500);
        w.submit("a");
        w.submit("b");
        w.submit("ab");
        w.shutdown();

        assert_eq!(launcher.0.opens.load(Ordering::SeqCst), 1);
        let sessions = sessions(&launcher);
        let echoes = sessions[0].iter().filter(|l| l.starts_with("echo")).count();
        assert_eq!(echoes, 4);
        assert_eq!(sessions[0].last().map(String::as_str), Some("exit"));
    }

    #[test]
    fn test_idle_timeout_closes_and_reopens() {
        let launcher = MockLauncher::default();
        let w = writer(&launcher, 30);
        w.submit("a");
        wait_until_idle(&w);

        w.submit("b");
        w.shutdown();

        assert_eq!(launcher.0.opens.load(Ordering::SeqCst), 2);
        assert_eq!(launcher.0.max_open.load(Ordering::SeqCst), 1);
        let sessions = sessions(&launcher);
        assert_eq!(sessions.len(), 2);
        assert!(sessions.iter().all(|s| s.last().map(String::as_str) == Some("exit")));
    }

    #[test]
    fn test_never_two_sessions_at_once() {
        let launcher = MockLauncher::default();
        let w = writer(&launcher, 1);
        for _ in 0..20 {
            w.submit("ab");
            std::thread::sleep(Duration::from_millis(2));
        }
        w.shutdown();

        assert_eq!(launcher.0.max_open.load(Ordering::SeqCst), 1);
        let echoes: usize = sessions(&launcher)
            .iter()
            .map(|s| s.iter().filter(|l| l.starts_with("echo")).count())
            .sum();
        assert_eq!(echoes, 40);
    }

    #[test]
    fn test_unmapped_string_is_skipped() {
        let launcher = MockLauncher::default();
        let w = writer(&launcher, 500);
        w.submit("a€b");
        w.submit("b");
        w.shutdown();

        let sessions = sessions(&launcher);
        let echoes = sessions[0].iter().filter(|l| l.starts_with("echo")).count();
        assert_eq!(echoes, 1);
    }

    #[test]
    fn test_combining_sequence_is_composed() {
        let launcher = MockLauncher::default();
        let w = writer(&launcher, 500);
        w.submit("a\u{0308}");
        w.shutdown();

        let sessions = sessions(&launcher);
        let echoes: Vec<&String> = sessions[0].iter().filter(|l| l.starts_with("echo")).collect();
        assert_eq!(echoes.len(), 1);
        assert!(echoes[0].starts_with("echo -n -e \"\\x40\\x00\\x05"));
    }

    #[test]
    fn test_failed_exit_does_not_block_next_batch() {
        let launcher = MockLauncher::default();
        launcher.0.exit_code.store(1, Ordering::SeqCst);
        let w = writer(&launcher, 20);
        w.submit("a");
        wait_until_idle(&w);

        launcher.0.exit_code.store(0, Ordering::SeqCst);
        w.submit("b");
        w.shutdown();
        assert_eq!(launcher.0.opens.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_io_error_abandons_batch() {
        let launcher = MockLauncher::default();
        launcher.0.fail_writes.store(1, Ordering::SeqCst);
        let w = writer(&launcher, 500);
        w.submit("a");
        wait_until_idle(&w);
        assert_eq!(launcher.0.opens.load(Ordering::SeqCst), 1);

        launcher.0.fail_writes.store(0, Ordering::SeqCst);
        w.submit("b");
        w.shutdown();
        assert_eq!(launcher.0.opens.load(Ordering::SeqCst), 2);
        assert_eq!(sessions(&launcher)[1].last().map(String::as_str), Some("exit"));
    }

    #[test]
    fn test_settings_from_config() {
        let config = DeviceConfig {
            path: "/dev/hidg1".into(),
            character_delay_ms: 5,
            idle_timeout_ms: 100,
            ..Default::default()
        };
        let settings = WriterSettings::from_config(&config);
        assert_eq!(settings.device_path, "/dev/hidg1");
        assert_eq!(settings.character_delay, Duration::from_millis(5));
        assert_eq!(settings.idle_timeout, Duration::from_millis(100));
    }
}
