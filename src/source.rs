use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyCode, KeyEventKind, KeyModifiers};

use crate::detector::{Evaluation, ScanDetector};
use crate::event::{key_code, KeyPress};

/// Identifies one subscription on a key event source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// The enclosing context exists but refused to hand out its event source.
///
/// Callers catch this and carry on with the local source alone; it never
/// propagates out of the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnclosingAccessError;

impl fmt::Display for EnclosingAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("enclosing context denied access to its event source")
    }
}

impl std::error::Error for EnclosingAccessError {}

/// A facility that delivers key presses to subscribers.
///
/// Sources push presses into every subscribed channel. A source may sit
/// inside an enclosing context (a parent frame, an outer window) with its own
/// source; [`enclosing`](Self::enclosing) exposes it when reachable.
pub trait KeyEventSource {
    fn subscribe(&mut self, tx: Sender<KeyPress>) -> SubscriptionId;
    fn unsubscribe(&mut self, id: SubscriptionId);

    /// Event source of the enclosing context, when there is one and it is
    /// reachable. `Err` means the context refused access.
    fn enclosing(&mut self) -> Result<Option<&mut dyn KeyEventSource>, EnclosingAccessError> {
        Ok(None)
    }
}

type SubscriberList = Arc<Mutex<Vec<(SubscriptionId, Sender<KeyPress>)>>>;

fn broadcast(subscribers: &SubscriberList, press: KeyPress) {
    let mut subs = match subscribers.lock() {
        Ok(subs) => subs,
        Err(_) => return,
    };
    subs.retain(|(_, tx)| tx.send(press.clone()).is_ok());
}

/// Production source: a reader thread translating crossterm key events into
/// key presses for all subscribers. The terminal must be in raw mode for
/// per-keystroke delivery.
pub struct CrosstermKeySource {
    subscribers: SubscriberList,
    next_id: u64,
    reader_started: bool,
}

impl CrosstermKeySource {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
            next_id: 0,
            reader_started: false,
        }
    }

    fn ensure_reader(&mut self) {
        if self.reader_started {
            return;
        }
        self.reader_started = true;

        let subscribers = Arc::clone(&self.subscribers);
        std::thread::spawn(move || loop {
            match event::read() {
                Ok(CtEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                    if let Some(press) = translate_key(key.code, key.modifiers) {
                        broadcast(&subscribers, press);
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        });
    }
}

/// Maps a crossterm key to the key-press codes the detector works with.
/// Ctrl-C comes through as ETX so embedders can observe it via on_key_detect.
fn translate_key(code: KeyCode, modifiers: KeyModifiers) -> Option<KeyPress> {
    match code {
        KeyCode::Char(c) if modifiers.contains(KeyModifiers::CONTROL) => {
            let c = c.to_ascii_uppercase();
            c.is_ascii_uppercase()
                .then(|| KeyPress::new(c as u32 - 'A' as u32 + 1))
        }
        KeyCode::Char(c) => Some(KeyPress::from_char(c)),
        KeyCode::Enter => Some(KeyPress::new(key_code::ENTER)),
        KeyCode::Tab => Some(KeyPress::new(key_code::TAB)),
        KeyCode::Esc => Some(KeyPress::new(27)),
        _ => None,
    }
}

impl KeyEventSource for CrosstermKeySource {
    fn subscribe(&mut self, tx: Sender<KeyPress>) -> SubscriptionId {
        self.ensure_reader();
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push((id, tx));
        }
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.retain(|(sub_id, _)| *sub_id != id);
        }
    }
}

/// Test source driven by hand. Pushed presses fan out to every subscriber; a
/// nested context can be attached to exercise dual subscription.
pub struct ChannelKeySource {
    subscribers: Vec<(SubscriptionId, Sender<KeyPress>)>,
    next_id: u64,
    enclosing: Option<Box<ChannelKeySource>>,
    deny_enclosing: bool,
}

impl ChannelKeySource {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            next_id: 0,
            enclosing: None,
            deny_enclosing: false,
        }
    }

    /// Attaches an enclosing-context source.
    pub fn with_enclosing(mut self, enclosing: ChannelKeySource) -> Self {
        self.enclosing = Some(Box::new(enclosing));
        self
    }

    /// Makes the enclosing context refuse access, the way a cross-origin
    /// boundary would.
    pub fn deny_enclosing(mut self) -> Self {
        self.deny_enclosing = true;
        self
    }

    /// Flips enclosing-context access at runtime, for boundaries that close
    /// after a subscription was handed out.
    pub fn set_deny_enclosing(&mut self, deny: bool) {
        self.deny_enclosing = deny;
    }

    pub fn push(&mut self, press: KeyPress) {
        self.subscribers.retain(|(_, tx)| tx.send(press.clone()).is_ok());
    }

    pub fn push_str(&mut self, s: &str) {
        for c in s.chars() {
            self.push(KeyPress::from_char(c));
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn enclosing_subscriber_count(&self) -> usize {
        self.enclosing
            .as_ref()
            .map_or(0, |parent| parent.subscriber_count())
    }

    /// Pushes a press through the enclosing-context source, if any.
    pub fn push_enclosing(&mut self, press: KeyPress) {
        if let Some(parent) = self.enclosing.as_mut() {
            parent.push(press);
        }
    }
}

impl KeyEventSource for ChannelKeySource {
    fn subscribe(&mut self, tx: Sender<KeyPress>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, tx));
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
    }

    fn enclosing(&mut self) -> Result<Option<&mut dyn KeyEventSource>, EnclosingAccessError> {
        if self.deny_enclosing {
            return Err(EnclosingAccessError);
        }
        Ok(self
            .enclosing
            .as_deref_mut()
            .map(|parent| parent as &mut dyn KeyEventSource))
    }
}

/// How long `step` waits for a key press while no evaluation is pending.
const IDLE_WAIT_MS: u64 = 250;

/// Drives a [`ScanDetector`] from a key event source.
///
/// Replaces framework lifecycle coupling with explicit [`start`](Self::start)
/// and [`stop`](Self::stop): start subscribes to the source and, when one is
/// reachable, to the enclosing context's source as well; stop unsubscribes
/// both. [`step`](Self::step) blocks until the next press or the quiet-period
/// deadline, whichever comes first.
pub struct ScanMonitor {
    detector: ScanDetector,
    tx: Sender<KeyPress>,
    rx: Receiver<KeyPress>,
    primary: Option<SubscriptionId>,
    enclosing: Option<SubscriptionId>,
}

impl ScanMonitor {
    pub fn new(detector: ScanDetector) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            detector,
            tx,
            rx,
            primary: None,
            enclosing: None,
        }
    }

    pub fn detector(&mut self) -> &mut ScanDetector {
        &mut self.detector
    }

    pub fn is_started(&self) -> bool {
        self.primary.is_some()
    }

    /// Subscribes to `source` and to its enclosing context when reachable.
    /// A refused enclosing context means we run isolated; the refusal is
    /// swallowed per the error model.
    pub fn start(&mut self, source: &mut dyn KeyEventSource) {
        if self.primary.is_some() {
            return;
        }
        self.primary = Some(source.subscribe(self.tx.clone()));
        self.enclosing = match source.enclosing() {
            Ok(Some(parent)) => Some(parent.subscribe(self.tx.clone())),
            Ok(None) | Err(_) => None,
        };
    }

    pub fn stop(&mut self, source: &mut dyn KeyEventSource) {
        if let Some(id) = self.primary.take() {
            source.unsubscribe(id);
        }
        if let Some(id) = self.enclosing.take() {
            match source.enclosing() {
                Ok(Some(parent)) => parent.unsubscribe(id),
                // The context became unreachable since start; its copy of the
                // subscription cannot be removed from here.
                Ok(None) | Err(_) => {}
            }
        }
        // Replace the channel so any subscription that could not be removed
        // fails on its next send and gets pruned by the source. Also drops
        // presses that were queued but never stepped.
        let (tx, rx) = mpsc::channel();
        self.tx = tx;
        self.rx = rx;
    }

    /// Blocks until the next key press or the pending quiet-period deadline,
    /// returning the evaluation when one completed.
    pub fn step(&mut self) -> Option<Evaluation> {
        let timeout = match self.detector.pending_deadline() {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => Duration::from_millis(IDLE_WAIT_MS),
        };
        match self.rx.recv_timeout(timeout) {
            Ok(press) => {
                // End characters evaluate synchronously inside the handler
                self.detector.handle_key_press(&press);
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                let _ = self.detector.poll();
            }
        }
        self.detector.take_outcome()
    }
}
