use crate::config::DetectorConfig;
use crate::event::{KeyPress, Suppression, TagClassifier, TargetClassifier};
use crate::timer::QuietTimer;
use std::time::{Duration, Instant};

/// Outcome of one evaluation cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Evaluation {
    /// The accumulated characters qualified as a scan.
    Scan { code: String, presses: u32 },
    /// Qualified as a scan, but the trigger button was held past the
    /// long-press threshold.
    LongPress { code: String, presses: u32 },
    /// The accumulated characters were too short or too slow.
    Error { partial: String, message: String },
}

impl Evaluation {
    pub fn is_success(&self) -> bool {
        !matches!(self, Evaluation::Error { .. })
    }
}

/// Accumulation state. A sequence is open exactly while a first-character
/// timestamp exists; an open sequence may still have an empty buffer when it
/// was opened by a designated start character.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum Phase {
    #[default]
    Idle,
    Accumulating {
        first_char_at: Instant,
        last_char_at: Instant,
        buffer: String,
    },
}

type ScanObserver = Box<dyn FnMut(&str, u32) + Send>;
type ErrorObserver = Box<dyn FnMut(&str, &str) + Send>;
type KeyObserver = Box<dyn FnMut(&KeyPress) + Send>;

/// Watches a stream of key presses and decides whether they came from a
/// hardware scanner or a human typist.
///
/// Feed it presses with [`handle_key_press`](Self::handle_key_press); when the
/// quiet period elapses (drive it via [`poll`](Self::poll)) or an end
/// character arrives, the accumulated sequence is classified and the matching
/// observer runs. All state lives in this struct and returns to idle after
/// every evaluation, successful or not.
pub struct ScanDetector {
    config: DetectorConfig,
    phase: Phase,
    scan_button_presses: u32,
    timer: QuietTimer,
    last_outcome: Option<Evaluation>,
    classifier: Box<dyn TargetClassifier + Send>,
    on_scan: Option<ScanObserver>,
    on_scan_button_long_pressed: Option<ScanObserver>,
    on_error: Option<ErrorObserver>,
    on_key_detect: Option<KeyObserver>,
    on_receive: Option<KeyObserver>,
}

impl ScanDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            scan_button_presses: 0,
            timer: QuietTimer::new(),
            last_outcome: None,
            classifier: Box::new(TagClassifier),
            on_scan: None,
            on_scan_button_long_pressed: None,
            on_error: None,
            on_key_detect: None,
            on_receive: None,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Replaces the text-input classifier used to ignore keystrokes aimed at
    /// editable controls.
    pub fn with_classifier(mut self, classifier: impl TargetClassifier + Send + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    pub fn on_scan(mut self, f: impl FnMut(&str, u32) + Send + 'static) -> Self {
        self.on_scan = Some(Box::new(f));
        self
    }

    pub fn on_scan_button_long_pressed(
        mut self,
        f: impl FnMut(&str, u32) + Send + 'static,
    ) -> Self {
        self.on_scan_button_long_pressed = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(&str, &str) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn on_key_detect(mut self, f: impl FnMut(&KeyPress) + Send + 'static) -> Self {
        self.on_key_detect = Some(Box::new(f));
        self
    }

    pub fn on_receive(mut self, f: impl FnMut(&KeyPress) + Send + 'static) -> Self {
        self.on_receive = Some(Box::new(f));
        self
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle && self.scan_button_presses == 0 && !self.timer.is_armed()
    }

    /// Deadline of the scheduled quiet-period evaluation, if one is pending.
    pub fn pending_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Processes one key press at the current time.
    pub fn handle_key_press(&mut self, press: &KeyPress) -> Suppression {
        self.handle_key_press_at(press, Instant::now())
    }

    /// Processes one key press stamped at `now`, returning what the event
    /// plumbing should do with it.
    pub fn handle_key_press_at(&mut self, press: &KeyPress, now: Instant) -> Suppression {
        // Keystrokes aimed at a text control are someone typing in a field;
        // leave them completely alone.
        if self.classifier.is_text_input(&press.target) {
            return Suppression::none();
        }

        let mut suppression = Suppression::none();

        // The scanner's trigger button is counted and always swallowed,
        // whatever the configured suppression says.
        if self.config.scan_button_key_code == Some(press.code) {
            self.scan_button_presses += 1;
            suppression = Suppression::all();
        }

        if let Some(observer) = self.on_key_detect.as_mut() {
            observer(press);
        }

        if self.config.stop_propagation {
            suppression.stop_propagation = true;
        }
        if self.config.prevent_default {
            suppression.prevent_default = true;
        }

        let sequence_open = self.phase != Phase::Idle;
        let mut end_requested = false;
        let mut appended = None;

        if sequence_open && self.config.end_char.contains(&press.code) {
            suppression = Suppression::all();
            end_requested = true;
        } else if !sequence_open && self.config.start_char.contains(&press.code) {
            // Opens the sequence without contributing a character.
            suppression = Suppression::all();
        } else {
            // Codes outside the unicode scalar range contribute nothing but
            // still count towards the timing window.
            appended = char::from_u32(press.code);
        }

        self.touch(appended, now);

        self.timer.cancel();
        if end_requested {
            self.evaluate();
        } else {
            self.timer.arm(
                now,
                Duration::from_millis(self.config.time_before_scan_test_ms),
            );
        }

        if let Some(observer) = self.on_receive.as_mut() {
            observer(press);
        }

        suppression
    }

    /// Appends `c` (when present) and stamps the sequence, opening one first
    /// if none is in flight.
    fn touch(&mut self, c: Option<char>, now: Instant) {
        match &mut self.phase {
            Phase::Idle => {
                let mut buffer = String::new();
                if let Some(c) = c {
                    buffer.push(c);
                }
                self.phase = Phase::Accumulating {
                    first_char_at: now,
                    last_char_at: now,
                    buffer,
                };
            }
            Phase::Accumulating {
                last_char_at,
                buffer,
                ..
            } => {
                if let Some(c) = c {
                    buffer.push(c);
                }
                *last_char_at = now;
            }
        }
    }

    /// Fires the quiet-period evaluation when its deadline has passed.
    pub fn poll(&mut self) -> Option<Evaluation> {
        self.poll_at(Instant::now())
    }

    pub fn poll_at(&mut self, now: Instant) -> Option<Evaluation> {
        if self.timer.fire(now) {
            Some(self.evaluate())
        } else {
            None
        }
    }

    /// Classifies whatever has accumulated and resets to idle.
    pub fn evaluate(&mut self) -> Evaluation {
        self.run_evaluation(None)
    }

    /// Classifies a literal string as if it had been scanned instantly,
    /// bypassing the timing check. The test-injection surface.
    pub fn evaluate_forced(&mut self, code: &str) -> Evaluation {
        self.run_evaluation(Some(code))
    }

    fn run_evaluation(&mut self, forced: Option<&str>) -> Evaluation {
        let (buffer, elapsed) = match forced {
            Some(code) => (code.to_string(), Duration::ZERO),
            None => match &self.phase {
                Phase::Idle => (String::new(), Duration::ZERO),
                Phase::Accumulating {
                    first_char_at,
                    last_char_at,
                    buffer,
                } => (buffer.clone(), last_char_at.duration_since(*first_char_at)),
            },
        };

        // The payload itself implies at least one trigger action.
        let presses = self.scan_button_presses.max(1);
        // Characters, not bytes: non-ASCII input must not inflate the counts
        let char_count = buffer.chars().count();
        let allowed =
            Duration::from_millis(char_count as u64 * self.config.avg_time_by_char_ms);

        let long_enough = char_count >= self.config.min_length;
        let fast_enough = elapsed < allowed || (elapsed.is_zero() && allowed.is_zero());

        let evaluation = if long_enough && fast_enough {
            if presses > self.config.scan_button_long_press_threshold {
                Evaluation::LongPress {
                    code: buffer,
                    presses,
                }
            } else {
                Evaluation::Scan {
                    code: buffer,
                    presses,
                }
            }
        } else if !long_enough {
            Evaluation::Error {
                partial: buffer,
                message: format!(
                    "string length should be greater or equal to {}",
                    self.config.min_length
                ),
            }
        } else {
            Evaluation::Error {
                partial: buffer,
                message: format!(
                    "average key character time should be less or equal to {}ms",
                    self.config.avg_time_by_char_ms
                ),
            }
        };

        self.reset();
        self.dispatch(&evaluation);
        self.last_outcome = Some(evaluation.clone());
        evaluation
    }

    fn dispatch(&mut self, evaluation: &Evaluation) {
        match evaluation {
            Evaluation::LongPress { code, presses } => {
                // Falls back to the plain scan observer when no long-press
                // observer is installed.
                if let Some(observer) = self.on_scan_button_long_pressed.as_mut() {
                    observer(code, *presses);
                } else if let Some(observer) = self.on_scan.as_mut() {
                    observer(code, *presses);
                }
            }
            Evaluation::Scan { code, presses } => {
                if let Some(observer) = self.on_scan.as_mut() {
                    observer(code, *presses);
                }
            }
            Evaluation::Error { partial, message } => {
                if let Some(observer) = self.on_error.as_mut() {
                    observer(partial, message);
                }
            }
        }
    }

    /// Takes the outcome of the most recent evaluation, if any happened since
    /// the last take. Lets drivers observe synchronous end-character
    /// evaluations without installing callbacks.
    pub fn take_outcome(&mut self) -> Option<Evaluation> {
        self.last_outcome.take()
    }

    /// Returns the detector to idle: empty buffer, zero press count, no
    /// pending evaluation. Runs after every evaluation regardless of outcome.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.scan_button_presses = 0;
        self.timer.cancel();
    }
}
