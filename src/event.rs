/// Key codes that carry special meaning in the default configuration.
pub mod key_code {
    pub const TAB: u32 = 9;
    pub const ENTER: u32 = 13;
}

/// Target of a key press, as reported by the embedding surface.
///
/// A plain terminal has no notion of focused elements, so the default target
/// is the whole page. Embedders that do track focus (a webview bridge, a UI
/// toolkit) fill in the tag name and editability of the focused element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Target {
    pub tag: Option<String>,
    pub content_editable: bool,
}

impl Target {
    pub fn page() -> Self {
        Self::default()
    }

    pub fn element(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_string()),
            content_editable: false,
        }
    }

    pub fn editable(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_string()),
            content_editable: true,
        }
    }
}

/// A single key press observed by the detector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPress {
    pub code: u32,
    pub target: Target,
}

impl KeyPress {
    pub fn new(code: u32) -> Self {
        Self {
            code,
            target: Target::page(),
        }
    }

    pub fn with_target(code: u32, target: Target) -> Self {
        Self { code, target }
    }

    pub fn from_char(c: char) -> Self {
        Self::new(c as u32)
    }
}

/// What the event plumbing should do with a press once the detector has seen
/// it. The detector never touches a live event; it hands back a value and the
/// delivery layer applies it where the surface supports cancellation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Suppression {
    pub stop_propagation: bool,
    pub prevent_default: bool,
}

impl Suppression {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            stop_propagation: true,
            prevent_default: true,
        }
    }

    pub fn is_none(&self) -> bool {
        !self.stop_propagation && !self.prevent_default
    }
}

/// Decides whether keystrokes aimed at a target belong to a text control and
/// should therefore be left alone by the detector.
pub trait TargetClassifier {
    fn is_text_input(&self, target: &Target) -> bool;
}

/// Default classifier: text inputs, text areas and content-editable elements
/// count as text controls, everything else does not.
#[derive(Clone, Copy, Debug, Default)]
pub struct TagClassifier;

impl TargetClassifier for TagClassifier {
    fn is_text_input(&self, target: &Target) -> bool {
        if target.content_editable {
            return true;
        }
        matches!(
            target.tag.as_deref(),
            Some(tag) if tag.eq_ignore_ascii_case("input") || tag.eq_ignore_ascii_case("textarea")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_target_is_not_text_input() {
        assert!(!TagClassifier.is_text_input(&Target::page()));
    }

    #[test]
    fn input_and_textarea_are_text_inputs() {
        assert!(TagClassifier.is_text_input(&Target::element("input")));
        assert!(TagClassifier.is_text_input(&Target::element("INPUT")));
        assert!(TagClassifier.is_text_input(&Target::element("textarea")));
    }

    #[test]
    fn other_elements_are_not_text_inputs() {
        assert!(!TagClassifier.is_text_input(&Target::element("div")));
        assert!(!TagClassifier.is_text_input(&Target::element("button")));
    }

    #[test]
    fn editable_elements_are_text_inputs() {
        assert!(TagClassifier.is_text_input(&Target::editable("div")));
    }

    #[test]
    fn key_press_from_char_maps_scalar_value() {
        let press = KeyPress::from_char('a');
        assert_eq!(press.code, 97);
        assert_eq!(press.target, Target::page());
    }

    #[test]
    fn suppression_none_and_all() {
        assert!(Suppression::none().is_none());
        let all = Suppression::all();
        assert!(all.stop_propagation);
        assert!(all.prevent_default);
        assert!(!all.is_none());
    }
}
