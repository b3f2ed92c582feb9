/// One member of an enumerated field type.
///
/// The storage `code` is what gets persisted; the display text is what a
/// user sees. Transition lists are only filled in while the owning
/// [`ChoiceDefinition`](super::ChoiceDefinition) is being built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceValue {
    code: String,
    display: String,
    tooltip: Option<String>,
    active: bool,
    pub(super) transitions: Vec<String>,
}

impl ChoiceValue {
    pub fn new(code: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            display: display.into(),
            tooltip: None,
            active: true,
            transitions: Vec::new(),
        }
    }

    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    /// Marks the value as retired: still readable, no longer offered.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn tooltip(&self) -> Option<&str> {
        self.tooltip.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Codes this value may move to when transitions are restricted.
    pub fn authorized_transitions(&self) -> &[String] {
        &self.transitions
    }
}
