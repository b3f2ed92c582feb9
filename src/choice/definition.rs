use super::ChoiceValue;
use crate::core::{EngineError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::ops::Deref;
use std::sync::Arc;

lazy_static! {
    // printable ASCII, no whitespace
    static ref STORAGE_CODE: Regex = Regex::new(r"^[!-~]+$").expect("static regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionRestriction {
    Unrestricted,
    Restricted { allow_all: bool },
}

/// An enumeration usable by single and multiple choice fields.
#[derive(Debug, Clone)]
pub struct ChoiceDefinition {
    name: String,
    max_code_len: usize,
    values: Vec<ChoiceValue>,
    by_code: HashMap<String, usize>,
    by_display: HashMap<String, usize>,
    default: Option<usize>,
    restriction: TransitionRestriction,
}

impl ChoiceDefinition {
    pub fn builder(name: impl Into<String>, max_code_len: usize) -> ChoiceDefinitionBuilder {
        ChoiceDefinitionBuilder::new(name, max_code_len)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_code_len(&self) -> usize {
        self.max_code_len
    }

    pub fn values(&self) -> &[ChoiceValue] {
        &self.values
    }

    pub fn active_values(&self) -> impl Iterator<Item = &ChoiceValue> {
        self.values.iter().filter(|v| v.is_active())
    }

    pub fn default_value(&self) -> Option<&ChoiceValue> {
        self.default.map(|idx| &self.values[idx])
    }

    pub fn parse_choice_value(&self, code: &str) -> Option<&ChoiceValue> {
        self.by_code.get(code).map(|idx| &self.values[*idx])
    }

    /// First value declared with this display text.
    pub fn lookup_by_display_value(&self, text: &str) -> Option<&ChoiceValue> {
        self.by_display.get(text).map(|idx| &self.values[*idx])
    }

    pub fn contains(&self, code: &str) -> bool {
        self.by_code.contains_key(code)
    }

    pub fn restriction(&self) -> TransitionRestriction {
        self.restriction
    }

    pub fn is_restricted(&self) -> bool {
        matches!(self.restriction, TransitionRestriction::Restricted { .. })
    }

    pub fn is_authorized_transition(&self, from: &str, to: &str) -> bool {
        match self.restriction {
            TransitionRestriction::Unrestricted => true,
            TransitionRestriction::Restricted { .. } => self
                .parse_choice_value(from)
                .is_some_and(|value| value.transitions.iter().any(|code| code == to)),
        }
    }

    /// Values a field currently holding `from` may move to.
    pub fn next_values(&self, from: &str) -> Vec<&ChoiceValue> {
        self.values
            .iter()
            .filter(|to| to.code() != from && self.is_authorized_transition(from, to.code()))
            .collect()
    }
}

/// Staged construction of a [`ChoiceDefinition`]; values are checked as
/// they are added, transitions are resolved on `build`.
#[derive(Debug)]
pub struct ChoiceDefinitionBuilder {
    name: String,
    max_code_len: usize,
    values: Vec<ChoiceValue>,
    default: Option<usize>,
    restricted: bool,
    allow_all: bool,
    transitions: Vec<(String, String)>,
    finals: Vec<String>,
    default_working: Option<String>,
    default_final: Option<String>,
}

impl ChoiceDefinitionBuilder {
    pub fn new(name: impl Into<String>, max_code_len: usize) -> Self {
        Self {
            name: name.into(),
            max_code_len,
            values: Vec::new(),
            default: None,
            restricted: false,
            allow_all: false,
            transitions: Vec::new(),
            finals: Vec::new(),
            default_working: None,
            default_final: None,
        }
    }

    pub fn add_choice_value(&mut self, value: ChoiceValue) -> Result<&mut Self> {
        self.check_code(value.code())?;
        if self.values.iter().any(|v| v.code() == value.code()) {
            return Err(EngineError::Composition(format!(
                "Duplicate choice code '{}' in '{}'",
                value.code(),
                self.name
            )));
        }
        self.values.push(value);
        Ok(self)
    }

    pub fn add_choice_value_as_default(&mut self, value: ChoiceValue) -> Result<&mut Self> {
        self.add_choice_value(value)?;
        self.default = Some(self.values.len() - 1);
        Ok(self)
    }

    pub fn restrict_transitions(&mut self) -> &mut Self {
        self.restricted = true;
        self
    }

    /// Restricts transitions, then links every value to every other value.
    pub fn allow_all_transitions(&mut self) -> &mut Self {
        self.restricted = true;
        self.allow_all = true;
        self
    }

    pub fn add_transition(&mut self, from: &str, to: &str) -> Result<&mut Self> {
        for code in [from, to] {
            if !self.values.iter().any(|v| v.code() == code) {
                return Err(EngineError::Composition(format!(
                    "Transition references unknown code '{}' in '{}'",
                    code, self.name
                )));
            }
        }
        self.restricted = true;
        self.transitions.push((from.to_string(), to.to_string()));
        Ok(self)
    }

    pub fn final_value(&mut self, code: &str) -> &mut Self {
        self.finals.push(code.to_string());
        self
    }

    pub fn default_working(&mut self, code: &str) -> &mut Self {
        self.default_working = Some(code.to_string());
        self
    }

    pub fn default_final(&mut self, code: &str) -> &mut Self {
        self.default_final = Some(code.to_string());
        self
    }

    fn check_code(&self, code: &str) -> Result<()> {
        if code.len() > self.max_code_len {
            return Err(EngineError::Composition(format!(
                "Choice code '{}' is {} characters long, '{}' allows at most {}",
                code,
                code.len(),
                self.name,
                self.max_code_len
            )));
        }
        if !STORAGE_CODE.is_match(code) {
            return Err(EngineError::Composition(format!(
                "Choice code '{}' in '{}' must be non-empty printable ASCII",
                code, self.name
            )));
        }
        Ok(())
    }

    pub fn build(self) -> Result<ChoiceDefinition> {
        let ChoiceDefinitionBuilder {
            name,
            max_code_len,
            mut values,
            default,
            restricted,
            allow_all,
            transitions,
            ..
        } = self;

        if allow_all {
            let codes: Vec<String> = values.iter().map(|v| v.code().to_string()).collect();
            for value in values.iter_mut() {
                value.transitions = codes
                    .iter()
                    .filter(|code| code.as_str() != value.code())
                    .cloned()
                    .collect();
            }
        } else {
            for (from, to) in transitions {
                if let Some(value) = values.iter_mut().find(|v| v.code() == from)
                    && !value.transitions.contains(&to)
                {
                    value.transitions.push(to);
                }
            }
        }

        let mut by_code = HashMap::new();
        let mut by_display = HashMap::new();
        for (idx, value) in values.iter().enumerate() {
            by_code.insert(value.code().to_string(), idx);
            by_display.entry(value.display().to_string()).or_insert(idx);
        }

        let restriction = if restricted {
            TransitionRestriction::Restricted { allow_all }
        } else {
            TransitionRestriction::Unrestricted
        };

        Ok(ChoiceDefinition {
            name,
            max_code_len,
            values,
            by_code,
            by_display,
            default,
            restriction,
        })
    }

    /// Builds a workflow: transitions are always restricted and final
    /// values plus default working/final picks are mandatory.
    pub fn build_workflow(mut self) -> Result<TransitionChoiceDefinition> {
        self.restricted = true;
        let finals: HashSet<String> = self.finals.iter().cloned().collect();
        let name = self.name.clone();
        let missing = |what: &str| {
            EngineError::Composition(format!("Workflow '{}' has no {}", name, what))
        };
        let default_working = self
            .default_working
            .clone()
            .ok_or_else(|| missing("default working value"))?;
        let default_final = self
            .default_final
            .clone()
            .ok_or_else(|| missing("default final value"))?;
        if finals.is_empty() {
            return Err(missing("final value"));
        }

        let choice = self.build()?;
        for code in finals.iter().chain([&default_working, &default_final]) {
            if !choice.contains(code) {
                return Err(EngineError::Composition(format!(
                    "Workflow '{}' references unknown code '{}'",
                    choice.name(),
                    code
                )));
            }
        }
        if !finals.contains(&default_final) {
            return Err(EngineError::Composition(format!(
                "Default final value '{}' of '{}' is not a final value",
                default_final,
                choice.name()
            )));
        }
        if finals.contains(&default_working) {
            return Err(EngineError::Composition(format!(
                "Default working value '{}' of '{}' is a final value",
                default_working,
                choice.name()
            )));
        }

        Ok(TransitionChoiceDefinition {
            choice: Arc::new(choice),
            finals,
            default_working,
            default_final,
        })
    }
}

/// A choice definition that models a lightweight workflow.
#[derive(Debug, Clone)]
pub struct TransitionChoiceDefinition {
    choice: Arc<ChoiceDefinition>,
    finals: HashSet<String>,
    default_working: String,
    default_final: String,
}

impl TransitionChoiceDefinition {
    pub fn choice(&self) -> &Arc<ChoiceDefinition> {
        &self.choice
    }

    pub fn is_final(&self, code: &str) -> bool {
        self.finals.contains(code)
    }

    pub fn final_values(&self) -> impl Iterator<Item = &ChoiceValue> {
        self.choice
            .values()
            .iter()
            .filter(|v| self.finals.contains(v.code()))
    }

    pub fn default_working(&self) -> &str {
        &self.default_working
    }

    pub fn default_final(&self) -> &str {
        &self.default_final
    }
}

impl Deref for TransitionChoiceDefinition {
    type Target = ChoiceDefinition;

    fn deref(&self) -> &Self::Target {
        &self.choice
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn colors() -> ChoiceDefinitionBuilder {
        let mut builder = ChoiceDefinition::builder("color", 3);
        builder
            .add_choice_value(ChoiceValue::new("RED", "Red"))
            .unwrap()
            .add_choice_value_as_default(ChoiceValue::new("GRN", "Green"))
            .unwrap()
            .add_choice_value(ChoiceValue::new("BLU", "Blue"))
            .unwrap();
        builder
    }

    #[test]
    fn test_code_longer_than_bound_is_rejected() {
        let mut builder = ChoiceDefinition::builder("color", 3);
        let err = builder
            .add_choice_value(ChoiceValue::new("PURPLE", "Purple"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Composition(_)));
    }

    #[test]
    fn test_non_ascii_code_is_rejected() {
        let mut builder = ChoiceDefinition::builder("color", 10);
        assert!(builder.add_choice_value(ChoiceValue::new("ÉTÉ", "Summer")).is_err());
        assert!(builder.add_choice_value(ChoiceValue::new("A B", "Spaced")).is_err());
    }

    #[test]
    fn test_parse_and_default() {
        let definition = colors().build().unwrap();
        assert_eq!(definition.parse_choice_value("BLU").unwrap().display(), "Blue");
        assert!(definition.parse_choice_value("XXX").is_none());
        assert_eq!(definition.default_value().unwrap().code(), "GRN");
    }

    #[test]
    fn test_lookup_by_display_first_match_wins() {
        let mut builder = colors();
        builder
            .add_choice_value(ChoiceValue::new("RD2", "Red"))
            .unwrap();
        let definition = builder.build().unwrap();
        assert_eq!(definition.lookup_by_display_value("Red").unwrap().code(), "RED");
    }

    #[test]
    fn test_explicit_transitions() {
        let mut builder = colors();
        builder.add_transition("RED", "GRN").unwrap();
        let definition = builder.build().unwrap();
        assert!(definition.is_authorized_transition("RED", "GRN"));
        assert!(!definition.is_authorized_transition("GRN", "RED"));
        assert!(!definition.is_authorized_transition("RED", "BLU"));
        let next: Vec<&str> = definition.next_values("RED").iter().map(|v| v.code()).collect();
        assert_eq!(next, vec!["GRN"]);
    }

    #[test]
    fn test_workflow_requires_defaults() {
        let builder = colors();
        assert!(builder.build_workflow().is_err());

        let mut builder = colors();
        builder
            .allow_all_transitions()
            .final_value("BLU")
            .default_working("RED")
            .default_final("BLU");
        let workflow = builder.build_workflow().unwrap();
        assert!(workflow.is_final("BLU"));
        assert!(!workflow.is_final("RED"));
        assert_eq!(workflow.default_working(), "RED");
        assert!(workflow.is_restricted());
    }
}
