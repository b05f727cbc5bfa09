use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetValue {
    Bool(bool),
    String(String),
    Int(i64),
    /// Momentary input such as a button click. Only true for the run that
    /// received it.
    Trigger(bool),
}

impl WidgetValue {
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::String(_) => "string",
            Self::Int(_) => "int",
            Self::Trigger(_) => "trigger",
        }
    }
}

impl fmt::Display for WidgetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) | Self::Trigger(b) => write!(f, "{b}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Int(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    Checkbox,
    Button,
    Radio,
    Slider,
    TextInput,
    TextArea,
}

impl WidgetKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Checkbox => "checkbox",
            Self::Button => "button",
            Self::Radio => "radio",
            Self::Slider => "slider",
            Self::TextInput => "text_input",
            Self::TextArea => "text_area",
        }
    }

    /// Stable id of a widget declared with `label`: `"<kind>-<label>"`.
    #[must_use]
    pub fn widget_id(self, label: &str) -> String {
        format!("{}-{label}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetState {
    pub id: String,
    pub value: WidgetValue,
}

/// Widget values as they travel with a rerun request.
///
/// Serialized as a JSON array of `{"id": .., "value": {"bool": true}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WidgetStates {
    widgets: Vec<WidgetState>,
}

impl WidgetStates {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: impl Into<String>, value: WidgetValue) {
        self.widgets.push(WidgetState {
            id: id.into(),
            value,
        });
    }

    #[must_use]
    pub fn with(mut self, id: impl Into<String>, value: WidgetValue) -> Self {
        self.push(id, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &WidgetState> {
        self.widgets.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}

/// Read-only copy of the store taken at the start of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WidgetValues {
    values: IndexMap<String, WidgetValue>,
}

impl WidgetValues {
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&WidgetValue> {
        self.values.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &WidgetValue)> {
        self.values.iter().map(|(id, value)| (id.as_str(), value))
    }
}

/// Current value of every widget seen so far, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WidgetStore {
    values: IndexMap<String, WidgetValue>,
}

impl WidgetStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepares the store for a new run: every trigger goes back to
    /// inactive, then the snapshot's entries overwrite what they name.
    pub fn apply_snapshot(&mut self, snapshot: Option<&WidgetStates>) {
        for value in self.values.values_mut() {
            if let WidgetValue::Trigger(active) = value {
                *active = false;
            }
        }

        if let Some(snapshot) = snapshot {
            for state in snapshot.iter() {
                self.values.insert(state.id.clone(), state.value.clone());
            }
        }
    }

    #[must_use]
    pub fn current_snapshot(&self) -> WidgetValues {
        WidgetValues {
            values: self.values.clone(),
        }
    }

    #[must_use]
    pub fn to_states(&self) -> WidgetStates {
        let mut states = WidgetStates::new();
        for (id, value) in &self.values {
            states.push(id.clone(), value.clone());
        }
        states
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&WidgetValue> {
        self.values.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_overwrites_and_keeps_others() {
        let mut store = WidgetStore::new();
        store.apply_snapshot(Some(
            &WidgetStates::new()
                .with("checkbox-a", WidgetValue::Bool(true))
                .with("text_input-name", WidgetValue::String("ann".into())),
        ));

        store.apply_snapshot(Some(
            &WidgetStates::new().with("text_input-name", WidgetValue::String("bob".into())),
        ));

        assert_eq!(store.get("checkbox-a"), Some(&WidgetValue::Bool(true)));
        assert_eq!(
            store.get("text_input-name"),
            Some(&WidgetValue::String("bob".into()))
        );
    }

    #[test]
    fn test_triggers_reset_unless_snapshot_sets_them() {
        let mut store = WidgetStore::new();
        store.apply_snapshot(Some(
            &WidgetStates::new().with("button-go", WidgetValue::Trigger(true)),
        ));
        assert_eq!(store.get("button-go"), Some(&WidgetValue::Trigger(true)));

        store.apply_snapshot(None);
        assert_eq!(store.get("button-go"), Some(&WidgetValue::Trigger(false)));

        store.apply_snapshot(Some(
            &WidgetStates::new().with("button-go", WidgetValue::Trigger(true)),
        ));
        assert_eq!(store.get("button-go"), Some(&WidgetValue::Trigger(true)));
    }

    #[test]
    fn test_duplicate_ids_last_write_wins() {
        let mut store = WidgetStore::new();
        store.apply_snapshot(Some(
            &WidgetStates::new()
                .with("radio-r", WidgetValue::Int(1))
                .with("radio-r", WidgetValue::Int(2)),
        ));
        assert_eq!(store.get("radio-r"), Some(&WidgetValue::Int(2)));
        assert_eq!(store.to_states().len(), 1);
    }

    #[test]
    fn test_snapshot_is_detached_copy() {
        let mut store = WidgetStore::new();
        store.apply_snapshot(Some(&WidgetStates::new().with("slider-s", WidgetValue::Int(3))));
        let snapshot = store.current_snapshot();

        store.apply_snapshot(Some(&WidgetStates::new().with("slider-s", WidgetValue::Int(9))));
        assert_eq!(snapshot.get("slider-s"), Some(&WidgetValue::Int(3)));
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_wire_format() {
        let json = r#"[
            {"id": "checkbox-checkbox", "value": {"bool": true}},
            {"id": "text_area-text_area", "value": {"string": "matey!"}},
            {"id": "radio-radio", "value": {"int": 2}},
            {"id": "button-button", "value": {"trigger": true}}
        ]"#;
        let states = WidgetStates::from_json(json).unwrap();
        assert_eq!(states.len(), 4);

        let mut store = WidgetStore::new();
        store.apply_snapshot(Some(&states));
        let snapshot = store.current_snapshot();
        let ids: Vec<&str> = snapshot.iter().map(|(id, _)| id).collect();
        assert_eq!(
            ids,
            vec!["checkbox-checkbox", "text_area-text_area", "radio-radio", "button-button"]
        );
        assert_eq!(
            serde_json::to_value(store.to_states()).unwrap(),
            serde_json::from_str::<serde_json::Value>(json).unwrap()
        );

        assert!(WidgetStates::from_json(r#"[{"id": "x", "value": {"float": 1.0}}]"#).is_err());
    }

    #[test]
    fn test_widget_ids() {
        assert_eq!(WidgetKind::TextArea.widget_id("text_area"), "text_area-text_area");
        assert_eq!(WidgetKind::Checkbox.widget_id("agree"), "checkbox-agree");
    }
}
