//! Entity memory for lead-qualification and per-call context.
//!
//! The required-field schema is declared upfront when the call starts;
//! undeclared keys can be stored but never participate in completion checks.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Declaration of one entity field the call is expected to collect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub required: bool,
    pub description: String,
}

/// Collected entities plus transient conversation context.
///
/// Invariant: a field appears in `collected` as true only when `fields`
/// holds a non-null value for it.
#[derive(Debug, Clone, Default)]
pub struct EntityMemory {
    fields: HashMap<String, Value>,
    required: HashMap<String, FieldSpec>,
    collected: HashMap<String, bool>,
    /// Declaration order of required fields, so question progression is stable
    field_order: Vec<String>,
    context: Vec<(String, Value)>,
}

impl EntityMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the required-field schema. Existing values survive re-declaration.
    pub fn initialize_required_fields<I>(&mut self, specs: I)
    where
        I: IntoIterator<Item = (String, FieldSpec)>,
    {
        for (field, spec) in specs {
            if !self.field_order.contains(&field) {
                self.field_order.push(field.clone());
            }
            self.required.insert(field.clone(), spec);
            self.fields.entry(field).or_insert(Value::Null);
        }
    }

    /// Store an entity value, marking required fields collected when non-null
    pub fn set_entity(&mut self, field: &str, value: Value) {
        let is_meaningful = !value.is_null() && value.as_str() != Some("");
        self.fields.insert(field.to_string(), value);

        let is_required = self.required.get(field).is_some_and(|spec| spec.required);
        if is_required && is_meaningful {
            self.collected.insert(field.to_string(), true);
        }
    }

    pub fn get_entity(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Store a transient context fact, preserving insertion order
    pub fn set_context(&mut self, key: &str, value: Value) {
        if let Some(entry) = self.context.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value;
        } else {
            self.context.push((key.to_string(), value));
        }
    }

    pub fn get_context(&self, key: &str) -> Option<&Value> {
        self.context
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Required fields not yet collected, in declaration order
    pub fn remaining_required_fields(&self) -> Vec<(&str, &FieldSpec)> {
        self.field_order
            .iter()
            .filter_map(|field| {
                let spec = self.required.get(field)?;
                let collected = self.collected.get(field).copied().unwrap_or(false);
                (spec.required && !collected).then_some((field.as_str(), spec))
            })
            .collect()
    }

    pub fn all_required_collected(&self) -> bool {
        self.remaining_required_fields().is_empty()
    }

    /// JSON snapshot used both in prompts and as the persisted memory state
    pub fn snapshot(&self) -> Value {
        let context: serde_json::Map<String, Value> = self
            .context
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let remaining: Vec<Value> = self
            .remaining_required_fields()
            .iter()
            .map(|(field, spec)| {
                json!({
                    "field": field,
                    "required": spec.required,
                    "description": spec.description,
                })
            })
            .collect();

        json!({
            "entities": self.fields,
            "context": context,
            "_metadata": {
                "hasAllRequiredFields": self.all_required_collected(),
                "remainingRequired": remaining,
            },
        })
    }

    /// Pretty-printed snapshot for LLM prompt interpolation
    pub fn formatted_context(&self) -> String {
        serde_json::to_string_pretty(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead_schema() -> Vec<(String, FieldSpec)> {
        vec![
            (
                "name".to_string(),
                FieldSpec {
                    required: true,
                    description: "Customer's full name".to_string(),
                },
            ),
            (
                "email".to_string(),
                FieldSpec {
                    required: true,
                    description: "Contact email".to_string(),
                },
            ),
            (
                "company".to_string(),
                FieldSpec {
                    required: false,
                    description: "Company name".to_string(),
                },
            ),
        ]
    }

    #[test]
    fn test_remaining_fields_in_declaration_order() {
        let mut memory = EntityMemory::new();
        memory.initialize_required_fields(lead_schema());

        let remaining: Vec<&str> = memory
            .remaining_required_fields()
            .iter()
            .map(|(field, _)| *field)
            .collect();
        assert_eq!(remaining, vec!["name", "email"]);
    }

    #[test]
    fn test_collecting_fields_advances_completion() {
        let mut memory = EntityMemory::new();
        memory.initialize_required_fields(lead_schema());

        memory.set_entity("name", json!("Ada Lovelace"));
        assert!(!memory.all_required_collected());

        memory.set_entity("email", json!("ada@example.com"));
        assert!(memory.all_required_collected());
    }

    #[test]
    fn test_null_value_never_counts_as_collected() {
        let mut memory = EntityMemory::new();
        memory.initialize_required_fields(lead_schema());

        memory.set_entity("name", Value::Null);
        memory.set_entity("email", json!(""));
        assert_eq!(memory.remaining_required_fields().len(), 2);
    }

    #[test]
    fn test_undeclared_keys_ignored_by_completion() {
        let mut memory = EntityMemory::new();
        memory.initialize_required_fields(lead_schema());

        memory.set_entity("favorite_color", json!("green"));
        assert_eq!(memory.remaining_required_fields().len(), 2);
        assert_eq!(memory.get_entity("favorite_color"), Some(&json!("green")));
    }

    #[test]
    fn test_context_preserves_insertion_order() {
        let mut memory = EntityMemory::new();
        memory.set_context("pendingQuestion", json!("What is your name?"));
        memory.set_context("lastIntent", json!("casual"));
        memory.set_context("pendingQuestion", json!("What is your email?"));

        let snapshot = memory.snapshot();
        let keys: Vec<&String> = snapshot["context"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["pendingQuestion", "lastIntent"]);
        assert_eq!(
            memory.get_context("pendingQuestion"),
            Some(&json!("What is your email?"))
        );
    }
}
