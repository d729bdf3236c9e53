//! Template variables referenced from recorded macros as `$(name)`.

use crate::macros::MacroContext;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    /// `date`, `time`, `datetime`, `year` or `filename`.
    Builtin,
    /// Read from the process environment; `value` names the variable.
    Environment,
    Fixed,
    /// Prompted on every use, `value` is the suggested default.
    Input,
    /// Prompted on first use, then remembered for the session.
    InputOnce,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub kind: VariableKind,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub prompt: String,
}

impl Variable {
    pub fn new(name: impl Into<String>, kind: VariableKind, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            value: value.into(),
            prompt: String::new(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Variables {
    defined: BTreeMap<String, Variable>,
    answers: HashMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, variable: Variable) {
        self.answers.remove(&variable.name);
        self.defined.insert(variable.name.clone(), variable);
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.defined.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Variable> {
        self.answers.remove(name);
        self.defined.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.defined.values()
    }

    /// Value of `name`, prompting through `ctx` when the kind asks for it.
    /// Names that were never defined fall back to the builtins.
    pub fn resolve(&mut self, name: &str, ctx: &mut dyn MacroContext) -> Option<String> {
        let Some(variable) = self.defined.get(name) else {
            return builtin(name, ctx);
        };
        let label = if variable.prompt.is_empty() {
            variable.name.as_str()
        } else {
            variable.prompt.as_str()
        };
        match variable.kind {
            VariableKind::Builtin => {
                let key = if variable.value.is_empty() { name } else { variable.value.as_str() };
                builtin(key, ctx)
            }
            VariableKind::Environment => {
                let key = if variable.value.is_empty() { name } else { variable.value.as_str() };
                env::var(key).ok()
            }
            VariableKind::Fixed => Some(variable.value.clone()),
            VariableKind::Input => ctx.prompt(label, &variable.value),
            VariableKind::InputOnce => {
                if let Some(answer) = self.answers.get(name) {
                    return Some(answer.clone());
                }
                let answer = ctx.prompt(label, &variable.value)?;
                self.answers.insert(name.to_string(), answer.clone());
                Some(answer)
            }
        }
    }
}

fn builtin(name: &str, ctx: &dyn MacroContext) -> Option<String> {
    let now = Local::now();
    let value = match name {
        "date" => now.format("%Y-%m-%d").to_string(),
        "time" => now.format("%H:%M:%S").to_string(),
        "datetime" => now.format("%Y-%m-%d %H:%M:%S").to_string(),
        "year" => now.format("%Y").to_string(),
        "filename" => return ctx.file_name(),
        _ => return None,
    };
    Some(value)
}
