//! Update expressions evaluated against JSON records.
//!
//! Both store backends load the current document, call
//! [`UpdateExpression::apply`], and persist the result, so condition and
//! arithmetic semantics are identical everywhere.

use serde_json::{Map, Value};

/// Dotted path to a (possibly nested) field, e.g. `units_available.xl`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parses a dotted path. Empty segments are ignored.
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Returns a path with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Looks up the field in `record`.
    pub fn get<'a>(&self, record: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(record, |current, segment| current.get(segment.as_str()))
    }

    fn set(&self, record: &mut Value, value: Value) -> Result<(), UpdateRejected> {
        let Some((last, parents)) = self.segments.split_last() else {
            return Err(UpdateRejected::InvalidPath(self.to_string()));
        };

        let mut current = record;
        for segment in parents {
            let object = current
                .as_object_mut()
                .ok_or_else(|| UpdateRejected::InvalidPath(self.to_string()))?;
            current = object
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
        }

        current
            .as_object_mut()
            .ok_or_else(|| UpdateRejected::InvalidPath(self.to_string()))?
            .insert(last.clone(), value);
        Ok(())
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// A single field change.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    /// Replaces the field, creating intermediate objects as needed.
    Set { path: FieldPath, value: Value },
    /// Adds `delta` to an integer field. A missing field counts as zero.
    Add { path: FieldPath, delta: i64 },
}

/// Precondition that must hold against the stored record for the update to
/// be written.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// The field exists, is an integer, and is `>= value`.
    GreaterOrEqual { path: FieldPath, value: i64 },
    AttributeExists(FieldPath),
    AttributeNotExists(FieldPath),
    /// The field equals one of `values`. A missing field compares as null.
    OneOf { path: FieldPath, values: Vec<Value> },
}

impl Condition {
    pub fn holds(&self, record: &Value) -> bool {
        match self {
            Condition::GreaterOrEqual { path, value } => path
                .get(record)
                .and_then(Value::as_i64)
                .is_some_and(|current| current >= *value),
            Condition::AttributeExists(path) => path.get(record).is_some(),
            Condition::AttributeNotExists(path) => path.get(record).is_none(),
            Condition::OneOf { path, values } => {
                let current = path.get(record).unwrap_or(&Value::Null);
                values.contains(current)
            }
        }
    }
}

/// Why an update expression could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateRejected {
    ConditionFailed,
    InvalidPath(String),
}

/// A set of actions applied atomically, optionally guarded by a condition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateExpression {
    pub actions: Vec<UpdateAction>,
    pub condition: Option<Condition>,
}

impl UpdateExpression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: impl Into<FieldPath>, value: impl Into<Value>) -> Self {
        self.actions.push(UpdateAction::Set {
            path: path.into(),
            value: value.into(),
        });
        self
    }

    pub fn add(mut self, path: impl Into<FieldPath>, delta: i64) -> Self {
        self.actions.push(UpdateAction::Add {
            path: path.into(),
            delta,
        });
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Evaluates the condition and applies every action to `record`.
    ///
    /// On error `record` may be partially modified; callers apply the
    /// expression to a copy and only persist it on success.
    pub fn apply(&self, record: &mut Value) -> Result<(), UpdateRejected> {
        if let Some(condition) = &self.condition
            && !condition.holds(record)
        {
            return Err(UpdateRejected::ConditionFailed);
        }

        for action in &self.actions {
            match action {
                UpdateAction::Set { path, value } => path.set(record, value.clone())?,
                UpdateAction::Add { path, delta } => {
                    let current = match path.get(record) {
                        None | Some(Value::Null) => 0,
                        Some(value) => value
                            .as_i64()
                            .ok_or_else(|| UpdateRejected::InvalidPath(path.to_string()))?,
                    };
                    path.set(record, Value::from(current + delta))?;
                }
            }
        }

        Ok(())
    }
}
