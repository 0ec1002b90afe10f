//! Typed store expressions
//!
//! Key conditions, update conditions and update actions are modelled as data
//! rather than expression strings. Two things consume them:
//!
//! - in-process stores evaluate them directly (`matches`, `evaluate`, `apply`)
//! - remote stores render them through [`ExpressionBuilder`] into an expression
//!   string plus `#name` / `:value` placeholder bindings
//!
//! No general query language is implemented here; only the operators the
//! data-access layer needs.

use crate::types::{Item, KeyToken};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

// =============================================================================
// Comparison
// =============================================================================

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

/// Compare two scalar values
///
/// Numbers compare numerically and strings lexically. Mixed or non-scalar
/// operands are incomparable, so every comparison on them is false.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

// =============================================================================
// Key conditions
// =============================================================================

/// Predicate on the sort key of a query
#[derive(Debug, Clone, PartialEq)]
pub enum SortCondition {
    /// Sort key compares to a value
    Compare {
        /// Operator (`Ne` is not a valid key condition)
        op: CompareOp,
        /// Right-hand operand
        value: Value,
    },
    /// Sort key within an inclusive range
    Between {
        /// Lower bound
        low: Value,
        /// Upper bound
        high: Value,
    },
    /// String sort key starts with a prefix
    BeginsWith(String),
}

impl SortCondition {
    /// Check a sort key value against this condition
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            SortCondition::Compare { op, value: rhs } => {
                compare_values(value, rhs).map_or(false, |o| op.holds(o))
            }
            SortCondition::Between { low, high } => {
                matches!(
                    compare_values(value, low),
                    Some(Ordering::Greater | Ordering::Equal)
                ) && matches!(
                    compare_values(value, high),
                    Some(Ordering::Less | Ordering::Equal)
                )
            }
            SortCondition::BeginsWith(prefix) => value
                .as_str()
                .map_or(false, |s| s.starts_with(prefix.as_str())),
        }
    }
}

/// Key condition of a query: partition equality plus optional sort predicate
#[derive(Debug, Clone, PartialEq)]
pub struct KeyCondition {
    /// Partition key attribute name
    pub partition_attr: String,
    /// Partition key value
    pub partition_value: Value,
    /// Sort key attribute and predicate
    pub sort: Option<(String, SortCondition)>,
}

impl KeyCondition {
    /// `partition_attr = value`
    pub fn partition(attr: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            partition_attr: attr.into(),
            partition_value: value.into(),
            sort: None,
        }
    }

    /// Add a sort key predicate
    pub fn with_sort(mut self, attr: impl Into<String>, condition: SortCondition) -> Self {
        self.sort = Some((attr.into(), condition));
        self
    }

    /// Add `sort_attr BETWEEN low AND high`
    pub fn between(
        self,
        attr: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.with_sort(
            attr,
            SortCondition::Between {
                low: low.into(),
                high: high.into(),
            },
        )
    }

    /// Partition value as a key token, if it is a valid key value
    pub fn partition_token(&self) -> Option<KeyToken> {
        KeyToken::from_value(&self.partition_value)
    }

    /// Check an item against the full key condition
    pub fn matches(&self, item: &Item) -> bool {
        let partition_ok = item
            .get(&self.partition_attr)
            .map_or(false, |v| compare_values(v, &self.partition_value) == Some(Ordering::Equal));
        if !partition_ok {
            return false;
        }
        match &self.sort {
            None => true,
            Some((attr, cond)) => item.get(attr).map_or(false, |v| cond.matches(v)),
        }
    }
}

// =============================================================================
// Update conditions
// =============================================================================

/// Guard evaluated against the existing item of a conditional update
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `attribute_exists(attr)`
    AttributeExists(String),
    /// `attribute_not_exists(attr)`
    AttributeNotExists(String),
    /// `attr <op> value`
    Compare {
        /// Attribute name
        attr: String,
        /// Operator
        op: CompareOp,
        /// Right-hand operand
        value: Value,
    },
    /// Both hold
    And(Box<Condition>, Box<Condition>),
    /// Either holds
    Or(Box<Condition>, Box<Condition>),
}

impl Condition {
    /// `attribute_exists(attr)`
    pub fn exists(attr: impl Into<String>) -> Self {
        Condition::AttributeExists(attr.into())
    }

    /// `attribute_not_exists(attr)`
    pub fn not_exists(attr: impl Into<String>) -> Self {
        Condition::AttributeNotExists(attr.into())
    }

    /// `attr < value`
    pub fn lt(attr: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Compare {
            attr: attr.into(),
            op: CompareOp::Lt,
            value: value.into(),
        }
    }

    /// `attr = value`
    pub fn eq(attr: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Compare {
            attr: attr.into(),
            op: CompareOp::Eq,
            value: value.into(),
        }
    }

    /// `self AND other`
    pub fn and(self, other: Condition) -> Self {
        Condition::And(Box::new(self), Box::new(other))
    }

    /// `self OR other`
    pub fn or(self, other: Condition) -> Self {
        Condition::Or(Box::new(self), Box::new(other))
    }

    /// Evaluate against the current item (None when the item does not exist)
    pub fn evaluate(&self, item: Option<&Item>) -> bool {
        let attr_of = |name: &str| item.and_then(|i| i.get(name));
        match self {
            Condition::AttributeExists(attr) => attr_of(attr).is_some(),
            Condition::AttributeNotExists(attr) => attr_of(attr).is_none(),
            Condition::Compare { attr, op, value } => attr_of(attr)
                .and_then(|current| compare_values(current, value))
                .map_or(false, |o| op.holds(o)),
            Condition::And(l, r) => l.evaluate(item) && r.evaluate(item),
            Condition::Or(l, r) => l.evaluate(item) || r.evaluate(item),
        }
    }
}

// =============================================================================
// Update actions
// =============================================================================

/// One mutation inside an update expression
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    /// `SET attr = value`
    Set {
        /// Attribute name
        attr: String,
        /// New value
        value: Value,
    },
    /// `SET attr = attr + by`; the attribute must already exist
    Increment {
        /// Attribute name
        attr: String,
        /// Amount
        by: i64,
    },
    /// `ADD attr by`; a missing attribute starts from zero
    Add {
        /// Attribute name
        attr: String,
        /// Amount
        by: i64,
    },
}

impl UpdateAction {
    /// Attribute touched by this action
    pub fn attr(&self) -> &str {
        match self {
            UpdateAction::Set { attr, .. }
            | UpdateAction::Increment { attr, .. }
            | UpdateAction::Add { attr, .. } => attr,
        }
    }
}

/// Ordered list of update actions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateExpr {
    /// Actions applied in order
    pub actions: Vec<UpdateAction>,
}

impl UpdateExpr {
    /// Empty update
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `SET attr = value`
    pub fn set(mut self, attr: impl Into<String>, value: impl Into<Value>) -> Self {
        self.actions.push(UpdateAction::Set {
            attr: attr.into(),
            value: value.into(),
        });
        self
    }

    /// Append `SET attr = attr + by`
    pub fn increment(mut self, attr: impl Into<String>, by: i64) -> Self {
        self.actions.push(UpdateAction::Increment {
            attr: attr.into(),
            by,
        });
        self
    }

    /// Append `ADD attr by`
    pub fn add(mut self, attr: impl Into<String>, by: i64) -> Self {
        self.actions.push(UpdateAction::Add {
            attr: attr.into(),
            by,
        });
        self
    }

    /// Check whether the expression has no actions
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Apply every action to `item` in place
    ///
    /// On error the item may be partially modified; callers apply to a
    /// scratch copy and commit only on success.
    pub fn apply(&self, item: &mut Item) -> Result<(), String> {
        for action in &self.actions {
            match action {
                UpdateAction::Set { attr, value } => {
                    item.insert(attr.clone(), value.clone());
                }
                UpdateAction::Increment { attr, by } => {
                    let current = item.get(attr).and_then(Value::as_i64).ok_or_else(|| {
                        format!(
                            "the provided expression refers to attribute '{}' which is missing or not an integer",
                            attr
                        )
                    })?;
                    item.insert(attr.clone(), Value::from(checked_sum(attr, current, *by)?));
                }
                UpdateAction::Add { attr, by } => {
                    let current = match item.get(attr) {
                        None => 0,
                        Some(v) => v.as_i64().ok_or_else(|| {
                            format!("ADD requires integer attribute '{}'", attr)
                        })?,
                    };
                    item.insert(attr.clone(), Value::from(checked_sum(attr, current, *by)?));
                }
            }
        }
        Ok(())
    }
}

fn checked_sum(attr: &str, current: i64, by: i64) -> Result<i64, String> {
    current
        .checked_add(by)
        .ok_or_else(|| format!("numeric overflow updating attribute '{}'", attr))
}

/// Which attributes a conditional update returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnValues {
    /// Nothing
    #[default]
    None,
    /// The whole item after the update
    AllNew,
    /// The whole item before the update
    AllOld,
    /// Only the updated attributes, after the update
    UpdatedNew,
}

impl ReturnValues {
    /// Wire name used by DynamoDB-compatible stores
    pub fn as_str(self) -> &'static str {
        match self {
            ReturnValues::None => "NONE",
            ReturnValues::AllNew => "ALL_NEW",
            ReturnValues::AllOld => "ALL_OLD",
            ReturnValues::UpdatedNew => "UPDATED_NEW",
        }
    }
}

// =============================================================================
// Rendering
// =============================================================================

/// Renders typed expressions into expression strings with placeholder bindings
///
/// Attribute names become `#n0, #n1, ...` (one placeholder per distinct name)
/// and values become `:v0, :v1, ...`.
#[derive(Debug, Default)]
pub struct ExpressionBuilder {
    names: BTreeMap<String, String>,
    values: BTreeMap<String, Value>,
}

impl ExpressionBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    fn name(&mut self, attr: &str) -> String {
        if let Some((placeholder, _)) = self.names.iter().find(|(_, a)| a.as_str() == attr) {
            return placeholder.clone();
        }
        let placeholder = format!("#n{}", self.names.len());
        self.names.insert(placeholder.clone(), attr.to_string());
        placeholder
    }

    fn value(&mut self, value: &Value) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value.clone());
        placeholder
    }

    /// Render a key condition expression
    pub fn key_condition(&mut self, cond: &KeyCondition) -> String {
        let pk = self.name(&cond.partition_attr);
        let pv = self.value(&cond.partition_value);
        let mut expr = format!("{} = {}", pk, pv);
        if let Some((attr, sort)) = &cond.sort {
            let sk = self.name(attr);
            let rendered = match sort {
                SortCondition::Compare { op, value } => {
                    format!("{} {} {}", sk, op.symbol(), self.value(value))
                }
                SortCondition::Between { low, high } => {
                    let lo = self.value(low);
                    let hi = self.value(high);
                    format!("{} BETWEEN {} AND {}", sk, lo, hi)
                }
                SortCondition::BeginsWith(prefix) => {
                    let p = self.value(&Value::String(prefix.clone()));
                    format!("begins_with({}, {})", sk, p)
                }
            };
            expr.push_str(" AND ");
            expr.push_str(&rendered);
        }
        expr
    }

    /// Render a condition expression
    pub fn condition(&mut self, cond: &Condition) -> String {
        match cond {
            Condition::AttributeExists(attr) => format!("attribute_exists({})", self.name(attr)),
            Condition::AttributeNotExists(attr) => {
                format!("attribute_not_exists({})", self.name(attr))
            }
            Condition::Compare { attr, op, value } => {
                let n = self.name(attr);
                let v = self.value(value);
                format!("{} {} {}", n, op.symbol(), v)
            }
            Condition::And(l, r) => {
                let l = self.grouped(l);
                let r = self.grouped(r);
                format!("{} AND {}", l, r)
            }
            Condition::Or(l, r) => {
                let l = self.condition(l);
                let r = self.condition(r);
                format!("{} OR {}", l, r)
            }
        }
    }

    // OR binds looser than AND
    fn grouped(&mut self, cond: &Condition) -> String {
        match cond {
            Condition::Or(..) => format!("({})", self.condition(cond)),
            _ => self.condition(cond),
        }
    }

    /// Render an update expression (`SET ... ADD ...`)
    pub fn update(&mut self, update: &UpdateExpr) -> String {
        let mut sets = Vec::new();
        let mut adds = Vec::new();
        for action in &update.actions {
            match action {
                UpdateAction::Set { attr, value } => {
                    let n = self.name(attr);
                    let v = self.value(value);
                    sets.push(format!("{} = {}", n, v));
                }
                UpdateAction::Increment { attr, by } => {
                    let n = self.name(attr);
                    let v = self.value(&Value::from(*by));
                    sets.push(format!("{} = {} + {}", n, n, v));
                }
                UpdateAction::Add { attr, by } => {
                    let n = self.name(attr);
                    let v = self.value(&Value::from(*by));
                    adds.push(format!("{} {}", n, v));
                }
            }
        }
        let mut clauses = Vec::new();
        if !sets.is_empty() {
            clauses.push(format!("SET {}", sets.join(", ")));
        }
        if !adds.is_empty() {
            clauses.push(format!("ADD {}", adds.join(", ")));
        }
        clauses.join(" ")
    }

    /// Render a projection expression
    pub fn projection(&mut self, attrs: &[String]) -> String {
        attrs
            .iter()
            .map(|a| self.name(a))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Placeholder to attribute name bindings
    pub fn names(&self) -> &BTreeMap<String, String> {
        &self.names
    }

    /// Placeholder to value bindings
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Consume the builder, returning `(names, values)`
    pub fn into_bindings(self) -> (BTreeMap<String, String>, BTreeMap<String, Value>) {
        (self.names, self.values)
    }
}
