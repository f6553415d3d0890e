//! Typed, runtime-mutable option registry.
//!
//! Each layer declares its options in [`Handler::make_options`]; the registry
//! is the union of all declarations. An option couples a constraint list with
//! accessor functions reading and writing the backing field in the
//! [`BotContext`], so outer layers can set options whose state lives with an
//! inner layer and vice versa.
//!
//! [`Handler::make_options`]: crate::handler::Handler::make_options

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::context::BotContext;
use crate::reply::OpReport;

/// Replacement shown for set `Hidden` options.
pub const HIDDEN_MASK: &str = "********";

/// Value type an option may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionType {
    /// Explicit unset.
    Null,
    Bool,
    Integer,
    Float,
    String,
    List,
    Map,
}

impl OptionType {
    pub fn matches(self, value: &Value) -> bool {
        match (self, value) {
            (Self::Null, Value::Null) | (Self::Bool, Value::Bool(_)) => true,
            (Self::Integer, Value::Number(n)) => n.is_i64(),
            (Self::Float, Value::Number(_)) => true,
            (Self::String, Value::String(_))
            | (Self::List, Value::Array(_))
            | (Self::Map, Value::Object(_)) => true,
            _ => false,
        }
    }
}

/// One element of an option's constraint list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    Type(OptionType),
    /// Rejects every `set`.
    ReadOnly,
    /// Redacted when listed.
    Hidden,
}

pub type OptionGetter = fn(&BotContext) -> Value;
pub type OptionSetter = fn(&mut BotContext, Value);
/// Veto hook run after the type check; `Err` carries the failure message.
pub type OptionCheck = fn(&Value) -> Result<(), String>;

#[derive(Debug, Clone)]
pub struct OptionSpec {
    name: String,
    constraints: Vec<Constraint>,
    get: OptionGetter,
    set: Option<OptionSetter>,
    check: Option<OptionCheck>,
}

impl OptionSpec {
    /// A mutable option accepting any of `types`.
    pub fn new(
        name: impl Into<String>,
        types: &[OptionType],
        get: OptionGetter,
        set: OptionSetter,
    ) -> Self {
        Self {
            name: name.into(),
            constraints: types.iter().copied().map(Constraint::Type).collect(),
            get,
            set: Some(set),
            check: None,
        }
    }

    pub fn read_only(name: impl Into<String>, get: OptionGetter) -> Self {
        Self {
            name: name.into(),
            constraints: vec![Constraint::ReadOnly],
            get,
            set: None,
            check: None,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.constraints.push(Constraint::Hidden);
        self
    }

    pub fn check(mut self, check: OptionCheck) -> Self {
        self.check = Some(check);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn is_read_only(&self) -> bool {
        self.constraints.contains(&Constraint::ReadOnly)
    }

    pub fn is_hidden(&self) -> bool {
        self.constraints.contains(&Constraint::Hidden)
    }

    /// First type alternative accepting `value`.
    pub fn accepts(&self, value: &Value) -> Option<OptionType> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::Type(t) if t.matches(value) => Some(*t),
            _ => None,
        })
    }

    pub fn value(&self, ctx: &BotContext) -> Value {
        (self.get)(ctx)
    }

    /// The value as shown to users: JSON, or the mask for hidden options.
    pub fn display(&self, ctx: &BotContext) -> String {
        let value = self.value(ctx);
        if self.is_hidden() && !value.is_null() {
            return HIDDEN_MASK.to_string();
        }
        value.to_string()
    }
}

/// Ordered set of option declarations.
#[derive(Debug, Clone, Default)]
pub struct OptionRegistry {
    specs: Vec<OptionSpec>,
}

impl OptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `spec`. An outer layer may override an inner layer's option by
    /// declaring the same name again; the override keeps the original
    /// position in listings.
    pub fn declare(&mut self, spec: OptionSpec) -> &mut Self {
        match self.specs.iter_mut().find(|s| s.name == spec.name) {
            Some(existing) => {
                debug!(option = %spec.name, "overriding option declaration");
                *existing = spec;
            }
            None => self.specs.push(spec),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&OptionSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OptionSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

// =============================================================================
// Operations
// =============================================================================

/// Lists `(name, display value)` for options whose name matches `pattern`
/// (a regular expression, unanchored). No pattern lists everything.
pub fn list_options(
    ctx: &BotContext,
    pattern: Option<&str>,
) -> Result<Vec<(String, String)>, regex::Error> {
    let pattern = pattern.map(Regex::new).transpose()?;
    Ok(ctx
        .options()
        .iter()
        .filter(|s| pattern.as_ref().is_none_or(|p| p.is_match(s.name())))
        .map(|s| (s.name().to_string(), s.display(ctx)))
        .collect())
}

/// Validates and applies `value` to option `name`.
pub fn set_option(ctx: &mut BotContext, name: &str, value: Value) -> OpReport {
    let Some(spec) = ctx.options().get(name).cloned() else {
        return OpReport::failed(format!("unknown option {name:?}"));
    };
    let setter = match spec.set {
        Some(setter) if !spec.is_read_only() => setter,
        _ => return OpReport::failed(format!("option {name} is read-only")),
    };
    let report = match spec.accepts(&value) {
        None => return OpReport::failed(format!("invalid value for {name}: {value}")),
        Some(OptionType::Null) => OpReport::ok(format!("unset {name}")),
        Some(_) => OpReport::ok(format!("option {name} set to {value}")),
    };
    if let Some(check) = spec.check
        && let Err(message) = check(&value)
    {
        return OpReport::failed(message);
    }

    info!(option = name, value = %spec_value_for_log(&spec, &value), "option set");
    setter(ctx, value);
    report
}

fn spec_value_for_log(spec: &OptionSpec, value: &Value) -> String {
    if spec.is_hidden() && !value.is_null() {
        HIDDEN_MASK.to_string()
    } else {
        value.to_string()
    }
}

/// Current values of all mutable options.
pub fn option_values(ctx: &BotContext) -> BTreeMap<String, Value> {
    ctx.options()
        .iter()
        .filter(|s| !s.is_read_only())
        .map(|s| (s.name().to_string(), s.value(ctx)))
        .collect()
}

fn options_target<'a>(ctx: &'a BotContext, file: Option<&'a str>) -> Result<&'a str, OpReport> {
    file.or(ctx.options_file())
        .ok_or_else(|| OpReport::failed("no options file specified"))
}

/// Writes the mutable options to `file` (or the default options file).
pub async fn save_options(ctx: &BotContext, file: Option<&str>) -> OpReport {
    let file = match options_target(ctx, file) {
        Ok(file) => file,
        Err(report) => return report,
    };
    match ctx.store().save(&option_values(ctx), file).await {
        Ok(_) => OpReport::ok(format!("saved options to {file}")),
        Err(e) => OpReport::failed(format!("error: failed to save options to {file}: {e}")),
    }
}

/// Applies the options stored in `file` (or the default options file) on top
/// of the current ones. Values that fail validation are skipped and reported.
pub async fn load_options(ctx: &mut BotContext, file: Option<&str>) -> OpReport {
    let file = match options_target(ctx, file) {
        Ok(file) => file.to_string(),
        Err(report) => return report,
    };
    let values: BTreeMap<String, Value> = match ctx.store().load(&file).await {
        Ok(values) => values,
        Err(e) => {
            if e.is_not_found() {
                warn!(file = %file, "options file does not exist");
            }
            return OpReport::failed(format!("error: failed to load options from {file}: {e}"));
        }
    };

    let rejected: Vec<String> = values
        .into_iter()
        .filter_map(|(name, value)| {
            let report = set_option(ctx, &name, value);
            (!report.ok).then_some(report.message)
        })
        .collect();
    if rejected.is_empty() {
        OpReport::ok(format!("loaded options from {file}"))
    } else {
        OpReport::failed(format!(
            "loaded options from {file} with errors: {}",
            rejected.join("; ")
        ))
    }
}
