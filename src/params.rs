//! Typed named-parameter registry.
//!
//! Every configurable component (runner, solver, prohibition manager) owns a
//! [`ParameterBox`] keyed by the component name. Parameters are exposed as
//! namespaced flags of the form `prefix::flag`, accepted on the command line
//! (`--sa1::cooling_rate 0.97`, booleans as zero-token
//! `prefix::flag-enable` / `prefix::flag-disable` switches), as a JSON
//! object `{prefix: {flag: value}}`, or interactively through
//! [`ParameterBox::read_from`].

use std::fmt;
use std::io::{BufRead, Write};

use serde_json::{Map, Value};

use crate::error::Error;

/// The type a parameter was registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Bool,
    UInt,
    Float,
    Str,
}

impl ParamKind {
    fn name(self) -> &'static str {
        match self {
            ParamKind::Bool => "bool",
            ParamKind::UInt => "unsigned integer",
            ParamKind::Float => "float",
            ParamKind::Str => "string",
        }
    }
}

/// A parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    UInt(u64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Bool(_) => ParamKind::Bool,
            ParamValue::UInt(_) => ParamKind::UInt,
            ParamValue::Float(_) => ParamKind::Float,
            ParamValue::Str(_) => ParamKind::Str,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            ParamValue::Bool(b) => Value::Bool(*b),
            ParamValue::UInt(u) => Value::from(*u),
            ParamValue::Float(f) => Value::from(*f),
            ParamValue::Str(s) => Value::from(s.clone()),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::UInt(u) => write!(f, "{u}"),
            ParamValue::Float(x) => write!(f, "{x}"),
            ParamValue::Str(s) => write!(f, "{s}"),
        }
    }
}

/// One registered parameter: flag, description, expected kind and (possibly
/// absent) value.
#[derive(Debug, Clone)]
pub struct Parameter {
    flag: String,
    description: String,
    kind: ParamKind,
    value: Option<ParamValue>,
}

impl Parameter {
    pub fn flag(&self) -> &str {
        &self.flag
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }
}

/// An ordered set of typed parameters under a common prefix.
#[derive(Debug, Clone)]
pub struct ParameterBox {
    prefix: String,
    params: Vec<Parameter>,
}

impl ParameterBox {
    pub fn new(prefix: &str) -> Self {
        ParameterBox {
            prefix: prefix.to_string(),
            params: Vec::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    fn register(&mut self, flag: &str, description: &str, kind: ParamKind) {
        assert!(
            self.find(flag).is_none(),
            "parameter {}::{} registered twice",
            self.prefix,
            flag
        );
        self.params.push(Parameter {
            flag: flag.to_string(),
            description: description.to_string(),
            kind,
            value: None,
        });
    }

    pub fn register_bool(&mut self, flag: &str, description: &str) {
        self.register(flag, description, ParamKind::Bool);
    }

    pub fn register_uint(&mut self, flag: &str, description: &str) {
        self.register(flag, description, ParamKind::UInt);
    }

    pub fn register_float(&mut self, flag: &str, description: &str) {
        self.register(flag, description, ParamKind::Float);
    }

    pub fn register_str(&mut self, flag: &str, description: &str) {
        self.register(flag, description, ParamKind::Str);
    }

    pub fn register_bool_default(&mut self, flag: &str, description: &str, value: bool) {
        self.register(flag, description, ParamKind::Bool);
        if let Some(p) = self.params.last_mut() {
            p.value = Some(ParamValue::Bool(value));
        }
    }

    pub fn register_uint_default(&mut self, flag: &str, description: &str, value: u64) {
        self.register(flag, description, ParamKind::UInt);
        if let Some(p) = self.params.last_mut() {
            p.value = Some(ParamValue::UInt(value));
        }
    }

    pub fn register_float_default(&mut self, flag: &str, description: &str, value: f64) {
        self.register(flag, description, ParamKind::Float);
        if let Some(p) = self.params.last_mut() {
            p.value = Some(ParamValue::Float(value));
        }
    }

    fn find(&self, flag: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.flag == flag)
    }

    fn find_mut(&mut self, flag: &str) -> Option<&mut Parameter> {
        self.params.iter_mut().find(|p| p.flag == flag)
    }

    fn qualified(&self, flag: &str) -> String {
        format!("{}::{}", self.prefix, flag)
    }

    /// True when the parameter exists and has a value.
    pub fn is_set(&self, flag: &str) -> bool {
        self.find(flag).map(|p| p.is_set()).unwrap_or(false)
    }

    fn get(&self, flag: &str, kind: ParamKind) -> Result<&ParamValue, Error> {
        let param = self
            .find(flag)
            .ok_or_else(|| Error::ParameterNotValid(self.qualified(flag)))?;
        if param.kind != kind {
            return Err(Error::incorrect(
                &self.qualified(flag),
                format!("expected a {} parameter", param.kind.name()),
            ));
        }
        param
            .value
            .as_ref()
            .ok_or_else(|| Error::ParameterNotSet(self.qualified(flag)))
    }

    pub fn bool(&self, flag: &str) -> Result<bool, Error> {
        match self.get(flag, ParamKind::Bool)? {
            ParamValue::Bool(b) => Ok(*b),
            _ => unreachable!(),
        }
    }

    pub fn uint(&self, flag: &str) -> Result<u64, Error> {
        match self.get(flag, ParamKind::UInt)? {
            ParamValue::UInt(u) => Ok(*u),
            _ => unreachable!(),
        }
    }

    pub fn float(&self, flag: &str) -> Result<f64, Error> {
        match self.get(flag, ParamKind::Float)? {
            ParamValue::Float(f) => Ok(*f),
            _ => unreachable!(),
        }
    }

    pub fn string(&self, flag: &str) -> Result<String, Error> {
        match self.get(flag, ParamKind::Str)? {
            ParamValue::Str(s) => Ok(s.clone()),
            _ => unreachable!(),
        }
    }

    fn set(&mut self, flag: &str, value: ParamValue) -> Result<(), Error> {
        let qualified = self.qualified(flag);
        let param = self
            .find_mut(flag)
            .ok_or(Error::ParameterNotValid(qualified.clone()))?;
        if param.kind != value.kind() {
            return Err(Error::incorrect(
                &qualified,
                format!("expected a {} value", param.kind.name()),
            ));
        }
        param.value = Some(value);
        Ok(())
    }

    pub fn set_bool(&mut self, flag: &str, value: bool) -> Result<(), Error> {
        self.set(flag, ParamValue::Bool(value))
    }

    pub fn set_uint(&mut self, flag: &str, value: u64) -> Result<(), Error> {
        self.set(flag, ParamValue::UInt(value))
    }

    pub fn set_float(&mut self, flag: &str, value: f64) -> Result<(), Error> {
        self.set(flag, ParamValue::Float(value))
    }

    pub fn set_string(&mut self, flag: &str, value: &str) -> Result<(), Error> {
        self.set(flag, ParamValue::Str(value.to_string()))
    }

    /// Copies the values (not the registrations) of every parameter of
    /// `other` that exists here with the same flag and kind. Used when
    /// cloning a configured runner.
    pub fn copy_values_from(&mut self, other: &ParameterBox) {
        for p in &other.params {
            if let Some(value) = &p.value {
                if let Some(mine) = self.find_mut(&p.flag) {
                    if mine.kind == p.kind {
                        mine.value = Some(value.clone());
                    }
                }
            }
        }
    }

    fn parse_value(kind: ParamKind, text: &str) -> Result<ParamValue, String> {
        let text = text.trim();
        match kind {
            ParamKind::Bool => match text.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(ParamValue::Bool(true)),
                "false" | "0" | "no" | "off" => Ok(ParamValue::Bool(false)),
                _ => Err(format!("cannot parse {text:?} as bool")),
            },
            ParamKind::UInt => text
                .parse::<u64>()
                .map(ParamValue::UInt)
                .map_err(|e| format!("cannot parse {text:?} as unsigned integer: {e}")),
            ParamKind::Float => text
                .parse::<f64>()
                .map(ParamValue::Float)
                .map_err(|e| format!("cannot parse {text:?} as float: {e}")),
            ParamKind::Str => Ok(ParamValue::Str(text.to_string())),
        }
    }

    /// Consumes the `prefix::flag` tokens of this box from an argument
    /// slice, returning the tokens that were left untouched.
    ///
    /// Recognized forms: `prefix::flag value`, `prefix::flag=value`, and for
    /// booleans `prefix::flag-enable` / `prefix::flag-disable`. Leading
    /// dashes are ignored. A token carrying this box's prefix but an unknown
    /// flag is a configuration error.
    pub fn parse_args(&mut self, args: &[String]) -> Result<Vec<String>, Error> {
        let ns = format!("{}::", self.prefix);
        let mut rest = Vec::new();
        let mut i = 0;
        while i < args.len() {
            let token = args[i].trim_start_matches('-');
            let Some(key) = token.strip_prefix(&ns) else {
                rest.push(args[i].clone());
                i += 1;
                continue;
            };
            if let Some(flag) = key.strip_suffix("-enable") {
                self.set_switch(flag, true)?;
            } else if let Some(flag) = key.strip_suffix("-disable") {
                self.set_switch(flag, false)?;
            } else if let Some((flag, value)) = key.split_once('=') {
                self.set_parsed(flag, value)?;
            } else {
                let flag = key.to_string();
                i += 1;
                let value = args.get(i).ok_or_else(|| {
                    Error::incorrect(&self.qualified(&flag), "missing value")
                })?;
                self.set_parsed(&flag, value)?;
            }
            i += 1;
        }
        Ok(rest)
    }

    fn set_switch(&mut self, flag: &str, value: bool) -> Result<(), Error> {
        let kind = self.find(flag).map(|p| p.kind);
        match kind {
            Some(ParamKind::Bool) => self.set_bool(flag, value),
            Some(_) => Err(Error::incorrect(
                &self.qualified(flag),
                "-enable/-disable switches apply to bool parameters only",
            )),
            None => Err(Error::Logic(format!(
                "unknown parameter {}",
                self.qualified(flag)
            ))),
        }
    }

    fn set_parsed(&mut self, flag: &str, text: &str) -> Result<(), Error> {
        let kind = self
            .find(flag)
            .map(|p| p.kind)
            .ok_or_else(|| Error::Logic(format!("unknown parameter {}", self.qualified(flag))))?;
        let value = Self::parse_value(kind, text)
            .map_err(|reason| Error::incorrect(&self.qualified(flag), reason))?;
        self.set(flag, value)
    }

    /// Emits `{prefix: {flag: value, …}}` with the currently set parameters.
    pub fn to_json(&self) -> Value {
        let mut flags = Map::new();
        for p in &self.params {
            if let Some(v) = &p.value {
                flags.insert(p.flag.clone(), v.to_json());
            }
        }
        let mut root = Map::new();
        root.insert(self.prefix.clone(), Value::Object(flags));
        Value::Object(root)
    }

    /// Reads values from a `{prefix: {flag: value, …}}` object. Sections for
    /// other prefixes are ignored; unknown flags inside this box's section
    /// are configuration errors.
    pub fn from_json(&mut self, json: &Value) -> Result<(), Error> {
        let Some(section) = json.get(&self.prefix) else {
            return Ok(());
        };
        let Some(map) = section.as_object() else {
            return Err(Error::incorrect(
                &self.prefix,
                "expected an object of flag/value pairs",
            ));
        };
        for (flag, value) in map {
            let kind = self.find(flag).map(|p| p.kind).ok_or_else(|| {
                Error::Logic(format!("unknown parameter {}", self.qualified(flag)))
            })?;
            let parsed = match (kind, value) {
                (ParamKind::Bool, Value::Bool(b)) => ParamValue::Bool(*b),
                (ParamKind::UInt, Value::Number(n)) if n.as_u64().is_some() => {
                    ParamValue::UInt(n.as_u64().unwrap_or_default())
                }
                (ParamKind::Float, Value::Number(n)) if n.as_f64().is_some() => {
                    ParamValue::Float(n.as_f64().unwrap_or_default())
                }
                (ParamKind::Str, Value::String(s)) => ParamValue::Str(s.clone()),
                _ => {
                    return Err(Error::incorrect(
                        &self.qualified(flag),
                        format!("expected a {} value", kind.name()),
                    ))
                }
            };
            self.set(flag, parsed)?;
        }
        Ok(())
    }

    /// Prompts interactively for every parameter still unset.
    pub fn read_from(
        &mut self,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<(), Error> {
        let unset: Vec<String> = self
            .params
            .iter()
            .filter(|p| !p.is_set())
            .map(|p| p.flag.clone())
            .collect();
        for flag in unset {
            let (description, kind) = {
                let p = self.find(&flag).ok_or_else(|| {
                    Error::ParameterNotValid(self.qualified(&flag))
                })?;
                (p.description.clone(), p.kind)
            };
            write!(output, "{} ({}): ", self.qualified(&flag), description)?;
            output.flush()?;
            let mut line = String::new();
            input.read_line(&mut line)?;
            let value = Self::parse_value(kind, &line)
                .map_err(|reason| Error::incorrect(&self.qualified(&flag), reason))?;
            self.set(&flag, value)?;
        }
        Ok(())
    }

    /// Human-readable dump of the box.
    pub fn print(&self, output: &mut dyn Write) -> std::io::Result<()> {
        for p in &self.params {
            match &p.value {
                Some(v) => writeln!(
                    output,
                    "  {} = {} ({})",
                    self.qualified(&p.flag),
                    v,
                    p.description
                )?,
                None => writeln!(
                    output,
                    "  {} = <unset> ({})",
                    self.qualified(&p.flag),
                    p.description
                )?,
            }
        }
        Ok(())
    }
}
