//! Shared types and enums used across tilevips.
//! Includes evaluation `Phase`, pixel `BandFormat`, load `Access`, the dynamic
//! `Value` used for metadata and operation arguments, and the progress
//! tracking policies.
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::api::Image;

/// Lifecycle point of an evaluation pass.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub enum Phase {
    PreEval,
    Eval,
    PostEval,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::PreEval, Phase::Eval, Phase::PostEval];

    /// Engine signal name for this phase.
    pub fn signal_name(self) -> &'static str {
        match self {
            Phase::PreEval => "preeval",
            Phase::Eval => "eval",
            Phase::PostEval => "posteval",
        }
    }

    pub fn from_signal_name(name: &str) -> Option<Phase> {
        match name {
            "preeval" => Some(Phase::PreEval),
            "eval" => Some(Phase::Eval),
            "posteval" => Some(Phase::PostEval),
            _ => None,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Phase::PreEval => 0,
            Phase::Eval => 1,
            Phase::PostEval => 2,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.signal_name())
    }
}

/// Numeric format of each band element.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandFormat {
    UChar,
    Char,
    UShort,
    Short,
    UInt,
    Int,
    Float,
    Double,
}

impl BandFormat {
    pub const NAMES: [&'static str; 8] = [
        "uchar", "char", "ushort", "short", "uint", "int", "float", "double",
    ];

    pub fn name(self) -> &'static str {
        match self {
            BandFormat::UChar => "uchar",
            BandFormat::Char => "char",
            BandFormat::UShort => "ushort",
            BandFormat::Short => "short",
            BandFormat::UInt => "uint",
            BandFormat::Int => "int",
            BandFormat::Float => "float",
            BandFormat::Double => "double",
        }
    }

    pub fn from_name(name: &str) -> Option<BandFormat> {
        match name {
            "uchar" => Some(BandFormat::UChar),
            "char" => Some(BandFormat::Char),
            "ushort" => Some(BandFormat::UShort),
            "short" => Some(BandFormat::Short),
            "uint" => Some(BandFormat::UInt),
            "int" => Some(BandFormat::Int),
            "float" => Some(BandFormat::Float),
            "double" => Some(BandFormat::Double),
            _ => None,
        }
    }

    pub fn is_int(self) -> bool {
        !matches!(self, BandFormat::Float | BandFormat::Double)
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, BandFormat::UChar | BandFormat::UShort | BandFormat::UInt)
    }

    /// Inclusive value range; float formats are unbounded.
    pub fn range(self) -> (f64, f64) {
        match self {
            BandFormat::UChar => (0.0, u8::MAX as f64),
            BandFormat::Char => (i8::MIN as f64, i8::MAX as f64),
            BandFormat::UShort => (0.0, u16::MAX as f64),
            BandFormat::Short => (i16::MIN as f64, i16::MAX as f64),
            BandFormat::UInt => (0.0, u32::MAX as f64),
            BandFormat::Int => (i32::MIN as f64, i32::MAX as f64),
            BandFormat::Float => (f32::MIN as f64, f32::MAX as f64),
            BandFormat::Double => (f64::MIN, f64::MAX),
        }
    }

    /// Clip and, for integer formats, round a value into this format.
    pub fn clip(self, v: f64) -> f64 {
        let (lo, hi) = self.range();
        let v = if self.is_int() { v.round() } else { v };
        v.clamp(lo, hi)
    }
}

impl std::fmt::Display for BandFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Read pattern requested when loading from a file.
#[derive(
    Copy, Clone, PartialEq, Eq, Debug, Default, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    #[default]
    Random,
    /// Top-to-bottom, single read
    Sequential,
}

impl Access {
    pub fn name(self) -> &'static str {
        match self {
            Access::Random => "random",
            Access::Sequential => "sequential",
        }
    }

    pub fn from_name(name: &str) -> Option<Access> {
        match name {
            "random" => Some(Access::Random),
            "sequential" => Some(Access::Sequential),
            _ => None,
        }
    }
}

/// What `enable_progress` does on an image that is already tracked.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReenablePolicy {
    /// Keep the existing subscription set and succeed
    #[default]
    Idempotent,
    /// Fail with `Error::AlreadyTracked`
    Reject,
}

/// Whether a tracked image reports every evaluation pass or only the first.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    #[default]
    Repeat,
    SingleShot,
}

/// Dynamically typed metadata and operation argument value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    DoubleArray(Vec<f64>),
    Image(Image),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::Str(_) => "str",
            Value::DoubleArray(_) => "double-array",
            Value::Image(_) => "image",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&Image> {
        match self {
            Value::Image(im) => Some(im),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{}", v),
            Value::DoubleArray(v) => write!(f, "{:?}", v),
            Value::Image(im) => write!(f, "<image {}>", im.id()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::DoubleArray(v)
    }
}

impl From<Image> for Value {
    fn from(v: Image) -> Self {
        Value::Image(v)
    }
}

impl From<&Image> for Value {
    fn from(v: &Image) -> Self {
        Value::Image(v.clone())
    }
}
