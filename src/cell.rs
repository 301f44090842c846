use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

lazy_static! {
    static ref CELL_ID_REGEX: Regex = Regex::new(r"^(\d+),(\d+)$").unwrap();
}

/// Zero-based key of a cell in the sparse map.
///
/// Ordering is row-major, so iterating a `BTreeMap<CellId, _>` visits cells
/// the same way a range projection does. On disk the key is `"<row>,<col>"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellId {
    pub row: u32,
    pub col: u32,
}

impl CellId {
    pub fn new(row: u32, col: u32) -> Self {
        CellId { row, col }
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.row, self.col)
    }
}

impl FromStr for CellId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = CELL_ID_REGEX.captures(s).ok_or(())?;
        let row = caps[1].parse().map_err(|_| ())?;
        let col = caps[2].parse().map_err(|_| ())?;
        Ok(CellId { row, col })
    }
}

impl Serialize for CellId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid cell id {s:?}")))
    }
}

/// One populated cell.
///
/// `value` is what the user typed; `computed` is a display value produced
/// elsewhere (e.g. a formula result). Fields this crate does not know about
/// (styles, notes, ...) ride along in `extra` untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CellRecord {
    pub fn with_value<S: Into<String>>(value: S) -> Self {
        CellRecord {
            value: Some(Value::String(value.into())),
            ..Default::default()
        }
    }

    /// Raw input as text; empty when absent.
    pub fn raw_text(&self) -> String {
        value_text(self.value.as_ref())
    }

    pub fn computed_text(&self) -> String {
        value_text(self.computed.as_ref())
    }

    /// True when the raw value is blank after trimming.
    pub fn is_blank(&self) -> bool {
        self.raw_text().trim().is_empty()
    }

    /// Replaces the raw value. The stale `computed` value is dropped since
    /// nothing here recalculates it.
    pub fn set_value<S: Into<String>>(&mut self, value: S) {
        self.value = Some(Value::String(value.into()));
        self.computed = None;
    }
}

fn value_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
