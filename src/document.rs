//! Sheet documents and their sparse cell state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::cell::{CellId, CellRecord};
use crate::range::CellBounds;
use crate::users::UserId;

pub type DocumentId = u64;

/// Sparse cell map. An absent key is an empty cell.
///
/// Entries that are not `"<row>,<col>"` keyed cell objects are kept aside in
/// `foreign` and written back unchanged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CellMap {
    cells: BTreeMap<CellId, CellRecord>,
    foreign: Map<String, Value>,
}

impl CellMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, row: u32, col: u32) -> Option<&CellRecord> {
        self.cells.get(&CellId::new(row, col))
    }

    pub fn insert(&mut self, id: CellId, record: CellRecord) -> Option<CellRecord> {
        self.foreign.remove(&id.to_string());
        self.cells.insert(id, record)
    }

    /// Existing record at `id`, or a fresh one inserted there.
    pub fn upsert(&mut self, id: CellId) -> &mut CellRecord {
        self.foreign.remove(&id.to_string());
        self.cells.entry(id).or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CellId, &CellRecord)> {
        self.cells.iter()
    }

    /// Cells inside `bounds`, row-major.
    pub fn within(&self, bounds: CellBounds) -> impl Iterator<Item = (&CellId, &CellRecord)> {
        let start = CellId::new(bounds.min_row, bounds.min_col);
        let end = CellId::new(bounds.max_row, bounds.max_col);
        self.cells
            .range(start..=end)
            .filter(move |(id, _)| bounds.contains(id.row, id.col))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn foreign_entries(&self) -> &Map<String, Value> {
        &self.foreign
    }
}

impl FromIterator<(CellId, CellRecord)> for CellMap {
    fn from_iter<I: IntoIterator<Item = (CellId, CellRecord)>>(iter: I) -> Self {
        CellMap {
            cells: iter.into_iter().collect(),
            foreign: Map::new(),
        }
    }
}

impl Serialize for CellMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.cells.len() + self.foreign.len()))?;
        for (key, value) in &self.foreign {
            map.serialize_entry(key, value)?;
        }
        for (id, record) in &self.cells {
            map.serialize_entry(&id.to_string(), record)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CellMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = match Value::deserialize(deserializer)? {
            Value::Object(entries) => entries,
            Value::Null => return Ok(CellMap::default()),
            other => {
                return Err(serde::de::Error::custom(format!(
                    "cell data must be an object, got {other}"
                )));
            }
        };

        let mut map = CellMap::default();
        for (key, value) in entries {
            let id = key
                .parse::<CellId>()
                .ok()
                .filter(|id| id.to_string() == key);
            match (id, value) {
                (Some(id), Value::Object(fields)) => {
                    match serde_json::from_value::<CellRecord>(Value::Object(fields.clone())) {
                        Ok(record) => {
                            map.cells.insert(id, record);
                        }
                        Err(_) => {
                            map.foreign.insert(key, Value::Object(fields));
                        }
                    }
                }
                (_, value) => {
                    map.foreign.insert(key, value);
                }
            }
        }
        Ok(map)
    }
}

/// The structured blob stored with a document.
///
/// Only `data` and `rowCount` mean anything to this crate; every other
/// top-level field is carried through saves and patches as-is.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredSheetState")]
pub struct SheetState {
    pub data: CellMap,

    /// Advisory count of populated rows, used for layout only.
    #[serde(rename = "rowCount", skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `SheetState` as found on disk or sent by clients. `row_count` is accepted
/// for `rowCount`; a non-numeric row count is kept as an unknown field.
#[derive(Deserialize)]
struct StoredSheetState {
    #[serde(default)]
    data: CellMap,
    #[serde(rename = "rowCount", alias = "row_count", default)]
    row_count: Option<Value>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<StoredSheetState> for SheetState {
    fn from(stored: StoredSheetState) -> Self {
        let mut extra = stored.extra;
        let row_count = match stored.row_count {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => Some(
                n.as_u64()
                    .or_else(|| n.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64))
                    .unwrap_or(0),
            ),
            Some(other) => {
                extra.insert(ROW_COUNT_KEY.to_string(), other);
                None
            }
        };
        SheetState {
            data: stored.data,
            row_count,
            extra,
        }
    }
}

const ROW_COUNT_KEY: &str = "rowCount";

impl SheetState {
    /// Sets the row count, replacing a non-numeric one kept from decoding.
    pub fn set_row_count(&mut self, rows: u64) {
        self.extra.remove(ROW_COUNT_KEY);
        self.row_count = Some(rows);
    }

    pub fn from_json(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    pub fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// A persisted sheet file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub owner_id: UserId,
    pub name: String,
    pub state: SheetState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn meta(&self) -> DocumentMeta {
        DocumentMeta {
            id: self.id,
            name: self.name.clone(),
            updated_at: self.updated_at,
            owner_id: self.owner_id,
        }
    }
}

/// Listing view of a document, without its state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub id: DocumentId,
    pub name: String,
    pub updated_at: DateTime<Utc>,
    pub owner_id: UserId,
}

/// Smallest rectangle covering every cell whose raw value is non-blank.
/// `None` when the sheet has no such cell.
pub fn used_range(state: &SheetState) -> Option<CellBounds> {
    let mut bounds: Option<CellBounds> = None;
    for (id, record) in state.data.iter() {
        if record.is_blank() {
            continue;
        }
        bounds = Some(match bounds {
            None => CellBounds::single(id.row, id.col),
            Some(b) => CellBounds {
                min_row: b.min_row.min(id.row),
                max_row: b.max_row.max(id.row),
                min_col: b.min_col.min(id.col),
                max_col: b.max_col.max(id.col),
            },
        });
    }
    bounds
}

/// Output shape of a range read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Projection {
    /// Dense row-major rows, blanks as `""`.
    Grid,
    /// Only non-blank cells, as `{row, col, value}`.
    Sparse,
}

impl Projection {
    /// `"sparse"` selects the sparse list; anything else, including nothing, is a grid.
    pub fn parse(s: Option<&str>) -> Self {
        match s.map(|s| s.trim().to_ascii_lowercase()) {
            Some(s) if s == "sparse" => Projection::Sparse,
            _ => Projection::Grid,
        }
    }
}

/// Which value of a cell a read reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueMode {
    Raw,
    /// `computed` when non-blank, `value` otherwise.
    Computed,
}

impl ValueMode {
    pub fn parse(s: Option<&str>) -> Self {
        match s.map(|s| s.trim().to_ascii_lowercase()) {
            Some(s) if s == "computed" => ValueMode::Computed,
            _ => ValueMode::Raw,
        }
    }

    pub fn pick(self, record: &CellRecord) -> String {
        if self == ValueMode::Computed {
            let computed = record.computed_text();
            if !computed.trim().is_empty() {
                return computed;
            }
        }
        record.raw_text()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseCell {
    pub row: u32,
    pub col: u32,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RangeValues {
    Grid(Vec<Vec<String>>),
    Sparse(Vec<SparseCell>),
}

/// Projects the cells inside `bounds`.
///
/// Callers bound the rectangle first (see `range::resolve_read_range`); the
/// grid projection allocates every cell in it.
pub fn read_range(
    state: &SheetState,
    bounds: CellBounds,
    projection: Projection,
    mode: ValueMode,
) -> RangeValues {
    match projection {
        Projection::Grid => {
            let cols = bounds.col_count() as usize;
            let mut values: Vec<Vec<String>> = (bounds.min_row..=bounds.max_row)
                .map(|_| vec![String::new(); cols])
                .collect();
            for (id, record) in state.data.within(bounds) {
                let r = (id.row - bounds.min_row) as usize;
                let c = (id.col - bounds.min_col) as usize;
                values[r][c] = mode.pick(record);
            }
            RangeValues::Grid(values)
        }
        Projection::Sparse => RangeValues::Sparse(
            state
                .data
                .within(bounds)
                .filter_map(|(id, record)| {
                    let value = mode.pick(record).trim().to_string();
                    (!value.is_empty()).then(|| SparseCell {
                        row: id.row,
                        col: id.col,
                        value,
                    })
                })
                .collect(),
        ),
    }
}
