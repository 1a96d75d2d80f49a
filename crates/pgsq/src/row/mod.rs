//! Two-phase row binder.
//!
//! A row mapper is a closure `Fn(&mut Row) -> T` that calls typed accessors
//! such as [`Row::string`] in a fixed order. It runs twice per statement:
//!
//! 1. **Discovery**, once, before rendering. Each accessor records its field
//!    (for the select list) and reserves a scratch [`Slot`] of the shape the
//!    accessor reads, then returns a zero value.
//! 2. **Extraction**, once per result row. The cursor fills the slots, and
//!    each accessor reads the slot at the current position and advances.
//!
//! The sequence of accessors must be identical in both phases. Any drift
//! (an accessor reading past the discovered fields, reading a slot of a
//! different shape, or a row consuming fewer fields than discovered) is
//! recorded as [`SqError::Binding`] with the caller's location, and ends
//! the iteration.

mod slot;

#[cfg(test)]
mod tests;

pub use slot::Slot;

use crate::cursor::{ArrayElement, ArrayTarget, Cursor, Destination, Discard, ScanKind};
use crate::error::{SqError, SqResult};
use crate::expr::{Fragment, SqlExpr};
use crate::field::{ArrayField, BinaryExpr, JsonExpr, NumberExpr, TextExpr, TimeExpr};
use crate::predicate::Predicate;
use chrono::{DateTime, Utc};
use std::panic::Location;

/// Fields and scratch slots collected by a discovery pass.
#[derive(Debug, Clone, Default)]
pub struct RowShape {
    fields: Vec<Fragment>,
    slots: Vec<Slot>,
}

impl RowShape {
    /// Fields in accessor order, ready for a select list.
    pub fn fields(&self) -> &[Fragment] {
        &self.fields
    }

    /// Scratch slots reserved by the accessors, one per field.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Number of discovered fields.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when the mapper read nothing.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Switch to extraction over `cursor`. The fields are no longer needed.
    pub fn attach<'c>(self, cursor: &'c mut dyn Cursor) -> Row<'c> {
        Row {
            state: State::Extraction {
                cursor,
                slots: self.slots,
                position: 0,
                rescan: None,
            },
            error: None,
            last_location: None,
        }
    }
}

enum State<'c> {
    Discovery {
        fields: Vec<Fragment>,
        slots: Vec<Slot>,
    },
    Extraction {
        cursor: &'c mut dyn Cursor,
        slots: Vec<Slot>,
        position: usize,
        rescan: Option<Vec<Discard>>,
    },
}

/// Accessor target handed to row mappers.
pub struct Row<'c> {
    state: State<'c>,
    error: Option<SqError>,
    last_location: Option<&'static Location<'static>>,
}

impl Row<'static> {
    fn discovery() -> Self {
        Row {
            state: State::Discovery {
                fields: Vec::new(),
                slots: Vec::new(),
            },
            error: None,
            last_location: None,
        }
    }
}

impl<'c> Row<'c> {
    /// True while the mapper runs to discover its fields.
    pub fn is_discovery(&self) -> bool {
        matches!(self.state, State::Discovery { .. })
    }

    /// First binding error recorded for the current row, if any.
    pub fn error(&self) -> Option<&SqError> {
        self.error.as_ref()
    }

    fn fail(&mut self, err: SqError) {
        if self.error.is_none() {
            tracing::warn!(target: "pgsq.row", error = %err, "row binding failed");
            self.error = Some(err);
        }
    }

    /// Discovery: record `expr` and reserve `slot`. Extraction: check the
    /// slot at the current position against `slot`'s shape, advance, and
    /// return the index that was read.
    #[track_caller]
    fn step(&mut self, expr: &dyn SqlExpr, slot: Slot) -> Option<usize> {
        let location = Location::caller();
        self.last_location = Some(location);

        let failure = match &mut self.state {
            State::Discovery { fields, slots } => {
                match Fragment::capture(expr) {
                    Ok(fragment) => {
                        fields.push(fragment);
                        slots.push(slot);
                        None
                    }
                    Err(err) => Some(err),
                }
            }
            State::Extraction {
                slots, position, ..
            } => {
                if self.error.is_some() {
                    return None;
                }
                let idx = *position;
                match slots.get(idx) {
                    None => Some(SqError::binding(
                        location,
                        format!(
                            "accessor #{} reads past the {} discovered fields",
                            idx + 1,
                            slots.len()
                        ),
                    )),
                    Some(found) if found.shape() != slot.shape() => Some(SqError::binding(
                        location,
                        format!(
                            "accessor #{} reads {} but discovery reserved {}",
                            idx + 1,
                            slot.shape().name(),
                            found.shape().name()
                        ),
                    )),
                    Some(_) => {
                        *position += 1;
                        return Some(idx);
                    }
                }
            }
        };

        if let Some(err) = failure {
            self.fail(err);
        }
        None
    }

    /// Read and empty the slot an accessor just stepped over.
    #[track_caller]
    fn take(&mut self, expr: &dyn SqlExpr, slot: Slot) -> Slot {
        let shape = slot.shape();
        let Some(idx) = self.step(expr, slot) else {
            return Slot::for_kind(shape);
        };
        match &mut self.state {
            State::Extraction { slots, .. } => slots[idx].take(),
            State::Discovery { .. } => Slot::for_kind(shape),
        }
    }

    /// Rescan the current row with `dest` at `idx` and discards elsewhere.
    fn rescan(
        &mut self,
        idx: usize,
        dest: &mut dyn Destination,
        location: &'static Location<'static>,
    ) {
        let State::Extraction {
            cursor,
            slots,
            rescan,
            ..
        } = &mut self.state
        else {
            return;
        };

        let width = slots.len();
        let discards = rescan.get_or_insert_with(Vec::new);
        if discards.len() != width {
            *discards = vec![Discard; width];
        }
        let (before, after) = discards.split_at_mut(idx);
        let mut targets: Vec<&mut dyn Destination> = Vec::with_capacity(width);
        targets.extend(before.iter_mut().map(|d| d as &mut dyn Destination));
        targets.push(dest);
        targets.extend(after.iter_mut().skip(1).map(|d| d as &mut dyn Destination));

        if let Err(err) = cursor.scan(&mut targets) {
            self.fail(SqError::scan(location, err.to_string()));
        }
    }

    /// Reset for the next row after a successful advance and scan.
    fn next_row(&mut self, location: &'static Location<'static>) -> SqResult<bool> {
        let State::Extraction {
            cursor,
            slots,
            position,
            ..
        } = &mut self.state
        else {
            return Err(SqError::Other("row is still in discovery".to_string()));
        };

        *position = 0;
        if !cursor.advance()? {
            return Ok(false);
        }
        let mut targets: Vec<&mut dyn Destination> = slots
            .iter_mut()
            .map(|s| s as &mut dyn Destination)
            .collect();
        cursor
            .scan(&mut targets)
            .map_err(|err| SqError::scan(location, err.to_string()))?;
        Ok(true)
    }

    /// Check that the mapper consumed every discovered field.
    ///
    /// The error points at the last accessor, or at `fallback` when the
    /// mapper read nothing.
    fn finish_row(&mut self, fallback: &'static Location<'static>) -> SqResult<()> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        if let State::Extraction {
            slots, position, ..
        } = &self.state
        {
            if *position != slots.len() {
                let location = self.last_location.unwrap_or(fallback);
                return Err(SqError::binding(
                    location,
                    format!(
                        "row mapper read {} fields but {} were discovered",
                        position,
                        slots.len()
                    ),
                ));
            }
        }
        Ok(())
    }

    // ==================== custom ====================

    /// Read the column into a caller-owned destination.
    #[track_caller]
    pub fn scan_into(&mut self, dest: &mut dyn Destination, expr: &impl SqlExpr) {
        let location = Location::caller();
        if let Some(idx) = self.step(expr, Slot::Any) {
            self.rescan(idx, dest, location);
        }
    }

    /// Read a one-dimensional array column into `out`.
    ///
    /// A NULL array leaves `out` empty.
    #[track_caller]
    pub fn scan_array<T: ArrayElement>(&mut self, out: &mut Vec<T>, field: &ArrayField) {
        let location = Location::caller();
        if let Some(idx) = self.step(field, Slot::for_kind(ScanKind::Array(T::ELEM))) {
            self.rescan(idx, &mut ArrayTarget::new(out), location);
        }
    }

    // ==================== bool ====================

    #[track_caller]
    pub fn null_bool(&mut self, predicate: &impl Predicate) -> Option<bool> {
        match self.take(predicate, Slot::Bool(None)) {
            Slot::Bool(v) => v,
            _ => None,
        }
    }

    #[track_caller]
    pub fn bool(&mut self, predicate: &impl Predicate) -> bool {
        self.null_bool(predicate).unwrap_or_default()
    }

    #[track_caller]
    pub fn bool_valid(&mut self, predicate: &impl Predicate) -> bool {
        self.null_bool(predicate).is_some()
    }

    // ==================== float64 ====================

    #[track_caller]
    pub fn null_float64(&mut self, field: &impl NumberExpr) -> Option<f64> {
        match self.take(field, Slot::Float64(None)) {
            Slot::Float64(v) => v,
            _ => None,
        }
    }

    #[track_caller]
    pub fn float64(&mut self, field: &impl NumberExpr) -> f64 {
        self.null_float64(field).unwrap_or_default()
    }

    #[track_caller]
    pub fn float64_valid(&mut self, field: &impl NumberExpr) -> bool {
        self.null_float64(field).is_some()
    }

    // ==================== int ====================

    /// Integer read, backed by an int64 slot.
    #[track_caller]
    pub fn int(&mut self, field: &impl NumberExpr) -> i64 {
        self.null_int64(field).unwrap_or_default()
    }

    #[track_caller]
    pub fn int_valid(&mut self, field: &impl NumberExpr) -> bool {
        self.null_int64(field).is_some()
    }

    #[track_caller]
    pub fn null_int32(&mut self, field: &impl NumberExpr) -> Option<i32> {
        match self.take(field, Slot::Int32(None)) {
            Slot::Int32(v) => v,
            _ => None,
        }
    }

    #[track_caller]
    pub fn int32(&mut self, field: &impl NumberExpr) -> i32 {
        self.null_int32(field).unwrap_or_default()
    }

    #[track_caller]
    pub fn int32_valid(&mut self, field: &impl NumberExpr) -> bool {
        self.null_int32(field).is_some()
    }

    #[track_caller]
    pub fn null_int64(&mut self, field: &impl NumberExpr) -> Option<i64> {
        match self.take(field, Slot::Int64(None)) {
            Slot::Int64(v) => v,
            _ => None,
        }
    }

    #[track_caller]
    pub fn int64(&mut self, field: &impl NumberExpr) -> i64 {
        self.null_int64(field).unwrap_or_default()
    }

    #[track_caller]
    pub fn int64_valid(&mut self, field: &impl NumberExpr) -> bool {
        self.null_int64(field).is_some()
    }

    // ==================== string ====================

    #[track_caller]
    pub fn null_string(&mut self, field: &impl TextExpr) -> Option<String> {
        match self.take(field, Slot::Text(None)) {
            Slot::Text(v) => v,
            _ => None,
        }
    }

    #[track_caller]
    pub fn string(&mut self, field: &impl TextExpr) -> String {
        self.null_string(field).unwrap_or_default()
    }

    #[track_caller]
    pub fn string_valid(&mut self, field: &impl TextExpr) -> bool {
        self.null_string(field).is_some()
    }

    // ==================== time ====================

    #[track_caller]
    pub fn null_time(&mut self, field: &impl TimeExpr) -> Option<DateTime<Utc>> {
        match self.take(field, Slot::Time(None)) {
            Slot::Time(v) => v,
            _ => None,
        }
    }

    #[track_caller]
    pub fn time(&mut self, field: &impl TimeExpr) -> DateTime<Utc> {
        self.null_time(field).unwrap_or_default()
    }

    #[track_caller]
    pub fn time_valid(&mut self, field: &impl TimeExpr) -> bool {
        self.null_time(field).is_some()
    }

    // ==================== bytes / json ====================

    #[track_caller]
    pub fn null_bytes(&mut self, field: &impl BinaryExpr) -> Option<Vec<u8>> {
        match self.take(field, Slot::Bytes(None)) {
            Slot::Bytes(v) => v,
            _ => None,
        }
    }

    #[track_caller]
    pub fn bytes(&mut self, field: &impl BinaryExpr) -> Vec<u8> {
        self.null_bytes(field).unwrap_or_default()
    }

    #[track_caller]
    pub fn null_json(&mut self, field: &impl JsonExpr) -> Option<serde_json::Value> {
        match self.take(field, Slot::Json(None)) {
            Slot::Json(v) => v,
            _ => None,
        }
    }

    #[track_caller]
    pub fn json(&mut self, field: &impl JsonExpr) -> serde_json::Value {
        self.null_json(field).unwrap_or_default()
    }
}

/// Run `mapper` once in discovery mode.
pub fn discover<T>(mapper: impl Fn(&mut Row<'_>) -> T) -> SqResult<RowShape> {
    let mut row = Row::discovery();
    let _ = mapper(&mut row);
    if let Some(err) = row.error.take() {
        return Err(err);
    }
    let State::Discovery { fields, slots } = row.state else {
        return Err(SqError::Other("row left discovery mode".to_string()));
    };
    tracing::trace!(target: "pgsq.row", fields = fields.len(), "row shape discovered");
    Ok(RowShape { fields, slots })
}

/// Map every row of `cursor` with `mapper`.
///
/// Stops at the first binding or scan failure. Slots and rescan buffers live
/// only for this iteration.
#[track_caller]
pub fn bind_rows<T>(
    cursor: &mut dyn Cursor,
    shape: RowShape,
    mapper: impl Fn(&mut Row<'_>) -> T,
) -> SqResult<Vec<T>> {
    bind_rows_at(cursor, shape, mapper, Location::caller())
}

/// [`bind_rows`] with scan failures reported at `location`.
pub(crate) fn bind_rows_at<T>(
    cursor: &mut dyn Cursor,
    shape: RowShape,
    mapper: impl Fn(&mut Row<'_>) -> T,
    location: &'static Location<'static>,
) -> SqResult<Vec<T>> {
    let mut row = shape.attach(cursor);
    let mut out = Vec::new();

    while row.next_row(location)? {
        let value = mapper(&mut row);
        row.finish_row(location)?;
        out.push(value);
    }

    tracing::debug!(target: "pgsq.row", rows = out.len(), "rows bound");
    Ok(out)
}
