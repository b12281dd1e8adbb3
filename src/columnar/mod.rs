//! Columnar accumulator
//! --------------------
//! The reducer driven by the engine's custom-aggregate hook, once per row of the
//! header-injected query. The first row it sees carries column names; every later
//! row carries data. State moves `AwaitingHeader -> Accumulating -> Finalized` and
//! never backwards.

pub mod rewrite;
pub mod sentinel;

use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::marshal::{MarshalOptions, MarshalValue, Marshaller};
pub use sentinel::NullSentinel;

/// One invocation of `step`, tagged by its role in the two-phase protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum RowInvocation {
    Header(Vec<String>),
    Data(Vec<MarshalValue>),
}

#[derive(Debug, Default)]
pub enum AccumulatorState {
    #[default]
    AwaitingHeader,
    Accumulating { names: Vec<String>, columns: Vec<Vec<MarshalValue>> },
    Finalized,
}

/// Column names and their values, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnarResult {
    pub names: Vec<String>,
    pub columns: Vec<Vec<MarshalValue>>,
}

impl ColumnarResult {
    pub fn row_count(&self) -> usize { self.columns.first().map(|c| c.len()).unwrap_or(0) }

    pub fn marshal(&self, opts: MarshalOptions) -> AppResult<Vec<u8>> {
        let cap = 16 + self.names.iter().map(|n| n.len() + 10).sum::<usize>() + self.row_count() * self.names.len() * 9;
        let mut m = Marshaller::with_capacity(opts, cap);
        m.marshal_columns(&self.names, &self.columns)?;
        Ok(m.into_bytes())
    }

    pub fn into_value(self) -> MarshalValue {
        MarshalValue::Dict(self.names.into_iter().zip(self.columns).map(|(n, c)| (n, MarshalValue::List(c))).collect())
    }
}

#[derive(Debug)]
pub struct ColumnarAccumulator {
    state: AccumulatorState,
    sentinel: NullSentinel,
    rows: usize,
}

impl ColumnarAccumulator {
    pub fn initialize(sentinel: NullSentinel) -> Self {
        Self { state: AccumulatorState::AwaitingHeader, sentinel, rows: 0 }
    }

    pub fn state(&self) -> &AccumulatorState { &self.state }

    pub fn row_count(&self) -> usize { self.rows }

    /// Decide what a raw row means given the current state.
    pub fn classify(&self, row: Vec<MarshalValue>) -> AppResult<RowInvocation> {
        match &self.state {
            AccumulatorState::AwaitingHeader => {
                let mut names = Vec::with_capacity(row.len());
                for (i, cell) in row.into_iter().enumerate() {
                    match cell {
                        MarshalValue::Text(s) => names.push(s),
                        other => {
                            return Err(AppError::integrity(
                                "bad_header_cell",
                                format!("header cell {i} is {} rather than a column name", other.type_name()),
                            ))
                        }
                    }
                }
                Ok(RowInvocation::Header(names))
            }
            AccumulatorState::Accumulating { .. } => Ok(RowInvocation::Data(row)),
            AccumulatorState::Finalized => Err(finalized_error("step")),
        }
    }

    pub fn step(&mut self, row: Vec<MarshalValue>) -> AppResult<()> {
        let invocation = self.classify(row)?;
        self.apply(invocation)
    }

    pub fn apply(&mut self, invocation: RowInvocation) -> AppResult<()> {
        match invocation {
            RowInvocation::Header(names) => match self.state {
                AccumulatorState::AwaitingHeader => {
                    debug!(target: "sqlmarshal::columnar", "header: {} columns", names.len());
                    let columns = names.iter().map(|_| Vec::new()).collect();
                    self.state = AccumulatorState::Accumulating { names, columns };
                    Ok(())
                }
                AccumulatorState::Accumulating { .. } => Err(AppError::integrity("duplicate_header", "header row delivered twice")),
                AccumulatorState::Finalized => Err(finalized_error("step")),
            },
            RowInvocation::Data(row) => match &mut self.state {
                AccumulatorState::Accumulating { names, columns } => {
                    // Width is checked before any push so a bad row leaves no partial trace.
                    if row.len() != names.len() {
                        return Err(AppError::integrity(
                            "row_width_mismatch",
                            format!("header has {} columns but row {} has {} values", names.len(), self.rows, row.len()),
                        ));
                    }
                    for (column, cell) in columns.iter_mut().zip(row) {
                        column.push(self.sentinel.resolve(cell));
                    }
                    self.rows += 1;
                    Ok(())
                }
                AccumulatorState::AwaitingHeader => Err(AppError::integrity("missing_header", "data row delivered before the header row")),
                AccumulatorState::Finalized => Err(finalized_error("step")),
            },
        }
    }

    /// Terminal transition: hand out the columns and leave the state `Finalized`.
    pub fn finalize(&mut self) -> AppResult<ColumnarResult> {
        match std::mem::replace(&mut self.state, AccumulatorState::Finalized) {
            AccumulatorState::Accumulating { names, columns } => {
                debug!(target: "sqlmarshal::columnar", "finalize: {} columns x {} rows", names.len(), self.rows);
                Ok(ColumnarResult { names, columns })
            }
            AccumulatorState::AwaitingHeader => Err(AppError::integrity("missing_header", "finalize called before any header row")),
            AccumulatorState::Finalized => Err(finalized_error("finalize")),
        }
    }

    pub fn finalize_marshal(&mut self, opts: MarshalOptions) -> AppResult<Vec<u8>> {
        self.finalize()?.marshal(opts)
    }
}

fn finalized_error(op: &str) -> AppError {
    AppError::integrity("already_finalized", format!("{op} called after finalize"))
}

#[cfg(test)]
#[path = "columnar_tests.rs"]
mod columnar_tests;
