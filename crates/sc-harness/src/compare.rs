//! Structural closeness check between a reference output and a candidate.

use std::fmt;

use sc_tensor::{DType, Tensor};

use crate::tolerance::{Tolerance, ToleranceTable};

/// A non-tensor leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// The result of running a computation: a tensor, a scalar, or a nested list.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Tensor(Tensor),
    Scalar(Scalar),
    List(Vec<Output>),
}

impl Output {
    /// One tensor stays a leaf; any other count becomes a list.
    pub fn from_tensors(mut tensors: Vec<Tensor>) -> Output {
        if tensors.len() == 1 {
            if let Some(t) = tensors.pop() {
                return Output::Tensor(t);
            }
        }
        Output::List(tensors.into_iter().map(Output::Tensor).collect())
    }

    fn kind(&self) -> &'static str {
        match self {
            Output::Tensor(_) => "tensor",
            Output::Scalar(_) => "scalar",
            Output::List(_) => "list",
        }
    }

    fn summary(&self) -> String {
        match self {
            Output::Tensor(t) => format!("{}{}", t.dtype(), t.shape()),
            Output::Scalar(s) => s.to_string(),
            Output::List(items) => format!("list of {}", items.len()),
        }
    }
}

impl From<Tensor> for Output {
    fn from(t: Tensor) -> Self {
        Output::Tensor(t)
    }
}

impl From<Scalar> for Output {
    fn from(s: Scalar) -> Self {
        Output::Scalar(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MismatchKind {
    /// Different kinds of value at the same position (tensor vs list, ...).
    Structure,
    Length,
    DType,
    Shape,
    /// Values differ; `tolerance` is set for float leaves.
    Value { tolerance: Option<Tolerance> },
}

/// The first difference found between two outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    /// List positions from the root down to the differing leaf.
    pub path: Vec<usize>,
    /// Multi-dimensional element index within a tensor leaf.
    pub index: Option<Vec<usize>>,
    pub dtype: Option<DType>,
    pub expected: String,
    pub actual: String,
    pub kind: MismatchKind,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "output")?;
        for p in &self.path {
            write!(f, "[{p}]")?;
        }
        if let Some(index) = &self.index {
            write!(f, " at {index:?}")?;
        }
        match &self.kind {
            MismatchKind::Structure => write!(f, ": kind differs")?,
            MismatchKind::Length => write!(f, ": length differs")?,
            MismatchKind::DType => write!(f, ": dtype differs")?,
            MismatchKind::Shape => write!(f, ": shape differs")?,
            MismatchKind::Value { .. } => write!(f, ": value differs")?,
        }
        if let Some(dtype) = self.dtype {
            write!(f, " ({dtype})")?;
        }
        write!(f, ": expected {}, got {}", self.expected, self.actual)?;
        if let MismatchKind::Value { tolerance: Some(t) } = &self.kind {
            write!(f, " with {t}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonOutcome {
    pub equal: bool,
    pub first_mismatch: Option<Mismatch>,
}

impl ComparisonOutcome {
    fn equal() -> Self {
        ComparisonOutcome {
            equal: true,
            first_mismatch: None,
        }
    }

    fn mismatch(m: Mismatch) -> Self {
        ComparisonOutcome {
            equal: false,
            first_mismatch: Some(m),
        }
    }
}

/// Compares outputs leaf by leaf with dtype-sensitive tolerance.
#[derive(Debug, Clone, Copy)]
pub struct OutputComparator<'a> {
    tolerances: &'a ToleranceTable,
}

impl<'a> OutputComparator<'a> {
    pub fn new(tolerances: &'a ToleranceTable) -> Self {
        OutputComparator { tolerances }
    }

    pub fn compare(&self, expected: &Output, actual: &Output) -> ComparisonOutcome {
        let mut path = Vec::new();
        match self.compare_at(&mut path, expected, actual) {
            None => ComparisonOutcome::equal(),
            Some(m) => ComparisonOutcome::mismatch(m),
        }
    }

    fn compare_at(
        &self,
        path: &mut Vec<usize>,
        expected: &Output,
        actual: &Output,
    ) -> Option<Mismatch> {
        match (expected, actual) {
            (Output::List(e), Output::List(a)) => {
                if e.len() != a.len() {
                    return Some(leaf(path, None, e.len(), a.len(), MismatchKind::Length));
                }
                for (i, (e, a)) in e.iter().zip(a).enumerate() {
                    path.push(i);
                    let found = self.compare_at(path, e, a);
                    path.pop();
                    if found.is_some() {
                        return found;
                    }
                }
                None
            }
            (Output::Tensor(e), Output::Tensor(a)) => self.compare_tensors(path, e, a),
            (Output::Scalar(e), Output::Scalar(a)) => compare_scalars(path, e, a),
            _ => Some(leaf(
                path,
                None,
                format!("{} ({})", expected.kind(), expected.summary()),
                format!("{} ({})", actual.kind(), actual.summary()),
                MismatchKind::Structure,
            )),
        }
    }

    fn compare_tensors(
        &self,
        path: &[usize],
        expected: &Tensor,
        actual: &Tensor,
    ) -> Option<Mismatch> {
        if expected.dtype() != actual.dtype() {
            return Some(leaf(path, None, expected.dtype(), actual.dtype(), MismatchKind::DType));
        }
        let dtype = expected.dtype();
        if expected.shape() != actual.shape() {
            return Some(leaf(
                path,
                Some(dtype),
                expected.shape(),
                actual.shape(),
                MismatchKind::Shape,
            ));
        }

        let (e, a) = (expected.storage(), actual.storage());
        let (offset, tolerance) = if dtype.is_float() {
            let tol = self.tolerances.lookup(dtype);
            let (ev, av) = (e.to_f64_vec()?, a.to_f64_vec()?);
            let offset = ev.iter().zip(&av).position(|(x, y)| !tol.is_close(*x, *y))?;
            (offset, Some(tol))
        } else {
            let (ev, av) = (e.to_i64_vec()?, a.to_i64_vec()?);
            (ev.iter().zip(&av).position(|(x, y)| x != y)?, None)
        };

        Some(Mismatch {
            path: path.to_vec(),
            index: expected.shape().unravel(offset),
            dtype: Some(dtype),
            expected: e.element_to_string(offset).unwrap_or_default(),
            actual: a.element_to_string(offset).unwrap_or_default(),
            kind: MismatchKind::Value { tolerance },
        })
    }
}

fn compare_scalars(path: &[usize], expected: &Scalar, actual: &Scalar) -> Option<Mismatch> {
    let same = match (expected, actual) {
        (Scalar::Float(e), Scalar::Float(a)) => e == a || (e.is_nan() && a.is_nan()),
        (e, a) => e == a,
    };
    if same {
        None
    } else {
        Some(leaf(
            path,
            None,
            expected,
            actual,
            MismatchKind::Value { tolerance: None },
        ))
    }
}

fn leaf(
    path: &[usize],
    dtype: Option<DType>,
    expected: impl ToString,
    actual: impl ToString,
    kind: MismatchKind,
) -> Mismatch {
    Mismatch {
        path: path.to_vec(),
        index: None,
        dtype,
        expected: expected.to_string(),
        actual: actual.to_string(),
        kind,
    }
}
