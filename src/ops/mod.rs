//! Operator bodies and their overload tables
//!
//! Every operator node type carries a list of [`Binding`]s: the concrete
//! input types it accepts, the output type it produces and the function
//! that computes it. The compiler scans the list in declaration order and
//! picks the first exact match; the handler is then called once per record.
//!
//! Author: Moroya Sakamoto

pub mod arithmetic;
pub mod logic;
pub mod random;
pub mod vector_math;

use crate::types::{DataType, SocketType, Value};
use std::fmt;

/// Plain operator body
pub type OpFn = fn(&[Value]) -> Value;

/// Operator body parameterised by a comparison tolerance
pub type TolerantFn = fn(&[Value], f32) -> Value;

/// The callable half of a binding
#[derive(Clone, Copy)]
pub enum Handler {
    /// Pure function of its inputs
    Pure(OpFn),
    /// Pure function of its inputs and a tolerance fixed at compile time
    Tolerant(TolerantFn),
}

impl Handler {
    /// Run the operator
    #[inline]
    pub fn call(&self, args: &[Value], tolerance: f32) -> Value {
        match self {
            Handler::Pure(f) => f(args),
            Handler::Tolerant(f) => f(args, tolerance),
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Pure(_) => write!(f, "Handler::Pure"),
            Handler::Tolerant(_) => write!(f, "Handler::Tolerant"),
        }
    }
}

/// One `(input types) -> output type` overload of an operator
#[derive(Debug, Clone, Copy)]
pub struct Binding {
    /// Exact input types, one per socket
    pub inputs: &'static [DataType],
    /// Result type
    pub output: DataType,
    /// Body
    pub handler: Handler,
}

impl Binding {
    /// Overload with a plain body
    pub const fn pure(inputs: &'static [DataType], output: DataType, f: OpFn) -> Self {
        Binding {
            inputs,
            output,
            handler: Handler::Pure(f),
        }
    }

    /// Overload whose body takes a tolerance
    pub const fn tolerant(inputs: &'static [DataType], output: DataType, f: TolerantFn) -> Self {
        Binding {
            inputs,
            output,
            handler: Handler::Tolerant(f),
        }
    }

    /// True if `observed` matches the input list exactly
    #[inline]
    pub fn matches(&self, observed: &[SocketType]) -> bool {
        self.inputs.len() == observed.len()
            && self
                .inputs
                .iter()
                .zip(observed)
                .all(|(want, got)| SocketType::Data(*want) == *got)
    }

    /// Describe this overload for error reporting
    pub fn signature(&self) -> Signature {
        Signature {
            inputs: self.inputs.iter().map(|t| SocketType::Data(*t)).collect(),
            outputs: vec![SocketType::Data(self.output)],
        }
    }
}

/// Printable `(inputs) -> outputs` description of an accepted overload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Accepted input types
    pub inputs: Vec<SocketType>,
    /// Produced output types
    pub outputs: Vec<SocketType>,
}

impl Signature {
    /// Build from socket type lists
    pub fn new(inputs: Vec<SocketType>, outputs: Vec<SocketType>) -> Self {
        Signature { inputs, outputs }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, t) in self.inputs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", t)?;
        }
        write!(f, ") -> ")?;
        for (i, t) in self.outputs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", t)?;
        }
        Ok(())
    }
}

/// Pick the first binding whose inputs match `observed` exactly
pub fn resolve<'a>(bindings: &'a [Binding], observed: &[SocketType]) -> Option<&'a Binding> {
    bindings.iter().find(|b| b.matches(observed))
}

// Shorthands used by the binding tables
pub(crate) const F: DataType = DataType::FLOAT;
pub(crate) const I: DataType = DataType::INT;
pub(crate) const B: DataType = DataType::BOOL;
pub(crate) const V: DataType = DataType::VEC3;
pub(crate) const Q: DataType = DataType::QUAT;
