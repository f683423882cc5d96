use crate::node::NodeId;

/// Enumeration representing the various errors that can occur within revad.
#[derive(Debug)]
pub enum RevadError {
    /// Operand shapes are incompatible with the requested operation,
    /// or a value does not have the shape of its node
    ShapeMismatch(Box<str>),
    /// Leaf was requested without a value and without a shape
    UnspecifiedNode,
    /// There is no rule for this combination of operands
    UnsupportedOperation(Box<str>),
    /// Node id does not belong to this context
    UnknownNode(NodeId),
    /// Node was read before it was evaluated
    MissingValue(NodeId),
    /// Error from file operations
    IOError(std::io::Error),
    /// Error parsing some data
    ParseError(Box<str>),
}

fn with_location(e: Box<str>, location: &std::panic::Location<'_>) -> Box<str> {
    use std::fmt::Write;
    let mut e: String = e.into();
    // Writing into String can not fail
    let _ = write!(e, ", {}:{}:{}", location.file(), location.line(), location.column());
    e.into()
}

impl RevadError {
    /// Shape mismatch
    #[track_caller]
    pub fn shape_mismatch(e: impl Into<Box<str>>) -> Self {
        Self::ShapeMismatch(with_location(e.into(), std::panic::Location::caller()))
    }

    /// Unsupported operation
    #[track_caller]
    pub fn unsupported(e: impl Into<Box<str>>) -> Self {
        Self::UnsupportedOperation(with_location(e.into(), std::panic::Location::caller()))
    }

    /// Parse error
    #[track_caller]
    pub fn parse_error(e: impl Into<Box<str>>) -> Self {
        Self::ParseError(with_location(e.into(), std::panic::Location::caller()))
    }
}

impl std::fmt::Display for RevadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RevadError::ShapeMismatch(e) => f.write_fmt(format_args!("Shape mismatch: {e}")),
            RevadError::UnspecifiedNode => {
                f.write_str("Leaf node needs either a value or a shape, but neither was given")
            }
            RevadError::UnsupportedOperation(e) => {
                f.write_fmt(format_args!("Unsupported operation: {e}"))
            }
            RevadError::UnknownNode(id) => {
                f.write_fmt(format_args!("Node {id} does not exist in this context"))
            }
            RevadError::MissingValue(id) => {
                f.write_fmt(format_args!("Node {id} has no value, it was not evaluated yet"))
            }
            RevadError::IOError(e) => f.write_fmt(format_args!("IO {e}")),
            RevadError::ParseError(e) => f.write_fmt(format_args!("Parse {e}")),
        }
    }
}

impl std::error::Error for RevadError {}

impl From<std::io::Error> for RevadError {
    #[track_caller]
    fn from(value: std::io::Error) -> Self {
        Self::IOError(value)
    }
}
