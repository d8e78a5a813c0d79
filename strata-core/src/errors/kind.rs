/// The cross-layer error categories. The same kind may be raised by several
/// layers; callers can match on the layer enum, the kind, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A resource that was required to exist does not.
    NotFound,
    /// A resource that was required to be absent is live.
    AlreadyExists,
    /// Pagination or n-th selection out of bounds.
    Range,
    /// A document failed schema validation.
    Validation,
    /// An argument had the wrong type.
    ArgumentType,
    /// An argument name is not recognized.
    ArgumentName,
    /// An argument value is malformed.
    ArgumentValue,
    /// Configuration or usage-contract violation.
    Config,
    /// An unexpected backend failure, wrapped with context.
    Uncaught,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::Range => "range",
            ErrorKind::Validation => "validation",
            ErrorKind::ArgumentType => "argument_type",
            ErrorKind::ArgumentName => "argument_name",
            ErrorKind::ArgumentValue => "argument_value",
            ErrorKind::Config => "config",
            ErrorKind::Uncaught => "uncaught",
        };
        f.write_str(s)
    }
}
