use std::borrow::Cow;
use std::error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AsmErrorKind {
    /// Malformed line or operand
    Syntax,
    UnknownMnemonic,
    /// The mnemonic exists but is reserved (`CMP`)
    DisabledOpcode,
    DuplicateLabel,
    UnknownLabel,
    /// Immediate outside 0-255, register outside R0-R3 or an address that
    /// does not fit in a byte
    OperandRange,
    /// The instruction would encode to a byte that decodes as something else
    ReservedEncoding,
    ImageTooLarge,
}

impl fmt::Display for AsmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsmErrorKind::Syntax => f.write_str("syntax error"),
            AsmErrorKind::UnknownMnemonic => f.write_str("unknown mnemonic"),
            AsmErrorKind::DisabledOpcode => f.write_str("disabled opcode"),
            AsmErrorKind::DuplicateLabel => f.write_str("duplicate label"),
            AsmErrorKind::UnknownLabel => f.write_str("unknown label"),
            AsmErrorKind::OperandRange => f.write_str("operand out of range"),
            AsmErrorKind::ReservedEncoding => f.write_str("reserved encoding"),
            AsmErrorKind::ImageTooLarge => f.write_str("image too large"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmError {
    kind: AsmErrorKind,
    context: Option<Cow<'static, str>>,
    line_nr: usize,
}

impl AsmError {
    pub(crate) fn new<C, S>(kind: AsmErrorKind, context: C, line_nr: usize) -> Self
    where
        C: Into<Option<S>>,
        S: Into<Cow<'static, str>>,
    {
        Self {
            kind,
            context: context.into().map(|inner| inner.into()),
            line_nr,
        }
    }

    pub fn kind(&self) -> AsmErrorKind {
        self.kind
    }

    /// 1-based source line
    pub fn line_nr(&self) -> usize {
        self.line_nr
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(
                f,
                "error [ln: {}]: {} - {}",
                self.line_nr, self.kind, context
            )
        } else {
            write!(f, "error [ln: {}]: {}", self.line_nr, self.kind)
        }
    }
}

impl error::Error for AsmError {}

/// Every error of one assembly run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmErrors(pub Vec<AsmError>);

impl fmt::Display for AsmErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "assembly failed with {} error(s)", self.0.len())?;
        for err in &self.0 {
            write!(f, "\n  {}", err)?;
        }
        Ok(())
    }
}

impl error::Error for AsmErrors {}

impl From<Vec<AsmError>> for AsmErrors {
    fn from(errors: Vec<AsmError>) -> Self {
        Self(errors)
    }
}

pub type Result<T, E = AsmError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::Result;

    #[test]
    fn test_display_with_context() -> Result<()> {
        let err = AsmError::new(AsmErrorKind::UnknownLabel, "`loop`", 4);
        assert_eq!(err.to_string(), "error [ln: 4]: unknown label - `loop`");

        Ok(())
    }

    #[test]
    fn test_display_without_context() -> Result<()> {
        let err = AsmError::new::<_, &'static str>(AsmErrorKind::DisabledOpcode, None, 1);
        assert_eq!(err.to_string(), "error [ln: 1]: disabled opcode");

        Ok(())
    }

    #[test]
    fn test_display_batch() -> Result<()> {
        let errors = AsmErrors(vec![
            AsmError::new(AsmErrorKind::Syntax, "expected 2 operands", 1),
            AsmError::new(AsmErrorKind::UnknownMnemonic, "`FOO`", 3),
        ]);

        assert_eq!(
            errors.to_string(),
            "assembly failed with 2 error(s)\n  error [ln: 1]: syntax error - expected 2 operands\n  error [ln: 3]: unknown mnemonic - `FOO`"
        );

        Ok(())
    }
}
