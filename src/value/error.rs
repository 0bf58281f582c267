#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorCode {
    ParseExpected,
    ParseUnexpected,
    ParseGeneric,
    AccessViolation,
    UndefinedMember,
    UndefinedSymbol,
    TypeError,
    ArithmeticError,
    FixtureFormat,
}

impl std::fmt::Display for RuntimeErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RuntimeErrorCode::ParseExpected => "PARSE_EXPECTED",
            RuntimeErrorCode::ParseUnexpected => "PARSE_UNEXPECTED",
            RuntimeErrorCode::ParseGeneric => "PARSE_GENERIC",
            RuntimeErrorCode::AccessViolation => "ACCESS_VIOLATION",
            RuntimeErrorCode::UndefinedMember => "UNDEFINED_MEMBER",
            RuntimeErrorCode::UndefinedSymbol => "UNDEFINED_SYMBOL",
            RuntimeErrorCode::TypeError => "TYPE_ERROR",
            RuntimeErrorCode::ArithmeticError => "ARITHMETIC_ERROR",
            RuntimeErrorCode::FixtureFormat => "FIXTURE_FORMAT",
        };
        write!(f, "{}", name)
    }
}

impl RuntimeErrorCode {
    pub fn is_parse(self) -> bool {
        matches!(
            self,
            RuntimeErrorCode::ParseExpected
                | RuntimeErrorCode::ParseUnexpected
                | RuntimeErrorCode::ParseGeneric
        )
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub message: String,
    pub code: Option<RuntimeErrorCode>,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub hint: Option<String>,
}

impl RuntimeError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            line: None,
            column: None,
            hint: None,
        }
    }

    pub(crate) fn with_code(message: impl Into<String>, code: RuntimeErrorCode) -> Self {
        Self {
            code: Some(code),
            ..Self::new(message)
        }
    }

    pub(crate) fn with_location(
        message: impl Into<String>,
        code: RuntimeErrorCode,
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
            line: Some(line),
            column: Some(column),
            hint: None,
        }
    }

    pub(crate) fn access(message: impl Into<String>) -> Self {
        Self::with_code(message, RuntimeErrorCode::AccessViolation)
    }

    pub(crate) fn undefined_member(message: impl Into<String>) -> Self {
        Self::with_code(message, RuntimeErrorCode::UndefinedMember)
    }

    pub(crate) fn undefined_symbol(message: impl Into<String>) -> Self {
        Self::with_code(message, RuntimeErrorCode::UndefinedSymbol)
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::with_code(message, RuntimeErrorCode::TypeError)
    }

    pub(crate) fn arithmetic(message: impl Into<String>) -> Self {
        Self::with_code(message, RuntimeErrorCode::ArithmeticError)
    }

    pub(crate) fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach a line number unless the error already carries one.
    pub(crate) fn at_line(mut self, line: usize) -> Self {
        if self.line.is_none() {
            self.line = Some(line);
        }
        self
    }

    pub fn is_access_violation(&self) -> bool {
        self.code == Some(RuntimeErrorCode::AccessViolation)
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(line) = self.line {
            write!(f, " on line {}", line)?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}
