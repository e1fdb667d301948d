use thiserror::Error;

/// Error taxonomy for the sandboxed tool runner. Each variant maps to one of
/// the fixed error codes surfaced in `CaseResult.errors[]` and in the
/// worker's `{ok:false, error:{code,...}}` envelope.
#[derive(Debug, Error)]
pub enum ToolRunnerError {
    #[error("invalid tool command: {0}")]
    InvalidCommand(String),

    #[error("command not allow-listed: {0}")]
    CommandNotAllowlisted(String),

    #[error("tool call timed out after {0}ms")]
    ToolTimeout(u64),

    #[error("failed to spawn tool worker process: {0}")]
    ToolProcessError(String),

    #[error("tool worker produced no output (stderr: {0})")]
    ToolEmptyResponse(String),

    #[error("tool worker produced invalid JSON: {0}")]
    ToolInvalidResponse(String),

    #[error("failed to write tool invocation to worker stdin: {0}")]
    ToolInputError(String),

    #[error("tool execution failed: {0}")]
    ToolExecutionError(String),

    #[error("tools module not found: {0}")]
    ToolsModuleNotFound(String),

    #[error("tools module does not export a `handlers` map")]
    HandlersMissing,

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("invalid worker arguments: {0}")]
    InvalidWorkerArgs(String),
}

impl ToolRunnerError {
    /// The fixed taxonomy code this variant reports as.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCommand(_) => "INVALID_COMMAND",
            Self::CommandNotAllowlisted(_) => "COMMAND_NOT_ALLOWLISTED",
            Self::ToolTimeout(_) => "TOOL_TIMEOUT",
            Self::ToolProcessError(_) => "TOOL_PROCESS_ERROR",
            Self::ToolEmptyResponse(_) => "TOOL_EMPTY_RESPONSE",
            Self::ToolInvalidResponse(_) => "TOOL_INVALID_RESPONSE",
            Self::ToolInputError(_) => "TOOL_INPUT_ERROR",
            Self::ToolExecutionError(_) => "TOOL_EXECUTION_ERROR",
            Self::ToolsModuleNotFound(_) => "TOOLS_MODULE_NOT_FOUND",
            Self::HandlersMissing => "HANDLERS_MISSING",
            Self::ToolNotFound(_) => "TOOL_NOT_FOUND",
            Self::InvalidWorkerArgs(_) => "INVALID_WORKER_ARGS",
        }
    }

    /// Maps a worker-reported error code string back onto a variant, falling
    /// back to `ToolExecutionError` for unrecognized codes.
    pub fn from_worker_code(code: &str, message: String) -> Self {
        match code {
            "TOOLS_MODULE_NOT_FOUND" => Self::ToolsModuleNotFound(message),
            "HANDLERS_MISSING" => Self::HandlersMissing,
            "TOOL_NOT_FOUND" => Self::ToolNotFound(message),
            "INVALID_WORKER_ARGS" => Self::InvalidWorkerArgs(message),
            _ => Self::ToolExecutionError(message),
        }
    }
}

/// Errors fatal to a single case's provider loop.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Missing {provider} API key in {var}")]
    MissingApiKey {
        provider: &'static str,
        var: &'static str,
    },

    #[error("Provider request failed ({status}): {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Provider returned invalid JSON: {0}")]
    InvalidJson(String),

    #[error("exceeded maxToolCalls={0}")]
    MaxToolCallsExceeded(usize),

    #[error("tool invocation failed: {0}")]
    ToolFailed(#[from] ToolRunnerError),

    #[error("provider serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("provider request cancelled")]
    Cancelled,
}

/// Top-level error surfaced before a run can start, or caught once per case
/// at the pipeline boundary and translated into a `CaseResult`.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("unknown suite: {0}")]
    UnknownSuite(String),

    #[error("unknown provider: {0:?}")]
    UnknownProvider(crate::providers::ProviderId),

    #[error("missing model for provider {0:?}; set runConfig.model or suite.modelByProvider")]
    MissingModel(crate::providers::ProviderId),

    #[error("unsupported file extension: {0}")]
    UnsupportedExtension(String),

    #[error("duplicate caseId in dataset: {0}")]
    DuplicateCaseId(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    ToolRunner(#[from] ToolRunnerError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EvalError {
    /// The taxonomy code used in a `CaseResult.errors[]` entry, falling back
    /// to `CASE_ERROR` for error kinds outside the coded tool-runner taxonomy.
    pub fn case_error_code(&self) -> &str {
        match self {
            Self::ToolRunner(err) => err.code(),
            Self::Provider(ProviderError::ToolFailed(err)) => err.code(),
            _ => "CASE_ERROR",
        }
    }
}
