#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum ApiaryError {
    #[error("apiary name is empty or already in use: {0:?}")]
    DuplicateName(String),
    #[error("cannot delete apiary {0:?}: at least one apiary must remain")]
    LastApiary(String),
    #[error("apiary not found: {0:?}")]
    ApiaryNotFound(String),
    #[error("hive name already in use: {0:?}")]
    DuplicateHiveName(String),
    #[error("hive not found: {0:?}")]
    HiveNotFound(String),
    #[error("index {index} out of range for {len} entries")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("box count must be at least 1, got {0}")]
    InvalidCount(i64),
    #[error("note text must not be empty")]
    EmptyNote,
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    #[error("no apiaries in store")]
    NoApiaries,
    #[error("malformed layout for apiary {apiary:?}: {reason}")]
    MalformedLayout { apiary: String, reason: String },
    #[error("corrupt record at key {key:?}: {reason}")]
    CorruptRecord { key: String, reason: String },
    #[error("storage error: {0}")]
    Storage(String),
}

pub type Result<T, E = ApiaryError> = std::result::Result<T, E>;
