use std::error::Error;
use strata::errors::{ErrorKind, StrataError};

/// Maps a fjall (or lsm-tree) error onto a [`StrataError`] by its message.
pub(crate) fn to_strata_error(error: impl Error) -> StrataError {
    let error_msg = error.to_string();
    let error_kind = if error_msg.contains("corrupt") || error_msg.contains("decompress") {
        ErrorKind::EncodingError
    } else if error_msg.contains("permission")
        || error_msg.contains("full")
        || error_msg.contains("Io")
    {
        ErrorKind::IOError
    } else {
        ErrorKind::BackendError
    };
    StrataError::new(&format!("Fjall Error: {}", error_msg), error_kind)
}
