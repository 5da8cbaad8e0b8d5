use connectors::RemoteErrorKind;
use model::ErrorCode;

/// Maps a remote failure classification onto the closed `ErrorCode` set the
/// Reporter clusters on (spec §4.8).
pub fn error_code_for(kind: &RemoteErrorKind) -> ErrorCode {
    match kind {
        RemoteErrorKind::Throttled { .. } => ErrorCode::Throttled,
        RemoteErrorKind::Transient | RemoteErrorKind::NotSent => ErrorCode::Transient,
        RemoteErrorKind::PermanentPerRecord { error_code, .. } => *error_code,
        RemoteErrorKind::PermanentFatal => ErrorCode::Fatal,
    }
}
