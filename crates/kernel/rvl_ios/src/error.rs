/// Classification of a negative IOS return code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::FromRepr)]
#[repr(i32)]
pub enum IosErrorKind {
    #[strum(to_string = "access denied")]
    AccessDenied = -1,
    #[strum(to_string = "already exists")]
    Exists = -2,
    #[strum(to_string = "invalid argument")]
    InvalidArgument = -4,
    #[strum(to_string = "not found")]
    NotFound = -6,
    #[strum(to_string = "request queue full")]
    QueueFull = -8,
    #[strum(to_string = "out of memory")]
    OutOfMemory = -22,
    /// Blocking call made before the scheduler started. Never produced by
    /// Starlet.
    #[strum(to_string = "scheduler not running")]
    NotReady = -0x1_0000,
    #[strum(to_string = "unknown")]
    Unknown = i32::MIN,
}

/// A failed IOS call.
///
/// Carries the signed code exactly as Starlet (or the local argument
/// checks) returned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("IOS error {code} ({kind})")]
pub struct IosError {
    code: i32,
    kind: IosErrorKind,
}

impl IosError {
    #[must_use]
    pub fn new(code: i32) -> Self {
        Self {
            code,
            kind: IosErrorKind::from_repr(code).unwrap_or(IosErrorKind::Unknown),
        }
    }

    #[must_use]
    pub fn from_kind(kind: IosErrorKind) -> Self {
        Self {
            code: kind as i32,
            kind,
        }
    }

    #[must_use]
    pub const fn code(&self) -> i32 {
        self.code
    }

    #[must_use]
    pub const fn kind(&self) -> IosErrorKind {
        self.kind
    }

    /// Splits a raw return value into success and error.
    pub fn check(ret: i32) -> Result<i32, Self> {
        if ret < 0 { Err(Self::new(ret)) } else { Ok(ret) }
    }
}

impl From<IosErrorKind> for IosError {
    fn from(kind: IosErrorKind) -> Self {
        Self::from_kind(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_survive_unchanged() {
        let known = IosError::new(-6);
        assert_eq!(known.code(), -6);
        assert_eq!(known.kind(), IosErrorKind::NotFound);
        assert_eq!(known.to_string(), "IOS error -6 (not found)");

        let odd = IosError::new(-106);
        assert_eq!(odd.code(), -106);
        assert_eq!(odd.kind(), IosErrorKind::Unknown);
    }

    #[test]
    fn check_passes_non_negative_values() {
        assert_eq!(IosError::check(3), Ok(3));
        assert_eq!(IosError::check(0), Ok(0));
        assert_eq!(IosError::check(-4), Err(IosErrorKind::InvalidArgument.into()));
    }
}
