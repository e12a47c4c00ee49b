#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SyscallError {
    #[error("invalid system call number {0}")]
    InvalidCode(u32),
}
