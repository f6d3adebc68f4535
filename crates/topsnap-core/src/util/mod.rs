//! Host constants queried from the C library.

/// Memory page size in bytes, or `None` if it cannot be determined.
pub fn page_size() -> Option<u64> {
    // SAFETY: sysconf is safe to call with _SC_PAGESIZE and has no side effects.
    let value = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    positive(value)
}

/// Kernel clock ticks per second, or `None` if it cannot be determined.
pub fn clock_ticks() -> Option<u64> {
    // SAFETY: sysconf is safe to call with _SC_CLK_TCK and has no side effects.
    let value = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    positive(value)
}

fn positive(value: libc::c_long) -> Option<u64> {
    u64::try_from(value).ok().filter(|&v| v > 0)
}
