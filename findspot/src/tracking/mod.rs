//! What gets counted
//!
//! - `filter`: module whitelist/blacklist, applied at discovery
//! - `mode`: OFF / COLLECT / TRIM selector, applied on every hit

pub mod filter;
pub mod mode;

pub use filter::ModuleFilter;
pub use mode::ModeSwitch;

/// Strip directories from a module path, accepting either separator.
///
/// `/usr/lib/libc.so.6` → `libc.so.6`, `C:\app\app.exe` → `app.exe`.
#[must_use]
pub fn short_module_name(path: &str) -> &str {
    path.rfind('/')
        .or_else(|| path.rfind('\\'))
        .map_or(path, |idx| &path[idx + 1..])
}
