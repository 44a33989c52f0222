//! Module whitelist/blacklist.
//!
//! Precedence: a non-empty whitelist decides alone; otherwise a non-empty
//! blacklist excludes its members; with both empty every module is tracked.
//!
//! The verdict is applied when a routine is discovered. Editing the lists
//! later does not change routines that are already in the store.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::domain::ListKind;

#[derive(Debug, Default, Clone)]
pub struct ModuleFilter {
    whitelist: BTreeSet<String>,
    blacklist: BTreeSet<String>,
}

impl ModuleFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the module should be ignored.
    #[must_use]
    pub fn tracked(&self, module: &str) -> bool {
        if !self.whitelist.is_empty() {
            return self.whitelist.contains(module);
        }
        if !self.blacklist.is_empty() {
            return !self.blacklist.contains(module);
        }
        true
    }

    /// Add `module` to a list. Returns false if it was already present.
    pub fn add(&mut self, list: ListKind, module: &str) -> bool {
        self.list_mut(list).insert(module.to_owned())
    }

    /// Remove `module` from a list. Returns false if it was not present.
    pub fn remove(&mut self, list: ListKind, module: &str) -> bool {
        self.list_mut(list).remove(module)
    }

    /// Human-readable dump of both lists for the `mod` command.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (label, list) in [("whitelist", &self.whitelist), ("blacklist", &self.blacklist)] {
            out.push_str(label);
            out.push_str(": ");
            for module in list {
                let _ = write!(out, "{module},");
            }
            out.push('\n');
        }
        if self.whitelist.is_empty() && self.blacklist.is_empty() {
            out.push_str("All modules are being tracked.\n");
        }
        out
    }

    fn list_mut(&mut self, list: ListKind) -> &mut BTreeSet<String> {
        match list {
            ListKind::Whitelist => &mut self.whitelist,
            ListKind::Blacklist => &mut self.blacklist,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_tracks_everything() {
        let filter = ModuleFilter::new();
        assert!(filter.tracked("libc.so.6"));
        assert!(filter.tracked(""));
    }

    #[test]
    fn test_blacklist_excludes_members() {
        let mut filter = ModuleFilter::new();
        filter.add(ListKind::Blacklist, "libc.so.6");
        assert!(!filter.tracked("libc.so.6"));
        assert!(filter.tracked("app"));
    }

    #[test]
    fn test_whitelist_overrides_blacklist() {
        let mut filter = ModuleFilter::new();
        filter.add(ListKind::Whitelist, "a");
        filter.add(ListKind::Blacklist, "b");
        filter.add(ListKind::Blacklist, "a");

        assert!(filter.tracked("a"));
        // Blacklist is not consulted at all while a whitelist exists
        assert!(!filter.tracked("b"));
        assert!(!filter.tracked("c"));

        // The blacklist is kept and applies again once the whitelist empties
        filter.remove(ListKind::Whitelist, "a");
        assert!(!filter.tracked("a"));
        assert!(!filter.tracked("b"));
        assert!(filter.tracked("c"));
    }

    #[test]
    fn test_add_and_remove_are_idempotent() {
        let mut filter = ModuleFilter::new();
        assert!(filter.add(ListKind::Whitelist, "app"));
        assert!(!filter.add(ListKind::Whitelist, "app"));
        assert!(filter.remove(ListKind::Whitelist, "app"));
        assert!(!filter.remove(ListKind::Whitelist, "app"));
        assert!(filter.tracked("anything"));
    }

    #[test]
    fn test_describe_empty() {
        let text = ModuleFilter::new().describe();
        assert_eq!(text, "whitelist: \nblacklist: \nAll modules are being tracked.\n");
    }

    #[test]
    fn test_describe_lists_members_sorted() {
        let mut filter = ModuleFilter::new();
        filter.add(ListKind::Blacklist, "libm.so");
        filter.add(ListKind::Blacklist, "libc.so");
        filter.add(ListKind::Whitelist, "app");

        assert_eq!(filter.describe(), "whitelist: app,\nblacklist: libc.so,libm.so,\n");
    }
}
