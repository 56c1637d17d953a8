//! Breakpoint storage and per-event resolution.

#![allow(missing_docs)]

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tracing::debug;

use crate::line_cache::LineNumberCache;

/// Identity of one breakpoint, stable for the life of the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BreakpointId(u32);

impl BreakpointId {
    /// Numeric value, for display.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

/// One breakpoint, bound to exactly one (code unit, line) pair.
///
/// Condition, ignore-count and temporary-breakpoint bookkeeping belongs to
/// the front end; the engine tracks just enough to answer "does at least one
/// breakpoint resolve here".
#[derive(Debug, Clone)]
pub struct Breakpoint {
    id: BreakpointId,
    unit: SmolStr,
    entry_line: u32,
    line: u32,
    /// Disabled breakpoints still resolve; the front end decides whether a
    /// hit stops execution.
    pub enabled: bool,
    /// Hit count, maintained by the front end.
    pub hits: u64,
}

impl Breakpoint {
    /// Breakpoint identity.
    #[must_use]
    pub fn id(&self) -> BreakpointId {
        self.id
    }

    /// Canonical source-unit identity.
    #[must_use]
    pub fn unit(&self) -> &SmolStr {
        &self.unit
    }

    /// Entry line of the code unit the breakpoint lives in.
    #[must_use]
    pub fn entry_line(&self) -> u32 {
        self.entry_line
    }

    /// Line the debugger stops at.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }
}

type LineTable = Rc<RefCell<FxHashMap<u32, Vec<Breakpoint>>>>;

/// Breakpoint tables of one source unit, keyed by the entry line of each
/// code unit.
///
/// A line table, once created, is never removed even when it empties: the
/// dispatcher's one-entry resolution cache may hold a reference to it, and a
/// breakpoint added later to the same code unit must land in the table the
/// cache already sees. Emptiness is checked before reuse, not before
/// eviction.
#[derive(Debug, Default)]
pub struct ModuleBreakpointSet {
    code_lines: FxHashMap<u32, LineTable>,
}

impl ModuleBreakpointSet {
    /// Line table of the code unit whose entry line is `entry_line`.
    #[must_use]
    pub fn line_table(&self, entry_line: u32) -> Option<&LineTable> {
        self.code_lines.get(&entry_line)
    }
}

#[derive(Debug, Clone)]
struct CachedUnit {
    raw_unit: SmolStr,
    entry_line: u32,
    lines: LineTable,
}

#[derive(Debug, Clone)]
struct Site {
    unit: SmolStr,
    entry_line: u32,
    line: u32,
}

/// Two-level (source unit, line) breakpoint index with a one-entry
/// resolution cache.
///
/// The cache skips the unit-level lookup when consecutive events occur in
/// the same code unit, which is the dominant case for line events. It is
/// only updated on a successful resolution to a non-empty line table and a
/// miss is never cached, so a breakpoint set after a unit's first resolution
/// is visible to the very next event.
#[derive(Debug, Default)]
pub struct BreakpointIndex {
    modules: IndexMap<SmolStr, ModuleBreakpointSet>,
    canonic: FxHashMap<SmolStr, SmolStr>,
    cache: Option<CachedUnit>,
    lines: LineNumberCache,
    by_id: IndexMap<BreakpointId, Site>,
    fold_case: bool,
    next_id: u32,
}

impl BreakpointIndex {
    /// An empty index. `fold_case` folds source-unit identities to lower
    /// case for hosts on case-insensitive filesystems.
    #[must_use]
    pub fn new(fold_case: bool) -> Self {
        Self {
            fold_case,
            ..Self::default()
        }
    }

    /// Canonical form of a raw source-unit identity, memoized per distinct
    /// raw string when case folding is enabled.
    #[must_use]
    pub fn canonical_unit(&mut self, raw: &str) -> SmolStr {
        if !self.fold_case {
            return SmolStr::from(raw);
        }
        if let Some(folded) = self.canonic.get(raw) {
            return folded.clone();
        }
        let folded = SmolStr::from(raw.to_lowercase());
        self.canonic.insert(SmolStr::from(raw), folded.clone());
        folded
    }

    /// Add a breakpoint at `line` of the code unit starting at `entry_line`
    /// in `unit`.
    pub fn set_break(&mut self, unit: &str, entry_line: u32, line: u32) -> BreakpointId {
        let unit = self.canonical_unit(unit);
        self.next_id += 1;
        let id = BreakpointId(self.next_id);

        let module = self.modules.entry(unit.clone()).or_default();
        if !module.code_lines.contains_key(&entry_line) {
            self.lines.add(entry_line);
        }
        let table = module
            .code_lines
            .entry(entry_line)
            .or_insert_with(|| Rc::new(RefCell::new(FxHashMap::default())));
        let mut table = table.borrow_mut();
        if !table.contains_key(&line) {
            self.lines.add(line);
        }
        table.entry(line).or_default().push(Breakpoint {
            id,
            unit: unit.clone(),
            entry_line,
            line,
            enabled: true,
            hits: 0,
        });
        drop(table);

        self.by_id.insert(id, Site { unit: unit.clone(), entry_line, line });
        debug!(%unit, entry_line, line, id = id.get(), "breakpoint set");
        id
    }

    /// Delete one breakpoint. Returns false when the id is unknown.
    pub fn clear_breakpoint(&mut self, id: BreakpointId) -> bool {
        let Some(site) = self.by_id.shift_remove(&id) else {
            return false;
        };
        self.remove_from_table(&site, id);
        debug!(unit = %site.unit, line = site.line, id = id.get(), "breakpoint cleared");
        true
    }

    /// Delete every breakpoint at one line. Returns the number deleted.
    pub fn clear_breaks_at(&mut self, unit: &str, entry_line: u32, line: u32) -> usize {
        let ids = self.breakpoints_at(unit, entry_line, line);
        for id in &ids {
            self.clear_breakpoint(*id);
        }
        ids.len()
    }

    /// Delete every breakpoint in the index. Line tables survive for the
    /// sake of live cached references.
    pub fn clear_all_breaks(&mut self) {
        let ids: Vec<BreakpointId> = self.by_id.keys().copied().collect();
        for id in ids {
            self.clear_breakpoint(id);
        }
    }

    fn remove_from_table(&mut self, site: &Site, id: BreakpointId) {
        let Some(module) = self.modules.get_mut(&site.unit) else {
            return;
        };
        let Some(table) = module.code_lines.get(&site.entry_line) else {
            return;
        };
        let mut table = table.borrow_mut();
        let emptied = match table.get_mut(&site.line) {
            Some(list) => {
                list.retain(|bp| bp.id != id);
                list.is_empty()
            }
            None => false,
        };
        if emptied {
            table.remove(&site.line);
            self.lines.remove(site.line);
        }
        // The table itself stays, even when empty.
    }

    /// Look up one breakpoint by id.
    #[must_use]
    pub fn breakpoint(&self, id: BreakpointId) -> Option<Breakpoint> {
        let site = self.by_id.get(&id)?;
        let table = self.modules.get(&site.unit)?.code_lines.get(&site.entry_line)?;
        let table = table.borrow();
        table
            .get(&site.line)?
            .iter()
            .find(|bp| bp.id == id)
            .cloned()
    }

    /// Enable or disable one breakpoint. Returns false when the id is
    /// unknown.
    pub fn set_enabled(&mut self, id: BreakpointId, enabled: bool) -> bool {
        let Some(site) = self.by_id.get(&id).cloned() else {
            return false;
        };
        let Some(table) = self
            .modules
            .get(&site.unit)
            .and_then(|module| module.code_lines.get(&site.entry_line))
        else {
            return false;
        };
        let mut table = table.borrow_mut();
        if let Some(bp) = table
            .get_mut(&site.line)
            .and_then(|list| list.iter_mut().find(|bp| bp.id == id))
        {
            bp.enabled = enabled;
            return true;
        }
        false
    }

    /// Ids of the breakpoints set at one line, in creation order.
    #[must_use]
    pub fn breakpoints_at(&mut self, unit: &str, entry_line: u32, line: u32) -> Vec<BreakpointId> {
        let unit = self.canonical_unit(unit);
        let Some(table) = self
            .modules
            .get(&unit)
            .and_then(|module| module.code_lines.get(&entry_line))
        else {
            return Vec::new();
        };
        let table = table.borrow();
        let mut ids: Vec<BreakpointId> = table
            .get(&line)
            .map(|list| list.iter().map(Breakpoint::id).collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    /// Ids of every breakpoint set in one source unit, in creation order.
    #[must_use]
    pub fn unit_breakpoints(&mut self, unit: &str) -> Vec<BreakpointId> {
        let unit = self.canonical_unit(unit);
        let mut ids: Vec<BreakpointId> = self
            .by_id
            .iter()
            .filter(|(_, site)| site.unit == unit)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Whether any breakpoint exists anywhere.
    #[must_use]
    pub fn any_breakpoints(&self) -> bool {
        !self.by_id.is_empty()
    }

    /// Number of live breakpoints (primarily for tests).
    #[doc(hidden)]
    #[must_use]
    pub fn breakpoint_count(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the code unit starting at `entry_line` in `raw_unit` carries
    /// at least one breakpoint. A unit never seen before is "no
    /// breakpoints", never an error.
    #[must_use]
    pub fn unit_has_breakpoints(&mut self, raw_unit: &str, entry_line: u32) -> bool {
        if !self.lines.contains(entry_line) {
            return false;
        }
        let unit = self.canonical_unit(raw_unit);
        self.modules
            .get(&unit)
            .and_then(|module| module.code_lines.get(&entry_line))
            .is_some_and(|table| !table.borrow().is_empty())
    }

    /// Resolve the breakpoints at `line` of the code unit executing in
    /// `raw_unit`, cache first.
    #[must_use]
    pub fn resolve_line(
        &mut self,
        raw_unit: &str,
        entry_line: u32,
        line: u32,
    ) -> Option<BreakpointHits> {
        if !self.lines.contains(line) {
            return None;
        }
        let table = self.resolve_unit(raw_unit, entry_line)?;
        if table.borrow().contains_key(&line) {
            Some(BreakpointHits { table, line })
        } else {
            None
        }
    }

    fn resolve_unit(&mut self, raw_unit: &str, entry_line: u32) -> Option<LineTable> {
        if let Some(cached) = &self.cache {
            if cached.entry_line == entry_line && cached.raw_unit.as_str() == raw_unit {
                return Some(cached.lines.clone());
            }
        }
        let unit = self.canonical_unit(raw_unit);
        let table = self.modules.get(&unit)?.code_lines.get(&entry_line)?.clone();
        if !table.borrow().is_empty() {
            self.cache = Some(CachedUnit {
                raw_unit: SmolStr::from(raw_unit),
                entry_line,
                lines: table.clone(),
            });
        }
        Some(table)
    }
}

/// Breakpoints hit at one line, handed to the breakpoint callback.
///
/// The view stays valid for the duration of the callback. Do not add or
/// delete breakpoints from inside `for_each`/`for_each_mut` closures; edit
/// the hit breakpoints in place (hit counts, enabled flags) and do
/// structural changes through the session control surface afterwards.
#[derive(Debug, Clone)]
pub struct BreakpointHits {
    table: LineTable,
    line: u32,
}

impl BreakpointHits {
    /// Line the hits resolved at.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Number of breakpoints at the line.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table
            .borrow()
            .get(&self.line)
            .map_or(0, Vec::len)
    }

    /// Whether the hit set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hit breakpoint ids in creation order.
    #[must_use]
    pub fn ids(&self) -> Vec<BreakpointId> {
        let table = self.table.borrow();
        let mut ids: Vec<BreakpointId> = table
            .get(&self.line)
            .map(|list| list.iter().map(Breakpoint::id).collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    /// Visit each hit breakpoint.
    pub fn for_each(&self, mut f: impl FnMut(&Breakpoint)) {
        let table = self.table.borrow();
        if let Some(list) = table.get(&self.line) {
            for bp in list {
                f(bp);
            }
        }
    }

    /// Visit each hit breakpoint mutably, for front-end hit bookkeeping.
    pub fn for_each_mut(&self, mut f: impl FnMut(&mut Breakpoint)) {
        let mut table = self.table.borrow_mut();
        if let Some(list) = table.get_mut(&self.line) {
            for bp in list {
                f(bp);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_is_exact() {
        let mut index = BreakpointIndex::new(false);
        index.set_break("main.src", 1, 7);

        assert!(index.resolve_line("main.src", 1, 7).is_some());
        assert!(index.resolve_line("main.src", 1, 8).is_none());
        assert!(index.resolve_line("main.src", 2, 7).is_none());
        assert!(index.resolve_line("other.src", 1, 7).is_none());
    }

    #[test]
    fn unknown_unit_is_no_breakpoints() {
        let mut index = BreakpointIndex::new(false);
        assert!(!index.unit_has_breakpoints("never-seen.src", 1));
        assert!(index.resolve_line("never-seen.src", 1, 10).is_none());
    }

    #[test]
    fn breakpoint_set_after_resolution_is_visible() {
        let mut index = BreakpointIndex::new(false);
        index.set_break("main.src", 1, 7);
        assert!(index.resolve_line("main.src", 1, 7).is_some());

        // The unit is now cached; a new breakpoint must still be seen.
        index.set_break("main.src", 1, 12);
        assert!(index.resolve_line("main.src", 1, 12).is_some());
    }

    #[test]
    fn cleared_table_survives_and_is_reusable() {
        let mut index = BreakpointIndex::new(false);
        let id = index.set_break("main.src", 1, 7);
        assert!(index.resolve_line("main.src", 1, 7).is_some());

        assert!(index.clear_breakpoint(id));
        assert!(index.resolve_line("main.src", 1, 7).is_none());
        assert!(!index.unit_has_breakpoints("main.src", 1));

        // Re-adding lands in the surviving table and resolves again.
        index.set_break("main.src", 1, 7);
        assert!(index.resolve_line("main.src", 1, 7).is_some());
    }

    #[test]
    fn case_folding_is_memoized_and_applied() {
        let mut index = BreakpointIndex::new(true);
        index.set_break("Main.Src", 1, 7);
        assert!(index.resolve_line("MAIN.SRC", 1, 7).is_some());
        assert_eq!(index.canonical_unit("Main.Src"), "main.src");
    }

    #[test]
    fn hit_bookkeeping_is_front_end_writable() {
        let mut index = BreakpointIndex::new(false);
        index.set_break("main.src", 1, 7);
        let hits = index.resolve_line("main.src", 1, 7).expect("hit");
        hits.for_each_mut(|bp| bp.hits += 1);

        let id = hits.ids()[0];
        assert_eq!(index.breakpoint(id).expect("bp").hits, 1);
    }

    #[test]
    fn clear_all_leaves_empty_index() {
        let mut index = BreakpointIndex::new(false);
        index.set_break("a.src", 1, 3);
        index.set_break("b.src", 10, 14);
        index.clear_all_breaks();
        assert!(!index.any_breakpoints());
        assert!(index.resolve_line("a.src", 1, 3).is_none());
    }
}
