//! Keyboard graph resolution
//!
//! Cross-links independently loaded keycode, keysym and scancode tables.
//! Entities live in flat arenas; links are stored as arena indices,
//! so the graph has no ownership cycles and is immutable once built.
//!
//! Individual failures (a keycode without scancode, an unknown keysym)
//! only shrink the graph. A layout where no keycode resolves is an error.

use crate::error::{ResolutionWarning, ResolveError};
use crate::keyboard::keystate::Keystate;
use crate::keyboard::tables::{Keycode, Keycodes, Keysym, Keysyms, Scancode, Scancodes};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};

/// One concrete way to type a keysym: press `keycode` while holding `keystate`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    keycode: usize,
    keysym: usize,
    scancode: usize,
    keystate: Keystate,
}

impl Symbol {
    pub fn keystate(&self) -> Keystate {
        self.keystate
    }
}

/// A keycode together with its resolution outcome
#[derive(Debug, Clone)]
pub struct ResolvedKeycode {
    keycode: Keycode,
    /// None if no scancode references this keycode
    scancode: Option<usize>,
    symbols: Vec<Symbol>,
}

impl ResolvedKeycode {
    pub fn keycode(&self) -> &Keycode {
        &self.keycode
    }

    /// Only valid keycodes take part in encoding
    pub fn is_valid(&self) -> bool {
        self.scancode.is_some()
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }
}

/// Summary of one resolution pass
#[derive(Debug, Clone, Default)]
pub struct ResolutionReport {
    pub resolved_keycodes: usize,
    pub symbols: usize,
    pub warnings: Vec<ResolutionWarning>,
}

impl ResolutionReport {
    pub fn unresolved_keycodes(&self) -> usize {
        self.count(|w| matches!(w, ResolutionWarning::MissingScancode { .. }))
    }

    pub fn unresolved_keysyms(&self) -> usize {
        self.count(|w| matches!(w, ResolutionWarning::MissingKeysym { .. }))
    }

    /// Keysym columns past the fourth
    pub fn skipped_columns(&self) -> usize {
        self.count(|w| matches!(w, ResolutionWarning::UnmappedColumn { .. }))
    }

    pub fn dangling_scancodes(&self) -> usize {
        self.count(|w| matches!(w, ResolutionWarning::DanglingScancode { .. }))
    }

    fn count(&self, pred: impl Fn(&ResolutionWarning) -> bool) -> usize {
        self.warnings.iter().filter(|w| pred(w)).count()
    }
}

/// Fully cross-linked layout model
#[derive(Debug, Clone)]
pub struct KeyboardGraph {
    layout: String,
    keysyms: Vec<Keysym>,
    scancodes: Vec<Scancode>,
    keycodes: Vec<ResolvedKeycode>,
    report: ResolutionReport,
}

impl KeyboardGraph {
    /// Resolve the three tables of one layout into a graph.
    ///
    /// Tables are expected to have unique ids; where they don't, the first
    /// record with an id wins.
    pub fn resolve(
        keycodes: Keycodes,
        keysyms: Keysyms,
        scancodes: Scancodes,
    ) -> Result<Self, ResolveError> {
        let layout = keycodes.name().to_string();
        let keycodes = keycodes.into_records();
        let keysyms = keysyms.into_records();
        let scancodes = scancodes.into_records();
        let mut report = ResolutionReport::default();

        let mut keysym_index: HashMap<u32, usize> = HashMap::with_capacity(keysyms.len());
        for (i, keysym) in keysyms.iter().enumerate() {
            keysym_index.entry(keysym.id).or_insert(i);
        }

        // Scancodes point at keycodes; keycodes look them up in reverse
        let keycode_ids: HashSet<u32> = keycodes.iter().map(|k| k.id).collect();
        let mut scancode_by_keycode: HashMap<u32, usize> = HashMap::with_capacity(scancodes.len());
        for (i, scancode) in scancodes.iter().enumerate() {
            if !keycode_ids.contains(&scancode.keycode) {
                report.warnings.push(ResolutionWarning::DanglingScancode {
                    scancode: scancode.id,
                    keycode: scancode.keycode,
                });
                continue;
            }
            scancode_by_keycode.entry(scancode.keycode).or_insert(i);
        }

        let mut resolved = Vec::with_capacity(keycodes.len());
        for (index, keycode) in keycodes.into_iter().enumerate() {
            let Some(&scancode) = scancode_by_keycode.get(&keycode.id) else {
                report.warnings.push(ResolutionWarning::MissingScancode {
                    keycode: keycode.id,
                });
                resolved.push(ResolvedKeycode {
                    keycode,
                    scancode: None,
                    symbols: Vec::new(),
                });
                continue;
            };

            if scancodes[scancode].id > u32::from(u8::MAX) {
                report.warnings.push(ResolutionWarning::WideScancode {
                    scancode: scancodes[scancode].id,
                });
            }

            let mut symbols = Vec::with_capacity(keycode.keysyms.len());
            for (i, &keysym_id) in keycode.keysyms.iter().enumerate() {
                let column = i + 1;
                let Some(&keysym) = keysym_index.get(&keysym_id) else {
                    report.warnings.push(ResolutionWarning::MissingKeysym {
                        keycode: keycode.id,
                        column,
                        keysym: keysym_id,
                    });
                    continue;
                };
                let Some(keystate) = Keystate::for_column(column) else {
                    report.warnings.push(ResolutionWarning::UnmappedColumn {
                        keycode: keycode.id,
                        column,
                        keysym: keysym_id,
                    });
                    continue;
                };
                symbols.push(Symbol {
                    keycode: index,
                    keysym,
                    scancode,
                    keystate,
                });
            }

            report.resolved_keycodes += 1;
            report.symbols += symbols.len();
            resolved.push(ResolvedKeycode {
                keycode,
                scancode: Some(scancode),
                symbols,
            });
        }

        for warning in &report.warnings {
            match warning {
                ResolutionWarning::WideScancode { .. } => warn!("{}: {}", layout, warning),
                _ => debug!("{}: {}", layout, warning),
            }
        }

        if report.resolved_keycodes == 0 {
            return Err(ResolveError::NoValidKeycodes {
                layout,
                keycodes: resolved.len(),
            });
        }

        info!(
            "Resolved layout {}: {}/{} keycodes, {} symbols, {} unresolved keysym refs, {} skipped columns, {} dangling scancodes",
            layout,
            report.resolved_keycodes,
            resolved.len(),
            report.symbols,
            report.unresolved_keysyms(),
            report.skipped_columns(),
            report.dangling_scancodes()
        );

        Ok(Self {
            layout,
            keysyms,
            scancodes,
            keycodes: resolved,
            report,
        })
    }

    /// Layout (keycode table) id
    pub fn layout(&self) -> &str {
        &self.layout
    }

    pub fn report(&self) -> &ResolutionReport {
        &self.report
    }

    /// All keycodes in table order, valid or not
    pub fn keycodes(&self) -> &[ResolvedKeycode] {
        &self.keycodes
    }

    pub fn keysyms(&self) -> &[Keysym] {
        &self.keysyms
    }

    pub fn scancodes(&self) -> &[Scancode] {
        &self.scancodes
    }

    /// Symbols of valid keycodes, in table order
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.keycodes
            .iter()
            .filter(|k| k.is_valid())
            .flat_map(|k| k.symbols.iter())
    }

    /// Every symbol that types `character`
    pub fn candidates(&self, character: char) -> Vec<&Symbol> {
        self.symbols()
            .filter(|s| self.keysym_of(s).produces(character))
            .collect()
    }

    /// Every symbol whose keysym types a character
    pub fn printable_symbols(&self) -> Vec<&Symbol> {
        self.symbols()
            .filter(|s| self.keysym_of(s).is_printable())
            .collect()
    }

    pub fn keycode_of(&self, symbol: &Symbol) -> &Keycode {
        &self.keycodes[symbol.keycode].keycode
    }

    pub fn keysym_of(&self, symbol: &Symbol) -> &Keysym {
        &self.keysyms[symbol.keysym]
    }

    pub fn scancode_of(&self, symbol: &Symbol) -> &Scancode {
        &self.scancodes[symbol.scancode]
    }
}
