//! Character encoder
//!
//! Maps characters to HID reports through the active keyboard graph.
//!
//! The graph is shared behind `RwLock<Option<Arc<..>>>`. Readers hold the
//! read lock only to clone the `Arc`; a layout change resolves the new graph
//! outside the lock and takes the write lock only for the pointer swap.

use crate::error::{EncodeError, LoadError};
use crate::keyboard::graph::{KeyboardGraph, Symbol};
use crate::keyboard::loader::TableSource;
use crate::keyboard::report::HidReport;
use log::{info, trace};
use std::sync::{Arc, RwLock};

/// Pick the preferred keystroke among candidates.
///
/// Fewest modifiers wins, then the smaller modifier mask. Remaining ties
/// keep the first candidate.
pub fn select_symbol<'a, I>(candidates: I) -> Option<&'a Symbol>
where
    I: IntoIterator<Item = &'a Symbol>,
{
    candidates.into_iter().min_by_key(|s| s.keystate().rank())
}

/// Encodes characters with the currently loaded layout
#[derive(Debug, Default)]
pub struct Encoder {
    graph: RwLock<Option<Arc<KeyboardGraph>>>,
}

impl Encoder {
    /// Encoder with no layout; every encode fails with `NotLoaded`
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_graph(graph: KeyboardGraph) -> Self {
        Self {
            graph: RwLock::new(Some(Arc::new(graph))),
        }
    }

    /// Load and resolve a layout, then make it active.
    ///
    /// On failure the previously active layout stays in place.
    pub fn load<S: TableSource + ?Sized>(
        &self,
        source: &S,
        layout: &str,
        keysyms: &str,
        scancodes: &str,
    ) -> Result<Arc<KeyboardGraph>, LoadError> {
        info!(
            "Loading layout {} (keysyms={}, scancodes={})",
            layout, keysyms, scancodes
        );
        let scancodes = source.load_scancodes(scancodes)?;
        let keysyms = source.load_keysyms(keysyms)?;
        let keycodes = source.load_keycodes(layout)?;
        let graph = Arc::new(KeyboardGraph::resolve(keycodes, keysyms, scancodes)?);
        self.swap(Some(Arc::clone(&graph)));
        Ok(graph)
    }

    /// Replace the active graph, returning the previous one
    pub fn replace(&self, graph: KeyboardGraph) -> Option<Arc<KeyboardGraph>> {
        self.swap(Some(Arc::new(graph)))
    }

    /// Drop the active graph
    pub fn unload(&self) -> Option<Arc<KeyboardGraph>> {
        self.swap(None)
    }

    fn swap(&self, graph: Option<Arc<KeyboardGraph>>) -> Option<Arc<KeyboardGraph>> {
        let mut guard = self.graph.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, graph)
    }

    /// Snapshot of the active graph
    pub fn graph(&self) -> Option<Arc<KeyboardGraph>> {
        self.graph
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(Arc::clone)
    }

    pub fn is_loaded(&self) -> bool {
        self.graph().is_some()
    }

    /// Encode one character
    pub fn encode_char(&self, character: char) -> Result<HidReport, EncodeError> {
        let graph = self.graph().ok_or(EncodeError::NotLoaded)?;
        encode_with(&graph, character)
    }

    /// Encode a string, one report per character.
    ///
    /// Stops at the first character without a mapping and reports its
    /// position (in characters).
    pub fn encode_str(&self, text: &str) -> Result<Vec<HidReport>, EncodeError> {
        let graph = self.graph().ok_or(EncodeError::NotLoaded)?;
        text.chars()
            .enumerate()
            .map(|(position, character)| {
                encode_with(&graph, character).map_err(|_| EncodeError::NoMappingAt {
                    position,
                    character,
                })
            })
            .collect()
    }

    /// Encode a string without stopping at unmapped characters
    pub fn encode_each(&self, text: &str) -> Vec<Result<HidReport, EncodeError>> {
        match self.graph() {
            Some(graph) => text.chars().map(|c| encode_with(&graph, c)).collect(),
            None => text.chars().map(|_| Err(EncodeError::NotLoaded)).collect(),
        }
    }
}

fn encode_with(graph: &KeyboardGraph, character: char) -> Result<HidReport, EncodeError> {
    let candidates = graph.candidates(character);
    let symbol = select_symbol(candidates.iter().copied()).ok_or(EncodeError::NoMapping(character))?;
    let report = HidReport::new(symbol.keystate(), graph.scancode_of(symbol).id);
    trace!(
        "{:?}: {} candidate(s), keycode {} -> {}",
        character,
        candidates.len(),
        graph.keycode_of(symbol).id,
        report.to_spaced_hex()
    );
    Ok(report)
}
