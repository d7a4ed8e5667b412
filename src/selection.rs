//! # Selection Model Module
//!
//! Determina quali item partecipano al prossimo passaggio dello scheduler.
//!
//! ## Operazioni supportate:
//! - **Click singolo**: selezione esclusiva, sposta l'anchor
//! - **Range** (modificatore range): seleziona il tratto contiguo tra anchor e
//!   item cliccato, sostituendo la selezione; l'anchor NON si sposta
//! - **Toggle** (modificatore multi-select): inverte un item, sposta l'anchor
//! - **Paint**: drag continuo; il primo item toccato si inverte e fissa il
//!   valore per tutto il gesto, gli item successivi vengono forzati a quel
//!   valore (mai alternati)
//! - **Range forzato**: forza un valore su tutto il tratto anchor..end
//! - **Select all / deselect all**: override globali
//!
//! ## Invariante:
//! L'anchor punta sempre a un item esistente oppure è `None`.

use crate::error::DecayError;
use crate::item::ItemId;
use crate::store::ItemStore;

/// State threaded through pointer-move events during a paint drag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaintGesture {
    pub active: bool,
    pub forced_value: bool,
}

/// Anchor, active item and in-progress paint gesture.
#[derive(Debug, Default)]
pub struct SelectionModel {
    anchor: Option<ItemId>,
    active: Option<ItemId>,
    paint: PaintGesture,
}

impl SelectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference point for range operations.
    pub fn anchor(&self) -> Option<ItemId> {
        self.anchor
    }

    /// Item currently shown in the viewer.
    pub fn active(&self) -> Option<ItemId> {
        self.active
    }

    pub fn paint(&self) -> PaintGesture {
        self.paint
    }

    /// Click handling: plain, range-extending or toggling.
    pub fn select(
        &mut self,
        store: &mut ItemStore,
        id: ItemId,
        extend_range: bool,
        toggle: bool,
    ) -> Result<(), DecayError> {
        if store.position(id).is_none() {
            return Err(DecayError::UnknownItem(id));
        }
        self.active = Some(id);

        if extend_range {
            if let Some((low, high)) = self.anchor.and_then(|anchor| store.span(anchor, id)) {
                for (index, item) in store.items_mut().iter_mut().enumerate() {
                    item.is_selected = (low..=high).contains(&index);
                }
                return Ok(());
            }
        }

        if toggle {
            if let Some(item) = store.get_mut(id) {
                item.is_selected = !item.is_selected;
            }
        } else {
            for item in store.items_mut() {
                item.is_selected = item.id == id;
            }
        }
        self.anchor = Some(id);
        Ok(())
    }

    /// First item of a drag: flip it and fix the paint value. Returns that value.
    pub fn begin_paint(&mut self, store: &mut ItemStore, id: ItemId) -> Result<bool, DecayError> {
        let item = store.get_mut(id).ok_or(DecayError::UnknownItem(id))?;
        let value = !item.is_selected;
        item.is_selected = value;
        self.paint = PaintGesture {
            active: true,
            forced_value: value,
        };
        self.anchor = Some(id);
        Ok(value)
    }

    /// Pointer entered `id` during a drag. Ignored when no gesture is active.
    pub fn paint_over(&mut self, store: &mut ItemStore, id: ItemId) -> Result<(), DecayError> {
        if !self.paint.active {
            return Ok(());
        }
        let item = store.get_mut(id).ok_or(DecayError::UnknownItem(id))?;
        item.is_selected = self.paint.forced_value;
        self.anchor = Some(id);
        Ok(())
    }

    pub fn end_paint(&mut self) {
        self.paint = PaintGesture::default();
    }

    /// Whole drag from `start` to `end` over the positional path between them.
    pub fn paint_select(
        &mut self,
        store: &mut ItemStore,
        start: ItemId,
        end: ItemId,
    ) -> Result<bool, DecayError> {
        let (low, high) = store.span(start, end).ok_or(DecayError::UnknownItem(end))?;
        let value = self.begin_paint(store, start)?;
        let mut path: Vec<ItemId> = store.items()[low..=high].iter().map(|item| item.id).collect();
        if path.first() != Some(&start) {
            // dragging upwards
            path.reverse();
        }
        for id in path.into_iter().skip(1) {
            self.paint_over(store, id)?;
        }
        self.end_paint();
        Ok(value)
    }

    /// Force every item between the anchor (or active item) and `end` to `value`.
    pub fn range_select(
        &mut self,
        store: &mut ItemStore,
        end: ItemId,
        value: bool,
    ) -> Result<(), DecayError> {
        let Some(anchor) = self.anchor.or(self.active) else {
            return Ok(());
        };
        let (low, high) = store.span(anchor, end).ok_or(DecayError::UnknownItem(end))?;
        for item in &mut store.items_mut()[low..=high] {
            item.is_selected = value;
        }
        Ok(())
    }

    pub fn select_all(&self, store: &mut ItemStore) {
        for item in store.items_mut() {
            item.is_selected = true;
        }
    }

    pub fn deselect_all(&self, store: &mut ItemStore) {
        for item in store.items_mut() {
            item.is_selected = false;
        }
    }

    /// Newly ingested items: the first one becomes active if nothing was.
    pub(crate) fn on_ingested(&mut self, added: &[ItemId]) {
        if self.active.is_none() {
            if let Some(&first) = added.first() {
                self.active = Some(first);
                self.anchor = Some(first);
            }
        }
    }

    /// Keep anchor and active item pointing at existing items after a removal.
    pub(crate) fn on_removed(&mut self, store: &ItemStore, removed: ItemId, index: usize) {
        let neighbour = store.neighbour_of_removed(index);
        if self.anchor == Some(removed) {
            self.anchor = neighbour;
        }
        if self.active == Some(removed) {
            self.active = neighbour;
        }
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ProcessorSettings;
    use crate::store::NewImage;

    fn setup(n: usize) -> (ItemStore, SelectionModel, Vec<ItemId>) {
        let mut store = ItemStore::new(20);
        let images = (0..n)
            .map(|i| NewImage::new(format!("{}.png", i), vec![i as u8]))
            .collect();
        let ids = store.ingest(images, ProcessorSettings::default()).unwrap().added;
        let mut selection = SelectionModel::new();
        selection.on_ingested(&ids);
        (store, selection, ids)
    }

    fn selected(store: &ItemStore) -> Vec<bool> {
        store.items().iter().map(|i| i.is_selected).collect()
    }

    #[test]
    fn test_plain_click_selects_only_one() {
        let (mut store, mut sel, ids) = setup(4);
        sel.select(&mut store, ids[2], false, false).unwrap();
        assert_eq!(selected(&store), vec![false, false, true, false]);
        assert_eq!(sel.anchor(), Some(ids[2]));
        assert_eq!(sel.active(), Some(ids[2]));
    }

    #[test]
    fn test_range_click_keeps_anchor() {
        let (mut store, mut sel, ids) = setup(5);
        sel.select(&mut store, ids[3], false, false).unwrap();
        sel.select(&mut store, ids[1], true, false).unwrap();
        assert_eq!(selected(&store), vec![false, true, true, true, false]);
        assert_eq!(sel.anchor(), Some(ids[3]));
        assert_eq!(sel.active(), Some(ids[1]));

        // extending again replaces the previous range
        sel.select(&mut store, ids[4], true, false).unwrap();
        assert_eq!(selected(&store), vec![false, false, false, true, true]);
    }

    #[test]
    fn test_toggle_moves_anchor() {
        let (mut store, mut sel, ids) = setup(3);
        sel.select(&mut store, ids[0], false, false).unwrap();
        sel.select(&mut store, ids[2], false, true).unwrap();
        assert_eq!(selected(&store), vec![true, false, true]);
        assert_eq!(sel.anchor(), Some(ids[2]));

        sel.select(&mut store, ids[2], false, true).unwrap();
        assert_eq!(selected(&store), vec![true, false, false]);
    }

    #[test]
    fn test_paint_never_alternates() {
        let (mut store, mut sel, ids) = setup(5);
        sel.select(&mut store, ids[1], false, false).unwrap();
        sel.select(&mut store, ids[3], false, true).unwrap();
        // mixed state: [f, t, f, t, f]

        let value = sel.paint_select(&mut store, ids[0], ids[4]).unwrap();
        assert!(value);
        assert_eq!(selected(&store), vec![true; 5]);
        assert!(!sel.paint().active);

        // starting on a selected item deselects the whole path
        let value = sel.paint_select(&mut store, ids[3], ids[1]).unwrap();
        assert!(!value);
        assert_eq!(selected(&store), vec![true, false, false, false, true]);
        assert_eq!(sel.anchor(), Some(ids[1]));
    }

    #[test]
    fn test_paint_select_walks_in_drag_order() {
        let (mut store, mut sel, ids) = setup(4);
        sel.deselect_all(&mut store);

        sel.paint_select(&mut store, ids[1], ids[3]).unwrap();
        assert_eq!(selected(&store), vec![false, true, true, true]);
        assert_eq!(sel.anchor(), Some(ids[3]));

        // a drag that never leaves its first item
        assert!(sel.paint_select(&mut store, ids[0], ids[0]).unwrap());
        assert_eq!(selected(&store), vec![true; 4]);
        assert_eq!(sel.anchor(), Some(ids[0]));
    }

    #[test]
    fn test_paint_gesture_steps() {
        let (mut store, mut sel, ids) = setup(3);
        sel.deselect_all(&mut store);

        sel.paint_over(&mut store, ids[0]).unwrap();
        assert_eq!(selected(&store), vec![false; 3], "no gesture, no effect");

        assert!(sel.begin_paint(&mut store, ids[2]).unwrap());
        sel.paint_over(&mut store, ids[0]).unwrap();
        sel.paint_over(&mut store, ids[0]).unwrap();
        sel.end_paint();
        assert_eq!(selected(&store), vec![true, false, true]);
    }

    #[test]
    fn test_range_select_forces_value() {
        let (mut store, mut sel, ids) = setup(5);
        sel.select(&mut store, ids[1], false, false).unwrap();
        sel.range_select(&mut store, ids[3], true).unwrap();
        assert_eq!(selected(&store), vec![false, true, true, true, false]);
        assert_eq!(sel.anchor(), Some(ids[1]));

        sel.range_select(&mut store, ids[2], false).unwrap();
        assert_eq!(selected(&store), vec![false, false, false, true, false]);
    }

    #[test]
    fn test_range_select_falls_back_to_active() {
        let (mut store, mut sel, ids) = setup(3);
        sel.anchor = None;
        sel.active = Some(ids[0]);
        sel.deselect_all(&mut store);
        sel.range_select(&mut store, ids[1], true).unwrap();
        assert_eq!(selected(&store), vec![true, true, false]);
    }

    #[test]
    fn test_select_all_after_deselect_all() {
        let (mut store, mut sel, ids) = setup(4);
        sel.select(&mut store, ids[2], false, true).unwrap();
        sel.deselect_all(&mut store);
        assert_eq!(selected(&store), vec![false; 4]);
        sel.select_all(&mut store);
        assert_eq!(selected(&store), vec![true; 4]);
    }

    #[test]
    fn test_removal_reassigns_anchor() {
        let (mut store, mut sel, ids) = setup(3);
        sel.select(&mut store, ids[2], false, false).unwrap();

        let (index, _) = store.remove(ids[2]).unwrap();
        sel.on_removed(&store, ids[2], index);
        assert_eq!(sel.anchor(), Some(ids[1]));
        assert_eq!(sel.active(), Some(ids[1]));

        let (index, _) = store.remove(ids[0]).unwrap();
        sel.on_removed(&store, ids[0], index);
        assert_eq!(sel.anchor(), Some(ids[1]), "unrelated removal keeps anchor");

        let (index, _) = store.remove(ids[1]).unwrap();
        sel.on_removed(&store, ids[1], index);
        assert_eq!(sel.anchor(), None);
        assert_eq!(sel.active(), None);
    }

    #[test]
    fn test_unknown_item() {
        let (mut store, mut sel, _) = setup(2);
        let err = sel.select(&mut store, ItemId(999), false, false).unwrap_err();
        assert!(matches!(err, DecayError::UnknownItem(_)));
    }
}
