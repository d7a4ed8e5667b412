//! # Item Store Module
//!
//! Collezione ordinata degli item del batch.
//!
//! ## Responsabilità:
//! - Ingestione con limite di capacità (ammissione parziale)
//! - Rimozione, riordino, svuotamento
//! - Lookup per id e per posizione
//!
//! L'ordine posizionale governa lo scheduling: lo scheduler prende sempre
//! il primo item pending incontrato, indipendentemente dall'ordine di
//! selezione.

use crate::codec::ImageBytes;
use crate::error::DecayError;
use crate::item::{BatchItem, ItemId};
use crate::settings::ProcessorSettings;
use tracing::warn;

/// Image handed over by the ingestion layer.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub name: String,
    pub bytes: ImageBytes,
    pub dimensions: Option<(u32, u32)>,
}

impl NewImage {
    pub fn new(name: impl Into<String>, bytes: impl Into<ImageBytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            dimensions: None,
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = Some((width, height));
        self
    }
}

/// Outcome of a (possibly partial) ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub added: Vec<ItemId>,
    /// Images dropped because the batch limit was reached.
    pub rejected: usize,
}

/// Ordered collection of batch items.
#[derive(Debug)]
pub struct ItemStore {
    items: Vec<BatchItem>,
    capacity: usize,
    next_id: u64,
}

impl ItemStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            capacity,
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[BatchItem] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut [BatchItem] {
        &mut self.items
    }

    pub fn get(&self, id: ItemId) -> Option<&BatchItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: ItemId) -> Option<&mut BatchItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    /// Admit as many images as fit; fails only if none fit.
    pub fn ingest(
        &mut self,
        images: Vec<NewImage>,
        settings: ProcessorSettings,
    ) -> Result<IngestReport, DecayError> {
        if images.is_empty() {
            return Ok(IngestReport::default());
        }

        let room = self.capacity.saturating_sub(self.items.len());
        if room == 0 {
            return Err(DecayError::CapacityExceeded {
                limit: self.capacity,
            });
        }

        let rejected = images.len().saturating_sub(room);
        if rejected > 0 {
            warn!(
                "Only {} images added due to {} file limit ({} dropped)",
                room, self.capacity, rejected
            );
        }

        let mut added = Vec::with_capacity(images.len().min(room));
        for image in images.into_iter().take(room) {
            let id = ItemId(self.next_id);
            self.next_id += 1;
            self.items
                .push(BatchItem::new(id, image.name, image.bytes, image.dimensions, settings));
            added.push(id);
        }

        Ok(IngestReport { added, rejected })
    }

    /// Remove an item, returning it with its former position.
    pub fn remove(&mut self, id: ItemId) -> Result<(usize, BatchItem), DecayError> {
        let index = self.position(id).ok_or(DecayError::UnknownItem(id))?;
        Ok((index, self.items.remove(index)))
    }

    /// Move the item at `from` to `to`.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), DecayError> {
        let len = self.items.len();
        if from >= len || to >= len {
            return Err(DecayError::InvalidReorder { from, to, len });
        }
        let item = self.items.remove(from);
        self.items.insert(to, item);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Id of the item adjacent to `index` once it is gone: next, else previous.
    pub(crate) fn neighbour_of_removed(&self, index: usize) -> Option<ItemId> {
        self.items
            .get(index)
            .or_else(|| index.checked_sub(1).and_then(|i| self.items.get(i)))
            .map(|item| item.id)
    }

    /// Inclusive positional range between two ids, in either order.
    pub(crate) fn span(&self, a: ItemId, b: ItemId) -> Option<(usize, usize)> {
        let start = self.position(a)?;
        let end = self.position(b)?;
        Some((start.min(end), start.max(end)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn images(n: usize) -> Vec<NewImage> {
        (0..n)
            .map(|i| NewImage::new(format!("img-{}.png", i), vec![i as u8]))
            .collect()
    }

    #[test]
    fn test_ingest_assigns_unique_ids() {
        let mut store = ItemStore::new(10);
        let report = store.ingest(images(3), ProcessorSettings::default()).unwrap();
        assert_eq!(report.added.len(), 3);
        assert_eq!(report.rejected, 0);

        let more = store.ingest(images(2), ProcessorSettings::default()).unwrap();
        let all: std::collections::HashSet<_> =
            report.added.iter().chain(more.added.iter()).collect();
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn test_ingest_partial_admission() {
        let mut store = ItemStore::new(4);
        store.ingest(images(3), ProcessorSettings::default()).unwrap();
        let report = store.ingest(images(3), ProcessorSettings::default()).unwrap();
        assert_eq!(report.added.len(), 1);
        assert_eq!(report.rejected, 2);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_ingest_when_full_fails() {
        let mut store = ItemStore::new(2);
        store.ingest(images(2), ProcessorSettings::default()).unwrap();
        let err = store.ingest(images(1), ProcessorSettings::default()).unwrap_err();
        assert!(matches!(err, DecayError::CapacityExceeded { limit: 2 }));
    }

    #[test]
    fn test_reorder() {
        let mut store = ItemStore::new(10);
        let ids = store.ingest(images(3), ProcessorSettings::default()).unwrap().added;
        store.reorder(0, 2).unwrap();
        let order: Vec<_> = store.items().iter().map(|i| i.id).collect();
        assert_eq!(order, vec![ids[1], ids[2], ids[0]]);

        assert!(matches!(
            store.reorder(0, 3),
            Err(DecayError::InvalidReorder { len: 3, .. })
        ));
    }

    #[test]
    fn test_remove_and_neighbour() {
        let mut store = ItemStore::new(10);
        let ids = store.ingest(images(3), ProcessorSettings::default()).unwrap().added;

        let (index, removed) = store.remove(ids[1]).unwrap();
        assert_eq!(removed.id, ids[1]);
        assert_eq!(store.neighbour_of_removed(index), Some(ids[2]));

        let (index, _) = store.remove(ids[2]).unwrap();
        assert_eq!(store.neighbour_of_removed(index), Some(ids[0]));

        let (index, _) = store.remove(ids[0]).unwrap();
        assert_eq!(store.neighbour_of_removed(index), None);

        assert!(matches!(store.remove(ids[0]), Err(DecayError::UnknownItem(_))));
    }

    #[test]
    fn test_span_is_order_independent() {
        let mut store = ItemStore::new(10);
        let ids = store.ingest(images(5), ProcessorSettings::default()).unwrap().added;
        assert_eq!(store.span(ids[3], ids[1]), Some((1, 3)));
        assert_eq!(store.span(ids[1], ids[3]), Some((1, 3)));
    }
}
