//! Feature items, labeled batches, and chunk partitioning.
//!
//! A sparse item names only its non-zero features. Structural checks
//! (matching lengths, unique indices, finite values) happen at construction;
//! the feature-count check needs the model and happens in [`Item::validate`].

use std::borrow::Cow;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::DimensionError;

/// Sparse feature vector as parallel (index, value) lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSparseItem")]
pub struct SparseItem {
    indices: Vec<usize>,
    values: Vec<f64>,
}

#[derive(Deserialize)]
struct RawSparseItem {
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl TryFrom<RawSparseItem> for SparseItem {
    type Error = DimensionError;

    fn try_from(raw: RawSparseItem) -> Result<Self, Self::Error> {
        SparseItem::new(raw.indices, raw.values)
    }
}

impl SparseItem {
    pub fn new(indices: Vec<usize>, values: Vec<f64>) -> Result<Self, DimensionError> {
        if indices.len() != values.len() {
            return Err(DimensionError::LengthMismatch {
                indices: indices.len(),
                values: values.len(),
            });
        }
        let mut seen = HashSet::with_capacity(indices.len());
        for &index in &indices {
            if !seen.insert(index) {
                return Err(DimensionError::DuplicateIndex { index });
            }
        }
        if let Some(position) = values.iter().position(|v| !v.is_finite()) {
            return Err(DimensionError::NonFiniteValue { position });
        }
        Ok(Self { indices, values })
    }

    /// Drop every entry equal to `value_to_ignore`, keeping the rest with
    /// their positions as indices.
    pub fn from_dense(values: &[f64], value_to_ignore: f64) -> Self {
        let (indices, values) = values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != value_to_ignore)
            .map(|(i, v)| (i, *v))
            .unzip();
        Self { indices, values }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn validate(&self, feature_count: usize) -> Result<(), DimensionError> {
        if let Some(&index) = self.indices.iter().find(|i| **i >= feature_count) {
            return Err(DimensionError::IndexOutOfRange {
                index,
                feature_count,
            });
        }
        if let Some(position) = self.values.iter().position(|v| !v.is_finite()) {
            return Err(DimensionError::NonFiniteValue { position });
        }
        Ok(())
    }
}

/// One feature vector, dense or sparse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Item {
    Dense(Vec<f64>),
    Sparse(SparseItem),
}

/// Borrowed (indices, values) view shared by both item shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureView<'a> {
    pub indices: Cow<'a, [usize]>,
    pub values: &'a [f64],
}

impl Item {
    pub fn dense(values: Vec<f64>) -> Self {
        Item::Dense(values)
    }

    pub fn sparse(indices: Vec<usize>, values: Vec<f64>) -> Result<Self, DimensionError> {
        SparseItem::new(indices, values).map(Item::Sparse)
    }

    pub fn validate(&self, feature_count: usize) -> Result<(), DimensionError> {
        match self {
            Item::Dense(values) => {
                if values.len() != feature_count {
                    return Err(DimensionError::DenseLengthMismatch {
                        expected: feature_count,
                        actual: values.len(),
                    });
                }
                if let Some(position) = values.iter().position(|v| !v.is_finite()) {
                    return Err(DimensionError::NonFiniteValue { position });
                }
                Ok(())
            }
            Item::Sparse(sparse) => sparse.validate(feature_count),
        }
    }

    /// Dense items list every position.
    pub fn features(&self) -> FeatureView<'_> {
        match self {
            Item::Dense(values) => FeatureView {
                indices: Cow::Owned((0..values.len()).collect()),
                values,
            },
            Item::Sparse(sparse) => FeatureView {
                indices: Cow::Borrowed(&sparse.indices),
                values: &sparse.values,
            },
        }
    }
}

impl From<SparseItem> for Item {
    fn from(sparse: SparseItem) -> Self {
        Item::Sparse(sparse)
    }
}

/// An item with its class label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledItem {
    pub item: Item,
    pub label: usize,
}

impl LabeledItem {
    pub fn new(item: impl Into<Item>, label: usize) -> Self {
        Self {
            item: item.into(),
            label,
        }
    }
}

/// Ordered collection of labeled items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    items: Vec<LabeledItem>,
}

impl Batch {
    pub fn new(items: Vec<LabeledItem>) -> Self {
        Self { items }
    }

    /// Flatten per-class item lists; the position of each list is its label.
    pub fn from_class_groups(groups: Vec<Vec<Item>>) -> Self {
        let items = groups
            .into_iter()
            .enumerate()
            .flat_map(|(label, items)| items.into_iter().map(move |item| LabeledItem { item, label }))
            .collect();
        Self { items }
    }

    pub fn push(&mut self, item: LabeledItem) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[LabeledItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items per class; labels at or beyond `class_count` are not counted.
    pub fn class_counts(&self, class_count: usize) -> Vec<usize> {
        let mut counts = vec![0; class_count];
        for labeled in &self.items {
            if let Some(count) = counts.get_mut(labeled.label) {
                *count += 1;
            }
        }
        counts
    }

    /// Check every item and label; returns the position of the first failure.
    pub fn validate(
        &self,
        class_count: usize,
        feature_count: usize,
    ) -> Result<(), (usize, DimensionError)> {
        for (position, labeled) in self.items.iter().enumerate() {
            if labeled.label >= class_count {
                return Err((
                    position,
                    DimensionError::LabelOutOfRange {
                        label: labeled.label,
                        class_count,
                    },
                ));
            }
            labeled
                .item
                .validate(feature_count)
                .map_err(|e| (position, e))?;
        }
        Ok(())
    }

    /// Split into consecutive chunks of at most `max_items`, indexed from 0.
    /// `max_items == 0` keeps the whole batch in one chunk.
    pub fn into_chunks(self, max_items: usize) -> Vec<Chunk> {
        if self.items.is_empty() {
            return Vec::new();
        }
        if max_items == 0 {
            return vec![Chunk {
                index: 0,
                batch: self,
            }];
        }
        let mut chunks = Vec::with_capacity(self.items.len().div_ceil(max_items));
        let mut items = self.items.into_iter().peekable();
        while items.peek().is_some() {
            let batch = Batch::new(items.by_ref().take(max_items).collect());
            chunks.push(Chunk {
                index: chunks.len(),
                batch,
            });
        }
        chunks
    }
}

impl FromIterator<LabeledItem> for Batch {
    fn from_iter<T: IntoIterator<Item = LabeledItem>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// A batch with a stable identity for chunked training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub batch: Batch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_rejects_length_mismatch() {
        assert_eq!(
            SparseItem::new(vec![0, 1], vec![1.0]),
            Err(DimensionError::LengthMismatch {
                indices: 2,
                values: 1
            })
        );
    }

    #[test]
    fn sparse_rejects_duplicates_and_nan() {
        assert_eq!(
            SparseItem::new(vec![2, 2], vec![1.0, 2.0]),
            Err(DimensionError::DuplicateIndex { index: 2 })
        );
        assert_eq!(
            SparseItem::new(vec![0, 1], vec![1.0, f64::NAN]),
            Err(DimensionError::NonFiniteValue { position: 1 })
        );
    }

    #[test]
    fn sparse_validate_checks_range() {
        let item = SparseItem::new(vec![0, 4], vec![1.0, 2.0]).unwrap();
        assert!(item.validate(5).is_ok());
        assert_eq!(
            item.validate(4),
            Err(DimensionError::IndexOutOfRange {
                index: 4,
                feature_count: 4
            })
        );
    }

    #[test]
    fn from_dense_drops_ignored_value() {
        let item = SparseItem::from_dense(&[0.0, 1.5, 0.0, -2.0], 0.0);
        assert_eq!(item.indices(), &[1, 3]);
        assert_eq!(item.values(), &[1.5, -2.0]);
    }

    #[test]
    fn dense_validate_checks_length() {
        let item = Item::dense(vec![1.0, 2.0]);
        assert_eq!(
            item.validate(3),
            Err(DimensionError::DenseLengthMismatch {
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn dense_features_list_all_positions() {
        let item = Item::dense(vec![1.0, 0.0, 3.0]);
        let view = item.features();
        assert_eq!(view.indices.as_ref(), &[0, 1, 2]);
        assert_eq!(view.values, &[1.0, 0.0, 3.0]);
    }

    #[test]
    fn batch_from_class_groups_labels_by_position() {
        let batch = Batch::from_class_groups(vec![
            vec![Item::dense(vec![1.0])],
            vec![Item::dense(vec![2.0]), Item::dense(vec![3.0])],
        ]);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.class_counts(3), vec![1, 2, 0]);
        assert_eq!(batch.items()[2].label, 1);
    }

    #[test]
    fn batch_validate_reports_position() {
        let batch = Batch::new(vec![
            LabeledItem::new(Item::dense(vec![1.0]), 0),
            LabeledItem::new(Item::dense(vec![1.0]), 5),
        ]);
        let (position, err) = batch.validate(2, 1).unwrap_err();
        assert_eq!(position, 1);
        assert_eq!(
            err,
            DimensionError::LabelOutOfRange {
                label: 5,
                class_count: 2
            }
        );
    }

    #[test]
    fn into_chunks_partitions_in_order() {
        let batch: Batch = (0..7)
            .map(|i| LabeledItem::new(Item::dense(vec![i as f64]), i % 2))
            .collect();
        let chunks = batch.into_chunks(3);
        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| c.batch.len()).collect::<Vec<_>>(),
            vec![3, 3, 1]
        );
        assert_eq!(chunks[2].index, 2);
        assert_eq!(chunks[1].batch.items()[0].item, Item::dense(vec![3.0]));
    }

    #[test]
    fn into_chunks_edge_cases() {
        assert!(Batch::default().into_chunks(4).is_empty());
        let batch: Batch = (0..5)
            .map(|_| LabeledItem::new(Item::dense(vec![1.0]), 0))
            .collect();
        assert_eq!(batch.into_chunks(0).len(), 1);
    }

    #[test]
    fn sparse_item_deserialization_validates() {
        let ok: SparseItem = serde_json::from_str(r#"{"indices":[0,3],"values":[1.0,2.0]}"#).unwrap();
        assert_eq!(ok.len(), 2);
        let dup = serde_json::from_str::<SparseItem>(r#"{"indices":[1,1],"values":[1.0,2.0]}"#);
        assert!(dup.is_err());
    }
}
