//! Collection literal shape: ordered single/spread item rows.

use serde::{Deserialize, Serialize};

use crate::{
    graph::Socket,
    types::{SlotType, TypeSet},
};

/// One element row of a collection literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionItem {
    /// A plain element.
    Single,
    /// A spread element (`...expr`); accepts any iterable value.
    Spread,
}

/// The ordered item descriptors of a collection literal. An empty list
/// renders as `[]` and lays out a single placeholder marker row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CollectionState {
    pub items: Vec<CollectionItem>,
}

impl CollectionState {
    pub fn singles(count: usize) -> CollectionState {
        CollectionState {
            items: vec![CollectionItem::Single; count],
        }
    }

    pub fn of(items: Vec<CollectionItem>) -> CollectionState {
        CollectionState { items }
    }

    pub(crate) fn dynamic_sockets(&self) -> Vec<Socket> {
        if self.items.is_empty() {
            return vec![Socket::marker("EMPTY")];
        }
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                CollectionItem::Single => Socket::value(format!("ITEM{i}"), TypeSet::Anything),
                CollectionItem::Spread => Socket::value(
                    format!("ITEM{i}"),
                    TypeSet::of(&[SlotType::Array, SlotType::String, SlotType::Iterable]),
                ),
            })
            .collect()
    }
}
