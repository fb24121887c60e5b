use std::collections::HashSet;

use anyhow::bail;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::item::{BoardItem, ItemKind};

/// Ordered collection of placed items. Insertion order is render (z) order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<BoardItem>", into = "Vec<BoardItem>")]
pub struct Board {
    items: IndexMap<String, BoardItem>,
}

impl From<Vec<BoardItem>> for Board {
    fn from(items: Vec<BoardItem>) -> Self {
        let mut board = Self::default();
        board.replace_all(items);
        board
    }
}

impl From<Board> for Vec<BoardItem> {
    fn from(board: Board) -> Self {
        board.items.into_values().collect()
    }
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&BoardItem> {
        self.items.get(id)
    }

    pub fn items(&self) -> impl Iterator<Item = &BoardItem> {
        self.items.values()
    }

    pub fn of_kind(&self, kind: ItemKind) -> impl Iterator<Item = &BoardItem> {
        self.items.values().filter(move |item| item.kind == kind)
    }

    pub fn append(&mut self, item: BoardItem) -> anyhow::Result<()> {
        if self.items.contains_key(&item.id) {
            bail!("Board already contains an item with id '{}'.", item.id);
        }
        self.items.insert(item.id.clone(), item);
        Ok(())
    }

    /// Appends every item or none of them.
    pub fn append_many(&mut self, items: Vec<BoardItem>) -> anyhow::Result<()> {
        let mut incoming = HashSet::with_capacity(items.len());
        for item in &items {
            if self.items.contains_key(&item.id) || !incoming.insert(item.id.as_str()) {
                bail!("Board already contains an item with id '{}'.", item.id);
            }
        }
        for item in items {
            self.items.insert(item.id.clone(), item);
        }
        Ok(())
    }

    /// Swaps in a whole new board. Later duplicates of an id win.
    pub fn replace_all(&mut self, items: Vec<BoardItem>) {
        self.items = items
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect();
    }

    pub fn remove(&mut self, id: &str) -> Option<BoardItem> {
        self.items.shift_remove(id)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::Board;
    use crate::board::{BoardItem, ItemKind, Point};

    fn item(id: &str, kind: ItemKind) -> BoardItem {
        BoardItem::with_id(id, kind, id, Point::default())
    }

    #[test]
    fn append_keeps_insertion_order() -> anyhow::Result<()> {
        let mut board = Board::new();
        board.append(item("b", ItemKind::Color))?;
        board.append(item("a", ItemKind::Motif))?;
        let ids: Vec<&str> = board.items().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        Ok(())
    }

    #[test]
    fn append_rejects_duplicate_id() -> anyhow::Result<()> {
        let mut board = Board::new();
        board.append(item("a", ItemKind::Color))?;
        assert!(board.append(item("a", ItemKind::Motif)).is_err());
        assert_eq!(board.get("a").map(|item| item.kind), Some(ItemKind::Color));
        Ok(())
    }

    #[test]
    fn append_many_is_all_or_nothing() -> anyhow::Result<()> {
        let mut board = Board::new();
        board.append(item("taken", ItemKind::Color))?;

        let clash = board.append_many(vec![
            item("img-1", ItemKind::Image),
            item("taken", ItemKind::Image),
        ]);
        assert!(clash.is_err());
        assert_eq!(board.len(), 1);

        let dup_in_batch = board.append_many(vec![
            item("img-1", ItemKind::Image),
            item("img-1", ItemKind::Image),
        ]);
        assert!(dup_in_batch.is_err());
        assert_eq!(board.len(), 1);

        board.append_many(vec![
            item("img-1", ItemKind::Image),
            item("img-2", ItemKind::Image),
        ])?;
        assert_eq!(board.of_kind(ItemKind::Image).count(), 2);
        Ok(())
    }

    #[test]
    fn remove_preserves_order_of_the_rest() -> anyhow::Result<()> {
        let mut board = Board::new();
        for id in ["a", "b", "c"] {
            board.append(item(id, ItemKind::Ceremony))?;
        }
        assert_eq!(board.remove("b").map(|item| item.id), Some("b".to_string()));
        assert!(board.remove("b").is_none());
        let ids: Vec<&str> = board.items().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        Ok(())
    }

    #[test]
    fn replace_all_and_clear() {
        let mut board = Board::from(vec![item("a", ItemKind::Color)]);
        board.replace_all(vec![item("x", ItemKind::Theme), item("y", ItemKind::Theme)]);
        assert_eq!(board.len(), 2);
        assert!(board.get("a").is_none());
        board.clear();
        assert!(board.is_empty());
    }

    #[test]
    fn board_round_trips_as_a_json_array() -> anyhow::Result<()> {
        let board = Board::from(vec![item("a", ItemKind::Color), item("b", ItemKind::Image)]);
        let value = serde_json::to_value(&board)?;
        assert!(value.is_array());
        let back: Board = serde_json::from_value(value)?;
        assert_eq!(back, board);
        Ok(())
    }
}
