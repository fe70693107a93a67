//! Rendering Hooks
//!
//! The board does not draw anything; it walks the layout and asks a
//! `CardRenderer` for each card and column label.

use serde::Serialize;

use crate::domain::{ColumnId, Item};
use crate::layout::Layout;

/// Host-provided rendering callbacks
pub trait CardRenderer {
    type Visual: From<String>;

    fn render_card(&self, item: &Item) -> Self::Visual;

    /// Defaults to `"{column} ({count})"`
    fn render_column_label(&self, column: &ColumnId, count: usize) -> Self::Visual {
        format!("{} ({})", column, count).into()
    }
}

/// One rendered column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnView<V> {
    pub column: ColumnId,
    pub label: V,
    pub cards: Vec<V>,
    /// Column is empty and shows its drop placeholder
    pub placeholder: bool,
}

/// Render every column of `layout` in display order
pub fn render_layout<C: CardRenderer>(layout: &Layout, renderer: &C) -> Vec<ColumnView<C::Visual>> {
    layout
        .column_ids()
        .iter()
        .map(|column| {
            let items = layout.items(column);
            ColumnView {
                column: column.clone(),
                label: renderer.render_column_label(column, items.len()),
                cards: items.iter().map(|item| renderer.render_card(item)).collect(),
                placeholder: items.is_empty(),
            }
        })
        .collect()
}
