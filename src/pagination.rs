//! Fixed-capacity chunking for printing onto sheets with a fixed slot grid.

use std::num::NonZeroUsize;

use derive_setters::Setters;

/// Physical label sheet: a grid of `rows` x `columns` labels.
#[derive(Debug, Clone, Copy, PartialEq, Setters)]
pub struct SheetLayout {
    pub rows: NonZeroUsize,
    pub columns: NonZeroUsize,
    pub label_width_mm: f32,
    pub label_height_mm: f32,
    pub margin_x_mm: f32,
    pub margin_y_mm: f32,
}

impl SheetLayout {
    /// Tomy 130 sheets, 101x47mm labels, 2 columns by 6 rows on A4.
    pub const TOMY_130: SheetLayout = SheetLayout {
        rows: NonZeroUsize::new(6).unwrap(),
        columns: NonZeroUsize::new(2).unwrap(),
        label_width_mm: 101.0,
        label_height_mm: 47.0,
        margin_x_mm: 4.0,
        margin_y_mm: 7.5,
    };

    pub fn capacity(&self) -> NonZeroUsize {
        self.rows.saturating_mul(self.columns)
    }
}

impl Default for SheetLayout {
    fn default() -> Self {
        SheetLayout::TOMY_130
    }
}

/// An entity placed on a page, with its 1-based position in the whole run.
#[derive(Debug, PartialEq)]
pub struct Placed<'a, T> {
    pub position: usize,
    pub total: usize,
    pub entity: &'a T,
}

#[derive(Debug)]
pub struct Page<'a, T> {
    pub number: usize,
    capacity: NonZeroUsize,
    entries: Vec<Placed<'a, T>>,
}

impl<'a, T> Page<'a, T> {
    pub fn entries(&self) -> &[Placed<'a, T>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    /// Exactly `capacity` slots, `None` for the padding after the last entry.
    pub fn slots(&self) -> impl Iterator<Item = Option<&Placed<'a, T>>> {
        (0..self.capacity.get()).map(|i| self.entries.get(i))
    }
}

/// Split `entities` into pages of `capacity`. Order is kept as is and an
/// empty input still yields one empty page.
pub fn paginate<T>(entities: &[T], capacity: NonZeroUsize) -> Vec<Page<'_, T>> {
    let total = entities.len();
    let mut pages: Vec<Page<T>> = entities
        .chunks(capacity.get())
        .enumerate()
        .map(|(pidx, chunk)| Page {
            number: pidx + 1,
            capacity,
            entries: chunk
                .iter()
                .enumerate()
                .map(|(i, entity)| Placed {
                    position: pidx * capacity.get() + i + 1,
                    total,
                    entity,
                })
                .collect(),
        })
        .collect();

    if pages.is_empty() {
        pages.push(Page {
            number: 1,
            capacity,
            entries: Vec::new(),
        });
    }
    pages
}
