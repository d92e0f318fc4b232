//! Row-major scalar grids shared by every pipeline stage.
//!
//! A [`Grid`] owns its samples exclusively. Stages never mutate their
//! input; each one allocates a fresh grid of the same shape, so index
//! `(x, y)` refers to the same pixel across every intermediate.
//!
//! Neighbor lookups are boundary-aware: [`Grid::offset`] returns `None`
//! outside the grid, and [`Grid::zero_padded`] treats everything outside
//! as `T::default()` (zero for numeric samples). Convolution stages use
//! the latter; comparison stages use the former.

use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, PipelineError};

/// A fixed-size 2D grid of samples stored row by row.
///
/// `data.len() == width * height` holds for every grid. Deserialization
/// goes through [`Grid::new`], so a serialized grid must also be
/// non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawGrid<T>")]
pub struct Grid<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

/// Unchecked wire form of [`Grid`].
#[derive(Deserialize)]
struct RawGrid<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T> TryFrom<RawGrid<T>> for Grid<T> {
    type Error = PipelineError;

    fn try_from(raw: RawGrid<T>) -> Result<Self, Self::Error> {
        Self::new(raw.width, raw.height, raw.data)
    }
}

impl<T> Grid<T> {
    /// Wrap an existing row-major buffer.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] if either dimension is zero
    /// or `data.len() != width * height`.
    pub fn new(width: usize, height: usize, data: Vec<T>) -> Result<Self, PipelineError> {
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidInput(format!(
                "grid must be non-empty, got {width}x{height}"
            )));
        }
        let expected = width.checked_mul(height).ok_or_else(|| {
            PipelineError::InvalidInput(format!("grid size {width}x{height} overflows"))
        })?;
        if data.len() != expected {
            return Err(PipelineError::InvalidInput(format!(
                "expected {expected} samples for {width}x{height}, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build a grid by evaluating `f(x, y)` for every pixel.
    ///
    /// A zero dimension yields an empty grid, which
    /// [`Pipeline::new`](crate::Pipeline::new) rejects.
    ///
    /// # Panics
    ///
    /// Panics if `width * height` samples cannot be allocated.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(width.saturating_mul(height));
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Width and height together.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// `true` when the grid holds no samples.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of pixels (`width * height`).
    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` if `other` has identical width and height.
    #[must_use]
    pub const fn same_shape<U>(&self, other: &Grid<U>) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Samples in row-major order.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Consume the grid and return its row-major buffer.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Iterate over samples in row-major order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    /// Iterate over `(x, y, &sample)` in row-major order.
    pub fn enumerate(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        let width = self.width;
        self.data
            .iter()
            .enumerate()
            .map(move |(i, v)| (i % width, i / width, v))
    }

    /// Apply `f` to every sample, producing a grid of the same shape.
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Grid<U> {
        Grid {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(f).collect(),
        }
    }

    /// Row-major index of `(x, y)`, or `None` when outside the grid.
    #[must_use]
    pub const fn index_of(&self, x: usize, y: usize) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y * self.width + x)
        } else {
            None
        }
    }

    pub(crate) fn set(&mut self, x: usize, y: usize, value: T) {
        if let Some(slot) = self.index_of(x, y).and_then(|i| self.data.get_mut(i)) {
            *slot = value;
        }
    }
}

impl<T: Copy> Grid<T> {
    /// A grid with every sample set to `value`.
    ///
    /// A zero dimension yields an empty grid, which
    /// [`Pipeline::new`](crate::Pipeline::new) rejects.
    ///
    /// # Panics
    ///
    /// Panics if `width * height` samples cannot be allocated.
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width.saturating_mul(height)],
        }
    }

    /// Sample at `(x, y)`, or `None` when outside the grid.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Option<T> {
        self.index_of(x, y).and_then(|i| self.data.get(i).copied())
    }

    /// Sample at `(x + dx, y + dy)`, or `None` when that lands outside.
    #[must_use]
    pub fn offset(&self, x: usize, y: usize, dx: isize, dy: isize) -> Option<T> {
        let nx = x.checked_add_signed(dx)?;
        let ny = y.checked_add_signed(dy)?;
        self.get(nx, ny)
    }
}

impl<T: Copy + Default> Grid<T> {
    /// Sample at signed coordinates, reading `T::default()` outside.
    #[must_use]
    pub fn zero_padded(&self, x: isize, y: isize) -> T {
        match (usize::try_from(x), usize::try_from(y)) {
            (Ok(x), Ok(y)) => self.get(x, y).unwrap_or_default(),
            _ => T::default(),
        }
    }
}

impl<T> Index<(usize, usize)> for Grid<T> {
    type Output = T;

    /// Panics when `(x, y)` is outside the grid.
    fn index(&self, (x, y): (usize, usize)) -> &T {
        assert!(
            x < self.width && y < self.height,
            "({x}, {y}) outside {}x{} grid",
            self.width,
            self.height
        );
        &self.data[y * self.width + x]
    }
}

/// The 8-connected neighbor offsets, clockwise from the upper-left.
pub const NEIGHBORS_8: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
];
