//! Component fields.
//!
//! A [`Field`] is one backing column of a pool seen through a [`SlotView`].
//! Clones and re-indexed fields share the column, so a write through any of
//! them is visible through every other field whose slots overlap.

use std::ops::{Add, Div, Mul, Sub};
use std::sync::Arc;

use glam::Vec2;
use parking_lot::RwLock;

use crate::component::Reindex;
use crate::error::{EcsError, EcsResult};
use crate::slots::{Key, SlotView};

/// Values that can be stored in a field.
pub trait FieldValue: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> FieldValue for T {}

/// Values that support element-wise arithmetic.
pub trait Element:
    FieldValue
    + Copy
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
{
}

impl<T> Element for T where
    T: FieldValue
        + Copy
        + Add<Output = T>
        + Sub<Output = T>
        + Mul<Output = T>
        + Div<Output = T>
{
}

/// Right-hand side of a write or in-place operation.
pub enum Operand<'a, T> {
    /// Broadcast to every position.
    Scalar(T),
    /// One value per position.
    Dense(&'a [T]),
    /// One value per position, read through another field.
    View(&'a Field<T>),
}

impl<'a, T> From<&'a [T]> for Operand<'a, T> {
    fn from(values: &'a [T]) -> Self {
        Operand::Dense(values)
    }
}

impl<'a, T> From<&'a Vec<T>> for Operand<'a, T> {
    fn from(values: &'a Vec<T>) -> Self {
        Operand::Dense(values)
    }
}

impl<'a, T, const N: usize> From<&'a [T; N]> for Operand<'a, T> {
    fn from(values: &'a [T; N]) -> Self {
        Operand::Dense(values)
    }
}

impl<'a, T> From<&'a Field<T>> for Operand<'a, T> {
    fn from(field: &'a Field<T>) -> Self {
        Operand::View(field)
    }
}

macro_rules! impl_scalar_operand {
    ($($ty:ty),+) => {
        $(
            impl<'a> From<$ty> for Operand<'a, $ty> {
                fn from(value: $ty) -> Self {
                    Operand::Scalar(value)
                }
            }
        )+
    };
}

impl_scalar_operand!(f32, f64, i32, u32, u64, bool, Vec2);

/// Element-wise arithmetic applied in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    fn name(self) -> &'static str {
        match self {
            ArithOp::Add => "in-place add",
            ArithOp::Sub => "in-place subtract",
            ArithOp::Mul => "in-place multiply",
            ArithOp::Div => "in-place divide",
        }
    }

    fn apply<T: Element>(self, lhs: T, rhs: T) -> T {
        match self {
            ArithOp::Add => lhs + rhs,
            ArithOp::Sub => lhs - rhs,
            ArithOp::Mul => lhs * rhs,
            ArithOp::Div => lhs / rhs,
        }
    }
}

/// A column of `T` seen through a slot view.
pub struct Field<T> {
    column: Arc<RwLock<Vec<T>>>,
    slots: SlotView,
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        Self {
            column: Arc::clone(&self.column),
            slots: self.slots.clone(),
        }
    }
}

impl<T: FieldValue> Field<T> {
    /// Allocate a column of `capacity` copies of `value`, viewed through `slots`.
    pub fn allocate_filled(capacity: usize, slots: &SlotView, value: T) -> Self {
        Self {
            column: Arc::new(RwLock::new(vec![value; capacity])),
            slots: slots.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &SlotView {
        &self.slots
    }

    /// Whether both fields are views of the same column.
    pub fn shares_column(&self, other: &Field<T>) -> bool {
        Arc::ptr_eq(&self.column, &other.column)
    }

    /// The same column through different slots.
    pub fn with_slots(&self, slots: &SlotView) -> Self {
        Self {
            column: Arc::clone(&self.column),
            slots: slots.clone(),
        }
    }

    /// A view of the positions selected by `key`. No data is copied.
    pub fn index(&self, key: &Key) -> EcsResult<Self> {
        Ok(self.with_slots(&self.slots.index(key)?))
    }

    pub fn get(&self, position: usize) -> EcsResult<T> {
        let slot = self.slot_at(position)?;
        Ok(self.column.read()[slot].clone())
    }

    pub fn set(&self, position: usize, value: T) -> EcsResult<()> {
        let slot = self.slot_at(position)?;
        self.column.write()[slot] = value;
        Ok(())
    }

    fn slot_at(&self, position: usize) -> EcsResult<usize> {
        self.slots
            .as_slice()
            .get(position)
            .map(|&slot| slot as usize)
            .ok_or(EcsError::IndexOutOfRange {
                index: position,
                len: self.len(),
            })
    }

    /// Copy the viewed values out, in view order.
    pub fn to_vec(&self) -> Vec<T> {
        let column = self.column.read();
        self.slots
            .as_slice()
            .iter()
            .map(|&slot| column[slot as usize].clone())
            .collect()
    }

    /// One flag per position: whether `predicate` holds for its value.
    pub fn mask(&self, predicate: impl Fn(&T) -> bool) -> Vec<bool> {
        let column = self.column.read();
        self.slots
            .as_slice()
            .iter()
            .map(|&slot| predicate(&column[slot as usize]))
            .collect()
    }

    /// Overwrite every viewed value.
    pub fn fill<'a>(&self, value: impl Into<Operand<'a, T>>) -> EcsResult<()> {
        let values = self.resolve(value.into(), "fill")?;
        let mut column = self.column.write();
        for (&slot, value) in self.slots.as_slice().iter().zip(values) {
            column[slot as usize] = value;
        }
        Ok(())
    }

    /// Overwrite the positions selected by `key`.
    pub fn assign<'a>(&self, key: &Key, value: impl Into<Operand<'a, T>>) -> EcsResult<()> {
        self.index(key)?.fill(value)
    }

    /// Rewrite every viewed value in place.
    pub fn map_in_place(&self, mut f: impl FnMut(&mut T)) {
        let mut column = self.column.write();
        for &slot in self.slots.as_slice() {
            f(&mut column[slot as usize]);
        }
    }

    /// Materialize an operand as one value per position of this view.
    ///
    /// A view over the same column is read in full before anything is
    /// written. Only the exact same view is refused.
    fn resolve(&self, operand: Operand<'_, T>, operation: &'static str) -> EcsResult<Vec<T>> {
        let len = self.len();
        let values = match operand {
            Operand::Scalar(value) => return Ok(vec![value; len]),
            Operand::Dense(values) => values.to_vec(),
            Operand::View(other) => {
                if self.shares_column(other) && self.slots.same_mapping(&other.slots) {
                    return Err(EcsError::Aliasing { operation });
                }
                other.to_vec()
            }
        };
        if values.len() != len {
            return Err(EcsError::LengthMismatch {
                expected: len,
                actual: values.len(),
            });
        }
        Ok(values)
    }
}

impl<T: Element> Field<T> {
    /// Apply `op` element-wise with `rhs`, writing into this view.
    ///
    /// Positions that repeat a slot apply the operation once per occurrence.
    pub fn apply<'a>(&self, op: ArithOp, rhs: impl Into<Operand<'a, T>>) -> EcsResult<()> {
        let values = self.resolve(rhs.into(), op.name())?;
        let mut column = self.column.write();
        for (&slot, value) in self.slots.as_slice().iter().zip(values) {
            let current = &mut column[slot as usize];
            *current = op.apply(*current, value);
        }
        Ok(())
    }

    pub fn add_assign<'a>(&self, rhs: impl Into<Operand<'a, T>>) -> EcsResult<()> {
        self.apply(ArithOp::Add, rhs)
    }

    pub fn sub_assign<'a>(&self, rhs: impl Into<Operand<'a, T>>) -> EcsResult<()> {
        self.apply(ArithOp::Sub, rhs)
    }

    pub fn mul_assign<'a>(&self, rhs: impl Into<Operand<'a, T>>) -> EcsResult<()> {
        self.apply(ArithOp::Mul, rhs)
    }

    pub fn div_assign<'a>(&self, rhs: impl Into<Operand<'a, T>>) -> EcsResult<()> {
        self.apply(ArithOp::Div, rhs)
    }

    /// Combine this view with `rhs` position by position into a new vector.
    pub fn zip_map<'a, U>(
        &self,
        rhs: impl Into<Operand<'a, T>>,
        f: impl Fn(T, T) -> U,
    ) -> EcsResult<Vec<U>> {
        let rhs = match rhs.into() {
            Operand::Scalar(value) => vec![value; self.len()],
            Operand::Dense(values) => values.to_vec(),
            Operand::View(other) => other.to_vec(),
        };
        if rhs.len() != self.len() {
            return Err(EcsError::LengthMismatch {
                expected: self.len(),
                actual: rhs.len(),
            });
        }
        Ok(self.to_vec().into_iter().zip(rhs).map(|(a, b)| f(a, b)).collect())
    }
}

impl Field<Vec2> {
    /// Length of every viewed vector.
    pub fn lengths(&self) -> Vec<f32> {
        self.to_vec().into_iter().map(Vec2::length).collect()
    }

    /// Multiply every viewed vector by `factor`.
    pub fn scale(&self, factor: f32) {
        self.map_in_place(|value| *value *= factor);
    }

    /// Clamp the length of every viewed vector to `[min, max]`.
    pub fn clamp_length(&self, min: f32, max: f32) {
        self.map_in_place(|value| *value = value.clamp_length(min, max));
    }
}

impl<T: FieldValue + Default> Reindex for Field<T> {
    fn allocate(capacity: usize, slots: &SlotView) -> Self {
        Self::allocate_filled(capacity, slots, T::default())
    }

    fn reindex(&self, slots: &SlotView) -> Self {
        self.with_slots(slots)
    }
}

impl<T: FieldValue + std::fmt::Debug> std::fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}
