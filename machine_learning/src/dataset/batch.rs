use std::borrow::Cow;

use ndarray::{ArrayView2, CowArray, Ix2};

/// A mini batch of samples, either borrowed from a `Dataset` or gathered from it.
#[derive(Clone, Debug)]
pub struct Batch<'a> {
    pub x: CowArray<'a, f32, Ix2>,
    pub y: Cow<'a, [usize]>,
}

impl<'a> Batch<'a> {
    pub fn borrowed(x: ArrayView2<'a, f32>, y: &'a [usize]) -> Self {
        Self {
            x: CowArray::from(x),
            y: Cow::Borrowed(y),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.y.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}
