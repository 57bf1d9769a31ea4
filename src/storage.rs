// The owning/borrowing storage split used by `partition`, `graph`, and
// `cell_storage`. The original algorithm parameterizes its containers on a
// "shared memory or not" template flag; in Rust that is naturally a sum type
// behind a `Deref<Target = [T]>` impl rather than a generic parameter on
// every method. Construction (the write side) is only ever defined for the
// `Owned` variant, matching the design note that borrowed/mmap'd data is
// always read-only.

use std::ops::Deref;

#[derive(Debug)]
pub enum Backing<'a, T> {
    Owned(Vec<T>),
    Borrowed(&'a [T]),
}

impl<'a, T> Backing<'a, T> {
    pub fn len(&self) -> usize {
        match self {
            Backing::Owned(v) => v.len(),
            Backing::Borrowed(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            Backing::Owned(v) => v.as_slice(),
            Backing::Borrowed(s) => s,
        }
    }
}

impl<T: Clone> Backing<'_, T> {
    pub fn to_owned_backing(&self) -> Backing<'static, T> {
        Backing::Owned(self.as_slice().to_vec())
    }
}

impl<'a, T> Deref for Backing<'a, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<'a, T> From<Vec<T>> for Backing<'a, T> {
    fn from(v: Vec<T>) -> Self {
        Backing::Owned(v)
    }
}

impl<'a, T> From<&'a [T]> for Backing<'a, T> {
    fn from(s: &'a [T]) -> Self {
        Backing::Borrowed(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owned_and_borrowed_deref_identically() {
        let data = vec![1u32, 2, 3];
        let owned: Backing<u32> = Backing::Owned(data.clone());
        let borrowed: Backing<u32> = Backing::Borrowed(&data);
        assert_eq!(&*owned, &*borrowed);
        assert_eq!(owned.len(), 3);
        assert!(!borrowed.is_empty());
    }
}
