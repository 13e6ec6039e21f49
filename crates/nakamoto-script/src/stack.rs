use crate::num::{NumError, ScriptNum};
use std::ops::Deref;

/// Stack error type.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum StackError {
    #[error("invalid stack operation")]
    InvalidOperation,
    #[error(transparent)]
    Num(#[from] NumError),
}

/// Data stack of the script machine.
pub type Stack = GenericStack<Vec<u8>>;

type Result<T> = std::result::Result<T, StackError>;

/// A stack with the checked primitives the opcodes are built from.
///
/// Every accessor addresses elements from the top, `top(0)` being the most recent push.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct GenericStack<T = Vec<u8>> {
    data: Vec<T>,
}

impl<T> From<Vec<T>> for GenericStack<T> {
    fn from(data: Vec<T>) -> Self {
        Self { data }
    }
}

impl<T> Deref for GenericStack<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<T> GenericStack<T> {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_inner(self) -> Vec<T> {
        self.data
    }

    /// Ensure there are at least `len` elements on the stack.
    #[inline]
    pub fn require(&self, len: usize) -> Result<()> {
        if self.data.len() < len {
            return Err(StackError::InvalidOperation);
        }
        Ok(())
    }

    #[inline]
    pub fn last(&self) -> Result<&T> {
        self.data.last().ok_or(StackError::InvalidOperation)
    }

    #[inline]
    pub fn pop(&mut self) -> Result<T> {
        self.data.pop().ok_or(StackError::InvalidOperation)
    }

    #[inline]
    pub fn push(&mut self, value: T) -> &mut Self {
        self.data.push(value);
        self
    }

    /// Element `i` positions below the top.
    #[inline]
    pub fn top(&self, i: usize) -> Result<&T> {
        self.require(i + 1)?;
        Ok(&self.data[self.data.len() - i - 1])
    }

    /// Removes the element `i` positions below the top.
    #[inline]
    pub fn remove(&mut self, i: usize) -> Result<T> {
        self.require(i + 1)?;
        let index = self.data.len() - i - 1;
        Ok(self.data.remove(index))
    }

    /// Removes the top `n` items.
    #[inline]
    pub fn drop(&mut self, n: usize) -> Result<()> {
        self.require(n)?;
        self.data.truncate(self.data.len() - n);
        Ok(())
    }

    /// Duplicates the top `n` items.
    ///
    /// dup(2): [x1 x2] -> [x1 x2 x1 x2]
    #[inline]
    pub fn dup(&mut self, n: usize) -> Result<()>
    where
        T: Clone,
    {
        self.require(n)?;
        let len = self.data.len();
        self.data.extend_from_within(len - n..);
        Ok(())
    }

    /// Copies the `n` items sitting below the top `n` items to the top.
    ///
    /// over(2): [x1 x2 x3 x4] -> [x1 x2 x3 x4 x1 x2]
    #[inline]
    pub fn over(&mut self, n: usize) -> Result<()>
    where
        T: Clone,
    {
        self.require(n * 2)?;
        let start = self.data.len() - n * 2;
        self.data.extend_from_within(start..start + n);
        Ok(())
    }

    /// Moves the bottom `n` of the top `3n` items to the top.
    ///
    /// rot(1): [x1 x2 x3] -> [x2 x3 x1]
    #[inline]
    pub fn rot(&mut self, n: usize) -> Result<()> {
        self.require(n * 3)?;
        let start = self.data.len() - n * 3;
        self.data[start..].rotate_left(n);
        Ok(())
    }

    /// Swaps the top `n` items with the `n` items below them.
    ///
    /// swap(2): [x1 x2 x3 x4] -> [x3 x4 x1 x2]
    #[inline]
    pub fn swap(&mut self, n: usize) -> Result<()> {
        self.require(n * 2)?;
        let start = self.data.len() - n * 2;
        self.data[start..].rotate_left(n);
        Ok(())
    }

    /// Removes the second-to-top item.
    #[inline]
    pub fn nip(&mut self) -> Result<()> {
        self.remove(1).map(|_| ())
    }

    /// Copies the top item below the second-to-top item.
    ///
    /// [x1 x2] -> [x2 x1 x2]
    #[inline]
    pub fn tuck(&mut self) -> Result<()>
    where
        T: Clone,
    {
        self.require(2)?;
        let top = self.data[self.data.len() - 1].clone();
        let index = self.data.len() - 2;
        self.data.insert(index, top);
        Ok(())
    }
}

impl Stack {
    /// Pops a number no longer than `max_size` bytes.
    #[inline]
    pub fn pop_num(&mut self, max_size: usize) -> Result<ScriptNum> {
        Ok(ScriptNum::from_bytes(&self.pop()?, false, max_size)?)
    }

    #[inline]
    pub fn pop_bool(&mut self) -> Result<bool> {
        Ok(cast_to_bool(&self.pop()?))
    }

    #[inline]
    pub fn peek_bool(&self) -> Result<bool> {
        Ok(cast_to_bool(self.last()?))
    }

    #[inline]
    pub fn push_num(&mut self, num: impl Into<ScriptNum>) -> &mut Self {
        self.push(num.into().to_bytes())
    }

    #[inline]
    pub fn push_bool(&mut self, value: bool) -> &mut Self {
        self.push(if value { vec![1] } else { Vec::new() })
    }
}

/// Truthiness of a stack element: any non-zero byte, except a lone sign bit in the last
/// position (negative zero).
pub fn cast_to_bool(data: &[u8]) -> bool {
    match data.split_last() {
        Some((&last, rest)) => rest.iter().any(|&x| x != 0) || (last != 0 && last != 0x80),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestStack = GenericStack<u8>;

    #[test]
    fn test_access_from_top() {
        let mut stack: TestStack = vec![0, 5].into();
        assert_eq!(stack.top(0), Ok(&5));
        assert_eq!(stack.top(1), Ok(&0));
        assert_eq!(stack.top(2), Err(StackError::InvalidOperation));
        assert_eq!(stack.remove(1), Ok(0));
        assert_eq!(stack.pop(), Ok(5));
        assert_eq!(stack.pop(), Err(StackError::InvalidOperation));
        assert_eq!(stack.last(), Err(StackError::InvalidOperation));
    }

    #[test]
    fn test_drop_and_dup() {
        let mut stack: TestStack = vec![0, 1].into();
        assert_eq!(stack.drop(3), Err(StackError::InvalidOperation));
        assert_eq!(stack.dup(2), Ok(()));
        assert_eq!(stack, vec![0, 1, 0, 1].into());
        assert_eq!(stack.drop(3), Ok(()));
        assert_eq!(stack, vec![0].into());
        assert_eq!(stack.dup(2), Err(StackError::InvalidOperation));
        assert_eq!(stack.dup(1), Ok(()));
        assert_eq!(stack, vec![0, 0].into());
    }

    #[test]
    fn test_over() {
        let mut stack: TestStack = vec![0, 5].into();
        assert_eq!(stack.over(2), Err(StackError::InvalidOperation));
        assert_eq!(stack.over(1), Ok(()));
        assert_eq!(stack, vec![0, 5, 0].into());
        let mut stack: TestStack = vec![1, 2, 3, 4].into();
        assert_eq!(stack.over(2), Ok(()));
        assert_eq!(stack, vec![1, 2, 3, 4, 1, 2].into());
    }

    #[test]
    fn test_rot() {
        let mut stack: TestStack = vec![0, 1, 2, 3].into();
        assert_eq!(stack.rot(1), Ok(()));
        assert_eq!(stack, vec![0, 2, 3, 1].into());
        let mut stack: TestStack = vec![0, 1, 2, 3, 4, 5].into();
        assert_eq!(stack.rot(3), Err(StackError::InvalidOperation));
        assert_eq!(stack.rot(2), Ok(()));
        assert_eq!(stack, vec![2, 3, 4, 5, 0, 1].into());
    }

    #[test]
    fn test_swap() {
        let mut stack: TestStack = vec![0, 1, 2, 3].into();
        assert_eq!(stack.swap(1), Ok(()));
        assert_eq!(stack, vec![0, 1, 3, 2].into());
        assert_eq!(stack.swap(2), Ok(()));
        assert_eq!(stack, vec![3, 2, 0, 1].into());
        assert_eq!(stack.swap(3), Err(StackError::InvalidOperation));
    }

    #[test]
    fn test_nip_and_tuck() {
        let mut stack: TestStack = vec![0].into();
        assert_eq!(stack.nip(), Err(StackError::InvalidOperation));
        assert_eq!(stack.tuck(), Err(StackError::InvalidOperation));
        let mut stack: TestStack = vec![0, 1, 2].into();
        assert_eq!(stack.nip(), Ok(()));
        assert_eq!(stack, vec![0, 2].into());
        assert_eq!(stack.tuck(), Ok(()));
        assert_eq!(stack, vec![2, 0, 2].into());
    }

    #[test]
    fn test_cast_to_bool() {
        assert!(!cast_to_bool(&[]));
        assert!(!cast_to_bool(&[0x00]));
        assert!(!cast_to_bool(&[0x00, 0x00]));
        assert!(!cast_to_bool(&[0x80]));
        assert!(!cast_to_bool(&[0x00, 0x00, 0x80]));
        assert!(cast_to_bool(&[0x01]));
        assert!(cast_to_bool(&[0x80, 0x00]));
        assert!(cast_to_bool(&[0x00, 0x81]));
    }

    #[test]
    fn test_numbers_and_bools() {
        let mut stack = Stack::default();
        stack.push_num(-129).push_bool(true).push_bool(false);
        assert_eq!(stack.pop_bool(), Ok(false));
        assert_eq!(stack.pop_bool(), Ok(true));
        assert_eq!(stack.pop_num(ScriptNum::MAX_NUM_SIZE).map(|n| n.value()), Ok(-129));
        stack.push(vec![0; 5]);
        assert_eq!(
            stack.pop_num(ScriptNum::MAX_NUM_SIZE),
            Err(StackError::Num(NumError::Overflow))
        );
    }
}
