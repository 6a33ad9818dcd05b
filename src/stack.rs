//! Growable stack with contiguous storage
//!
//! Used to stage the per-frame ground polygons and visible props. Clearing
//! keeps the allocation around, so a stack that is refilled every frame stops
//! growing once it has reached its working size.

/// Smallest capacity a stack is ever given.
pub const MIN_CAPACITY: usize = 4;

/// Capacity multiplier applied when a push finds the stack full.
const GROWTH_NUMERATOR: usize = 3;
const GROWTH_DENOMINATOR: usize = 2;

/// A LIFO stack of `T` stored in one contiguous block.
///
/// Growth always moves the elements into a fresh allocation. References into
/// the stack can't outlive a `push` or `grow` thanks to borrowing, so stale
/// pointers are ruled out at compile time.
#[derive(Debug, Clone)]
pub struct GrowableStack<T> {
    data: Vec<T>,
    capacity: usize,
}

impl<T> GrowableStack<T> {
    /// Create a stack with room for at least `initial_count` elements.
    pub fn new(initial_count: usize) -> Self {
        let mut stack = Self { data: Vec::new(), capacity: 0 };
        stack.grow(initial_count.max(MIN_CAPACITY));
        stack
    }

    /// Number of elements in use
    pub fn count(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of elements the stack can hold before it has to grow.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reallocate to hold `new_count` elements.
    ///
    /// Panics if `new_count` doesn't exceed both the current capacity and the
    /// current count.
    pub fn grow(&mut self, new_count: usize) {
        assert!(
            new_count > self.capacity && new_count > self.data.len(),
            "Trying to grow the stack to {} elements, but it already holds {} (capacity {})",
            new_count,
            self.data.len(),
            self.capacity
        );

        let mut new_data = Vec::with_capacity(new_count);
        new_data.extend(self.data.drain(..));
        self.data = new_data;
        self.capacity = new_count;
    }

    /// Push an element, growing the stack by 1.5x when it's full.
    pub fn push(&mut self, element: T) {
        if self.data.len() >= self.capacity {
            let grown = (self.capacity * GROWTH_NUMERATOR / GROWTH_DENOMINATOR).max(MIN_CAPACITY);
            self.grow(grown.max(self.capacity + 1));
        }

        debug_assert!(self.data.len() < self.capacity);
        self.data.push(element);
    }

    /// Remove and return the most recently pushed element.
    pub fn pop(&mut self) -> Option<T> {
        self.data.pop()
    }

    /// The most recently pushed element.
    pub fn front(&self) -> Option<&T> {
        self.data.last()
    }

    /// Element at `index`. Panics when out of bounds.
    pub fn at(&self, index: usize) -> &T {
        assert!(
            index < self.data.len(),
            "Accessing stack index {} out of bounds (count {})",
            index,
            self.data.len()
        );
        &self.data[index]
    }

    /// Mutable element at `index`. Panics when out of bounds.
    pub fn at_mut(&mut self, index: usize) -> &mut T {
        assert!(
            index < self.data.len(),
            "Accessing stack index {} out of bounds (count {})",
            index,
            self.data.len()
        );
        &mut self.data[index]
    }

    /// Drop all elements but keep the allocation for reuse.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Release the stack and everything in it.
    pub fn free(self) {}

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }
}

impl<T> Default for GrowableStack<T> {
    fn default() -> Self {
        Self::new(MIN_CAPACITY)
    }
}

impl<'a, T> IntoIterator for &'a GrowableStack<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(i: usize) -> [u8; 5] {
        [i as u8, (i >> 8) as u8, 0xAB, (i * 7) as u8, 0xCD]
    }

    #[test]
    fn test_minimum_capacity() {
        assert_eq!(GrowableStack::<u32>::new(0).capacity(), MIN_CAPACITY);
        assert_eq!(GrowableStack::<u32>::new(3).capacity(), MIN_CAPACITY);
        assert_eq!(GrowableStack::<u32>::new(10).capacity(), 10);
    }

    #[test]
    fn test_push_keeps_contents() {
        for &n in &[0usize, 1, 4, 5, 100] {
            let mut stack = GrowableStack::new(4);
            for i in 0..n {
                stack.push(element(i));
                assert_eq!(stack.count(), i + 1);
            }
            assert_eq!(stack.count(), n);
            assert!(stack.capacity() >= n);
            for i in 0..n {
                assert_eq!(*stack.at(i), element(i), "element {} of {}", i, n);
            }
        }
    }

    #[test]
    fn test_growth_factor() {
        let mut stack = GrowableStack::new(4);
        for i in 0..5 {
            stack.push(i);
        }
        assert_eq!(stack.capacity(), 6);
        for i in 5..7 {
            stack.push(i);
        }
        assert_eq!(stack.capacity(), 9);
    }

    #[test]
    fn test_pop_and_count() {
        let mut stack = GrowableStack::new(4);
        stack.push(1);
        stack.push(2);
        stack.push(3);
        assert_eq!(stack.pop(), Some(3));
        assert_eq!(stack.front(), Some(&2));
        assert_eq!(stack.count(), 2);
        stack.push(4);
        assert_eq!(stack.as_slice(), &[1, 2, 4]);
        stack.pop();
        stack.pop();
        stack.pop();
        assert_eq!(stack.pop(), None);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut stack = GrowableStack::new(4);
        for i in 0..50 {
            stack.push(i);
        }
        let capacity = stack.capacity();
        stack.clear();
        assert_eq!(stack.count(), 0);
        assert_eq!(stack.capacity(), capacity);
        stack.push(7);
        assert_eq!(*stack.at(0), 7);
    }

    #[test]
    fn test_at_mut_edits_in_place() {
        let mut stack = GrowableStack::new(4);
        for i in 0..6 {
            stack.push(element(i));
        }
        stack.at_mut(4)[2] = 0x11;
        assert_eq!(stack.at(4)[2], 0x11);
        assert_eq!(*stack.at(3), element(3));
        assert_eq!(*stack.at(5), element(5));
    }

    #[test]
    #[should_panic]
    fn test_at_mut_out_of_bounds() {
        let mut stack = GrowableStack::new(4);
        stack.push(1u8);
        *stack.at_mut(1) = 2;
    }

    #[test]
    fn test_free_drops_elements() {
        let shared = std::rc::Rc::new(());
        let mut stack = GrowableStack::new(4);
        for _ in 0..10 {
            stack.push(shared.clone());
        }
        assert_eq!(std::rc::Rc::strong_count(&shared), 11);
        stack.free();
        assert_eq!(std::rc::Rc::strong_count(&shared), 1);
    }

    #[test]
    #[should_panic]
    fn test_at_out_of_bounds() {
        let mut stack = GrowableStack::new(4);
        stack.push(1u8);
        stack.at(1);
    }

    #[test]
    #[should_panic]
    fn test_grow_must_enlarge() {
        let mut stack = GrowableStack::<u8>::new(8);
        stack.grow(8);
    }
}
