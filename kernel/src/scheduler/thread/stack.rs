//! Stack - Thread stack allocation and overflow detection
//!
//! Stacks grow downward; the lowest word holds a fencepost. A thread
//! that overran its stack has clobbered the fencepost, which the
//! dispatcher checks on every handoff.

use alloc::vec;
use alloc::boxed::Box;

/// Default kernel stack size (16KB)
pub const DEFAULT_KERNEL_STACK_SIZE: usize = 16 * 1024;

/// Value written at the lowest address of every stack
pub const STACK_FENCEPOST: u64 = 0xdedbeef;

const WORD: usize = core::mem::size_of::<u64>();

/// Thread stack
pub struct Stack {
    /// Backing memory, word-aligned; `words[0]` is the fencepost
    words: Box<[u64]>,
}

impl Stack {
    /// Allocate new stack of `size` bytes (rounded up to whole words, at least two)
    pub fn new(size: usize) -> Self {
        let len = ((size + WORD - 1) / WORD).max(2);
        let mut words = vec![0u64; len].into_boxed_slice();
        words[0] = STACK_FENCEPOST;
        Self { words }
    }

    /// Get stack base address (lowest address)
    pub fn base(&self) -> u64 {
        self.words.as_ptr() as u64
    }

    /// Get stack top address (initial RSP)
    pub fn top(&self) -> u64 {
        self.base() + self.size() as u64
    }

    /// Get stack size
    pub fn size(&self) -> usize {
        self.words.len() * WORD
    }

    /// Check if address is within stack
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base() && addr < self.top()
    }

    /// Stack-overflow check: the fencepost is still in place
    pub fn is_intact(&self) -> bool {
        self.words[0] == STACK_FENCEPOST
    }

    /// Overwrite the fencepost, as a runaway frame would
    #[cfg(test)]
    pub(crate) fn clobber_fencepost(&mut self) {
        self.words[0] = 0;
    }
}

impl core::fmt::Debug for Stack {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Stack")
            .field("base", &format_args!("{:#x}", self.base()))
            .field("size", &self.size())
            .field("intact", &self.is_intact())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stack_has_fencepost() {
        let stack = Stack::new(DEFAULT_KERNEL_STACK_SIZE);
        assert!(stack.is_intact());
        assert_eq!(stack.size(), DEFAULT_KERNEL_STACK_SIZE);
        assert!(stack.contains(stack.base()));
        assert!(!stack.contains(stack.top()));
    }

    #[test]
    fn test_overflow_detected() {
        let mut stack = Stack::new(64);
        stack.clobber_fencepost();
        assert!(!stack.is_intact());
    }

    #[test]
    fn test_tiny_stack_rounds_up() {
        let stack = Stack::new(1);
        assert_eq!(stack.size(), 2 * WORD);
    }
}
