//! First-fit free-list heap over a single statically bounded arena.
//!
//! Every block starts with a header laid out in the arena itself:
//!
//! ```text
//! +0  size   u32  usable bytes after the header
//! +4  free   u32  non-zero when the block is free
//! +8  next   u32  offset of the next block header, `u32::MAX` at the tail
//! ```
//!
//! The chain of blocks always covers the arena contiguously and in address
//! order. `used` counts every header plus the payload of every in-use block,
//! so `total - used` is exactly the payload still available in free blocks.

use core::fmt;

use log::{debug, error, trace, warn};

use super::address::HeapAddr;
use crate::{
    align_down, align_up,
    config::HEAP_ALIGN,
    error::{KernelError, KernelResult},
};

/// Bytes taken by a block header.
pub const HEADER_SIZE: usize = 12;

const NIL: u32 = u32::MAX;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Header {
    size: usize,
    free: bool,
    next: Option<usize>,
}

/// A view of one block in arena order.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BlockInfo {
    /// Offset of the block header within the arena.
    pub offset: usize,
    /// Usable size, header excluded.
    pub size:   usize,
    pub free:   bool,
}

impl BlockInfo {
    /// The address a caller got back for this block.
    pub fn addr(&self) -> HeapAddr {
        self.offset + HEADER_SIZE
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct HeapStats {
    pub total_bytes:       usize,
    /// In-use payload plus the header of every block.
    pub used_bytes:        usize,
    pub free_bytes:        usize,
    /// Requests that failed because no free block was large enough.
    pub exhaustion_events: usize,
}

pub struct Heap<'a> {
    arena:     &'a mut [u8],
    head:      Option<usize>,
    total:     usize,
    used:      usize,
    exhausted: usize,
}

impl<'a> Heap<'a> {
    /// A heap without an arena. Every allocation fails until it is replaced
    /// by [`Heap::new`].
    pub fn empty() -> Self {
        Heap {
            arena:     Default::default(),
            head:      None,
            total:     0,
            used:      0,
            exhausted: 0,
        }
    }

    /// Carves the whole arena into one free block.
    ///
    /// The start of the arena is rounded up and its end rounded down to
    /// [`HEAP_ALIGN`]. Fails if what is left cannot hold a single header
    /// plus the smallest payload.
    pub fn new(arena: &'a mut [u8]) -> KernelResult<Self> {
        let base = arena.as_ptr() as usize;
        let start = align_up!(base, HEAP_ALIGN) - base;
        if start >= arena.len() {
            error!("heap: arena of {} bytes is too small", arena.len());
            return Err(KernelError::AllocationError);
        }
        let total = align_down!(arena.len() - start, HEAP_ALIGN);
        if total < HEADER_SIZE + HEAP_ALIGN || start + total > NIL as usize {
            error!("heap: unusable arena of {} bytes", arena.len());
            return Err(KernelError::AllocationError);
        }

        let mut heap = Heap {
            arena,
            head: Some(start),
            total,
            used: HEADER_SIZE,
            exhausted: 0,
        };
        heap.write_header(
            start,
            Header {
                size: total - HEADER_SIZE,
                free: true,
                next: None,
            },
        );
        debug!(
            "heap: initialized at 0x{:x}, {} bytes available",
            base + start,
            total - HEADER_SIZE
        );
        Ok(heap)
    }

    /// Returns the first free block large enough for `size` bytes.
    ///
    /// The block is split when the remainder can hold a header plus the
    /// smallest payload; otherwise it is handed out whole.
    pub fn allocate(&mut self, size: usize) -> KernelResult<HeapAddr> {
        if size == 0 {
            warn!("heap: refusing a zero-sized request");
            return Err(KernelError::AllocationError);
        }
        if size > self.total {
            return Err(self.exhaust(size));
        }
        let size = align_up!(size, HEAP_ALIGN);

        let mut cursor = self.head;
        while let Some(offset) = cursor {
            let mut block = self.header(offset);
            if block.free && block.size >= size {
                if block.size >= size + HEADER_SIZE + HEAP_ALIGN {
                    let rest = offset + HEADER_SIZE + size;
                    self.write_header(
                        rest,
                        Header {
                            size: block.size - size - HEADER_SIZE,
                            free: true,
                            next: block.next,
                        },
                    );
                    block.size = size;
                    block.next = Some(rest);
                    self.used += HEADER_SIZE;
                }
                block.free = false;
                self.used += block.size;
                self.write_header(offset, block);

                trace!("heap: alloc {} bytes at 0x{:x}", block.size, offset + HEADER_SIZE);
                return Ok(offset + HEADER_SIZE);
            }
            cursor = block.next;
        }

        Err(self.exhaust(size))
    }

    /// Marks the block owning `addr` free and merges every pair of adjacent
    /// free blocks.
    ///
    /// Releasing a block that is already free changes nothing and reports
    /// [`KernelError::DoubleFree`]. An address that no block owns reports
    /// [`KernelError::AllocationError`] and is ignored as well.
    pub fn release(&mut self, addr: HeapAddr) -> KernelResult<()> {
        let offset = match self.find(addr) {
            Some(offset) => offset,
            None => {
                warn!("heap: release of unknown address 0x{:x}", addr);
                return Err(KernelError::AllocationError);
            }
        };

        let mut block = self.header(offset);
        if block.free {
            warn!("heap: double free detected at 0x{:x}", addr);
            return Err(KernelError::DoubleFree);
        }

        block.free = true;
        self.used -= block.size;
        self.write_header(offset, block);
        trace!("heap: dealloc {} bytes at 0x{:x}", block.size, addr);

        self.coalesce();
        Ok(())
    }

    pub fn stats(&self) -> HeapStats {
        HeapStats {
            total_bytes:       self.total,
            used_bytes:        self.used,
            free_bytes:        self.total - self.used,
            exhaustion_events: self.exhausted,
        }
    }

    /// Walks the block chain in arena order.
    pub fn blocks(&self) -> Blocks<'_, 'a> {
        Blocks {
            heap:   self,
            cursor: self.head,
        }
    }

    /// Verifies the block chain against the heap invariants.
    pub fn check(&self) -> Result<(), &'static str> {
        let Some(start) = self.head else {
            return if self.total == 0 { Ok(()) } else { Err("missing head block") };
        };

        let mut expected = start;
        let mut used = 0;
        let mut prev_free = false;
        for block in self.blocks() {
            if block.offset != expected {
                return Err("blocks are not contiguous");
            }
            if block.size % HEAP_ALIGN != 0 {
                return Err("block size is not aligned");
            }
            if block.free && prev_free {
                return Err("adjacent free blocks were not merged");
            }
            used += HEADER_SIZE;
            if !block.free {
                used += block.size;
            }
            prev_free = block.free;
            expected = block.offset + HEADER_SIZE + block.size;
        }

        if expected != start + self.total {
            return Err("blocks do not cover the arena");
        }
        if used != self.used {
            return Err("usage accounting is out of sync");
        }
        Ok(())
    }

    /// The payload bytes starting at `addr`.
    ///
    /// Panics if the range leaves the arena.
    pub fn bytes_mut(&mut self, addr: HeapAddr, len: usize) -> &mut [u8] {
        &mut self.arena[addr..addr + len]
    }

    /// The machine address of `addr`.
    pub fn address_of(&self, addr: HeapAddr) -> usize {
        self.arena.as_ptr() as usize + addr
    }

    fn exhaust(&mut self, size: usize) -> KernelError {
        self.exhausted += 1;
        error!(
            "heap: out of memory (requested: {} bytes, free: {} bytes)",
            size,
            self.total - self.used
        );
        KernelError::AllocationError
    }

    fn find(&self, addr: HeapAddr) -> Option<usize> {
        self.blocks()
            .find(|block| block.addr() == addr)
            .map(|block| block.offset)
    }

    fn coalesce(&mut self) {
        let mut cursor = self.head;
        while let Some(offset) = cursor {
            let mut block = self.header(offset);
            let Some(next) = block.next else {
                break;
            };

            let successor = self.header(next);
            if block.free && successor.free {
                block.size += successor.size + HEADER_SIZE;
                block.next = successor.next;
                self.used -= HEADER_SIZE;
                self.write_header(offset, block);
                // Stay on this block, the new successor may be free too.
            } else {
                cursor = Some(next);
            }
        }
    }

    fn read_u32(&self, at: usize) -> u32 {
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.arena[at..at + 4]);
        u32::from_le_bytes(word)
    }

    fn write_u32(&mut self, at: usize, value: u32) {
        self.arena[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn header(&self, offset: usize) -> Header {
        let next = self.read_u32(offset + 8);
        Header {
            size: self.read_u32(offset) as usize,
            free: self.read_u32(offset + 4) != 0,
            next: (next != NIL).then_some(next as usize),
        }
    }

    fn write_header(&mut self, offset: usize, header: Header) {
        self.write_u32(offset, header.size as u32);
        self.write_u32(offset + 4, header.free as u32);
        self.write_u32(offset + 8, header.next.map_or(NIL, |next| next as u32));
    }
}

pub struct Blocks<'h, 'a> {
    heap:   &'h Heap<'a>,
    cursor: Option<usize>,
}

impl Iterator for Blocks<'_, '_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<BlockInfo> {
        let offset = self.cursor?;
        let header = self.heap.header(offset);
        self.cursor = header.next;
        Some(BlockInfo {
            offset,
            size: header.size,
            free: header.free,
        })
    }
}

impl fmt::Display for Heap<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        write!(
            f,
            "Heap(total: {}, used: {}, free: {}, blocks: ",
            stats.total_bytes, stats.used_bytes, stats.free_bytes
        )?;
        for block in self.blocks() {
            let tag = if block.free { "free" } else { "used" };
            write!(f, "[0x{:x} {} {}] ", block.offset, block.size, tag)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::{format, vec::Vec};

    use super::*;
    use crate::is_aligned;

    #[repr(C, align(16))]
    struct MockArena {
        data: [u8; 4096],
    }

    impl MockArena {
        fn new() -> Self {
            MockArena { data: [0u8; 4096] }
        }
    }

    fn layout(heap: &Heap) -> Vec<BlockInfo> {
        heap.blocks().collect()
    }

    #[test]
    fn test_init() {
        let mut arena = MockArena::new();
        let heap = Heap::new(&mut arena.data).unwrap();

        let stats = heap.stats();
        assert_eq!(stats.total_bytes, 4096);
        assert_eq!(stats.used_bytes, HEADER_SIZE);
        assert_eq!(stats.free_bytes, 4096 - HEADER_SIZE);
        assert_eq!(stats.exhaustion_events, 0);

        let blocks = layout(&heap);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].free);
        assert_eq!(blocks[0].size, 4096 - HEADER_SIZE);
        assert!(heap.check().is_ok());
    }

    #[test]
    fn test_alloc_release_scenario() {
        let mut arena = MockArena::new();
        let mut heap = Heap::new(&mut arena.data).unwrap();
        let before = heap.stats();

        let addr = heap.allocate(100).unwrap();
        assert_eq!(heap.stats().used_bytes, before.used_bytes + 100 + HEADER_SIZE);

        heap.release(addr).unwrap();
        assert_eq!(heap.stats().free_bytes, before.free_bytes);

        assert_eq!(heap.allocate(5000), Err(KernelError::AllocationError));
        assert_eq!(heap.stats().exhaustion_events, 1);
        assert!(heap.check().is_ok());
    }

    #[test]
    fn test_rounds_to_alignment() {
        let mut arena = MockArena::new();
        let mut heap = Heap::new(&mut arena.data).unwrap();

        let a = heap.allocate(1).unwrap();
        let b = heap.allocate(7).unwrap();
        assert!(is_aligned!(a, HEAP_ALIGN));
        assert!(is_aligned!(b, HEAP_ALIGN));
        assert_eq!(b - a, HEADER_SIZE + 4);
        assert_eq!(layout(&heap)[1].size, 8);
    }

    #[test]
    fn test_zero_size() {
        let mut arena = MockArena::new();
        let mut heap = Heap::new(&mut arena.data).unwrap();

        assert_eq!(heap.allocate(0), Err(KernelError::AllocationError));
        assert_eq!(heap.stats().exhaustion_events, 0);
        assert_eq!(heap.stats().used_bytes, HEADER_SIZE);
    }

    #[test]
    fn test_first_fit() {
        let mut arena = MockArena::new();
        let mut heap = Heap::new(&mut arena.data).unwrap();

        let a = heap.allocate(64).unwrap();
        let _b = heap.allocate(64).unwrap();
        heap.release(a).unwrap();

        // The hole left by `a` comes first in list order.
        let c = heap.allocate(32).unwrap();
        assert_eq!(c, a);

        // 64 - 32 - HEADER_SIZE bytes are left in the hole, too few for this.
        let d = heap.allocate(24).unwrap();
        assert!(d > a + 64);
        assert!(heap.check().is_ok());
    }

    #[test]
    fn test_no_split_for_small_remainder() {
        let mut arena = MockArena::new();
        let mut heap = Heap::new(&mut arena.data).unwrap();

        let a = heap.allocate(64).unwrap();
        let _b = heap.allocate(64).unwrap();
        heap.release(a).unwrap();
        let used = heap.stats().used_bytes;

        // 64 < 56 + HEADER_SIZE + HEAP_ALIGN, so the block is used whole.
        assert_eq!(heap.allocate(56).unwrap(), a);
        assert_eq!(layout(&heap)[0].size, 64);
        assert_eq!(heap.stats().used_bytes, used + 64);
        assert!(heap.check().is_ok());
    }

    #[test]
    fn test_double_free() {
        let mut arena = MockArena::new();
        let mut heap = Heap::new(&mut arena.data).unwrap();

        let a = heap.allocate(100).unwrap();
        let _b = heap.allocate(50).unwrap();
        heap.release(a).unwrap();

        let stats = heap.stats();
        let blocks = layout(&heap);

        assert_eq!(heap.release(a), Err(KernelError::DoubleFree));
        assert_eq!(heap.stats(), stats);
        assert_eq!(layout(&heap), blocks);
        assert!(heap.check().is_ok());
    }

    #[test]
    fn test_unknown_address() {
        let mut arena = MockArena::new();
        let mut heap = Heap::new(&mut arena.data).unwrap();

        let a = heap.allocate(100).unwrap();
        let stats = heap.stats();

        assert_eq!(heap.release(a + 4), Err(KernelError::AllocationError));
        assert_eq!(heap.release(1 << 20), Err(KernelError::AllocationError));
        assert_eq!(heap.stats(), stats);
    }

    #[test]
    fn test_coalescing() {
        let mut arena = MockArena::new();
        let mut heap = Heap::new(&mut arena.data).unwrap();

        let a = heap.allocate(100).unwrap();
        let b = heap.allocate(200).unwrap();
        let c = heap.allocate(300).unwrap();

        heap.release(a).unwrap();
        heap.release(c).unwrap();
        // a | b | c + tail
        assert_eq!(layout(&heap).len(), 3);
        assert!(heap.check().is_ok());

        heap.release(b).unwrap();
        let blocks = layout(&heap);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].free);
        assert_eq!(heap.stats().used_bytes, HEADER_SIZE);
        assert!(heap.check().is_ok());
    }

    #[test]
    fn test_exhaustion_and_recovery() {
        let mut arena = MockArena::new();
        let mut heap = Heap::new(&mut arena.data).unwrap();

        let mut held = Vec::new();
        while let Ok(addr) = heap.allocate(500) {
            held.push(addr);
        }
        // The eighth request takes the 500-byte tail whole.
        assert_eq!(held.len(), 8);
        assert_eq!(heap.stats().exhaustion_events, 1);
        assert_eq!(heap.stats().used_bytes, 4096);

        for addr in held {
            heap.release(addr).unwrap();
        }
        assert_eq!(heap.stats().used_bytes, HEADER_SIZE);
        assert_eq!(heap.stats().exhaustion_events, 1);
    }

    #[test]
    fn test_unaligned_arena() {
        let mut arena = MockArena::new();
        let heap = Heap::new(&mut arena.data[1..]).unwrap();

        // 3 bytes are skipped at the front, 1 at the back.
        assert_eq!(heap.stats().total_bytes, 4092);
        assert!(is_aligned!(heap.address_of(layout(&heap)[0].addr()), HEAP_ALIGN));
    }

    #[test]
    fn test_tiny_arena() {
        let mut arena = [0u8; 8];
        assert!(Heap::new(&mut arena).is_err());

        let mut empty = Heap::empty();
        assert_eq!(empty.allocate(4), Err(KernelError::AllocationError));
        assert!(empty.check().is_ok());
    }

    #[test]
    fn test_display() {
        let mut arena = MockArena::new();
        let mut heap = Heap::new(&mut arena.data).unwrap();
        heap.allocate(16).unwrap();

        let dump = format!("{}", heap);
        assert!(dump.starts_with("Heap(total: 4096, used: 40, free: 4056"));
        assert!(dump.contains("[0x0 16 used]"));
    }
}
