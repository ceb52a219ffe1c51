/// An address handed out by the heap: the byte offset of a payload from the
/// start of the arena.
pub type HeapAddr = usize;

#[macro_export]
macro_rules! align_up {
    ($sz:expr, $align:expr) => {{
        ($sz + $align - 1) & !($align - 1)
    }};
}

#[macro_export]
macro_rules! align_down {
    ($a:expr, $align:expr) => {{
        $a & !($align - 1)
    }};
}

#[macro_export]
macro_rules! is_aligned {
    ($addr:expr, $align:expr) => {{
        $crate::align_down!($addr, $align) == $addr
    }};
}
