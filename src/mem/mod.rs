pub use self::{
    address::HeapAddr,
    heap::{BlockInfo, Heap, HeapStats, HEADER_SIZE},
};

pub mod address;
pub mod heap;
