mod file_reader;
mod memory_reader;
mod range_reader;

pub use file_reader::LocalFileReader;
pub use memory_reader::MemoryReader;
pub use range_reader::RangeReader;
