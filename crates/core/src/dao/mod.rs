pub mod memory;

pub use memory::MemoryNutDao;
