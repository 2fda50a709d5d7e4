mod process_stream;

pub use process_stream::{process_stream, CHUNK_SIZE};
