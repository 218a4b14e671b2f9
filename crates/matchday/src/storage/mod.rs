pub mod filesystem;
pub mod table;

pub use filesystem::{newest_mtime, replace_dir, write_atomic};
pub use table::{count_rows, read_rows, Row, TableFormat};
