//! Binary raster views and file loading.

pub mod binary;
pub mod io;

pub use self::binary::{vertical_core, BinaryBuffer, BitImage, CoreData};
pub use self::io::{load_binary, write_json_file};
