use std::fs;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use shared::{
    Context,
    Result,
};

pub mod poscar;
pub mod xdatcar;

pub use poscar::Poscar;
pub use xdatcar::Xdatcar;


/// Read a whole text file, decompressing it first if its name ends with `.gz`.
pub fn read_text<P>(fname: P) -> Result<String>
where P: AsRef<Path> {
    let fname = fname.as_ref();
    let is_gz = fname.extension()
        .map(|e| e.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);

    if is_gz {
        let f = fs::File::open(fname)
            .with_context(|| format!("Cannot open {:?}", fname))?;
        let mut ret = String::new();
        GzDecoder::new(f).read_to_string(&mut ret)
            .with_context(|| format!("Cannot decompress {:?}", fname))?;
        Ok(ret)
    } else {
        fs::read_to_string(fname)
            .with_context(|| format!("Cannot read {:?}", fname))
    }
}
