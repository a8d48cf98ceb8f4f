use std::path::Path;

use hdf5::{
    types::VarLenUnicode,
    File as H5File,
    Location,
};

use crate::error::Result;
use crate::trajectory::to_varlen;
use super::OutputData;


fn write_str_attr(loc: &Location, name: &str, value: &str) -> Result<()> {
    loc.new_attr::<VarLenUnicode>()
        .shape(())
        .create(name)?
        .write_scalar(&to_varlen(value)?)?;
    Ok(())
}


/// One dataset per variable, with `kind`, `units` and `axis` attributes. The header is
/// stored as the `header` attribute of the file.
pub(super) fn write(data: &OutputData, fname: &Path, header: &str) -> Result<()> {
    let f = H5File::create(fname)?;
    write_str_attr(&f, "header", header)?;

    for var in data.iter() {
        let ds = f.new_dataset_builder()
            .with_data(var.get_data())
            .create(var.get_name())?;
        write_str_attr(&ds, "kind", var.get_kind().as_str())?;
        write_str_attr(&ds, "units", var.get_units())?;
        write_str_attr(&ds, "axis", &var.get_axis().join("|"))?;
    }

    Ok(())
}
