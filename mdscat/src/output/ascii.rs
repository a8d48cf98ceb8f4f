use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use shared::ndarray::{ArrayViewD, Axis, Ix1};

use crate::error::Result;
use super::{
    OutputData,
    OutputVariable,
};


/// Plain text dump: the header as comment lines, then one block per variable.
pub(super) fn write(data: &OutputData, fname: &Path, header: &str) -> Result<()> {
    let mut w = BufWriter::new(File::create(fname)?);

    for line in header.lines() {
        writeln!(w, "# {}", line.trim_start_matches('#').trim())?;
    }
    writeln!(w)?;

    for var in data.iter() {
        write_variable(&mut w, var)?;
    }
    w.flush()?;
    Ok(())
}


fn write_variable<W: Write>(w: &mut W, var: &OutputVariable) -> Result<()> {
    writeln!(w, "# variable: {}", var.get_name())?;
    writeln!(w, "# kind: {}, units: {}, axis: {}, shape: {:?}",
        var.get_kind().as_str(), var.get_units(), var.get_axis().join("|"), var.get_data().shape())?;
    write_block(w, var.get_data().view())?;
    writeln!(w)?;
    Ok(())
}


fn write_block<W: Write>(w: &mut W, data: ArrayViewD<f64>) -> Result<()> {
    match data.ndim() {
        0 => writeln!(w, "{:16.8e}", data.iter().next().copied().unwrap_or_default())?,
        1 => {
            if let Ok(line) = data.into_dimensionality::<Ix1>() {
                for v in line.iter() {
                    writeln!(w, "{:16.8e}", v)?;
                }
            }
        },
        2 => {
            for row in data.axis_iter(Axis(0)) {
                let s = row.iter().map(|v| format!("{:16.8e}", v)).collect::<Vec<_>>().join(" ");
                writeln!(w, "{}", s)?;
            }
        },
        _ => {
            for (i, sub) in data.axis_iter(Axis(0)).enumerate() {
                writeln!(w, "# [{}]", i)?;
                write_block(w, sub)?;
            }
        },
    }
    Ok(())
}
