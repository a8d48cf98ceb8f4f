//! Named result arrays accumulated by a job and their writers.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::IndexMap;
use shared::{
    info,
    ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, IxDyn},
};

use crate::error::{Error, Result};

mod ascii;
mod h5;


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariableKind {
    Line,
    Surface,
    Volume,
}


impl VariableKind {
    pub fn ndim(&self) -> usize {
        match self {
            Self::Line => 1,
            Self::Surface => 2,
            Self::Volume => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Surface => "surface",
            Self::Volume => "volume",
        }
    }
}


/// Result array with its physical units and the names of the variables labelling its
/// axes (`"q|time"` style). The shape is fixed at creation.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputVariable {
    name: String,
    kind: VariableKind,
    data: ArrayD<f64>,
    axis: Vec<String>,
    units: String,
}


impl OutputVariable {
    /// Zero-filled variable of the given shape.
    pub fn zeros(name: &str, kind: VariableKind, shape: &[usize], axis: &str, units: &str) -> Result<Self> {
        Self::from_data(name, kind, ArrayD::zeros(IxDyn(shape)), axis, units)
    }

    pub fn from_data(name: &str, kind: VariableKind, data: ArrayD<f64>, axis: &str, units: &str) -> Result<Self> {
        if data.ndim() != kind.ndim() {
            return Err(Error::computation("initialize",
                    format!("variable '{}' is a {} but has {} dimensions", name, kind.as_str(), data.ndim())));
        }
        let axis = if axis.is_empty() {
            vec![]
        } else {
            axis.split('|').map(|a| a.to_string()).collect()
        };
        Ok(Self {
            name: name.to_string(),
            kind,
            data,
            axis,
            units: units.to_string(),
        })
    }

    pub fn get_name(&self) -> &str { &self.name }
    pub fn get_kind(&self) -> VariableKind { self.kind }
    pub fn get_data(&self) -> &ArrayD<f64> { &self.data }
    pub fn get_axis(&self) -> &[String] { &self.axis }
    pub fn get_units(&self) -> &str { &self.units }

    /// Values can change, the shape cannot.
    pub fn get_data_mut(&mut self) -> ArrayViewMutD<'_, f64> {
        self.data.view_mut()
    }


    /// Add `x`, of the same shape, to the stored values.
    pub fn accumulate(&mut self, x: ArrayViewD<f64>) -> Result<()> {
        if x.shape() != self.data.shape() {
            return Err(Error::computation("combine",
                    format!("cannot add {:?} values to '{}' of shape {:?}", x.shape(), self.name, self.data.shape())));
        }
        self.data += &x;
        Ok(())
    }


    /// Overwrite the stored values with `x`, of the same shape.
    pub fn assign(&mut self, x: ArrayViewD<f64>) -> Result<()> {
        if x.shape() != self.data.shape() {
            return Err(Error::computation("finalize",
                    format!("cannot assign {:?} values to '{}' of shape {:?}", x.shape(), self.name, self.data.shape())));
        }
        self.data.assign(&x);
        Ok(())
    }
}


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Hdf5,
    Ascii,
}


impl OutputFormat {
    pub const ALL: [OutputFormat; 2] = [Self::Hdf5, Self::Ascii];

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Hdf5 => "h5",
            Self::Ascii => "dat",
        }
    }

    /// `<root>.<ext>`
    pub fn file_name(&self, root: &Path) -> PathBuf {
        let mut s = root.as_os_str().to_os_string();
        s.push(".");
        s.push(self.extension());
        PathBuf::from(s)
    }
}


impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hdf5" | "h5" => Ok(Self::Hdf5),
            "ascii" | "dat" | "text" => Ok(Self::Ascii),
            _ => Err(format!("unknown output format '{}', expected 'hdf5' or 'ascii'", s)),
        }
    }
}


impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hdf5 => write!(f, "hdf5"),
            Self::Ascii => write!(f, "ascii"),
        }
    }
}


/// Output variables of a job, in creation order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutputData {
    variables: IndexMap<String, OutputVariable>,
}


impl OutputData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, var: OutputVariable) -> Result<()> {
        if self.variables.contains_key(var.get_name()) {
            return Err(Error::computation("initialize", format!("duplicate output variable '{}'", var.get_name())));
        }
        self.variables.insert(var.name.clone(), var);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&OutputVariable> {
        self.variables.get(name)
            .ok_or_else(|| Error::computation("output", format!("no output variable '{}'", name)))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut OutputVariable> {
        self.variables.get_mut(name)
            .ok_or_else(|| Error::computation("output", format!("no output variable '{}'", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OutputVariable> {
        self.variables.values()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }


    /// Write every variable to `<root>.<ext>` for each format. All files are first
    /// written under a `.part` name and only renamed once every format succeeded, so a
    /// failure leaves no file under its final name. Returns the written files.
    pub fn write(&self, root: &Path, formats: &[OutputFormat], header: &str) -> Result<Vec<PathBuf>> {
        let targets = formats.iter()
            .map(|format| {
                let fname = format.file_name(root);
                let mut part = fname.clone().into_os_string();
                part.push(".part");
                (*format, PathBuf::from(part), fname)
            })
            .collect::<Vec<_>>();

        let remove_parts = || targets.iter().for_each(|(_, part, _)| { let _ = std::fs::remove_file(part); });

        for (format, part, _) in targets.iter() {
            let written = match format {
                OutputFormat::Hdf5 => h5::write(self, part, header),
                OutputFormat::Ascii => ascii::write(self, part, header),
            };
            if let Err(e) = written {
                remove_parts();
                return Err(e);
            }
        }

        let mut ret = vec![];
        for (_, part, fname) in targets.iter() {
            if let Err(e) = std::fs::rename(part, fname) {
                ret.iter().for_each(|f| { let _ = std::fs::remove_file(f); });
                remove_parts();
                return Err(e.into());
            }
            ret.push(fname.clone());
        }

        for fname in ret.iter() {
            info!("Output written to {:?}", fname);
        }
        Ok(ret)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use shared::ndarray::{array, Array2};

    fn sample() -> OutputData {
        let mut data = OutputData::new();
        data.add(OutputVariable::from_data("q", VariableKind::Line, array![1.0, 2.0].into_dyn(), "", "inv_nm").unwrap()).unwrap();
        data.add(OutputVariable::from_data("time", VariableKind::Line, array![0.0, 0.5, 1.0].into_dyn(), "", "ps").unwrap()).unwrap();
        data.add(OutputVariable::zeros("f(q,t)_H", VariableKind::Surface, &[2, 3], "q|time", "au").unwrap()).unwrap();
        data
    }

    #[test]
    fn test_variables() {
        let mut data = sample();
        assert!(data.add(OutputVariable::zeros("q", VariableKind::Line, &[2], "", "").unwrap()).is_err());
        assert!(OutputVariable::zeros("x", VariableKind::Surface, &[2], "", "").is_err());

        let var = data.get_mut("f(q,t)_H").unwrap();
        let x = Array2::from_elem((2, 3), 0.5).into_dyn();
        var.accumulate(x.view()).unwrap();
        var.accumulate(x.view()).unwrap();
        assert_eq!(var.get_data()[[1, 2]], 1.0);
        assert_eq!(var.get_axis(), &["q", "time"]);
        assert!(var.accumulate(Array2::<f64>::zeros((3, 2)).into_dyn().view()).is_err());
        assert!(data.get("s(q,f)_H").is_err());
    }

    #[test]
    fn test_formats() {
        assert_eq!("HDF5".parse::<OutputFormat>().unwrap(), OutputFormat::Hdf5);
        assert!("netcdf".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Ascii.file_name(Path::new("/a/b/disf")), PathBuf::from("/a/b/disf.dat"));
    }

    #[test]
    fn test_write() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("disf");
        let files = sample().write(&root, &OutputFormat::ALL, "# test header").unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.is_file()));
        assert!(!dir.path().join("disf.h5.part").exists());

        let txt = std::fs::read_to_string(dir.path().join("disf.dat")).unwrap();
        assert!(txt.starts_with("# test header"));
        assert!(txt.contains("f(q,t)_H"));

        let f = hdf5::File::open(dir.path().join("disf.h5")).unwrap();
        let q: shared::ndarray::Array1<f64> = f.dataset("q").unwrap().read().unwrap();
        assert_eq!(q.to_vec(), vec![1.0, 2.0]);
        let fqt: Array2<f64> = f.dataset("f(q,t)_H").unwrap().read().unwrap();
        assert_eq!(fqt.dim(), (2, 3));
    }

    #[test]
    fn test_failed_format_leaves_no_final_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("out");
        std::fs::create_dir(dir.path().join("out.dat.part")).unwrap();

        assert!(sample().write(&root, &[OutputFormat::Hdf5, OutputFormat::Ascii], "# header").is_err());
        assert!(!dir.path().join("out.h5").exists());
        assert!(!dir.path().join("out.h5.part").exists());
        assert!(!dir.path().join("out.dat").exists());
    }
}
