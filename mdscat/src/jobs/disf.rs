use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use shared::{
    c64,
    info,
    ndarray::{Array1, Array2, Axis, Ix2},
    numeric_methods::{average_correlation, get_spectrum_rows},
};

use crate::configurators::{
    AtomSelectionConfigurator,
    AtomTransmutationConfigurator,
    FramesConfigurator,
    InstrumentResolutionConfigurator,
    OutputFilesConfigurator,
    ProjectionConfigurator,
    QVectorsConfigurator,
    SelectionGroups,
    TrajectoryConfigurator,
    WeightsConfigurator,
};
use crate::core::{
    Configuration,
    ConfiguratorCatalog,
    ConfiguratorSpec,
    Job,
    JobDefinition,
};
use crate::error::{Error, Result};
use crate::output::{
    OutputData,
    OutputFormat,
    OutputVariable,
    VariableKind,
};
use crate::trajectory::{Projector, Trajectory};
use super::{output_header, weighted_total};


fn fqt_name(element: &str) -> String {
    format!("f(q,t)_{}", element)
}

fn sqf_name(element: &str) -> String {
    format!("s(q,f)_{}", element)
}


/// Dynamic incoherent structure factor.
///
/// Each step handles one group of the selection: its mean position over the selected
/// frames gives, for every q shell, the average autocorrelation of `exp(i q.r(t))`
/// over the shell's vectors. Partial results are summed per element, normalized by
/// the group count of the element and Fourier transformed with the instrument
/// resolution's time window into `s(q,f)`.
pub struct Disf {
    trajectory: Option<Arc<Trajectory>>,
    frames: Vec<usize>,
    time: Array1<f64>,
    time_step: f64,
    frequencies: Array1<f64>,
    frequency_window: Array1<f64>,
    time_window: Array1<f64>,
    shells: Vec<f64>,
    q_vectors: Vec<Array2<f64>>,
    groups: SelectionGroups,
    projector: Projector,
    weights: BTreeMap<String, f64>,
    output_root: PathBuf,
    formats: Vec<OutputFormat>,
    header: String,
    output: OutputData,
    written: Vec<PathBuf>,
}


impl Disf {
    pub fn get_output(&self) -> &OutputData { &self.output }

    /// Files written by `finalize`.
    pub fn get_written_files(&self) -> &[PathBuf] { &self.written }

    fn trajectory(&self) -> Result<&Trajectory> {
        self.trajectory.as_deref()
            .ok_or_else(|| Error::computation("run_step", "the trajectory is already released"))
    }
}


impl JobDefinition for Disf {
    const NAME: &'static str = "disf";
    const LABEL: &'static str = "Dynamic Incoherent Structure Factor";

    fn catalog() -> ConfiguratorCatalog {
        ConfiguratorCatalog::new()
            .with(ConfiguratorSpec::new("trajectory", "trajectory"))
            .with(ConfiguratorSpec::new("frames", "frames")
                .depends_on("trajectory"))
            .with(ConfiguratorSpec::new("instrument_resolution", "instrument_resolution")
                .depends_on("frames"))
            .with(ConfiguratorSpec::new("q_vectors", "q_vectors")
                .depends_on("trajectory"))
            .with(ConfiguratorSpec::new("atom_selection", "atom_selection")
                .depends_on("trajectory")
                .depends_on("grouping_level"))
            .with(ConfiguratorSpec::new("grouping_level", "grouping_level"))
            .with(ConfiguratorSpec::new("transmutated_atoms", "atom_transmutation")
                .depends_on("trajectory")
                .depends_on("atom_selection"))
            .with(ConfiguratorSpec::new("projection", "projection")
                .with_label("project coordinates"))
            .with(ConfiguratorSpec::new("weights", "weights")
                .with_option("default", "b_incoherent")
                .depends_on("atom_selection")
                .with_dependency("transmutation", "transmutated_atoms"))
            .with(ConfiguratorSpec::new("output_files", "output_files")
                .with_option("formats", vec!["hdf5", "ascii"])
                .with_option("default_root", "disf"))
            .with(ConfiguratorSpec::new("running_mode", "running_mode"))
    }


    fn from_configuration(cfg: Configuration) -> Result<Self> {
        let trajectory = cfg.get::<TrajectoryConfigurator>("trajectory")?.get_instance()?;
        let frames = cfg.get::<FramesConfigurator>("frames")?;
        let resolution = cfg.get::<InstrumentResolutionConfigurator>("instrument_resolution")?;
        let qvectors = cfg.get::<QVectorsConfigurator>("q_vectors")?;
        let selection = cfg.get::<AtomSelectionConfigurator>("atom_selection")?;
        let transmutation = cfg.get::<AtomTransmutationConfigurator>("transmutated_atoms")?;
        let output = cfg.get::<OutputFilesConfigurator>("output_files")?;

        let shells = qvectors.get_shells().to_vec();
        let q_vectors = shells.iter()
            .map(|&q| qvectors.shell(q)
                .map(|s| s.q_vectors.clone())
                .ok_or_else(|| Error::computation("initialize", format!("no q vectors for shell {}", q))))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            trajectory: Some(trajectory),
            frames: frames.get_value().to_vec(),
            time: frames.get_relative_time(),
            time_step: resolution.get_time_step(),
            frequencies: resolution.get_frequencies().clone(),
            frequency_window: resolution.get_frequency_window(),
            time_window: resolution.get_time_window(),
            shells,
            q_vectors,
            groups: SelectionGroups::new(selection, Some(transmutation)),
            projector: cfg.get::<ProjectionConfigurator>("projection")?.get_projector(),
            weights: cfg.get::<WeightsConfigurator>("weights")?.get_weights().clone(),
            output_root: output.get_root().to_path_buf(),
            formats: output.get_formats().to_vec(),
            header: output_header(Self::LABEL, &cfg),
            output: OutputData::new(),
            written: vec![],
        })
    }
}


impl Job for Disf {
    /// `[nshells, nframes]` correlation of one group.
    type Partial = Array2<f64>;

    fn number_of_steps(&self) -> usize {
        self.groups.groups.len()
    }


    fn initialize(&mut self) -> Result<()> {
        use VariableKind::*;

        let nq = self.shells.len();
        let nt = self.frames.len();
        let nf = self.frequencies.len();

        let out = &mut self.output;
        *out = OutputData::new();
        out.add(OutputVariable::from_data("q", Line, Array1::from(self.shells.clone()).into_dyn(), "index", "1/nm")?)?;
        out.add(OutputVariable::from_data("time", Line, self.time.clone().into_dyn(), "index", "ps")?)?;
        out.add(OutputVariable::from_data("time_window", Line, self.time_window.clone().into_dyn(), "index", "au")?)?;
        out.add(OutputVariable::from_data("frequency", Line, self.frequencies.clone().into_dyn(), "index", "rad/ps")?)?;
        out.add(OutputVariable::from_data("frequency_window", Line, self.frequency_window.clone().into_dyn(), "frequency", "au")?)?;

        for el in self.groups.elements() {
            out.add(OutputVariable::zeros(&fqt_name(el), Surface, &[nq, nt], "q|time", "au")?)?;
            out.add(OutputVariable::zeros(&sqf_name(el), Surface, &[nq, nf], "q|frequency", "nm2/ps")?)?;
        }
        out.add(OutputVariable::zeros(&fqt_name("total"), Surface, &[nq, nt], "q|time", "au")?)?;
        out.add(OutputVariable::zeros(&sqf_name("total"), Surface, &[nq, nf], "q|frequency", "nm2/ps")?)?;

        info!("DISF over {} groups, {} frames and {} q shells.", self.groups.groups.len(), nt, nq);
        Ok(())
    }


    fn run_step(&self, index: usize) -> Result<(usize, Array2<f64>)> {
        let traj = self.trajectory()?;
        let group = self.groups.groups.get(index)
            .ok_or_else(|| Error::computation("run_step", format!("no group #{}", index)))?;

        let mut series = traj.read_atoms_trajectory(group, &self.frames);
        self.projector.apply(&mut series);

        let mut ret = Array2::<f64>::zeros((self.shells.len(), self.frames.len()));
        for (mut row, qvs) in ret.axis_iter_mut(Axis(0)).zip(self.q_vectors.iter()) {
            let rho = series.dot(qvs)
                .mapv(|phase| c64::new(phase.cos(), phase.sin()));
            row.assign(&average_correlation(rho.view()));
        }

        Ok((index, ret))
    }


    fn combine(&mut self, index: usize, partial: Array2<f64>) -> Result<()> {
        let element = self.groups.group_elements.get(index)
            .ok_or_else(|| Error::computation("combine", format!("no group #{}", index)))?;
        self.output.get_mut(&fqt_name(element))?
            .accumulate(partial.view().into_dyn())
    }


    fn finalize(&mut self) -> Result<()> {
        for (el, &n) in self.groups.n_per_element.iter() {
            let fqt = self.output.get_mut(&fqt_name(el))?;
            fqt.get_data_mut().mapv_inplace(|v| v / n as f64);

            let fqt = fqt.get_data().view()
                .into_dimensionality::<Ix2>()
                .map_err(|e| Error::computation("finalize", e))?;
            let sqf = get_spectrum_rows(fqt, self.time_window.view(), self.time_step)
                .map_err(|e| Error::computation("finalize", e))?;
            self.output.get_mut(&sqf_name(el))?.assign(sqf.view().into_dyn())?;
        }

        for prefix in ["f(q,t)", "s(q,f)"] {
            let total = weighted_total(&self.output, prefix, &self.weights)?;
            self.output.get_mut(&format!("{}_total", prefix))?.assign(total.view())?;
        }

        self.written = self.output.write(&self.output_root, &self.formats, &self.header)?;
        self.trajectory = None;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use std::f64::consts::PI;
    use std::path::Path;

    use shared::ndarray::{array, Array3};

    use super::*;
    use crate::core::{
        JobRunner,
        Outcome,
        Plugins,
        RunningMode,
        Status,
    };
    use crate::jobs::prepare;
    use crate::trajectory::Universe;

    /// A hydrogen moving 0.1 nm per frame along x and a fixed oxygen, 1 nm cubic cell.
    fn save_two_atoms(dir: &Path) -> PathBuf {
        save_moving_and_fixed(dir, "H", "O")
    }

    /// First atom moves 0.1 nm per frame along x, the second one stays put. Three frames
    /// of 0.1 ps in a 1 nm cubic cell.
    fn save_moving_and_fixed(dir: &Path, moving: &str, fixed: &str) -> PathBuf {
        let universe = Universe::from_elements(&[moving.to_string(), fixed.to_string()]);
        let mut coordinates = Array3::<f64>::zeros((3, 2, 3));
        for i in 0 .. 3 {
            coordinates[[i, 0, 0]] = 0.1 * i as f64;
            coordinates[[i, 1, 1]] = 0.5;
        }
        let mut cells = Array3::<f64>::zeros((3, 3, 3));
        for i in 0 .. 3 {
            for k in 0 .. 3 {
                cells[[i, k, k]] = 1.0;
            }
        }
        let traj = Trajectory::new(universe, coordinates, Some(cells), array![0.0, 0.1, 0.2]).unwrap();
        let fname = dir.join(format!("{}_{}.h5", moving, fixed));
        traj.save_to_h5(&fname).unwrap();
        fname
    }

    fn input(traj: &Path, root: &Path, extra: &str) -> toml::Table {
        let txt = format!(r#"
            trajectory = {:?}
            q_vectors = {{ generator = "spherical_lattice", seed = 3, shells = [6.0, 6.0, 1.0], n_vectors = 6, width = 1.0 }}
            output_files = {{ root = {:?}, formats = ["hdf5", "ascii"] }}
            {}
            "#, traj, root, extra);
        toml::from_str(&txt).unwrap()
    }

    fn run(values: &toml::Table, mode: RunningMode) -> Disf {
        let prepared = prepare::<Disf>(values, &Plugins::builtin(), &Status::new()).unwrap();
        let mut job = prepared.job;
        let ret = JobRunner::new(mode).with_chunk_size(2).run(&mut job).unwrap();
        assert_eq!(ret, Outcome::Completed(()));
        job
    }

    fn data(job: &Disf, name: &str) -> Vec<f64> {
        job.get_output().get(name).unwrap().get_data().iter().cloned().collect()
    }

    #[test]
    fn test_two_atoms() {
        let dir = tempfile::tempdir().unwrap();
        let traj = save_two_atoms(dir.path());
        let root = dir.path().join("out").join("disf");
        let job = run(&input(&traj, &root, ""), RunningMode::Serial);

        assert_eq!(data(&job, "q"), vec![6.0]);
        assert_eq!(data(&job, "time").len(), 3);
        assert_eq!(data(&job, "frequency").len(), 5);

        // Only the two vectors along x see the motion of H.
        let expected = (0 .. 3)
            .map(|t| (2.0 * (2.0 * PI * 0.1 * t as f64).cos() + 4.0) / 6.0)
            .collect::<Vec<_>>();
        for (a, b) in data(&job, "f(q,t)_H").iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1E-9, "{} != {}", a, b);
        }
        for v in data(&job, "f(q,t)_O") {
            assert!((v - 1.0).abs() < 1E-9);
        }

        // b_incoherent of O is zero.
        assert_eq!(job.get_output().get("f(q,t)_total").unwrap().get_data(),
                   job.get_output().get("f(q,t)_H").unwrap().get_data());

        // Constant signal with the ideal kernel: a single peak at zero frequency.
        let s = data(&job, "s(q,f)_O");
        assert!((s[2] - 5.0 * 0.5 * 0.1 / PI).abs() < 1E-9);
        for i in [0, 1, 3, 4] {
            assert!(s[i].abs() < 1E-9);
        }

        assert_eq!(job.get_output().get("s(q,f)_total").unwrap().get_units(), "nm2/ps");
        assert_eq!(job.get_output().get("f(q,t)_H").unwrap().get_units(), "au");

        assert_eq!(job.get_written_files().len(), 2);
        assert!(dir.path().join("out/disf.h5").is_file());
        assert!(dir.path().join("out/disf.dat").is_file());
        assert!(!dir.path().join("out/disf.h5.part").exists());
        assert!(job.trajectory().is_err());
    }

    #[test]
    fn test_per_element_average() {
        let dir = tempfile::tempdir().unwrap();
        let traj = save_moving_and_fixed(dir.path(), "H", "H");
        let root = dir.path().join("hh");
        let job = run(&input(&traj, &root, ""), RunningMode::Serial);

        // Mean of the moving atom's (2cos(0.2 pi t) + 4)/6 and the fixed atom's 1.
        let expected = (0 .. 3)
            .map(|t| ((2.0 * (2.0 * PI * 0.1 * t as f64).cos() + 4.0) / 6.0 + 1.0) / 2.0)
            .collect::<Vec<_>>();
        let fqt = data(&job, "f(q,t)_H");
        assert_eq!(fqt.len(), 3);
        assert!((fqt[0] - 1.0).abs() < 1E-9);
        for (a, b) in fqt.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1E-9, "{} != {}", a, b);
        }
        assert_eq!(data(&job, "f(q,t)_total"), fqt);
    }

    #[test]
    fn test_equal_weights_and_projection() {
        let dir = tempfile::tempdir().unwrap();
        let traj = save_two_atoms(dir.path());
        let root = dir.path().join("disf");
        let extra = r#"
            weights = "equal"
            projection = { planar = [1.0, 0.0, 0.0] }
            instrument_resolution = { kernel = "gaussian", sigma = 5.0 }
            "#;
        let job = run(&input(&traj, &root, extra), RunningMode::Serial);

        // Motion along x is projected out.
        for v in data(&job, "f(q,t)_H").into_iter().chain(data(&job, "f(q,t)_total")) {
            assert!((v - 1.0).abs() < 1E-9);
        }
    }

    #[test]
    fn test_serial_parallel_and_permuted_combine_agree() {
        let dir = tempfile::tempdir().unwrap();
        let traj = crate::configurators::tests::save_water_trajectory(dir.path());
        let q_vectors = r#"q_vectors = { generator = "spherical_lattice", seed = 7, shells = [3.0, 6.0, 3.0], n_vectors = 5, width = 1.0 }"#;

        let values = |root: &str| {
            let txt = format!("trajectory = {:?}\n{}\noutput_files = {{ root = {:?}, formats = [\"ascii\"] }}",
                traj, q_vectors, dir.path().join(root));
            toml::from_str::<toml::Table>(&txt).unwrap()
        };

        let serial = run(&values("serial"), RunningMode::Serial);
        let parallel = run(&values("parallel"), RunningMode::Parallel { nthreads: 3 });
        assert_eq!(serial.get_output(), parallel.get_output());

        let mut permuted = prepare::<Disf>(&values("permuted"), &Plugins::builtin(), &Status::new()).unwrap().job;
        permuted.initialize().unwrap();
        let n = permuted.number_of_steps();
        assert_eq!(n, 7);
        let partials = (0 .. n).rev().map(|i| permuted.run_step(i).unwrap()).collect::<Vec<_>>();
        for (i, p) in partials {
            permuted.combine(i, p).unwrap();
        }
        permuted.finalize().unwrap();

        for var in serial.get_output().iter() {
            let other = permuted.get_output().get(var.get_name()).unwrap();
            for (a, b) in var.get_data().iter().zip(other.get_data().iter()) {
                assert!((a - b).abs() < 1E-12, "{}: {} != {}", var.get_name(), a, b);
            }
        }
    }

    #[test]
    fn test_cancelled_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let traj = save_two_atoms(dir.path());
        let root = dir.path().join("cancelled");
        let status = Status::new();
        let mut job = prepare::<Disf>(&input(&traj, &root, ""), &Plugins::builtin(), &status).unwrap().job;

        status.stop();
        let ret = JobRunner::new(RunningMode::Serial).with_status(status).run(&mut job).unwrap();
        assert_eq!(ret, Outcome::Cancelled);
        assert!(!dir.path().join("cancelled.h5").exists());
        assert!(!dir.path().join("cancelled.dat").exists());
    }
}
