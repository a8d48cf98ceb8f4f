use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use shared::{
    info,
    ndarray::{Array1, Axis},
    numeric_methods::msd_1d,
};

use crate::configurators::{
    AtomSelectionConfigurator,
    AtomTransmutationConfigurator,
    FramesConfigurator,
    OutputFilesConfigurator,
    ProjectionConfigurator,
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


/// Mean square displacement of the mean position of each group.
pub struct Msd {
    trajectory: Option<Arc<Trajectory>>,
    frames: Vec<usize>,
    time: Array1<f64>,
    groups: SelectionGroups,
    projector: Projector,
    weights: BTreeMap<String, f64>,
    output_root: PathBuf,
    formats: Vec<OutputFormat>,
    header: String,
    output: OutputData,
}


impl Msd {
    pub fn get_output(&self) -> &OutputData { &self.output }
}


impl JobDefinition for Msd {
    const NAME: &'static str = "msd";
    const LABEL: &'static str = "Mean Square Displacement";

    fn catalog() -> ConfiguratorCatalog {
        ConfiguratorCatalog::new()
            .with(ConfiguratorSpec::new("trajectory", "trajectory"))
            .with(ConfiguratorSpec::new("frames", "frames")
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
                .depends_on("atom_selection")
                .with_dependency("transmutation", "transmutated_atoms"))
            .with(ConfiguratorSpec::new("output_files", "output_files")
                .with_option("formats", vec!["hdf5", "ascii"])
                .with_option("default_root", "msd"))
            .with(ConfiguratorSpec::new("running_mode", "running_mode"))
    }


    fn from_configuration(cfg: Configuration) -> Result<Self> {
        let frames = cfg.get::<FramesConfigurator>("frames")?;
        let selection = cfg.get::<AtomSelectionConfigurator>("atom_selection")?;
        let transmutation = cfg.get::<AtomTransmutationConfigurator>("transmutated_atoms")?;
        let output = cfg.get::<OutputFilesConfigurator>("output_files")?;

        Ok(Self {
            trajectory: Some(cfg.get::<TrajectoryConfigurator>("trajectory")?.get_instance()?),
            frames: frames.get_value().to_vec(),
            time: frames.get_relative_time(),
            groups: SelectionGroups::new(selection, Some(transmutation)),
            projector: cfg.get::<ProjectionConfigurator>("projection")?.get_projector(),
            weights: cfg.get::<WeightsConfigurator>("weights")?.get_weights().clone(),
            output_root: output.get_root().to_path_buf(),
            formats: output.get_formats().to_vec(),
            header: output_header(Self::LABEL, &cfg),
            output: OutputData::new(),
        })
    }
}


impl Job for Msd {
    type Partial = Array1<f64>;

    fn number_of_steps(&self) -> usize {
        self.groups.groups.len()
    }


    fn initialize(&mut self) -> Result<()> {
        let nt = self.frames.len();
        let out = &mut self.output;
        *out = OutputData::new();
        out.add(OutputVariable::from_data("time", VariableKind::Line, self.time.clone().into_dyn(), "index", "ps")?)?;
        for el in self.groups.elements() {
            out.add(OutputVariable::zeros(&format!("msd_{}", el), VariableKind::Line, &[nt], "time", "nm2")?)?;
        }
        out.add(OutputVariable::zeros("msd_total", VariableKind::Line, &[nt], "time", "nm2")?)?;

        info!("MSD over {} groups and {} frames.", self.groups.groups.len(), nt);
        Ok(())
    }


    fn run_step(&self, index: usize) -> Result<(usize, Array1<f64>)> {
        let traj = self.trajectory.as_deref()
            .ok_or_else(|| Error::computation("run_step", "the trajectory is already released"))?;
        let group = self.groups.groups.get(index)
            .ok_or_else(|| Error::computation("run_step", format!("no group #{}", index)))?;

        let mut series = traj.read_atoms_trajectory(group, &self.frames);
        self.projector.apply(&mut series);

        let mut ret = Array1::<f64>::zeros(self.frames.len());
        for xs in series.axis_iter(Axis(1)) {
            ret += &msd_1d(xs);
        }
        Ok((index, ret))
    }


    fn combine(&mut self, index: usize, partial: Array1<f64>) -> Result<()> {
        let element = self.groups.group_elements.get(index)
            .ok_or_else(|| Error::computation("combine", format!("no group #{}", index)))?;
        self.output.get_mut(&format!("msd_{}", element))?
            .accumulate(partial.view().into_dyn())
    }


    fn finalize(&mut self) -> Result<()> {
        for (el, &n) in self.groups.n_per_element.iter() {
            self.output.get_mut(&format!("msd_{}", el))?
                .get_data_mut()
                .mapv_inplace(|v| v / n as f64);
        }

        let total = weighted_total(&self.output, "msd", &self.weights)?;
        self.output.get_mut("msd_total")?.assign(total.view())?;

        self.output.write(&self.output_root, &self.formats, &self.header)?;
        self.trajectory = None;
        Ok(())
    }
}
