//! Built-in configurator kinds.

use crate::core::{
    ConfiguratorFactory,
    Registry,
};

mod basic;
mod paths;
mod physics;
mod running_mode;
mod selection;
mod trajectory;

pub use basic::{
    BooleanConfigurator,
    FloatConfigurator,
    IntegerConfigurator,
    RangeConfigurator,
    RangeType,
    SingleChoiceConfigurator,
};
pub use paths::{
    normalize_path,
    InputDirectoryConfigurator,
    OutputFilesConfigurator,
};
pub use physics::{
    InstrumentResolutionConfigurator,
    ProjectionConfigurator,
    QVectorsConfigurator,
};
pub use running_mode::RunningModeConfigurator;
pub use selection::{
    AtomSelectionConfigurator,
    AtomTransmutationConfigurator,
    GroupingLevelConfigurator,
    SelectionGroups,
    WeightsConfigurator,
};
pub use trajectory::{
    FramesConfigurator,
    TrajectoryConfigurator,
};


pub fn register_all(registry: &mut Registry<ConfiguratorFactory>) {
    registry.register("boolean", |s| Ok(Box::new(BooleanConfigurator::new(s)?)));
    registry.register("integer", |s| Ok(Box::new(IntegerConfigurator::new(s)?)));
    registry.register("float", |s| Ok(Box::new(FloatConfigurator::new(s)?)));
    registry.register("single_choice", |s| Ok(Box::new(SingleChoiceConfigurator::new(s)?)));
    registry.register("range", |s| Ok(Box::new(RangeConfigurator::new(s)?)));
    registry.register("input_directory", |s| Ok(Box::new(InputDirectoryConfigurator::new(s)?)));
    registry.register("output_files", |s| Ok(Box::new(OutputFilesConfigurator::new(s)?)));
    registry.register("trajectory", |s| Ok(Box::new(TrajectoryConfigurator::new(s)?)));
    registry.register("frames", |s| Ok(Box::new(FramesConfigurator::new(s)?)));
    registry.register("instrument_resolution", |s| Ok(Box::new(InstrumentResolutionConfigurator::new(s)?)));
    registry.register("q_vectors", |s| Ok(Box::new(QVectorsConfigurator::new(s)?)));
    registry.register("grouping_level", |s| Ok(Box::new(GroupingLevelConfigurator::new(s)?)));
    registry.register("atom_selection", |s| Ok(Box::new(AtomSelectionConfigurator::new(s)?)));
    registry.register("atom_transmutation", |s| Ok(Box::new(AtomTransmutationConfigurator::new(s)?)));
    registry.register("projection", |s| Ok(Box::new(ProjectionConfigurator::new(s)?)));
    registry.register("weights", |s| Ok(Box::new(WeightsConfigurator::new(s)?)));
    registry.register("running_mode", |s| Ok(Box::new(RunningModeConfigurator::new(s)?)));
}


#[cfg(test)]
pub(crate) mod tests {
    use std::path::{Path, PathBuf};

    use shared::ndarray::{array, Array3};

    use super::*;
    use crate::core::{
        ConfiguratorCatalog,
        ConfiguratorSpec,
        Configuration,
        Plugins,
        RunningMode,
        Status,
    };
    use crate::error::{ConfigurationError, Error};
    use crate::trajectory::{
        universe::tests::water_universe,
        Atom,
        Projector,
        Trajectory,
        Universe,
    };

    fn resolve(catalog: &ConfiguratorCatalog, input: &str) -> Result<Configuration, Error> {
        let input: toml::Table = toml::from_str(input).unwrap();
        Configuration::resolve(catalog, &Plugins::builtin(), &input, &Status::new())
    }

    fn cfg_range(catalog: &ConfiguratorCatalog, input: &str) -> Vec<f64> {
        resolve(catalog, input).unwrap()
            .get::<RangeConfigurator>("frames").unwrap()
            .get_values().to_vec()
    }

    fn invalid_name(e: Error) -> String {
        match e {
            Error::Configuration(ConfigurationError::InvalidValue { name, .. }) => name,
            e => panic!("unexpected error {:?}", e),
        }
    }

    /// Two waters and an argon atom in a 2 nm box, four frames of 0.1 ps.
    pub(crate) fn save_water_trajectory(dir: &Path) -> PathBuf {
        let coordinates = Array3::from_shape_fn((4, 7, 3), |(i, j, k)| (i + j + k) as f64 * 0.01);
        let mut cells = Array3::<f64>::zeros((4, 3, 3));
        for i in 0 .. 4 {
            for k in 0 .. 3 {
                cells[[i, k, k]] = 2.0;
            }
        }
        let traj = Trajectory::new(water_universe(), coordinates, Some(cells), array![0.0, 0.1, 0.2, 0.3]).unwrap();
        let fname = dir.join("water.h5");
        traj.save_to_h5(&fname).unwrap();
        fname
    }

    fn water_catalog() -> ConfiguratorCatalog {
        ConfiguratorCatalog::new()
            .with(ConfiguratorSpec::new("trajectory", "trajectory"))
            .with(ConfiguratorSpec::new("frames", "frames").depends_on("trajectory"))
            .with(ConfiguratorSpec::new("atom_selection", "atom_selection")
                .depends_on("trajectory")
                .depends_on("grouping_level"))
            .with(ConfiguratorSpec::new("grouping_level", "grouping_level"))
            .with(ConfiguratorSpec::new("transmutated_atoms", "atom_transmutation")
                .depends_on("trajectory")
                .depends_on("atom_selection"))
            .with(ConfiguratorSpec::new("weights", "weights")
                .depends_on("atom_selection")
                .with_dependency("transmutation", "transmutated_atoms"))
    }

    #[test]
    fn test_basic_kinds() {
        let catalog = ConfiguratorCatalog::new()
            .with(ConfiguratorSpec::new("flag", "boolean").with_option("default", true))
            .with(ConfiguratorSpec::new("count", "integer")
                .with_option("mini", 1)
                .with_option("maxi", 10)
                .with_option("default", 5))
            .with(ConfiguratorSpec::new("ratio", "float").with_option("mini", 0.0))
            .with(ConfiguratorSpec::new("color", "single_choice")
                .with_option("choices", toml::Value::Array(vec!["red".into(), "blue".into()])))
            .with(ConfiguratorSpec::new("shells", "range")
                .with_option("value_type", "float")
                .with_option("include_last", true));

        let cfg = resolve(&catalog, "ratio = 2\nshells = [0.5, 2.0, 0.5]").unwrap();
        assert!(cfg.get::<BooleanConfigurator>("flag").unwrap().get_value());
        assert_eq!(cfg.get::<IntegerConfigurator>("count").unwrap().get_value(), 5);
        assert_eq!(cfg.get::<FloatConfigurator>("ratio").unwrap().get_value(), 2.0);
        assert_eq!(cfg.get::<SingleChoiceConfigurator>("color").unwrap().get_value(), "red");
        assert_eq!(cfg.get::<RangeConfigurator>("shells").unwrap().get_values(), &[0.5, 1.0, 1.5, 2.0]);
        assert!(cfg.get::<FloatConfigurator>("count").is_err());

        assert_eq!(invalid_name(resolve(&catalog, "count = 11").err().unwrap()), "count");
        assert_eq!(invalid_name(resolve(&catalog, "ratio = -1.0").err().unwrap()), "ratio");
        assert_eq!(invalid_name(resolve(&catalog, "color = \"green\"").err().unwrap()), "color");
        assert_eq!(invalid_name(resolve(&catalog, "shells = [2.0, 1.0, 0.5]").err().unwrap()), "shells");
        assert_eq!(invalid_name(resolve(&catalog, "shells = [0.0, inf, 1.0]").err().unwrap()), "shells");
        assert_eq!(invalid_name(resolve(&catalog, "shells = [0.0, 10.0, nan]").err().unwrap()), "shells");
        assert_eq!(invalid_name(resolve(&catalog, "shells = [0.0, 10.0, 1e-12]").err().unwrap()), "shells");

        let capped = ConfiguratorCatalog::new()
            .with(ConfiguratorSpec::new("frames", "range").with_option("maxi_count", 3));
        assert_eq!(cfg_range(&capped, "frames = [0, 3, 1]"), vec![0.0, 1.0, 2.0]);
        assert_eq!(invalid_name(resolve(&capped, "frames = [0, 4, 1]").err().unwrap()), "frames");
        assert_eq!(invalid_name(resolve(&catalog, "flag = 1").err().unwrap()), "flag");

        let bad = ConfiguratorCatalog::new()
            .with(ConfiguratorSpec::new("color", "single_choice"));
        assert!(matches!(resolve(&bad, ""), Err(Error::Configuration(ConfigurationError::Definition { .. }))));
        let bad = ConfiguratorCatalog::new()
            .with(ConfiguratorSpec::new("count", "integer").with_option("colour", 1));
        assert!(matches!(resolve(&bad, ""), Err(Error::Configuration(ConfigurationError::Definition { .. }))));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/a/b/../c/./d").unwrap(), PathBuf::from("/a/c/d"));
        assert!(normalize_path("relative").unwrap().is_absolute());
    }

    #[test]
    fn test_input_directory_and_output_files() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = ConfiguratorCatalog::new()
            .with(ConfiguratorSpec::new("input", "input_directory"))
            .with(ConfiguratorSpec::new("output_files", "output_files")
                .with_option("formats", toml::Value::Array(vec!["hdf5".into(), "ascii".into()])));

        let root = dir.path().join("results").join("run");
        let input = format!("input = {:?}\noutput_files = {{ root = {:?}, formats = [\"ascii\"] }}",
            dir.path().join("x").join("..").to_string_lossy(), root.to_string_lossy());
        let cfg = resolve(&catalog, &input).unwrap();
        assert_eq!(cfg.get::<InputDirectoryConfigurator>("input").unwrap().get_value(), Some(dir.path()));
        let out = cfg.get::<OutputFilesConfigurator>("output_files").unwrap();
        assert_eq!(out.get_root(), root.as_path());
        assert_eq!(out.get_formats().len(), 1);
        assert!(dir.path().join("results").is_dir());

        let input = format!("input = {:?}", dir.path().join("missing").to_string_lossy());
        assert_eq!(invalid_name(resolve(&catalog, &input).err().unwrap()), "input");
    }

    #[test]
    fn test_selection_and_weights() {
        let dir = tempfile::tempdir().unwrap();
        let fname = save_water_trajectory(dir.path());
        let catalog = water_catalog();

        let input = format!("trajectory = {:?}", fname.to_string_lossy());
        let cfg = resolve(&catalog, &input).unwrap();
        let frames = cfg.get::<FramesConfigurator>("frames").unwrap();
        assert_eq!(frames.get_value(), &[0, 1, 2, 3]);
        assert!((frames.get_time_step() - 0.1).abs() < 1E-12);
        let sel = cfg.get::<AtomSelectionConfigurator>("atom_selection").unwrap();
        assert_eq!(sel.n_groups(), 7);
        let weights = cfg.get::<WeightsConfigurator>("weights").unwrap();
        assert!((weights.get_weight("H") - 4.0 / 7.0).abs() < 1E-12);
        assert!((weights.get_weight("Ar") - 1.0 / 7.0).abs() < 1E-12);

        let input = format!(r#"
            trajectory = {:?}
            frames = [1, -1, 2]
            grouping_level = "molecule"
            atom_selection = {{ molecule_name = ["water"] }}
            weights = "mass"
        "#, fname.to_string_lossy());
        let cfg = resolve(&catalog, &input).unwrap();
        let frames = cfg.get::<FramesConfigurator>("frames").unwrap();
        assert_eq!(frames.get_value(), &[1, 3]);
        let t = frames.get_relative_time();
        assert!(t[0] == 0.0 && (t[1] - 0.2).abs() < 1E-12);
        let sel = cfg.get::<AtomSelectionConfigurator>("atom_selection").unwrap();
        assert_eq!(sel.get_groups(), &[vec![0, 1, 2], vec![3, 4, 5]]);
        assert!((cfg.get::<WeightsConfigurator>("weights").unwrap().get_weight("O") - 1.0).abs() < 1E-12);

        let input = format!(r#"
            trajectory = {:?}
            atom_selection = {{ atom_element = ["H"] }}
            transmutated_atoms = [{{ element = "d", selection = {{ atom_name = ["HW1"] }} }}]
        "#, fname.to_string_lossy());
        let cfg = resolve(&catalog, &input).unwrap();
        let sel = cfg.get::<AtomSelectionConfigurator>("atom_selection").unwrap();
        let trans = cfg.get::<AtomTransmutationConfigurator>("transmutated_atoms").unwrap();
        let groups = SelectionGroups::new(sel, Some(trans));
        assert_eq!(groups.group_elements, vec!["D", "H", "D", "H"]);
        assert_eq!(groups.n_per_element["D"], 2);
        assert!((cfg.get::<WeightsConfigurator>("weights").unwrap().get_weight("D") - 0.5).abs() < 1E-12);

        let cases = [
            ("atom_selection", "atom_selection = { atom_name = [\"XX\"] }"),
            ("atom_selection", "atom_selection = { no_such_selector = [\"XX\"] }"),
            ("weights", "weights = \"b_incoherent\"\natom_selection = { atom_element = [\"O\"] }"),
            ("weights", "weights = \"spin\""),
            ("transmutated_atoms", "transmutated_atoms = [{ element = \"Xx\", selection = \"all\" }]"),
            ("frames", "frames = [3, 2, 1]"),
            ("grouping_level", "grouping_level = \"residue\""),
            ("trajectory", "trajectory = \"/no/such/file.h5\""),
        ];
        for (name, extra) in cases {
            let input = format!("trajectory = {:?}\n{}", fname.to_string_lossy(), extra);
            let input = if name == "trajectory" { extra.to_string() } else { input };
            assert_eq!(invalid_name(resolve(&catalog, &input).err().unwrap()), name, "{}", extra);
        }
    }

    #[test]
    fn test_equal_weights_on_untabulated_elements() {
        let dir = tempfile::tempdir().unwrap();
        let atoms = ["Ti", "Li", "Li"].iter()
            .map(|e| Atom { name: e.to_string(), element: e.to_string() })
            .collect();
        let universe = Universe::new(atoms, vec![]).unwrap();
        let traj = Trajectory::new(universe, Array3::zeros((2, 3, 3)), None, array![0.0, 1.0]).unwrap();
        let fname = dir.path().join("tili.h5");
        traj.save_to_h5(&fname).unwrap();

        let input = format!("trajectory = {:?}\nweights = \"equal\"", fname.to_string_lossy());
        let cfg = resolve(&water_catalog(), &input).unwrap();
        let weights = cfg.get::<WeightsConfigurator>("weights").unwrap();
        assert!((weights.get_weight("Ti") - 1.0 / 3.0).abs() < 1E-12);
        assert!((weights.get_weight("Li") - 2.0 / 3.0).abs() < 1E-12);

        let input = format!("trajectory = {:?}\nweights = \"mass\"", fname.to_string_lossy());
        assert_eq!(invalid_name(resolve(&water_catalog(), &input).err().unwrap()), "weights");
    }

    #[test]
    fn test_physics_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let fname = save_water_trajectory(dir.path());
        let catalog = ConfiguratorCatalog::new()
            .with(ConfiguratorSpec::new("trajectory", "trajectory"))
            .with(ConfiguratorSpec::new("frames", "frames").depends_on("trajectory"))
            .with(ConfiguratorSpec::new("instrument_resolution", "instrument_resolution").depends_on("frames"))
            .with(ConfiguratorSpec::new("q_vectors", "q_vectors").depends_on("trajectory"))
            .with(ConfiguratorSpec::new("projection", "projection"))
            .with(ConfiguratorSpec::new("running_mode", "running_mode"));

        let input = format!(r#"
            trajectory = {:?}
            instrument_resolution = {{ kernel = "gaussian", sigma = 2.0 }}
            q_vectors = {{ generator = "spherical_lattice", seed = 1, shells = [1.0, 4.0, 1.0], n_vectors = 4, width = 1.0 }}
            projection = {{ axial = [0, 0, 3] }}
            running_mode = {{ mode = "parallel", nthreads = 2 }}
        "#, fname.to_string_lossy());
        let cfg = resolve(&catalog, &input).unwrap();

        let res = cfg.get::<InstrumentResolutionConfigurator>("instrument_resolution").unwrap();
        assert_eq!(res.n_frequencies(), 7);
        assert_eq!(res.get_time_window().len(), 7);
        assert!((res.get_frequencies()[3]).abs() < 1E-12);

        // 2 nm cubic box: |q| = pi |hkl|
        let qv = cfg.get::<QVectorsConfigurator>("q_vectors").unwrap();
        assert_eq!(qv.get_shells(), &[3.0, 4.0]);
        assert_eq!(qv.shell(3.0).unwrap().n_q_vectors, 4);

        assert_eq!(cfg.get::<ProjectionConfigurator>("projection").unwrap().get_projector(),
            Projector::Axial([0.0, 0.0, 1.0]));
        assert_eq!(cfg.get::<RunningModeConfigurator>("running_mode").unwrap().get_value(),
            RunningMode::Parallel { nthreads: 2 });

        let input = format!("trajectory = {:?}\nq_vectors = {{ generator = \"spherical_lattice\", width = 0.0 }}",
            fname.to_string_lossy());
        assert_eq!(invalid_name(resolve(&catalog, &input).err().unwrap()), "q_vectors.width");

        let input = format!("trajectory = {:?}\nframes = [0, 1, 1]", fname.to_string_lossy());
        assert_eq!(invalid_name(resolve(&catalog, &input).err().unwrap()), "instrument_resolution");

        let input = format!("trajectory = {:?}\nprojection = {{ planar = [0, 0, 0] }}", fname.to_string_lossy());
        assert_eq!(invalid_name(resolve(&catalog, &input).err().unwrap()), "projection");
    }

    #[test]
    fn test_q_vectors_stopped_during_generation() {
        let dir = tempfile::tempdir().unwrap();
        let fname = save_water_trajectory(dir.path());
        let catalog = ConfiguratorCatalog::new()
            .with(ConfiguratorSpec::new("trajectory", "trajectory"))
            .with(ConfiguratorSpec::new("q_vectors", "q_vectors").depends_on("trajectory"));
        let input: toml::Table = toml::from_str(&format!(
            "trajectory = {:?}\nq_vectors = {{ generator = \"spherical_lattice\", seed = 1, shells = [3.0, 9.0, 3.0] }}",
            fname.to_string_lossy())).unwrap();

        let status = crate::qvectors::spherical_lattice::tests::stop_after_first_update();
        let ret = Configuration::resolve(&catalog, &Plugins::builtin(), &input, &status);
        assert!(matches!(ret, Err(Error::Cancelled)));
        assert_eq!(status.progress(), (1, 3));
    }
}
