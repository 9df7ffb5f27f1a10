use std::path::PathBuf;

use ndarray::{Array2, Array3};

use rollplot::environments::Cstr;
use rollplot::policies::{ConstantPolicy, ProportionalPolicy};
use rollplot::policy::Policy;
use rollplot::{
    PlotConfig, PlotError, PolicyRollouts, RolloutConfig, RolloutDataset, collect_rollouts,
    performance_plots,
};

fn unique_path(name: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!(
        "rollplot_it_{}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos(),
        name
    ));
    p
}

fn constant_rollouts(steps: usize, reps: usize, reward: f64) -> PolicyRollouts {
    PolicyRollouts {
        x: Array3::from_shape_fn((2, steps, reps), |(d, t, _)| {
            if d == 0 { 0.8 + 0.001 * t as f64 } else { 330.0 }
        }),
        u: Array3::from_elem((1, steps, reps), 300.0),
        r: Array2::from_elem((steps, reps), reward),
    }
}

fn synthetic_dataset(steps: usize, reps: usize) -> RolloutDataset {
    let mut ds = RolloutDataset::new(constant_rollouts(steps, reps, 10.0));
    ds.policies.insert("ppo".into(), constant_rollouts(steps, reps, 1.0));
    ds.policies.insert("sac".into(), constant_rollouts(steps, reps, -1.0));
    ds.reference.insert("Ca".into(), vec![0.85; steps]);
    ds
}

fn config_writing_to(path: &PathBuf) -> PlotConfig {
    PlotConfig {
        output: path.to_string_lossy().into_owned(),
        ..PlotConfig::default()
    }
}

#[test]
fn synthetic_dataset_renders_with_zero_spread() {
    let out = unique_path("synthetic.svg");
    let ds = synthetic_dataset(60, 5);
    let policies = vec!["ppo".to_string(), "sac".to_string()];

    let summary = performance_plots(&ds, &policies, &config_writing_to(&out)).unwrap();

    assert!(out.exists());
    let svg = std::fs::read_to_string(&out).unwrap();
    let _ = std::fs::remove_file(&out);
    assert!(svg.contains("<svg"));

    assert_eq!(summary.oracle_median, 600.0);
    assert_eq!(summary.mad, vec![("ppo".to_string(), 0.0), ("sac".to_string(), 0.0)]);
    assert_eq!(summary.optimality_gaps[0].1, vec![540.0; 5]);
    assert_eq!(summary.optimality_gaps[1].1, vec![660.0; 5]);
}

#[test]
fn too_many_policies_is_reported_before_drawing() {
    let out = unique_path("too_many.svg");
    let mut ds = synthetic_dataset(10, 2);
    for name in ["a2c", "ddpg", "td3"] {
        ds.policies.insert(name.into(), constant_rollouts(10, 2, 0.0));
    }
    let policies: Vec<String> = ["ppo", "sac", "a2c", "ddpg"].iter().map(|s| s.to_string()).collect();

    let err = performance_plots(&ds, &policies, &config_writing_to(&out)).unwrap_err();
    assert!(matches!(err, PlotError::TooManyPolicies { requested: 5, available: 4 }));
    assert!(!out.exists());
}

#[test]
fn collected_rollouts_survive_save_load_and_plot() {
    let env = Cstr::new();
    let mut policies: Vec<(String, Box<dyn Policy>)> = vec![
        ("constant".to_string(), Box::new(ConstantPolicy::new(vec![300.0]))),
        (
            "p-control".to_string(),
            Box::new(ProportionalPolicy::new(0, 2, -60.0, 300.0, (295.0, 302.0))),
        ),
    ];
    let config = RolloutConfig {
        repetitions: 3,
        oracle_horizon: 2,
        oracle_grid: 3,
        seed: 7,
    };
    let ds = collect_rollouts(&env, &mut policies, &config).unwrap();

    let data = unique_path("cstr.json");
    ds.save(&data).unwrap();
    let loaded = RolloutDataset::load(&data).unwrap();
    let _ = std::fs::remove_file(&data);
    assert_eq!(loaded, ds);

    let out = unique_path("cstr.svg");
    let names = vec!["constant".to_string(), "p-control".to_string()];
    let summary = performance_plots(&loaded, &names, &config_writing_to(&out)).unwrap();
    assert!(out.exists());
    let _ = std::fs::remove_file(&out);

    assert_eq!(summary.mad.len(), 2);
    assert!(summary.mad.iter().all(|(_, mad)| mad.is_finite() && *mad >= 0.0));
    // rewards are negative squared tracking errors
    assert!(summary.oracle_median <= 0.0);
}
