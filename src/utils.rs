/// `n` evenly spaced samples over `[start, stop]`, both ends included.
///
/// Matches the usual numeric convention: `n == 0` gives an empty vector,
/// `n == 1` gives `[start]`, and the last sample is exactly `stop`.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            let mut out: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
            out[n - 1] = stop;
            out
        }
    }
}

/// Resolves a dataset name to a file path, appending `.json` when the name
/// carries no extension.
pub fn dataset_path(name: &str) -> std::path::PathBuf {
    let path = std::path::PathBuf::from(name);
    if path.extension().is_some() {
        path
    } else {
        path.with_extension("json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linspace_hits_both_ends() {
        let t = linspace(0.0, 25.0, 60);
        assert_eq!(t.len(), 60);
        assert_eq!(t[0], 0.0);
        assert_eq!(t[59], 25.0);
        assert!(t.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn linspace_small_counts() {
        assert!(linspace(1.0, 2.0, 0).is_empty());
        assert_eq!(linspace(1.0, 2.0, 1), vec![1.0]);
        assert_eq!(linspace(1.0, 2.0, 3), vec![1.0, 1.5, 2.0]);
    }

    #[test]
    fn dataset_path_appends_extension_once() {
        assert_eq!(dataset_path("cstr_data"), std::path::PathBuf::from("cstr_data.json"));
        assert_eq!(dataset_path("cstr_data.json"), std::path::PathBuf::from("cstr_data.json"));
        assert_eq!(dataset_path("out/run.bin"), std::path::PathBuf::from("out/run.bin"));
    }
}
