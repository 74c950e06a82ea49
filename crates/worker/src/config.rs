//! Command-line configuration.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use frame_core::DEFAULT_POOL_CAPACITY;

const USAGE: &str = "usage: worker <cfg> <weights> <names> [-pose] [-gpu <id>] \
[-thresh <float>] [-pull <endpoint>] [-push <endpoint>] [-pool <frames>]\n\
<names> is required for the object variant and unused by -pose.";

const DEFAULT_PULL_ENDPOINT: &str = "ipc://unprocessed";
const DEFAULT_PUSH_ENDPOINT: &str = "ipc://processed";
const DEFAULT_THRESHOLD: f32 = 0.2;

/// Which detector variant this process runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectorKind {
    Object,
    Pose,
}

impl DetectorKind {
    pub fn label(self) -> &'static str {
        match self {
            DetectorKind::Object => "object",
            DetectorKind::Pose => "pose",
        }
    }
}

/// Resolved startup configuration.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub cfg: PathBuf,
    pub weights: PathBuf,
    pub names: Option<PathBuf>,
    pub kind: DetectorKind,
    pub gpu: usize,
    pub threshold: f32,
    pub pull_endpoint: String,
    pub push_endpoint: String,
    pub pool_capacity: usize,
}

impl WorkerConfig {
    /// Parse the argument list (without the program name).
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut pose = false;
        let mut gpu: usize = 0;
        let mut threshold = DEFAULT_THRESHOLD;
        let mut pull_endpoint = DEFAULT_PULL_ENDPOINT.to_owned();
        let mut push_endpoint = DEFAULT_PUSH_ENDPOINT.to_owned();
        let mut pool_capacity = DEFAULT_POOL_CAPACITY;
        let mut positional: Vec<String> = Vec::new();

        let mut idx = 0;
        while idx < args.len() {
            match args[idx].as_str() {
                "-pose" => {
                    pose = true;
                    idx += 1;
                }
                "-gpu" => {
                    idx += 1;
                    gpu = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("-gpu requires a value"))?
                        .parse()
                        .with_context(|| "-gpu must be a device ordinal".to_string())?;
                    idx += 1;
                }
                "-thresh" => {
                    idx += 1;
                    threshold = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("-thresh requires a value"))?
                        .parse()
                        .with_context(|| "-thresh must be a number".to_string())?;
                    if !(0.0..=1.0).contains(&threshold) {
                        bail!("-thresh must be within [0, 1]");
                    }
                    idx += 1;
                }
                "-pull" => {
                    idx += 1;
                    pull_endpoint = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("-pull requires an endpoint"))?
                        .clone();
                    idx += 1;
                }
                "-push" => {
                    idx += 1;
                    push_endpoint = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("-push requires an endpoint"))?
                        .clone();
                    idx += 1;
                }
                "-pool" => {
                    idx += 1;
                    pool_capacity = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("-pool requires a value"))?
                        .parse()
                        .with_context(|| "-pool must be a frame count".to_string())?;
                    if pool_capacity == 0 {
                        bail!("-pool must be at least 1");
                    }
                    idx += 1;
                }
                arg if arg.starts_with('-') => {
                    bail!("unrecognised flag {arg}\n{USAGE}");
                }
                other => {
                    positional.push(other.to_owned());
                    idx += 1;
                }
            }
        }

        let mut positional = positional.into_iter();
        let cfg = positional.next().map(PathBuf::from);
        let weights = positional.next().map(PathBuf::from);
        let names = positional.next().map(PathBuf::from);

        let (Some(cfg), Some(weights)) = (cfg, weights) else {
            bail!("{USAGE}");
        };
        let kind = if pose {
            DetectorKind::Pose
        } else {
            DetectorKind::Object
        };
        if kind == DetectorKind::Object && names.is_none() {
            bail!("{USAGE}");
        }

        Ok(Self {
            cfg,
            weights,
            names,
            kind,
            gpu,
            threshold,
            pull_endpoint,
            push_endpoint,
            pool_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn object_variant_with_defaults() {
        let config =
            WorkerConfig::from_args(&args(&["yolo.cfg", "yolo.weights", "coco.names"])).unwrap();
        assert_eq!(config.kind, DetectorKind::Object);
        assert_eq!(config.names, Some(PathBuf::from("coco.names")));
        assert_eq!(config.gpu, 0);
        assert_eq!(config.threshold, DEFAULT_THRESHOLD);
        assert_eq!(config.pull_endpoint, "ipc://unprocessed");
        assert_eq!(config.push_endpoint, "ipc://processed");
        assert_eq!(config.pool_capacity, DEFAULT_POOL_CAPACITY);
    }

    #[test]
    fn pose_variant_needs_no_names() {
        let config =
            WorkerConfig::from_args(&args(&["pose.cfg", "pose.weights", "-pose"])).unwrap();
        assert_eq!(config.kind, DetectorKind::Pose);
        assert_eq!(config.names, None);
    }

    #[test]
    fn flags_override_defaults() {
        let config = WorkerConfig::from_args(&args(&[
            "m.cfg", "m.weights", "m.names", "-gpu", "1", "-thresh", "0.5", "-pull",
            "tcp://127.0.0.1:5557", "-push", "tcp://127.0.0.1:5558", "-pool", "16",
        ]))
        .unwrap();
        assert_eq!(config.gpu, 1);
        assert_eq!(config.threshold, 0.5);
        assert_eq!(config.pull_endpoint, "tcp://127.0.0.1:5557");
        assert_eq!(config.push_endpoint, "tcp://127.0.0.1:5558");
        assert_eq!(config.pool_capacity, 16);
    }

    #[test]
    fn missing_arguments_print_usage() {
        let err = WorkerConfig::from_args(&args(&["only.cfg"])).unwrap_err();
        assert!(err.to_string().contains("usage:"));

        // object variant without a names file
        let err = WorkerConfig::from_args(&args(&["m.cfg", "m.weights"])).unwrap_err();
        assert!(err.to_string().contains("usage:"));
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        assert!(
            WorkerConfig::from_args(&args(&["m.cfg", "m.w", "m.n", "-thresh", "1.5"])).is_err()
        );
        assert!(
            WorkerConfig::from_args(&args(&["m.cfg", "m.w", "m.n", "-thresh", "-0.1"])).is_err()
        );
    }

    #[test]
    fn rejects_unknown_flags_and_zero_pool() {
        assert!(WorkerConfig::from_args(&args(&["m.cfg", "m.w", "m.n", "--verbose"])).is_err());
        assert!(WorkerConfig::from_args(&args(&["m.cfg", "m.w", "m.n", "-pool", "0"])).is_err());
    }
}
