//! Parameter definitions for hyperparameter search

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A sampled parameter value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    /// Continuous floating-point value
    Float(f64),
    /// Integer value
    Int(i64),
}

impl ParameterValue {
    /// Get as f64 (integers cast)
    pub fn as_f64(&self) -> f64 {
        match self {
            ParameterValue::Float(v) => *v,
            ParameterValue::Int(v) => *v as f64,
        }
    }

    /// Get as i64 (floats yield `None`)
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

/// A parameter range to sample from
#[derive(Debug, Clone)]
pub enum Parameter {
    /// Continuous range, optionally sampled in log space
    Float {
        /// Parameter name
        name: String,
        /// Lower bound (inclusive)
        min: f64,
        /// Upper bound (inclusive)
        max: f64,
        /// Sample log-uniformly instead of uniformly
        log_scale: bool,
    },
    /// Integer range with a step width
    Int {
        /// Parameter name
        name: String,
        /// Lower bound (inclusive)
        min: i64,
        /// Upper bound (inclusive)
        max: i64,
        /// Step between admissible values
        step: i64,
    },
}

impl Parameter {
    /// Get the parameter name
    pub fn name(&self) -> &str {
        match self {
            Parameter::Float { name, .. } => name,
            Parameter::Int { name, .. } => name,
        }
    }

    /// Sample a value from this parameter's range
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        match self {
            Parameter::Float {
                min,
                max,
                log_scale,
                ..
            } => {
                let value = if *log_scale {
                    let log_min = min.ln();
                    let log_max = max.ln();
                    (rng.gen::<f64>() * (log_max - log_min) + log_min).exp()
                } else {
                    rng.gen::<f64>() * (max - min) + min
                };
                ParameterValue::Float(value)
            }
            Parameter::Int {
                min, max, step, ..
            } => {
                let choices = (max - min) / step + 1;
                let value = min + step * rng.gen_range(0..choices);
                ParameterValue::Int(value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_log_uniform_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        let param = Parameter::Float {
            name: "lr".to_string(),
            min: 8e-5,
            max: 2e-3,
            log_scale: true,
        };
        for _ in 0..1_000 {
            let value = param.sample(&mut rng).as_f64();
            assert!((8e-5..=2e-3).contains(&value));
        }
    }

    #[test]
    fn test_stepped_int_aligns_to_step() {
        let mut rng = StdRng::seed_from_u64(2);
        let param = Parameter::Int {
            name: "hidden_layer_nodes".to_string(),
            min: 300,
            max: 900,
            step: 100,
        };
        for _ in 0..1_000 {
            let value = param.sample(&mut rng).as_i64().unwrap();
            assert!((300..=900).contains(&value));
            assert_eq!((value - 300) % 100, 0);
        }
    }

    #[test]
    fn test_int_range_covers_both_endpoints() {
        let mut rng = StdRng::seed_from_u64(3);
        let param = Parameter::Int {
            name: "embedder_layers".to_string(),
            min: 1,
            max: 2,
            step: 1,
        };
        let samples: Vec<i64> = (0..200)
            .map(|_| param.sample(&mut rng).as_i64().unwrap())
            .collect();
        assert!(samples.contains(&1));
        assert!(samples.contains(&2));
    }
}
