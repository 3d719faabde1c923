use crate::errors::RiskError;

pub fn fmt_vec_output(v: &[f64]) -> String {
    v.iter().map(|n| format!("{:.4}", n)).collect::<Vec<_>>().join(", ")
}

// Validation
pub fn validate_float_parameter(value: f64, min: f64, max: f64, parameter: &str) -> Result<(), RiskError> {
    if value.is_nan() || value < min || max < value {
        Err(RiskError::InvalidParameter(
            parameter.to_string(),
            format!("real value within range {} and {}", min, max),
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Logistic function, stable for large magnitudes.
#[inline]
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

pub fn precision_round(n: f64, precision: i32) -> f64 {
    let p = (10.0_f64).powi(precision);
    (n * p).round() / p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(800.0) <= 1.0);
        assert!(sigmoid(-800.0) >= 0.0);
        assert!((sigmoid(2.0) + sigmoid(-2.0) - 1.0).abs() < 1e-15);
    }

    #[test]
    fn test_validate_float_parameter() {
        assert!(validate_float_parameter(0.5, 0.0, 1.0, "p").is_ok());
        assert!(validate_float_parameter(f64::NAN, 0.0, 1.0, "p").is_err());
        assert!(validate_float_parameter(1.5, 0.0, 1.0, "p").is_err());
    }

    #[test]
    fn test_fmt_vec_output() {
        assert_eq!(fmt_vec_output(&[1.0, 0.5]), "1.0000, 0.5000");
        assert_eq!(fmt_vec_output(&[]), "");
    }
}
