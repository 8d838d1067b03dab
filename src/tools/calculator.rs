use crate::function::{Function, Toolkit};
use anyhow::{Result, bail};
use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Deserialize, JsonSchema)]
pub struct IntPairArgs {
    /// First integer
    pub first_int: i64,
    /// Second integer
    pub second_int: i64,
}

#[derive(Deserialize, JsonSchema)]
pub struct PowerArgs {
    /// Base number
    pub base: f64,
    /// Exponent to raise the base to
    pub exponent: f64,
}

#[derive(Deserialize, JsonSchema)]
pub struct IntegerArgs {
    /// Non-negative integer
    pub n: u64,
}

/// Integral results print without a fractional part.
pub fn format_number(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        format!("{}", x)
    }
}

pub fn divide(a: f64, b: f64) -> Result<f64> {
    if b == 0.0 {
        bail!("Division by zero is undefined");
    }
    Ok(a / b)
}

pub fn factorial(n: u64) -> Result<u128> {
    (1..=u128::from(n))
        .try_fold(1u128, |acc, k| acc.checked_mul(k))
        .ok_or_else(|| anyhow::anyhow!("Factorial of {} overflows", n))
}

pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n < 4 {
        return true;
    }
    if n % 2 == 0 {
        return false;
    }
    let mut i = 3u64;
    while i.saturating_mul(i) <= n {
        if n % i == 0 {
            return false;
        }
        i += 2;
    }
    true
}

fn finite(result: f64) -> Result<String> {
    if !result.is_finite() {
        bail!("Result is not a finite number");
    }
    Ok(format_number(result))
}

fn integer(name: &'static str, description: &str, op: fn(i64, i64) -> Option<i64>) -> Function {
    Function::typed(name, description, move |args: IntPairArgs| {
        op(args.first_int, args.second_int)
            .map(|n| n.to_string())
            .ok_or_else(|| anyhow::anyhow!("{} of {} and {} overflows", name, args.first_int, args.second_int))
    })
}

pub fn calculator() -> Toolkit {
    Toolkit::new("calculator")
        .register(integer("add", "Add two integers and return the result.", i64::checked_add))
        .register(integer("subtract", "Subtract the second integer from the first.", i64::checked_sub))
        .register(integer("multiply", "Multiply two integers and return the result.", i64::checked_mul))
        .register(Function::typed(
            "divide",
            "Divide the first integer by the second.",
            |args: IntPairArgs| finite(divide(args.first_int as f64, args.second_int as f64)?),
        ))
        .register(Function::typed(
            "exponentiate",
            "Raise the base to the power of the exponent.",
            |args: PowerArgs| finite(args.base.powf(args.exponent)),
        ))
        .register(Function::typed(
            "factorial",
            "Calculate the factorial of a non-negative integer.",
            |args: IntegerArgs| Ok(factorial(args.n)?.to_string()),
        ))
        .register(Function::typed(
            "is_prime",
            "Check whether a number is prime.",
            |args: IntegerArgs| Ok(is_prime(args.n).to_string()),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primes() {
        let primes: Vec<u64> = (0..30).filter(|n| is_prime(*n)).collect();
        assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
    }

    #[test]
    fn factorial_overflow_is_an_error() {
        assert_eq!(factorial(0).unwrap(), 1);
        assert_eq!(factorial(20).unwrap(), 2_432_902_008_176_640_000);
        assert!(factorial(40).is_err());
    }

    #[test]
    fn numbers_format_compactly() {
        assert_eq!(format_number(5.0), "5");
        assert_eq!(format_number(-2.0), "-2");
        assert_eq!(format_number(2.5), "2.5");
    }
}
