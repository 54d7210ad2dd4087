use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};

/// An `f64` that can be replaced from any thread without locking.
#[derive(Debug)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    #[inline(always)]
    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    #[inline(always)]
    fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release)
    }
}

/// Temperature and external field, each an independent last-writer-wins cell.
#[derive(Debug)]
pub struct Parameters {
    temperature: AtomicF64,
    magnetic_field: AtomicF64,
}

impl Parameters {
    pub fn new(temperature: f64, magnetic_field: f64) -> Self {
        Self {
            temperature: AtomicF64::new(temperature),
            magnetic_field: AtomicF64::new(magnetic_field),
        }
    }
}

/// Shared handle to a lattice's parameters, handed to whatever drives them
/// from outside the sampling loop (sliders, stdin, tests).
#[derive(Debug, Clone)]
pub struct ParameterHandle(Arc<Parameters>);

impl ParameterHandle {
    pub fn new(temperature: f64, magnetic_field: f64) -> Self {
        Self(Arc::new(Parameters::new(temperature, magnetic_field)))
    }

    #[inline(always)]
    pub fn temperature(&self) -> f64 {
        self.0.temperature.load()
    }

    #[inline(always)]
    pub fn magnetic_field(&self) -> f64 {
        self.0.magnetic_field.load()
    }

    pub fn set_temperature(&self, temperature: f64) {
        self.0.temperature.store(temperature);
    }

    pub fn set_magnetic_field(&self, magnetic_field: f64) {
        self.0.magnetic_field.store(magnetic_field);
    }

    pub fn apply(&self, update: ParameterUpdate) {
        match update {
            ParameterUpdate::Temperature(t) => self.set_temperature(t),
            ParameterUpdate::MagneticField(h) => self.set_magnetic_field(h),
        }
    }
}

/// A single parameter change, as typed on the headless binary's stdin:
/// `temperature 2.3`, `t 2.3`, `field -0.5` or `h -0.5`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterUpdate {
    Temperature(f64),
    MagneticField(f64),
}

impl FromStr for ParameterUpdate {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let name = parts
            .next()
            .ok_or_else(|| anyhow!("empty parameter command"))?;
        let value = parts
            .next()
            .ok_or_else(|| anyhow!("missing value for `{}`", name))?;
        if let Some(extra) = parts.next() {
            bail!("unexpected `{}` after parameter value", extra);
        }

        let value: f64 = value
            .parse()
            .with_context(|| format!("`{}` is not a number", value))?;

        match name.to_ascii_lowercase().as_str() {
            "t" | "temperature" => Ok(ParameterUpdate::Temperature(value)),
            "h" | "field" => Ok(ParameterUpdate::MagneticField(value)),
            other => bail!("unknown parameter `{}`", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn parses_commands() {
        assert_eq!(
            "t 2.5".parse::<ParameterUpdate>().unwrap(),
            ParameterUpdate::Temperature(2.5)
        );
        assert_eq!(
            "  Temperature   0.01 ".parse::<ParameterUpdate>().unwrap(),
            ParameterUpdate::Temperature(0.01)
        );
        assert_eq!(
            "field -3".parse::<ParameterUpdate>().unwrap(),
            ParameterUpdate::MagneticField(-3.0)
        );
        assert_eq!(
            "H 1e-2".parse::<ParameterUpdate>().unwrap(),
            ParameterUpdate::MagneticField(0.01)
        );
    }

    #[test]
    fn rejects_malformed_commands() {
        for line in ["", "t", "t abc", "pressure 1.0", "t 1.0 2.0"] {
            assert!(line.parse::<ParameterUpdate>().is_err(), "{:?}", line);
        }
    }

    #[test]
    fn fields_are_independent() {
        let params = ParameterHandle::new(50.0, 0.0);
        params.apply(ParameterUpdate::MagneticField(-1.5));
        assert_eq!(params.temperature(), 50.0);
        assert_eq!(params.magnetic_field(), -1.5);

        params.apply(ParameterUpdate::Temperature(-2.0));
        assert_eq!(params.temperature(), -2.0);
        assert_eq!(params.magnetic_field(), -1.5);
    }

    #[test]
    fn writes_from_other_threads_are_visible() {
        let params = ParameterHandle::new(50.0, 0.0);
        let remote = params.clone();
        thread::spawn(move || {
            remote.set_temperature(1.25);
            remote.set_magnetic_field(0.5);
        })
        .join()
        .unwrap();

        assert_eq!(params.temperature(), 1.25);
        assert_eq!(params.magnetic_field(), 0.5);
    }
}
