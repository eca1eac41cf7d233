//! Generator worker: a simulated acquisition channel.
//!
//! `SineSource` has no input queue. While running it produces one sample per
//! iteration, paced by its sample period, and accepts parameter changes as
//! application messages.

use std::convert::Infallible;
use std::f64::consts::TAU;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::worker::{
    Cleaner, DataProcessor, HardwareStarter, Leftovers, MessageProcessor, Specialization,
    WorkerBuilder, WorkerContext,
};

/// Category label of produced samples.
pub const SAMPLES_CATEGORY: &str = "samples";

/// One acquired sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Sample number since the channel was last armed.
    pub index: u64,
    /// Seconds since the channel was last armed.
    pub t: f64,
    pub value: f64,
}

/// Parameter changes, applied between samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "value", rename_all = "snake_case")]
pub enum SourceCommand {
    SetFrequency(f64),
    SetAmplitude(f64),
}

#[derive(Debug)]
pub struct SineSource {
    frequency: f64,
    amplitude: f64,
    period: Duration,
    index: u64,
    produced: u64,
}

impl SineSource {
    pub fn new(frequency: f64, amplitude: f64, period: Duration) -> Result<Self> {
        if period.is_zero() {
            return Err(Error::Config("sample period must be non-zero".to_string()));
        }
        check_frequency(frequency).map_err(Error::Config)?;
        check_amplitude(amplitude).map_err(Error::Config)?;
        Ok(Self {
            frequency,
            amplitude,
            period,
            index: 0,
            produced: 0,
        })
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    /// Builder for a source-only worker with every optional capability
    /// registered.
    pub fn builder(self, name: impl AsRef<str>) -> WorkerBuilder<Self> {
        WorkerBuilder::new(name, self)
            .source_only()
            .with_message_processor()
            .with_hardware_starter()
            .with_cleaner()
    }

    /// The sample at `index` under the current parameters.
    pub fn sample_at(&self, index: u64) -> Sample {
        let t = index as f64 * self.period.as_secs_f64();
        Sample {
            index,
            t,
            value: self.amplitude * (TAU * self.frequency * t).sin(),
        }
    }

    fn apply(&mut self, command: SourceCommand) -> Result<()> {
        match command {
            SourceCommand::SetFrequency(hz) => {
                check_frequency(hz).map_err(Error::InvalidRequest)?;
                self.frequency = hz;
            }
            SourceCommand::SetAmplitude(amplitude) => {
                check_amplitude(amplitude).map_err(Error::InvalidRequest)?;
                self.amplitude = amplitude;
            }
        }
        Ok(())
    }
}

fn check_frequency(hz: f64) -> std::result::Result<(), String> {
    if hz.is_finite() && hz >= 0.0 {
        Ok(())
    } else {
        Err(format!("frequency must be finite and non-negative, got {hz}"))
    }
}

fn check_amplitude(amplitude: f64) -> std::result::Result<(), String> {
    if amplitude.is_finite() {
        Ok(())
    } else {
        Err(format!("amplitude must be finite, got {amplitude}"))
    }
}

impl Specialization for SineSource {
    type Item = Infallible;
    type Message = SourceCommand;
    type Output = Sample;
}

impl DataProcessor for SineSource {
    fn process_data(
        &mut self,
        _input: Option<Infallible>,
        ctx: &mut WorkerContext<Sample>,
    ) -> Result<()> {
        std::thread::sleep(self.period);
        let sample = self.sample_at(self.index);
        self.index += 1;
        self.produced += 1;
        ctx.emit(SAMPLES_CATEGORY, sample)
    }
}

impl MessageProcessor for SineSource {
    fn process_messages(
        &mut self,
        messages: Vec<SourceCommand>,
        _ctx: &mut WorkerContext<Sample>,
    ) -> Result<()> {
        // Apply in order; a bad command doesn't block the ones after it.
        let mut first_error = None;
        for command in messages {
            debug!(?command, "applying source command");
            if let Err(e) = self.apply(command) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl HardwareStarter for SineSource {
    fn start_hardware(&mut self, ctx: &mut WorkerContext<Sample>) -> Result<()> {
        self.index = 0;
        info!(
            worker = %ctx.worker(),
            frequency = self.frequency,
            amplitude = self.amplitude,
            period_ms = self.period.as_millis() as u64,
            "source armed"
        );
        Ok(())
    }
}

impl Cleaner for SineSource {
    fn cleanup(
        &mut self,
        leftovers: Leftovers<Infallible, SourceCommand>,
        ctx: &mut WorkerContext<Sample>,
    ) -> Result<()> {
        info!(
            worker = %ctx.worker(),
            produced = self.produced,
            dropped_commands = leftovers.messages.len(),
            "source released"
        );
        Ok(())
    }
}
