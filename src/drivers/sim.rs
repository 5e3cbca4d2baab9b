use std::thread::{self, JoinHandle};
use std::time::Duration;
use crate::drivers::gain::Gain;
use crate::drivers::link::{manual_link, DeviceLink, ManualFeeder, ReaderState};
use crate::drivers::LinkError;
const ADC_MID: f64 = 512.0;
const ADC_MAX: f64 = 1023.0;
/// Opens a link to a simulated 10-bit ADC that prints one reading per line,
/// like the device firmware does. Gain tokens written to the link change the
/// signal amplitude.
pub fn open_simulated(period: Duration, read_timeout: Duration) -> Result<DeviceLink, LinkError> {
    let (link, feeder) = manual_link("simulator", Some(read_timeout));
    spawn_generator(feeder, period)?;
    Ok(link)
}
fn spawn_generator(feeder: ManualFeeder, period: Duration) -> Result<JoinHandle<()>, LinkError> {
    thread::Builder::new()
        .name("adc-simulator".into())
        .spawn(move || {
            let mut phase = 0.0f64;
            let mut gain = Gain::X10;
            loop {
                // 会话开始读取之前不产生数据，避免积压的旧读数
                match feeder.reader_state() {
                    ReaderState::Gone => break,
                    ReaderState::Idle => {
                        thread::sleep(period);
                        continue;
                    }
                    ReaderState::Reading => {}
                }
                let written = feeder.take_written();
                if let Ok(new_gain) = String::from_utf8_lossy(&written).parse::<Gain>() {
                    log::debug!("simulator gain set to {new_gain}");
                    gain = new_gain;
                }
                phase += 0.1;
                let value = reading(phase, gain);
                if !feeder.push(format!("{value:.2}\r\n")) {
                    break;
                }
                thread::sleep(period);
            }
            log::debug!("simulator stopped");
        })
        .map_err(|e| LinkError::WorkerSpawn("simulator", e))
}
fn reading(phase: f64, gain: Gain) -> f64 {
    let amplitude = (gain.factor().max(1.0).log10() + 1.0) * 100.0;
    let wave = phase.sin() + 0.3 * (phase * 3.7).sin();
    (ADC_MID + wave * amplitude).clamp(0.0, ADC_MAX)
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::pipeline::{AcquisitionPipeline, PipelineConfig};
    use std::time::Instant;
    #[test]
    fn readings_stay_in_adc_range() {
        for gain in Gain::ALL {
            for step in 0..200 {
                let v = reading(step as f64 * 0.1, gain);
                assert!((0.0..=ADC_MAX).contains(&v));
            }
        }
    }
    #[test]
    fn higher_gain_swings_wider() {
        let swing = |gain| {
            (0..100)
                .map(|i| (reading(i as f64 * 0.1, gain) - ADC_MID).abs())
                .fold(0.0, f64::max)
        };
        assert!(swing(Gain::X100) > swing(Gain::X10));
    }
    #[test]
    fn simulated_link_feeds_a_session() {
        let mut pipeline = AcquisitionPipeline::new(PipelineConfig::default(), None).unwrap();
        let link = open_simulated(Duration::from_millis(1), Duration::from_millis(5)).unwrap();
        pipeline.start(link).unwrap();
        pipeline.send_gain(Gain::X1000).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while pipeline.sample_count().unwrap() < 10 {
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(2));
        }
        pipeline.stop().unwrap();
        let samples = pipeline.snapshot().unwrap();
        assert!(samples.iter().enumerate().all(|(i, s)| s.index == i as u64));
    }
    #[test]
    fn idle_link_does_not_queue_readings() {
        let mut pipeline = AcquisitionPipeline::new(PipelineConfig::default(), None).unwrap();
        let link = open_simulated(Duration::from_millis(1), Duration::from_millis(5)).unwrap();
        // left connected but not streaming
        thread::sleep(Duration::from_millis(300));
        pipeline.start(link).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while pipeline.sample_count().unwrap() == 0 {
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(1));
        }
        pipeline.stop().unwrap();
        let samples = pipeline.snapshot().unwrap();
        assert!(samples.len() < 100, "stale readings replayed: {}", samples.len());
        let first = samples.first().map(|s| s.value);
        assert_eq!(first.map(|v| format!("{v:.2}")), Some(format!("{:.2}", reading(0.1, Gain::X10))));
    }
}
