// src/engine.rs
use crate::config::AppConfig;
use crate::drivers::{
    self, export, list_ports, open_serial, render_samples_png, AcquisitionPipeline, DeviceLink,
    Gain, PlotStyle, SessionState,
};
use crate::types::*;
use anyhow::{anyhow, Result};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// GUI 侧持有的后台引擎句柄
pub struct EngineHandle {
    pub tx_cmd: Sender<GuiCommand>,
    pub rx: Receiver<AppMessage>,
    join: Option<JoinHandle<()>>,
}

impl EngineHandle {
    pub fn send(&self, cmd: GuiCommand) {
        if self.tx_cmd.send(cmd).is_err() {
            log::error!("engine thread is gone");
        }
    }

    /// 请求后台退出并等待会话关闭
    pub fn shutdown(&mut self) {
        if let Some(join) = self.join.take() {
            self.tx_cmd.send(GuiCommand::Shutdown).ok();
            if join.join().is_err() {
                log::error!("engine thread panicked");
            }
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn spawn_thread(config: AppConfig, pipeline: AcquisitionPipeline) -> Result<EngineHandle> {
    let (tx, rx) = channel();
    let (tx_cmd, rx_cmd) = channel();
    let join = thread::Builder::new()
        .name("engine".into())
        .spawn(move || Engine::new(config, pipeline, tx).run(rx_cmd))?;
    Ok(EngineHandle { tx_cmd, rx, join: Some(join) })
}

// 当前选择的设备
#[derive(Clone, Debug, PartialEq)]
enum Target {
    Simulation,
    Serial(String),
}

struct Engine {
    config: AppConfig,
    pipeline: AcquisitionPipeline,
    tx: Sender<AppMessage>,
    target: Option<Target>,
    // 已打开但尚未开始会话的连接
    pending: Option<DeviceLink>,
    is_streaming: bool,
}

impl Engine {
    fn new(config: AppConfig, pipeline: AcquisitionPipeline, tx: Sender<AppMessage>) -> Self {
        Self { config, pipeline, tx, target: None, pending: None, is_streaming: false }
    }

    fn run(mut self, rx_cmd: Receiver<GuiCommand>) {
        self.log("⚙️ Engine ready.");
        self.emit(AppMessage::Ports(list_ports()));
        loop {
            match rx_cmd.recv_timeout(POLL_INTERVAL) {
                Ok(GuiCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(cmd) => {
                    if let Err(e) = self.handle(cmd) {
                        self.log(&format!("❌ {e:#}"));
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
            }
            self.watch_session();
        }
        self.pipeline.dispose();
        log::info!("engine stopped");
    }

    fn handle(&mut self, cmd: GuiCommand) -> Result<()> {
        match cmd {
            GuiCommand::RefreshPorts => self.emit(AppMessage::Ports(list_ports())),
            GuiCommand::Connect(mode, port) => self.connect(mode, port)?,
            GuiCommand::Disconnect => {
                self.pipeline.stop()?;
                self.pending = None;
                self.target = None;
                self.set_streaming(false);
                self.emit(AppMessage::Status(false));
                self.log("🔌 Disconnected");
            }
            GuiCommand::StartStream(gain) => self.start_stream(gain)?,
            GuiCommand::StopStream => {
                self.pipeline.stop()?;
                self.set_streaming(false);
                let kept = self.pipeline.sample_count()?;
                self.log(&format!("🛑 Stream Stopped ({kept} samples)"));
            }
            GuiCommand::SendGain(gain) => {
                self.pipeline.send_gain(gain)?;
                self.log(&format!("📤 Option sent to device: {gain}"));
            }
            GuiCommand::ExportData => {
                let text = self.pipeline.export()?;
                let path = export::write_atomically(
                    &self.config.export_dir(),
                    &self.config.export_file_name,
                    text.as_bytes(),
                )?;
                self.log(&format!(
                    "💾 Data exported as {} ({} samples)",
                    export::MIME_TYPE,
                    text.lines().count()
                ));
                self.emit(AppMessage::Exported(path));
            }
            GuiCommand::ExportSnapshot => {
                let samples = self.pipeline.snapshot()?;
                let png = render_samples_png(&samples, &PlotStyle::default())?;
                let path = export::write_atomically(
                    &self.config.export_dir(),
                    &self.config.snapshot_file_name,
                    &png,
                )?;
                self.emit(AppMessage::Exported(path));
            }
            GuiCommand::Shutdown => {}
        }
        Ok(())
    }

    fn connect(&mut self, mode: ConnectionMode, port: Option<String>) -> Result<()> {
        let target = match mode {
            ConnectionMode::Simulation => Target::Simulation,
            ConnectionMode::Hardware => Target::Serial(
                port.or_else(|| self.config.port.clone())
                    .ok_or_else(|| anyhow!("select a serial port first"))?,
            ),
        };
        if self.target.as_ref() == Some(&target) {
            return Ok(());
        }
        self.pipeline.stop()?;
        self.set_streaming(false);
        self.target = None;
        self.pending = Some(self.open(&target)?);
        self.log(&format!("✅ Connected to {target:?}"));
        self.target = Some(target);
        self.emit(AppMessage::Status(true));
        Ok(())
    }

    fn start_stream(&mut self, gain: Gain) -> Result<()> {
        let target = self.target.clone().ok_or(drivers::LinkError::NotConnected)?;
        // 会话结束时连接已关闭，重新打开同一设备
        let link = match self.pending.take() {
            Some(link) => link,
            None => self.open(&target)?,
        };
        let session = self.pipeline.start(link)?;
        self.set_streaming(true);
        self.log(&format!("🌊 Stream Started (session {session})"));
        match self.pipeline.send_gain(gain) {
            Ok(()) => self.log(&format!("📤 Option sent to device: {gain}")),
            Err(e) => self.log(&format!("❌ Error sending option to device: {e}")),
        }
        Ok(())
    }

    fn open(&self, target: &Target) -> Result<DeviceLink> {
        let link = match target {
            Target::Simulation => drivers::sim::open_simulated(
                self.config.simulator_period(),
                self.config.read_timeout(),
            )?,
            Target::Serial(port) => {
                open_serial(port, self.config.baud_rate, self.config.read_timeout())?
            }
        };
        Ok(link)
    }

    // 设备主动断开时同步界面状态
    fn watch_session(&mut self) {
        if self.is_streaming && self.pipeline.state() != SessionState::Active {
            self.log("⚠️ Device closed the link");
            self.set_streaming(false);
        }
    }

    fn set_streaming(&mut self, streaming: bool) {
        if self.is_streaming != streaming {
            self.is_streaming = streaming;
            self.emit(AppMessage::Streaming(streaming));
        }
    }

    fn log(&self, msg: &str) {
        log::info!("{msg}");
        self.emit(AppMessage::Log(msg.to_owned()));
    }

    fn emit(&self, msg: AppMessage) {
        self.tx.send(msg).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn test_config(dir: &std::path::Path) -> AppConfig {
        AppConfig {
            export_dir: Some(dir.to_path_buf()),
            simulator_period_ms: 1,
            read_timeout_ms: 5,
            stop_timeout_ms: 500,
            ..AppConfig::default()
        }
    }

    fn wait_for(rx: &Receiver<AppMessage>, mut pred: impl FnMut(&AppMessage) -> bool) -> AppMessage {
        let deadline = Instant::now() + Duration::from_secs(3);
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            let msg = rx.recv_timeout(left).expect("expected engine message");
            if pred(&msg) {
                return msg;
            }
        }
    }

    #[test]
    fn simulated_session_exports_data_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let pipeline = AcquisitionPipeline::new(config.pipeline(), None).unwrap();
        let store = pipeline.store().clone();
        let mut engine = spawn_thread(config, pipeline).unwrap();
        engine.send(GuiCommand::Connect(ConnectionMode::Simulation, None));
        wait_for(&engine.rx, |m| matches!(m, AppMessage::Status(true)));
        engine.send(GuiCommand::StartStream(Gain::X100));
        wait_for(&engine.rx, |m| matches!(m, AppMessage::Streaming(true)));
        let deadline = Instant::now() + Duration::from_secs(3);
        while store.len().unwrap() < 5 {
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(5));
        }
        engine.send(GuiCommand::StopStream);
        wait_for(&engine.rx, |m| matches!(m, AppMessage::Streaming(false)));
        engine.send(GuiCommand::ExportData);
        let AppMessage::Exported(path) = wait_for(&engine.rx, |m| matches!(m, AppMessage::Exported(_))) else {
            unreachable!()
        };
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text.lines().count(), store.len().unwrap());
        assert!(text.starts_with("0,"));
        engine.shutdown();
    }

    #[test]
    fn hardware_connect_without_port_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let pipeline = AcquisitionPipeline::new(config.pipeline(), None).unwrap();
        let engine = spawn_thread(config, pipeline).unwrap();
        engine.send(GuiCommand::Connect(ConnectionMode::Hardware, None));
        let msg = wait_for(&engine.rx, |m| matches!(m, AppMessage::Log(s) if s.starts_with("❌")));
        assert!(matches!(msg, AppMessage::Log(s) if s.contains("serial port")));
    }

    #[test]
    fn start_without_connection_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let pipeline = AcquisitionPipeline::new(config.pipeline(), None).unwrap();
        let engine = spawn_thread(config, pipeline).unwrap();
        engine.send(GuiCommand::StartStream(Gain::X10));
        wait_for(&engine.rx, |m| matches!(m, AppMessage::Log(s) if s.contains("no open device link")));
    }
}
