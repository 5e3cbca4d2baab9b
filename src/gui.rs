// src/gui.rs
use eframe::egui;
use egui::Color32;
use egui_plot::{Line, Plot, PlotPoints};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use crate::drivers::{DisplayFeed, Gain, PlotWindow, SampleStore, GAIN_SENTINEL};
use crate::engine::EngineHandle;
use crate::types::*;

const APP_INFO: &str = "ADC Scope streams readings from a Bluetooth-paired \
microcontroller, plots them live and saves them as <index>,<value> lines.\n\n\
1. Pick SIM or REAL and a serial port (RFCOMM binding), then CONNECT.\n\
2. Choose a gain and press START.\n\
3. STOP ends the session; SAVE writes data.txt.";

pub struct AdcScopeApp {
    // 系统状态
    is_connected: bool,
    is_streaming: bool,
    has_session: bool,
    connection_mode: ConnectionMode,
    ports: Vec<String>,
    selected_port: Option<String>,
    // None 表示仍停留在 "GAIN" 占位项
    gain: Option<Gain>,
    show_info: bool,
    last_export: Option<PathBuf>,

    // 数据流
    feed: Arc<DisplayFeed>,
    store: SampleStore,
    window: PlotWindow,

    // 界面日志
    log_messages: Vec<String>,

    // 通讯管道
    engine: EngineHandle,
}

impl AdcScopeApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        feed: Arc<DisplayFeed>,
        store: SampleStore,
        engine: EngineHandle,
        plot_window: usize,
        selected_port: Option<String>,
    ) -> Self {
        // 新样本到达时唤醒界面重绘
        let ctx = cc.egui_ctx.clone();
        feed.set_waker(move || ctx.request_repaint());
        Self {
            is_connected: false, is_streaming: false, has_session: false,
            connection_mode: ConnectionMode::Simulation,
            ports: Vec::new(), selected_port,
            gain: None, show_info: false, last_export: None,
            feed, store, window: PlotWindow::with_capacity(plot_window),
            log_messages: vec!["ADC Scope Ready.".to_owned()],
            engine,
        }
    }

    fn log(&mut self, msg: &str) {
        self.log_messages.push(format!("> {}", msg));
        if self.log_messages.len() > 8 { self.log_messages.remove(0); }
    }

    fn drain_messages(&mut self) {
        while let Ok(msg) = self.engine.rx.try_recv() {
            match msg {
                AppMessage::Log(s) => self.log(&s),
                AppMessage::Ports(ports) => {
                    if self.selected_port.is_none() { self.selected_port = ports.first().cloned(); }
                    self.ports = ports;
                }
                AppMessage::Status(b) => self.is_connected = b,
                AppMessage::Streaming(b) => {
                    self.is_streaming = b;
                    if b { self.has_session = true; }
                }
                AppMessage::Exported(path) => {
                    self.log(&format!("Saved {}", path.display()));
                    self.last_export = Some(path);
                }
            }
        }
    }

    fn pull_samples(&mut self) {
        if self.feed.take_pending() {
            if let Err(e) = self.window.sync(&self.store) {
                self.log(&format!("❌ {e}"));
            }
        }
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.selectable_value(&mut self.connection_mode, ConnectionMode::Simulation, "SIM");
            ui.selectable_value(&mut self.connection_mode, ConnectionMode::Hardware, "REAL");
        });

        if self.connection_mode == ConnectionMode::Hardware {
            ui.horizontal(|ui| {
                let shown = self.selected_port.clone().unwrap_or_else(|| "(no port)".to_owned());
                egui::ComboBox::from_id_source("port")
                    .selected_text(shown)
                    .show_ui(ui, |ui| {
                        for port in &self.ports {
                            ui.selectable_value(&mut self.selected_port, Some(port.clone()), port.as_str());
                        }
                    });
                if ui.button("🔄").clicked() { self.engine.send(GuiCommand::RefreshPorts); }
            });
        }

        let btn_txt = if self.is_connected { "DISCONNECT" } else { "CONNECT" };
        if ui.button(btn_txt).clicked() {
            if !self.is_connected {
                let port = match self.connection_mode {
                    ConnectionMode::Hardware => self.selected_port.clone(),
                    ConnectionMode::Simulation => None,
                };
                self.engine.send(GuiCommand::Connect(self.connection_mode, port));
            } else {
                self.engine.send(GuiCommand::Disconnect);
            }
        }

        ui.add_space(10.0);
        ui.add_enabled_ui(self.is_connected, |ui| {
            let shown = self.gain.map(|g| g.token()).unwrap_or(GAIN_SENTINEL);
            egui::ComboBox::from_id_source("gain")
                .selected_text(shown)
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut self.gain, None, GAIN_SENTINEL);
                    for gain in Gain::ALL {
                        ui.selectable_value(&mut self.gain, Some(gain), gain.token());
                    }
                });
        });

        ui.horizontal(|ui| {
            let start = egui::Button::new(egui::RichText::new("▶ START").color(Color32::WHITE))
                .fill(if self.is_connected { Color32::from_rgb(0, 120, 60) } else { Color32::from_rgb(30, 30, 30) });
            if ui.add_enabled(self.is_connected, start).clicked() {
                match self.gain {
                    Some(gain) => self.engine.send(GuiCommand::StartStream(gain)),
                    None => self.log("Select a valid gain option"),
                }
            }
            let stop = egui::Button::new(egui::RichText::new("⏹ STOP").color(Color32::WHITE))
                .fill(if self.is_streaming { Color32::RED } else { Color32::from_rgb(30, 30, 30) });
            if ui.add_enabled(self.is_streaming, stop).clicked() {
                self.engine.send(GuiCommand::StopStream);
            }
        });
        if ui.add_enabled(self.is_streaming && self.gain.is_some(), egui::Button::new("📤 SEND GAIN")).clicked() {
            if let Some(gain) = self.gain { self.engine.send(GuiCommand::SendGain(gain)); }
        }

        ui.add_space(10.0);
        ui.horizontal(|ui| {
            if ui.add_enabled(self.has_session, egui::Button::new("💾 SAVE")).clicked() {
                self.engine.send(GuiCommand::ExportData);
            }
            if ui.add_enabled(self.has_session && !self.window.is_empty(), egui::Button::new("🖼 SNAPSHOT")).clicked() {
                self.engine.send(GuiCommand::ExportSnapshot);
            }
            if ui.button("ℹ INFO").clicked() { self.show_info = true; }
        });
        if let Some(path) = &self.last_export {
            ui.label(egui::RichText::new(path.display().to_string()).small());
        }
    }
}

impl eframe::App for AdcScopeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // 1. 消息处理
        self.drain_messages();
        self.pull_samples();
        // 后台消息不会主动唤醒界面，定期轮询
        ctx.request_repaint_after(Duration::from_millis(200));

        // 2. UI 绘制
        egui::SidePanel::left("L").min_width(260.0).show(ctx, |ui| {
            ui.add_space(10.0);
            ui.heading("ADC Scope");
            ui.label("Bluetooth ADC Monitor");
            ui.separator();
            self.controls(ui);
            ui.add_space(10.0);
            egui::ScrollArea::vertical().max_height(160.0).show(ui, |ui| {
                for m in &self.log_messages { ui.monospace(m); }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                if !self.is_connected { ui.label("Connect first."); }
                // 序列长度可能领先于已绘制的点
                ui.label(format!("Samples: {} (plotted {})", self.feed.available(), self.window.next_index()));
            });
            Plot::new("adc_plot")
                .auto_bounds_x()
                .auto_bounds_y()
                .show(ui, |plot_ui| {
                    plot_ui.line(Line::new(PlotPoints::new(self.window.points())).name("Data ADC").color(Color32::from_rgb(0, 255, 255)));
                });
        });

        if self.show_info {
            egui::Window::new("Application Information")
                .open(&mut self.show_info)
                .collapsible(false)
                .show(ctx, |ui| { ui.label(APP_INFO); });
        }
    }
}
