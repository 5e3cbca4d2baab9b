// src/main.rs
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
mod config;
mod drivers;
mod engine;
mod gui;
mod types;
use anyhow::anyhow;
use config::AppConfig;
use drivers::{AcquisitionPipeline, DisplayFeed, DisplaySink};
use eframe::egui;
use std::sync::Arc;
// 入口函数
fn main() -> anyhow::Result<()> {
    env_logger::init();
    // 配置文件无效时退回默认值，不阻止启动
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::error!("{e:#}; using default settings");
        AppConfig::default()
    });
    let feed = Arc::new(DisplayFeed::new());
    let pipeline = AcquisitionPipeline::new(
        config.pipeline(),
        Some(Arc::clone(&feed) as Arc<dyn DisplaySink>),
    )?;
    let store = pipeline.store().clone();
    let engine = engine::spawn_thread(config.clone(), pipeline)?;
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1100.0, 680.0])
        .with_min_inner_size([800.0, 500.0])
        .with_title("ADC Scope");
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    eframe::run_native(
        "ADC Scope",
        options,
        Box::new(move |cc| {
            Box::new(gui::AdcScopeApp::new(
                cc,
                feed,
                store,
                engine,
                config.plot_window,
                config.port.clone(),
            ))
        }),
    )
    .map_err(|e| anyhow!("{e}"))
}
