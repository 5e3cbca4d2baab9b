// src/types.rs
use std::path::PathBuf;
use crate::drivers::Gain;

// 连接模式
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum ConnectionMode {
    Simulation,
    Hardware,
}

// GUI 发给后台的命令
#[derive(Clone, Debug)]
pub enum GuiCommand {
    RefreshPorts,
    // Hardware 模式下携带串口名
    Connect(ConnectionMode, Option<String>),
    Disconnect,
    // 发送增益后开始接收
    StartStream(Gain),
    StopStream,
    SendGain(Gain),
    ExportData,
    ExportSnapshot,
    Shutdown,
}

// 后台发给 GUI 的消息
#[derive(Clone, Debug)]
pub enum AppMessage {
    Log(String),
    Ports(Vec<String>),
    Status(bool),         // 连接状态
    Streaming(bool),      // 接收状态
    Exported(PathBuf),
}
